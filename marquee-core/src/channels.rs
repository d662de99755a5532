use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::events::SeatEvent;

const CHANNEL_CAPACITY: usize = 100;

/// Showtime-scoped fan-out: one broadcast channel per showtime, created
/// lazily on the first subscriber. Delivery is best-effort and at-most-once;
/// a client that was offline reconciles via the seat listing when it rejoins.
pub struct ShowtimeChannels {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<SeatEvent>>>,
}

impl ShowtimeChannels {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Join a showtime's group. The subscription lapses when the receiver is
    /// dropped, i.e. when the client disconnects.
    pub fn subscribe(&self, showtime_id: Uuid) -> broadcast::Receiver<SeatEvent> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(showtime_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver an event to everyone watching this showtime. A showtime with
    /// no listeners is a no-op, and senders whose last receiver is gone are
    /// pruned on the way out.
    pub fn publish(&self, showtime_id: Uuid, event: SeatEvent) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let dead = match channels.get(&showtime_id) {
            Some(sender) => sender.send(event).is_err() || sender.receiver_count() == 0,
            None => false,
        };
        if dead {
            channels.remove(&showtime_id);
        }
    }

    pub fn group_count(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for ShowtimeChannels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn released(seat_id: Uuid) -> SeatEvent {
        SeatEvent::SeatReservationReleased {
            seat_id,
            owner_token: "conn-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_all_group_subscribers() {
        let channels = ShowtimeChannels::new();
        let showtime = Uuid::new_v4();
        let seat = Uuid::new_v4();

        let mut rx_a = channels.subscribe(showtime);
        let mut rx_b = channels.subscribe(showtime);
        channels.publish(showtime, released(seat));

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                SeatEvent::SeatReservationReleased { seat_id, .. } => assert_eq!(seat_id, seat),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_groups_are_isolated_per_showtime() {
        let channels = ShowtimeChannels::new();
        let (st_a, st_b) = (Uuid::new_v4(), Uuid::new_v4());

        let mut rx_a = channels.subscribe(st_a);
        let _rx_b = channels.subscribe(st_b);
        channels.publish(st_b, released(Uuid::new_v4()));

        assert!(matches!(
            rx_a.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let channels = ShowtimeChannels::new();
        channels.publish(Uuid::new_v4(), released(Uuid::new_v4()));
        assert_eq!(channels.group_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_group_is_pruned() {
        let channels = ShowtimeChannels::new();
        let showtime = Uuid::new_v4();

        let rx = channels.subscribe(showtime);
        assert_eq!(channels.group_count(), 1);

        drop(rx);
        channels.publish(showtime, released(Uuid::new_v4()));
        assert_eq!(channels.group_count(), 0);
    }
}
