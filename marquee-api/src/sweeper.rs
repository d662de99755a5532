use chrono::Utc;
use marquee_core::{HoldRegistry, SeatEvent, ShowtimeChannels};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Periodically reclaim abandoned holds and tell each showtime's group which
/// seats came back. Runs for the process lifetime; one pass holds the
/// registry lock only while scanning, so claims are never starved.
pub async fn run_hold_sweeper(
    holds: Arc<HoldRegistry>,
    channels: Arc<ShowtimeChannels>,
    interval: Duration,
) {
    info!("Hold sweeper started, interval {:?}", interval);
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so a restart doesn't race
    // startup claims.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let expired = holds.sweep_expired(Utc::now());
        if expired.is_empty() {
            continue;
        }

        debug!("Sweeper evicted {} expired holds", expired.len());
        for hold in expired {
            channels.publish(
                hold.showtime_id,
                SeatEvent::SeatReservationExpired {
                    seat_id: hold.seat_id,
                    owner_token: hold.owner_token,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_sweep_broadcasts_expiry_exactly_once() {
        let holds = Arc::new(HoldRegistry::new(ChronoDuration::seconds(300)));
        let channels = Arc::new(ShowtimeChannels::new());
        let (showtime, seat) = (Uuid::new_v4(), Uuid::new_v4());
        let t0 = Utc::now() - ChronoDuration::seconds(400);

        holds.claim_at(showtime, seat, "conn-x", t0).unwrap();
        let mut rx = channels.subscribe(showtime);

        // Two passes; only the first finds the stale hold.
        for expired in holds.sweep_expired(Utc::now()) {
            channels.publish(
                expired.showtime_id,
                SeatEvent::SeatReservationExpired {
                    seat_id: expired.seat_id,
                    owner_token: expired.owner_token,
                },
            );
        }
        assert!(holds.sweep_expired(Utc::now()).is_empty());

        match rx.try_recv().unwrap() {
            SeatEvent::SeatReservationExpired { seat_id, owner_token } => {
                assert_eq!(seat_id, seat);
                assert_eq!(owner_token, "conn-x");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
