use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Realtime events fanned out to a showtime's broadcast group. The wire name
/// doubles as the SSE event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SeatEvent {
    SeatTemporarilyReserved {
        seat_id: Uuid,
        owner_token: String,
    },
    SeatReservationReleased {
        seat_id: Uuid,
        owner_token: String,
    },
    SeatReservationExpired {
        seat_id: Uuid,
        owner_token: String,
    },
    SeatsBooked {
        seat_ids: Vec<Uuid>,
        booking_id: Uuid,
        owner_token: String,
    },
    BookingCancelled {
        seat_ids: Vec<Uuid>,
        booking_id: Uuid,
    },
}

impl SeatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SeatEvent::SeatTemporarilyReserved { .. } => "seat_temporarily_reserved",
            SeatEvent::SeatReservationReleased { .. } => "seat_reservation_released",
            SeatEvent::SeatReservationExpired { .. } => "seat_reservation_expired",
            SeatEvent::SeatsBooked { .. } => "seats_booked",
            SeatEvent::BookingCancelled { .. } => "booking_cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let seat_id = Uuid::new_v4();
        let event = SeatEvent::SeatTemporarilyReserved {
            seat_id,
            owner_token: "conn-1".to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "seat_temporarily_reserved");
        assert_eq!(value["seat_id"], seat_id.to_string());
        assert_eq!(value["owner_token"], "conn-1");
        assert_eq!(event.name(), "seat_temporarily_reserved");
    }

    #[test]
    fn test_booked_event_carries_all_seats() {
        let booking_id = Uuid::new_v4();
        let seats = vec![Uuid::new_v4(), Uuid::new_v4()];
        let event = SeatEvent::SeatsBooked {
            seat_ids: seats.clone(),
            booking_id,
            owner_token: "conn-1".to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["seat_ids"].as_array().unwrap().len(), 2);
        assert_eq!(value["booking_id"], booking_id.to_string());
    }
}
