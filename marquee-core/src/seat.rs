use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub showtime_id: Uuid,
    pub seat_number: i32,
    pub status: SeatStatus,
    pub booking_id: Option<Uuid>,
}

/// Durable availability status. Holds never touch this; only the booking
/// commit/cancel transactions flip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Booked => "booked",
        }
    }
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for SeatStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "booked" => Ok(SeatStatus::Booked),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Seat as returned to clients: durable row plus the ephemeral hold flag.
#[derive(Debug, Clone, Serialize)]
pub struct SeatView {
    pub id: Uuid,
    pub showtime_id: Uuid,
    pub seat_number: i32,
    pub status: SeatStatus,
    pub booking_id: Option<Uuid>,
    pub temporarily_reserved: bool,
}

impl SeatView {
    pub fn from_seat(seat: Seat, temporarily_reserved: bool) -> Self {
        Self {
            id: seat.id,
            showtime_id: seat.showtime_id,
            seat_number: seat.seat_number,
            status: seat.status,
            booking_id: seat.booking_id,
            temporarily_reserved,
        }
    }
}
