use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub screen_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Showtime {
    /// A booking can only be cancelled strictly before the show starts.
    pub fn cancellation_open(&self, now: DateTime<Utc>) -> bool {
        now < self.start_time
    }

    /// Two showtimes on the same screen may not overlap in [start, end).
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn showtime(start: DateTime<Utc>, end: DateTime<Utc>) -> Showtime {
        Showtime {
            id: Uuid::new_v4(),
            movie_id: Uuid::new_v4(),
            screen_id: 1,
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn test_cancellation_window() {
        let now = Utc::now();
        let s = showtime(now + Duration::hours(1), now + Duration::hours(3));
        assert!(s.cancellation_open(now));
        assert!(!s.cancellation_open(now + Duration::hours(1)));
        assert!(!s.cancellation_open(now + Duration::hours(2)));
    }

    #[test]
    fn test_overlap_detection() {
        let now = Utc::now();
        let s = showtime(now, now + Duration::hours(2));

        assert!(s.overlaps(now + Duration::hours(1), now + Duration::hours(3)));
        assert!(s.overlaps(now - Duration::hours(1), now + Duration::minutes(30)));
        // Back-to-back screenings are fine.
        assert!(!s.overlaps(now + Duration::hours(2), now + Duration::hours(4)));
        assert!(!s.overlaps(now - Duration::hours(2), now));
    }
}
