use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// A provisional, non-durable claim on a seat. Lives only in process memory;
/// losing it on restart is harmless because the durable seat status is the
/// source of truth.
#[derive(Debug, Clone)]
pub struct Hold {
    pub owner_token: String,
    pub held_at: DateTime<Utc>,
}

/// A hold evicted by the sweeper, returned so the caller can broadcast the
/// expiry to the showtime's group.
#[derive(Debug, Clone)]
pub struct ExpiredHold {
    pub showtime_id: Uuid,
    pub seat_id: Uuid,
    pub owner_token: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HoldError {
    #[error("seat is already held by another client")]
    Held { owner_token: String },

    #[error("no matching hold owned by this client")]
    NotOwner,
}

/// Tracks soft holds keyed by (showtime, seat). At most one live hold exists
/// per key. All operations take the mutex for their whole duration and never
/// await, which serializes claim/release/sweep against each other.
pub struct HoldRegistry {
    ttl: Duration,
    holds: Mutex<HashMap<(Uuid, Uuid), Hold>>,
}

impl HoldRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            holds: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Uuid, Uuid), Hold>> {
        self.holds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self, hold: &Hold, now: DateTime<Utc>) -> bool {
        now - hold.held_at <= self.ttl
    }

    /// Claim a seat. Fails only when a live hold by a *different* owner
    /// exists; re-claiming your own seat refreshes the timestamp, and an
    /// expired hold is silently overwritten.
    pub fn claim(&self, showtime_id: Uuid, seat_id: Uuid, owner_token: &str) -> Result<(), HoldError> {
        self.claim_at(showtime_id, seat_id, owner_token, Utc::now())
    }

    pub fn claim_at(
        &self,
        showtime_id: Uuid,
        seat_id: Uuid,
        owner_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HoldError> {
        let mut holds = self.lock();
        if let Some(existing) = holds.get(&(showtime_id, seat_id)) {
            if existing.owner_token != owner_token && self.is_live(existing, now) {
                return Err(HoldError::Held {
                    owner_token: existing.owner_token.clone(),
                });
            }
        }
        holds.insert(
            (showtime_id, seat_id),
            Hold {
                owner_token: owner_token.to_string(),
                held_at: now,
            },
        );
        Ok(())
    }

    /// Release a hold you own. Missing or foreign holds are an error so a
    /// client can never free somebody else's claim.
    pub fn release(&self, showtime_id: Uuid, seat_id: Uuid, owner_token: &str) -> Result<(), HoldError> {
        let mut holds = self.lock();
        match holds.get(&(showtime_id, seat_id)) {
            Some(hold) if hold.owner_token == owner_token => {
                holds.remove(&(showtime_id, seat_id));
                Ok(())
            }
            _ => Err(HoldError::NotOwner),
        }
    }

    /// True only for a live hold owned by `owner_token`. Used by the booking
    /// commit protocol to validate caller legitimacy.
    pub fn is_held_by(&self, showtime_id: Uuid, seat_id: Uuid, owner_token: &str) -> bool {
        self.is_held_by_at(showtime_id, seat_id, owner_token, Utc::now())
    }

    pub fn is_held_by_at(
        &self,
        showtime_id: Uuid,
        seat_id: Uuid,
        owner_token: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let holds = self.lock();
        match holds.get(&(showtime_id, seat_id)) {
            Some(hold) => hold.owner_token == owner_token && self.is_live(hold, now),
            None => false,
        }
    }

    /// Live holds for one showtime, seat id -> owner token. Drives the
    /// `temporarily_reserved` flag in seat listings.
    pub fn holds_for_showtime(&self, showtime_id: Uuid) -> HashMap<Uuid, String> {
        self.holds_for_showtime_at(showtime_id, Utc::now())
    }

    pub fn holds_for_showtime_at(
        &self,
        showtime_id: Uuid,
        now: DateTime<Utc>,
    ) -> HashMap<Uuid, String> {
        let holds = self.lock();
        holds
            .iter()
            .filter(|((st, _), hold)| *st == showtime_id && self.is_live(hold, now))
            .map(|((_, seat), hold)| (*seat, hold.owner_token.clone()))
            .collect()
    }

    /// Drop holds promoted to a booking. Best-effort; anything missed would
    /// expire on its own.
    pub fn remove(&self, showtime_id: Uuid, seat_ids: &[Uuid]) {
        let mut holds = self.lock();
        for seat_id in seat_ids {
            holds.remove(&(showtime_id, *seat_id));
        }
    }

    /// Evict every hold older than the TTL and return them. Removing an entry
    /// that is already gone is a no-op, so the sweep is idempotent.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<ExpiredHold> {
        let mut holds = self.lock();
        let mut expired = Vec::new();
        holds.retain(|(showtime_id, seat_id), hold| {
            if now - hold.held_at > self.ttl {
                expired.push(ExpiredHold {
                    showtime_id: *showtime_id,
                    seat_id: *seat_id,
                    owner_token: hold.owner_token.clone(),
                });
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HoldRegistry {
        HoldRegistry::new(Duration::seconds(300))
    }

    #[test]
    fn test_claim_conflict_reports_current_owner() {
        let reg = registry();
        let (st, seat) = (Uuid::new_v4(), Uuid::new_v4());

        reg.claim(st, seat, "conn-x").unwrap();
        let err = reg.claim(st, seat, "conn-y").unwrap_err();
        assert_eq!(
            err,
            HoldError::Held {
                owner_token: "conn-x".to_string()
            }
        );
    }

    #[test]
    fn test_reclaim_by_owner_refreshes_timestamp() {
        let reg = registry();
        let (st, seat) = (Uuid::new_v4(), Uuid::new_v4());
        let t0 = Utc::now();

        reg.claim_at(st, seat, "conn-x", t0).unwrap();
        // 4 minutes later the owner touches the seat again.
        let t1 = t0 + Duration::seconds(240);
        reg.claim_at(st, seat, "conn-x", t1).unwrap();

        // 4 minutes after the refresh the hold is still live.
        assert!(reg.is_held_by_at(st, seat, "conn-x", t1 + Duration::seconds(240)));
    }

    #[test]
    fn test_expired_hold_is_claimable_by_another_client() {
        let reg = registry();
        let (st, seat) = (Uuid::new_v4(), Uuid::new_v4());
        let t0 = Utc::now();

        reg.claim_at(st, seat, "conn-x", t0).unwrap();
        let after_ttl = t0 + Duration::seconds(301);
        assert!(!reg.is_held_by_at(st, seat, "conn-x", after_ttl));
        reg.claim_at(st, seat, "conn-y", after_ttl).unwrap();
        assert!(reg.is_held_by_at(st, seat, "conn-y", after_ttl));
    }

    #[test]
    fn test_release_requires_ownership() {
        let reg = registry();
        let (st, seat) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(reg.release(st, seat, "conn-x"), Err(HoldError::NotOwner));

        reg.claim(st, seat, "conn-x").unwrap();
        assert_eq!(reg.release(st, seat, "conn-y"), Err(HoldError::NotOwner));

        reg.release(st, seat, "conn-x").unwrap();
        assert!(reg.is_empty());
        // Releasing again fails: the hold is gone.
        assert_eq!(reg.release(st, seat, "conn-x"), Err(HoldError::NotOwner));
    }

    #[test]
    fn test_sweep_evicts_only_stale_holds() {
        let reg = registry();
        let st = Uuid::new_v4();
        let (old_seat, fresh_seat) = (Uuid::new_v4(), Uuid::new_v4());
        let t0 = Utc::now();

        reg.claim_at(st, old_seat, "conn-x", t0).unwrap();
        reg.claim_at(st, fresh_seat, "conn-y", t0 + Duration::seconds(200)).unwrap();

        let expired = reg.sweep_expired(t0 + Duration::seconds(301));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].seat_id, old_seat);
        assert_eq!(expired[0].owner_token, "conn-x");
        assert_eq!(reg.len(), 1);

        // Second pass finds nothing: the eviction already happened.
        assert!(reg.sweep_expired(t0 + Duration::seconds(302)).is_empty());
    }

    #[test]
    fn test_holds_for_showtime_filters_scope_and_liveness() {
        let reg = registry();
        let (st_a, st_b) = (Uuid::new_v4(), Uuid::new_v4());
        let (s1, s2, s3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let t0 = Utc::now();

        reg.claim_at(st_a, s1, "conn-x", t0).unwrap();
        reg.claim_at(st_a, s2, "conn-y", t0 - Duration::seconds(400)).unwrap();
        reg.claim_at(st_b, s3, "conn-z", t0).unwrap();

        let held = reg.holds_for_showtime_at(st_a, t0);
        assert_eq!(held.len(), 1);
        assert_eq!(held.get(&s1).map(String::as_str), Some("conn-x"));
    }
}
