use axum::{
    extract::{Path, State},
    routing::post,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use marquee_core::booking::{Booking, BookingStatus};
use marquee_core::seat::{Seat, SeatStatus};
use marquee_core::{HoldRegistry, SeatEvent};
use marquee_store::{BookingRepository, ReportType, SeatRepository, ShowtimeRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::audit;
use crate::error::AppError;
use crate::middleware::auth::CustomerClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(book_seats).get(list_bookings))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

#[derive(Debug, Deserialize)]
struct BookSeatsRequest {
    showtime_id: Uuid,
    seat_ids: Vec<Uuid>,
    owner_token: String,
}

#[derive(Debug, Serialize)]
struct BookSeatsResponse {
    booking_id: Uuid,
    seat_ids: Vec<Uuid>,
    status: BookingStatus,
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    booking_id: Uuid,
    seat_ids: Vec<Uuid>,
    status: BookingStatus,
}

fn dedup_preserving_order(seat_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    seat_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Seats the caller does not currently hold: missing, expired, or foreign
/// holds all count as contested. Touches nothing.
fn contested_seats(
    holds: &HoldRegistry,
    showtime_id: Uuid,
    seat_ids: &[Uuid],
    owner_token: &str,
    now: DateTime<Utc>,
) -> Vec<Uuid> {
    seat_ids
        .iter()
        .copied()
        .filter(|seat_id| !holds.is_held_by_at(showtime_id, *seat_id, owner_token, now))
        .collect()
}

/// Seats whose durable status blocks a booking. The hold layer cannot vouch
/// for these; only the store can.
fn unavailable_seats(seats: &[Seat]) -> Vec<Uuid> {
    seats
        .iter()
        .filter(|seat| seat.status != SeatStatus::Available)
        .map(|seat| seat.id)
        .collect()
}

/// Everything to fan out once the transaction commits: the group broadcast
/// and the audit payload.
fn commit_effects(
    showtime_id: Uuid,
    seat_ids: &[Uuid],
    booking_id: Uuid,
    owner_token: &str,
) -> (SeatEvent, serde_json::Value) {
    let event = SeatEvent::SeatsBooked {
        seat_ids: seat_ids.to_vec(),
        booking_id,
        owner_token: owner_token.to_string(),
    };
    let audit = json!({
        "action": "seats_booked",
        "booking_id": booking_id,
        "showtime_id": showtime_id,
        "seat_ids": seat_ids,
    });
    (event, audit)
}

/// Promote the caller's holds into a durable booking. Every step before the
/// transaction is a pure check; inside the transaction the status-guarded
/// seat UPDATE is the final arbiter against double booking: zero rows
/// affected means another transaction took the seat, and the whole booking
/// rolls back.
async fn book_seats(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<BookSeatsRequest>,
) -> Result<Json<BookSeatsResponse>, AppError> {
    let user_id = claims.user_id().ok_or_else(|| {
        AppError::AuthenticationError("User must be logged in to book seats".to_string())
    })?;

    let seat_ids = dedup_preserving_order(&req.seat_ids);
    if seat_ids.is_empty() {
        return Err(AppError::ValidationError("Seat IDs are required".to_string()));
    }
    if req.owner_token.trim().is_empty() {
        return Err(AppError::ValidationError("owner_token is required".to_string()));
    }

    // 1. Hold validation: every seat must be held by this caller. Nothing is
    //    mutated on failure.
    let contested = contested_seats(
        &state.holds,
        req.showtime_id,
        &seat_ids,
        &req.owner_token,
        Utc::now(),
    );
    if !contested.is_empty() {
        return Err(AppError::SeatConflict {
            message: "Seats are no longer held by this client".to_string(),
            seat_ids: contested,
        });
    }

    // 2. Showtime must exist.
    ShowtimeRepository::get(&state.db.pool, req.showtime_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Showtime not found".to_string()))?;

    // 3. Durable availability re-check. Catches anything that bypassed the
    //    hold layer, e.g. a stale hold surviving a crashed peer.
    let mut seats = Vec::with_capacity(seat_ids.len());
    for seat_id in &seat_ids {
        let seat = SeatRepository::get(&state.db.pool, req.showtime_id, *seat_id)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .ok_or_else(|| {
                AppError::NotFoundError(format!("Seat {} not found for this showtime", seat_id))
            })?;
        seats.push(seat);
    }

    let blocked = unavailable_seats(&seats);
    if !blocked.is_empty() {
        return Err(AppError::SeatConflict {
            message: "Seats are not available".to_string(),
            seat_ids: blocked,
        });
    }

    // 4. Atomic transition. Dropping the transaction on any early return
    //    rolls the whole booking back.
    let mut tx = state
        .db
        .pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let booking_id = Uuid::new_v4();
    BookingRepository::create(&mut tx, booking_id, user_id, req.showtime_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    for seat_id in &seat_ids {
        let updated = SeatRepository::mark_booked(&mut tx, req.showtime_id, *seat_id, booking_id)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        // A concurrent transaction won the seat between our re-check and
        // this UPDATE.
        if updated == 0 {
            return Err(AppError::SeatConflict {
                message: format!("Seat {} is not available", seat_id),
                seat_ids: vec![*seat_id],
            });
        }
    }

    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    // 5. The holds served their purpose; best-effort cleanup.
    state.holds.remove(req.showtime_id, &seat_ids);

    // 6. Fan out and audit.
    let (event, audit_payload) =
        commit_effects(req.showtime_id, &seat_ids, booking_id, &req.owner_token);
    state.channels.publish(req.showtime_id, event);

    info!("Booking {} confirmed for {} seats", booking_id, seat_ids.len());

    audit::record_event(&state, None, Some(user_id), ReportType::Booking, audit_payload);

    Ok(Json(BookSeatsResponse {
        booking_id,
        seat_ids,
        status: BookingStatus::Confirmed,
    }))
}

/// Cancel a confirmed booking before the show starts, returning its seats to
/// the pool.
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    let user_id = claims.user_id().ok_or_else(|| {
        AppError::AuthenticationError("User must be logged in to cancel a booking".to_string())
    })?;

    let booking = BookingRepository::get(&state.db.pool, booking_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Booking not found".to_string()))?;

    if booking.user_id != user_id {
        return Err(AppError::AuthorizationError(
            "Booking does not belong to you".to_string(),
        ));
    }
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::BusinessRuleError(
            "Booking is already cancelled".to_string(),
        ));
    }

    let showtime = ShowtimeRepository::get(&state.db.pool, booking.showtime_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Showtime not found".to_string()))?;

    if !showtime.cancellation_open(Utc::now()) {
        return Err(AppError::BusinessRuleError(
            "Cannot cancel after the showtime has started".to_string(),
        ));
    }

    let mut tx = state
        .db
        .pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let updated = BookingRepository::cancel(&mut tx, booking_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if updated == 0 {
        // Raced with another cancel of the same booking.
        return Err(AppError::ConflictError(
            "Booking is already cancelled".to_string(),
        ));
    }

    let freed = SeatRepository::release_for_booking(&mut tx, booking_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    state.channels.publish(
        booking.showtime_id,
        SeatEvent::BookingCancelled {
            seat_ids: freed.clone(),
            booking_id,
        },
    );

    info!("Booking {} cancelled, {} seats freed", booking_id, freed.len());

    audit::record_event(
        &state,
        None,
        Some(user_id),
        ReportType::Booking,
        json!({
            "action": "booking_cancelled",
            "booking_id": booking_id,
            "showtime_id": booking.showtime_id,
            "seat_ids": freed,
        }),
    );

    Ok(Json(CancelResponse {
        booking_id,
        seat_ids: freed,
        status: BookingStatus::Cancelled,
    }))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let user_id = claims.user_id().ok_or_else(|| {
        AppError::AuthenticationError("User must be logged in to list bookings".to_string())
    })?;

    let bookings = BookingRepository::list_for_user(&state.db.pool, user_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(bookings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marquee_core::HoldError;

    fn seat(id: Uuid, showtime_id: Uuid, status: SeatStatus, booking_id: Option<Uuid>) -> Seat {
        Seat {
            id,
            showtime_id,
            seat_number: 1,
            status,
            booking_id,
        }
    }

    #[test]
    fn test_dedup_preserves_first_occurrence_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let deduped = dedup_preserving_order(&[a, b, a, c, b]);
        assert_eq!(deduped, vec![a, b, c]);
    }

    #[test]
    fn test_dedup_of_empty_input_is_empty() {
        assert!(dedup_preserving_order(&[]).is_empty());
    }

    #[test]
    fn test_contested_seats_reports_missing_expired_and_foreign_holds() {
        let holds = HoldRegistry::new(Duration::seconds(300));
        let showtime = Uuid::new_v4();
        let (mine, foreign, stale, unheld) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        holds.claim_at(showtime, mine, "conn-x", now).unwrap();
        holds.claim_at(showtime, foreign, "conn-y", now).unwrap();
        holds
            .claim_at(showtime, stale, "conn-x", now - Duration::seconds(400))
            .unwrap();

        let contested =
            contested_seats(&holds, showtime, &[mine, foreign, stale, unheld], "conn-x", now);
        assert_eq!(contested, vec![foreign, stale, unheld]);
    }

    #[test]
    fn test_unavailable_seats_names_only_booked_ones() {
        let showtime = Uuid::new_v4();
        let (free, taken) = (Uuid::new_v4(), Uuid::new_v4());
        let seats = vec![
            seat(free, showtime, SeatStatus::Available, None),
            seat(taken, showtime, SeatStatus::Booked, Some(Uuid::new_v4())),
        ];

        assert_eq!(unavailable_seats(&seats), vec![taken]);
        assert!(unavailable_seats(&seats[..1]).is_empty());
    }

    #[test]
    fn test_commit_effects_shape() {
        let showtime = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        let seats = vec![Uuid::new_v4(), Uuid::new_v4()];

        let (event, audit) = commit_effects(showtime, &seats, booking_id, "conn-x");

        assert_eq!(event.name(), "seats_booked");
        match event {
            SeatEvent::SeatsBooked {
                seat_ids,
                booking_id: b,
                owner_token,
            } => {
                assert_eq!(seat_ids, seats);
                assert_eq!(b, booking_id);
                assert_eq!(owner_token, "conn-x");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(audit["action"], "seats_booked");
        assert_eq!(audit["booking_id"], booking_id.to_string());
        assert_eq!(audit["seat_ids"].as_array().unwrap().len(), 2);
    }

    // Two clients fight over seat 1: X claims it, Y is refused, X books it,
    // Y is then blocked by the durable status even though the hold is gone,
    // and cancellation reopens the seat.
    #[test]
    fn test_claim_book_reclaim_cancel_sequence() {
        let holds = HoldRegistry::new(Duration::seconds(300));
        let showtime = Uuid::new_v4();
        let seat_one = Uuid::new_v4();
        let now = Utc::now();

        // X claims seat 1.
        holds.claim_at(showtime, seat_one, "conn-x", now).unwrap();

        // Y's claim conflicts and reports X as the holder.
        assert_eq!(
            holds.claim_at(showtime, seat_one, "conn-y", now),
            Err(HoldError::Held {
                owner_token: "conn-x".to_string()
            })
        );

        // X's booking passes hold validation; Y's would not.
        assert!(contested_seats(&holds, showtime, &[seat_one], "conn-x", now).is_empty());
        assert_eq!(
            contested_seats(&holds, showtime, &[seat_one], "conn-y", now),
            vec![seat_one]
        );

        // The commit flips the durable row and drops the hold.
        let booking_id = Uuid::new_v4();
        let booked = seat(seat_one, showtime, SeatStatus::Booked, Some(booking_id));
        holds.remove(showtime, &[seat_one]);

        // With the hold gone the registry no longer objects to Y, so the
        // durable re-check must.
        assert!(contested_seats(&holds, showtime, &[seat_one], "conn-y", now).is_empty());
        assert_eq!(unavailable_seats(&[booked]), vec![seat_one]);

        // Cancellation frees the seat again.
        let freed = seat(seat_one, showtime, SeatStatus::Available, None);
        assert!(unavailable_seats(&[freed]).is_empty());
    }
}
