use axum::{extract::State, routing::post, Json, Router};
use marquee_core::seat::SeatStatus;
use marquee_core::SeatEvent;
use marquee_store::{SeatRepository, ShowtimeRepository};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/seats/reserve", post(reserve_seat))
}

#[derive(Debug, Deserialize)]
struct ReserveRequest {
    showtime_id: Uuid,
    seat_id: Uuid,
    owner_token: String,
    /// true = claim, false = release.
    reserving: bool,
}

#[derive(Debug, Serialize)]
struct ReserveResponse {
    seat_id: Uuid,
    status: &'static str,
}

/// Claim or release a soft hold. Holds are ephemeral; the durable seat row
/// is only consulted to refuse claims on already-booked seats.
async fn reserve_seat(
    State(state): State<AppState>,
    Json(req): Json<ReserveRequest>,
) -> Result<Json<ReserveResponse>, AppError> {
    if req.owner_token.trim().is_empty() {
        return Err(AppError::ValidationError("owner_token is required".to_string()));
    }

    let showtime = ShowtimeRepository::get(&state.db.pool, req.showtime_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if showtime.is_none() {
        return Err(AppError::NotFoundError("Showtime not found".to_string()));
    }

    if req.reserving {
        let seat = SeatRepository::get(&state.db.pool, req.showtime_id, req.seat_id)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .ok_or_else(|| {
                AppError::NotFoundError("Seat not found for this showtime".to_string())
            })?;

        // Durable status wins over the hold map: a booked seat is never
        // claimable even if no hold exists for it.
        if seat.status != SeatStatus::Available {
            return Err(AppError::SeatConflict {
                message: "Seat is not available".to_string(),
                seat_ids: vec![req.seat_id],
            });
        }

        // Claim only ever fails with Held.
        state
            .holds
            .claim(req.showtime_id, req.seat_id, &req.owner_token)
            .map_err(|_| AppError::SeatConflict {
                message: "Seat is already held by another client".to_string(),
                seat_ids: vec![req.seat_id],
            })?;

        debug!("Seat {} held by {}", req.seat_id, req.owner_token);
        state.channels.publish(
            req.showtime_id,
            SeatEvent::SeatTemporarilyReserved {
                seat_id: req.seat_id,
                owner_token: req.owner_token.clone(),
            },
        );

        Ok(Json(ReserveResponse {
            seat_id: req.seat_id,
            status: "reserved",
        }))
    } else {
        state
            .holds
            .release(req.showtime_id, req.seat_id, &req.owner_token)
            .map_err(|_| {
                AppError::AuthorizationError("Hold is not owned by this client".to_string())
            })?;

        debug!("Seat {} released by {}", req.seat_id, req.owner_token);
        state.channels.publish(
            req.showtime_id,
            SeatEvent::SeatReservationReleased {
                seat_id: req.seat_id,
                owner_token: req.owner_token.clone(),
            },
        );

        Ok(Json(ReserveResponse {
            seat_id: req.seat_id,
            status: "released",
        }))
    }
}
