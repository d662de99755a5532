use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use marquee_core::seat::SeatView;
use marquee_core::showtime::Showtime;
use marquee_store::{ReportType, SeatRepository, ShowtimeRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::audit;
use crate::error::AppError;
use crate::middleware::auth::{has_permission, AdminClaims};
use crate::state::AppState;

const MAX_SEATS_PER_SHOWTIME: i32 = 500;

/// SQLSTATE for an exclusion constraint violation.
const EXCLUSION_VIOLATION: &str = "23P01";

/// The schedule exclusion constraint fires when two admins race past the
/// overlap pre-check; surface that as the same conflict the pre-check
/// reports instead of a 500.
fn map_schedule_error(err: sqlx::Error) -> AppError {
    let exclusion = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == EXCLUSION_VIOLATION)
        .unwrap_or(false);

    if exclusion {
        AppError::ConflictError(
            "Another showtime is already scheduled on this screen in that window".to_string(),
        )
    } else {
        AppError::InternalServerError(err.to_string())
    }
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/showtimes", get(list_showtimes))
        .route("/v1/showtimes/{id}", get(get_showtime))
        .route("/v1/showtimes/movie/{movie_id}", get(list_by_movie))
        .route("/v1/showtimes/{id}/seats", get(list_seats))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/showtimes", post(add_showtime))
        .route("/v1/showtimes/{id}", delete(delete_showtime))
}

#[derive(Debug, Serialize)]
struct ShowtimeDetail {
    #[serde(flatten)]
    showtime: Showtime,
    seats: Vec<SeatView>,
}

async fn list_showtimes(State(state): State<AppState>) -> Result<Json<Vec<Showtime>>, AppError> {
    let showtimes = ShowtimeRepository::list(&state.db.pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(showtimes))
}

async fn list_by_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> Result<Json<Vec<Showtime>>, AppError> {
    let showtimes = ShowtimeRepository::list_by_movie(&state.db.pool, movie_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(showtimes))
}

async fn get_showtime(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShowtimeDetail>, AppError> {
    let showtime = ShowtimeRepository::get(&state.db.pool, id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Showtime not found".to_string()))?;

    let seats = seat_views(&state, id).await?;
    Ok(Json(ShowtimeDetail { showtime, seats }))
}

async fn list_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SeatView>>, AppError> {
    let exists = ShowtimeRepository::get(&state.db.pool, id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .is_some();
    if !exists {
        return Err(AppError::NotFoundError("Showtime not found".to_string()));
    }

    Ok(Json(seat_views(&state, id).await?))
}

/// Durable seat rows merged with the live holds for this showtime.
pub async fn seat_views(state: &AppState, showtime_id: Uuid) -> Result<Vec<SeatView>, AppError> {
    let seats = SeatRepository::list_by_showtime(&state.db.pool, showtime_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let held = state.holds.holds_for_showtime(showtime_id);
    Ok(seats
        .into_iter()
        .map(|seat| {
            let reserved = held.contains_key(&seat.id);
            SeatView::from_seat(seat, reserved)
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct AddShowtimeRequest {
    movie_id: Uuid,
    screen_id: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    seat_count: i32,
}

async fn add_showtime(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Json(req): Json<AddShowtimeRequest>,
) -> Result<Json<Showtime>, AppError> {
    if !has_permission(&claims, "showtimes:write") {
        return Err(AppError::AuthorizationError(
            "Missing showtimes:write permission".to_string(),
        ));
    }

    if req.end_time <= req.start_time {
        return Err(AppError::ValidationError(
            "end_time must be after start_time".to_string(),
        ));
    }
    if req.seat_count < 1 || req.seat_count > MAX_SEATS_PER_SHOWTIME {
        return Err(AppError::ValidationError(format!(
            "seat_count must be between 1 and {}",
            MAX_SEATS_PER_SHOWTIME
        )));
    }

    let overlapping =
        ShowtimeRepository::has_overlap(&state.db.pool, req.screen_id, req.start_time, req.end_time)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if overlapping {
        return Err(AppError::ConflictError(
            "Another showtime is already scheduled on this screen in that window".to_string(),
        ));
    }

    let showtime = Showtime {
        id: Uuid::new_v4(),
        movie_id: req.movie_id,
        screen_id: req.screen_id,
        start_time: req.start_time,
        end_time: req.end_time,
    };

    let mut tx = state
        .db
        .pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    ShowtimeRepository::create(&mut tx, &showtime)
        .await
        .map_err(map_schedule_error)?;
    SeatRepository::bulk_create(&mut tx, showtime.id, req.seat_count)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    tx.commit().await.map_err(map_schedule_error)?;

    info!("Showtime {} scheduled with {} seats", showtime.id, req.seat_count);

    audit::record_event(
        &state,
        Uuid::parse_str(&claims.sub).ok(),
        None,
        ReportType::AdminAction,
        json!({
            "action": "showtime_added",
            "showtime_id": showtime.id,
            "movie_id": showtime.movie_id,
            "seat_count": req.seat_count,
        }),
    );

    Ok(Json(showtime))
}

async fn delete_showtime(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !has_permission(&claims, "showtimes:delete") {
        return Err(AppError::AuthorizationError(
            "Missing showtimes:delete permission".to_string(),
        ));
    }

    let showtime = ShowtimeRepository::get(&state.db.pool, id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Showtime not found".to_string()))?;

    let bookings = ShowtimeRepository::confirmed_booking_count(&state.db.pool, id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if bookings > 0 {
        return Err(AppError::BusinessRuleError(
            "Cannot delete a showtime with confirmed bookings".to_string(),
        ));
    }

    let mut tx = state
        .db
        .pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    ShowtimeRepository::delete(&mut tx, id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    info!("Showtime {} deleted", id);

    audit::record_event(
        &state,
        Uuid::parse_str(&claims.sub).ok(),
        None,
        ReportType::AdminAction,
        json!({
            "action": "showtime_deleted",
            "showtime_id": id,
            "movie_id": showtime.movie_id,
        }),
    );

    Ok(Json(json!({ "deleted": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_error_maps_only_exclusion_to_conflict() {
        // Non-database errors stay internal; only SQLSTATE 23P01 becomes a
        // scheduling conflict.
        assert!(matches!(
            map_schedule_error(sqlx::Error::RowNotFound),
            AppError::InternalServerError(_)
        ));
        assert!(matches!(
            map_schedule_error(sqlx::Error::PoolTimedOut),
            AppError::InternalServerError(_)
        ));
    }
}
