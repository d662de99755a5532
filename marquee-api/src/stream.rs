use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};
use marquee_store::ShowtimeRepository;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/showtimes/{id}/stream", get(showtime_stream))
}

/// Join a showtime's broadcast group. Subscribing is the join; dropping the
/// connection leaves it. Events missed while disconnected are gone — clients
/// reconcile through the seat listing when they come back.
async fn showtime_stream(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    ShowtimeRepository::get(&state.db.pool, showtime_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Showtime not found".to_string()))?;

    let rx = state.channels.subscribe(showtime_id);

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(data) => Some(Ok(Event::default().event(event.name()).data(data))),
                Err(_) => None,
            },
            // Lagged receivers skip what they missed; at-most-once delivery.
            Err(_) => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
