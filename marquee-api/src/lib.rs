use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod audit;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod middleware;
pub mod seats;
pub mod showtimes;
pub mod state;
pub mod stream;
pub mod sweeper;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let customer = bookings::routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::auth::customer_auth_middleware,
    ));

    let admin = showtimes::admin_routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::auth::admin_auth_middleware,
    ));

    Router::new()
        .merge(auth::routes())
        .merge(showtimes::public_routes())
        .merge(seats::routes())
        .merge(stream::routes())
        .merge(customer)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
