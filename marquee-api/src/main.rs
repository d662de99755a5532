use chrono::Utc;
use marquee_api::{app, audit, state::{AppState, AuthConfig}};
use marquee_core::{HoldRegistry, ShowtimeChannels};
use marquee_store::ReportType;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = marquee_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    let db = marquee_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let holds = Arc::new(HoldRegistry::new(chrono::Duration::seconds(
        config.business_rules.seat_hold_seconds as i64,
    )));
    let channels = Arc::new(ShowtimeChannels::new());

    let app_state = AppState {
        db: Arc::new(db),
        holds: holds.clone(),
        channels: channels.clone(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    tokio::spawn(marquee_api::sweeper::run_hold_sweeper(
        holds,
        channels,
        Duration::from_secs(config.business_rules.hold_sweep_interval_seconds),
    ));

    audit::record_event(
        &app_state,
        None,
        None,
        ReportType::System,
        json!({
            "action": "server_started",
            "port": config.server.port,
            "timestamp": Utc::now(),
        }),
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
