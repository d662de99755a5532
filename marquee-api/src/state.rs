use marquee_core::{HoldRegistry, ShowtimeChannels};
use marquee_store::DbClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbClient>,
    pub holds: Arc<HoldRegistry>,
    pub channels: Arc<ShowtimeChannels>,
    pub auth: AuthConfig,
}
