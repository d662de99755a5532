use marquee_store::{ReportRepository, ReportType};
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

/// Fire-and-forget audit write. Booking and scheduling outcomes must never
/// depend on the audit sink, so failures are logged and swallowed.
pub fn record_event(
    state: &AppState,
    admin_id: Option<Uuid>,
    user_id: Option<Uuid>,
    report_type: ReportType,
    report_data: serde_json::Value,
) {
    let pool = state.db.pool.clone();
    tokio::spawn(async move {
        if let Err(e) =
            ReportRepository::record_event(&pool, admin_id, user_id, report_type, report_data).await
        {
            warn!("Failed to record audit event: {}", e);
        }
    });
}
