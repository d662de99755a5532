use chrono::Utc;
use uuid::Uuid;

/// Audit trail categories, mirrored in the `reports.report_type` column.
#[derive(Debug, Clone, Copy)]
pub enum ReportType {
    Booking,
    AdminAction,
    System,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Booking => "booking",
            ReportType::AdminAction => "admin_action",
            ReportType::System => "system",
        }
    }
}

pub struct ReportRepository;

impl ReportRepository {
    /// Write one audit entry. Callers treat this as fire-and-forget: a failed
    /// audit write is logged, never surfaced to the user-facing operation.
    pub async fn record_event(
        pool: &sqlx::PgPool,
        admin_id: Option<Uuid>,
        user_id: Option<Uuid>,
        report_type: ReportType,
        report_data: serde_json::Value,
    ) -> Result<Uuid, sqlx::Error> {
        let report_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO reports (id, admin_id, user_id, report_type, report_data, generated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(report_id)
        .bind(admin_id)
        .bind(user_id)
        .bind(report_type.as_str())
        .bind(report_data)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(report_id)
    }
}
