use chrono::{DateTime, Utc};
use marquee_core::booking::{Booking, BookingStatus};
use sqlx::Postgres;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    showtime_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = sqlx::Error;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row
            .status
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            showtime_id: row.showtime_id,
            status,
            created_at: row.created_at,
        })
    }
}

pub struct BookingRepository;

impl BookingRepository {
    pub async fn create(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        booking_id: Uuid,
        user_id: Uuid,
        showtime_id: Uuid,
    ) -> Result<Booking, sqlx::Error> {
        let booking = Booking {
            id: booking_id,
            user_id,
            showtime_id,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, showtime_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.showtime_id)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(booking)
    }

    pub async fn get(pool: &sqlx::PgPool, booking_id: Uuid) -> Result<Option<Booking>, sqlx::Error> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, showtime_id, status, created_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    pub async fn list_for_user(
        pool: &sqlx::PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Booking>, sqlx::Error> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, showtime_id, status, created_at
            FROM bookings
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    /// Mark a confirmed booking cancelled. Zero rows affected means it was
    /// already cancelled (or raced with another cancel).
    pub async fn cancel(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(BookingStatus::Cancelled.as_str())
        .bind(booking_id)
        .bind(BookingStatus::Confirmed.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }
}
