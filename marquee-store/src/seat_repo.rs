use marquee_core::seat::{Seat, SeatStatus};
use sqlx::{Postgres, Row};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    showtime_id: Uuid,
    seat_number: i32,
    status: String,
    booking_id: Option<Uuid>,
}

impl TryFrom<SeatRow> for Seat {
    type Error = sqlx::Error;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let status: SeatStatus = row
            .status
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Seat {
            id: row.id,
            showtime_id: row.showtime_id,
            seat_number: row.seat_number,
            status,
            booking_id: row.booking_id,
        })
    }
}

pub struct SeatRepository;

impl SeatRepository {
    pub async fn list_by_showtime(
        pool: &sqlx::PgPool,
        showtime_id: Uuid,
    ) -> Result<Vec<Seat>, sqlx::Error> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            r#"
            SELECT id, showtime_id, seat_number, status, booking_id
            FROM seats
            WHERE showtime_id = $1
            ORDER BY seat_number
            "#,
        )
        .bind(showtime_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Seat::try_from).collect()
    }

    pub async fn get(
        pool: &sqlx::PgPool,
        showtime_id: Uuid,
        seat_id: Uuid,
    ) -> Result<Option<Seat>, sqlx::Error> {
        let row: Option<SeatRow> = sqlx::query_as(
            r#"
            SELECT id, showtime_id, seat_number, status, booking_id
            FROM seats
            WHERE id = $1 AND showtime_id = $2
            "#,
        )
        .bind(seat_id)
        .bind(showtime_id)
        .fetch_optional(pool)
        .await?;

        row.map(Seat::try_from).transpose()
    }

    /// One row per seat number 1..=count, all available. Runs inside the
    /// showtime-creation transaction.
    pub async fn bulk_create(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        showtime_id: Uuid,
        count: i32,
    ) -> Result<(), sqlx::Error> {
        for seat_number in 1..=count {
            sqlx::query(
                r#"
                INSERT INTO seats (id, showtime_id, seat_number, status, booking_id)
                VALUES ($1, $2, $3, $4, NULL)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(showtime_id)
            .bind(seat_number)
            .bind(SeatStatus::Available.as_str())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Flip one seat to booked. The status guard makes this the final arbiter
    /// against double booking: a concurrent transaction that already took the
    /// seat leaves zero rows for this UPDATE to affect, and the caller must
    /// treat that as a conflict and roll back.
    pub async fn mark_booked(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        showtime_id: Uuid,
        seat_id: Uuid,
        booking_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = $1, booking_id = $2
            WHERE id = $3 AND showtime_id = $4 AND status = $5
            "#,
        )
        .bind(SeatStatus::Booked.as_str())
        .bind(booking_id)
        .bind(seat_id)
        .bind(showtime_id)
        .bind(SeatStatus::Available.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Return every seat of a cancelled booking to the pool and report which
    /// seats were freed.
    pub async fn release_for_booking(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            UPDATE seats
            SET status = $1, booking_id = NULL
            WHERE booking_id = $2
            RETURNING id
            "#,
        )
        .bind(SeatStatus::Available.as_str())
        .bind(booking_id)
        .fetch_all(&mut **tx)
        .await?;

        rows.iter().map(|row| row.try_get("id")).collect()
    }
}
