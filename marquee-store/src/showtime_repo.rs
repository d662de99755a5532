use chrono::{DateTime, Utc};
use marquee_core::booking::BookingStatus;
use marquee_core::showtime::Showtime;
use sqlx::{Postgres, Row};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct ShowtimeRow {
    id: Uuid,
    movie_id: Uuid,
    screen_id: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl From<ShowtimeRow> for Showtime {
    fn from(row: ShowtimeRow) -> Self {
        Showtime {
            id: row.id,
            movie_id: row.movie_id,
            screen_id: row.screen_id,
            start_time: row.start_time,
            end_time: row.end_time,
        }
    }
}

pub struct ShowtimeRepository;

impl ShowtimeRepository {
    pub async fn get(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Showtime>, sqlx::Error> {
        let row: Option<ShowtimeRow> = sqlx::query_as(
            r#"
            SELECT id, movie_id, screen_id, start_time, end_time
            FROM showtimes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Showtime::from))
    }

    pub async fn list(pool: &sqlx::PgPool) -> Result<Vec<Showtime>, sqlx::Error> {
        let rows: Vec<ShowtimeRow> = sqlx::query_as(
            r#"
            SELECT id, movie_id, screen_id, start_time, end_time
            FROM showtimes
            ORDER BY start_time ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Showtime::from).collect())
    }

    pub async fn list_by_movie(
        pool: &sqlx::PgPool,
        movie_id: Uuid,
    ) -> Result<Vec<Showtime>, sqlx::Error> {
        let rows: Vec<ShowtimeRow> = sqlx::query_as(
            r#"
            SELECT id, movie_id, screen_id, start_time, end_time
            FROM showtimes
            WHERE movie_id = $1
            ORDER BY start_time ASC
            "#,
        )
        .bind(movie_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Showtime::from).collect())
    }

    /// True when an existing showtime on this screen overlaps [start, end).
    pub async fn has_overlap(
        pool: &sqlx::PgPool,
        screen_id: i32,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS overlapping
            FROM showtimes
            WHERE screen_id = $1 AND start_time < $2 AND $3 < end_time
            "#,
        )
        .bind(screen_id)
        .bind(end_time)
        .bind(start_time)
        .fetch_one(pool)
        .await?;

        let count: i64 = row.try_get("overlapping")?;
        Ok(count > 0)
    }

    pub async fn create(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        showtime: &Showtime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO showtimes (id, movie_id, screen_id, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(showtime.id)
        .bind(showtime.movie_id)
        .bind(showtime.screen_id)
        .bind(showtime.start_time)
        .bind(showtime.end_time)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Confirmed bookings gate showtime deletion.
    pub async fn confirmed_booking_count(
        pool: &sqlx::PgPool,
        showtime_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS bookings
            FROM bookings
            WHERE showtime_id = $1 AND status = $2
            "#,
        )
        .bind(showtime_id)
        .bind(BookingStatus::Confirmed.as_str())
        .fetch_one(pool)
        .await?;

        row.try_get("bookings")
    }

    /// Seats first (they reference bookings), then the showtime's remaining
    /// bookings, then the showtime itself. The caller has already verified no
    /// confirmed bookings exist, so any rows removed here are cancelled ones
    /// that would otherwise keep a dangling foreign key.
    pub async fn delete(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        showtime_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query("DELETE FROM seats WHERE showtime_id = $1")
            .bind(showtime_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query("DELETE FROM bookings WHERE showtime_id = $1")
            .bind(showtime_id)
            .execute(&mut **tx)
            .await?;

        let result = sqlx::query("DELETE FROM showtimes WHERE id = $1")
            .bind(showtime_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}
