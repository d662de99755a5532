use chrono::{Duration, Utc};
use marquee_core::showtime::Showtime;
use marquee_store::{BookingRepository, DbClient, SeatRepository, ShowtimeRepository};
use uuid::Uuid;

fn fresh_screen_id() -> i32 {
    (Uuid::new_v4().as_u128() % 1_000_000) as i32
}

/// Book on a showtime, cancel the booking, then delete the showtime. The
/// delete must succeed even though a cancelled booking row still references
/// the showtime.
#[tokio::test]
#[ignore = "needs a live Postgres via DATABASE_URL"]
async fn test_delete_showtime_with_cancelled_bookings_succeeds() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
    let db = DbClient::new(&url).await.expect("connect");
    db.migrate().await.expect("migrate");

    let start = Utc::now() + Duration::days(1);
    let showtime = Showtime {
        id: Uuid::new_v4(),
        movie_id: Uuid::new_v4(),
        screen_id: fresh_screen_id(),
        start_time: start,
        end_time: start + Duration::hours(2),
    };

    let mut tx = db.pool.begin().await.expect("begin");
    ShowtimeRepository::create(&mut tx, &showtime).await.expect("create showtime");
    SeatRepository::bulk_create(&mut tx, showtime.id, 2).await.expect("create seats");
    tx.commit().await.expect("commit");

    let seats = SeatRepository::list_by_showtime(&db.pool, showtime.id)
        .await
        .expect("list seats");
    assert_eq!(seats.len(), 2);

    // Book one seat.
    let booking_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let mut tx = db.pool.begin().await.expect("begin");
    BookingRepository::create(&mut tx, booking_id, user_id, showtime.id)
        .await
        .expect("create booking");
    let updated = SeatRepository::mark_booked(&mut tx, showtime.id, seats[0].id, booking_id)
        .await
        .expect("mark booked");
    assert_eq!(updated, 1);
    tx.commit().await.expect("commit");

    // Cancel it, freeing the seat.
    let mut tx = db.pool.begin().await.expect("begin");
    assert_eq!(BookingRepository::cancel(&mut tx, booking_id).await.expect("cancel"), 1);
    let freed = SeatRepository::release_for_booking(&mut tx, booking_id)
        .await
        .expect("release seats");
    assert_eq!(freed, vec![seats[0].id]);
    tx.commit().await.expect("commit");

    // No confirmed bookings remain, so the delete gate passes; the cancelled
    // booking row must not break the delete.
    assert_eq!(
        ShowtimeRepository::confirmed_booking_count(&db.pool, showtime.id)
            .await
            .expect("count"),
        0
    );

    let mut tx = db.pool.begin().await.expect("begin");
    let deleted = ShowtimeRepository::delete(&mut tx, showtime.id)
        .await
        .expect("delete showtime");
    tx.commit().await.expect("commit");

    assert_eq!(deleted, 1);
    assert!(ShowtimeRepository::get(&db.pool, showtime.id)
        .await
        .expect("get showtime")
        .is_none());
    assert!(BookingRepository::get(&db.pool, booking_id)
        .await
        .expect("get booking")
        .is_none());
}
