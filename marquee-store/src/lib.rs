pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod report_repo;
pub mod seat_repo;
pub mod showtime_repo;

pub use booking_repo::BookingRepository;
pub use database::DbClient;
pub use report_repo::{ReportRepository, ReportType};
pub use seat_repo::SeatRepository;
pub use showtime_repo::ShowtimeRepository;
