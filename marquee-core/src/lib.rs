pub mod booking;
pub mod channels;
pub mod events;
pub mod hold;
pub mod seat;
pub mod showtime;

pub use channels::ShowtimeChannels;
pub use events::SeatEvent;
pub use hold::{HoldRegistry, HoldError};
