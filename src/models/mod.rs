pub mod actor;
pub mod booking;
pub mod payment;
pub mod review;
pub mod venue;

pub use actor::Actor;
pub use booking::{Booking, BookingStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use review::Review;
pub use venue::{AddOn, Venue};
