pub mod arbitrator;
pub mod manager;
pub mod models;
pub mod repository;

pub use arbitrator::{ArbitrationConfig, CancellationArbitrator, CancellationRuling, RefusalReason};
pub use manager::{BookingError, BookingManager};
pub use models::{Booking, BookingStatus, CancellationRecord};
pub use repository::BookingRepository;
