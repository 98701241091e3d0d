pub mod models;
pub mod pii;

pub use models::events::{Notification, NotificationEvent, TripSummary};
pub use models::party::PartyRole;
pub use pii::Masked;
