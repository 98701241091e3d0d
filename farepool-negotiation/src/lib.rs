pub mod manager;
pub mod models;
pub mod repository;

pub use manager::{NegotiationError, NegotiationManager};
pub use models::{Negotiation, NegotiationMessage, NegotiationStatus};
pub use repository::NegotiationRepository;
