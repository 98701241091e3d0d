pub mod geo;
pub mod notify;

use uuid::Uuid;

/// Failures surfaced by the durable store. The conditional variants exist
/// because the store, not the caller, is the place where check-and-mutate
/// happens: a reservation that would overdraw a trip's seats must be refused
/// inside the same atomic update that would have applied it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: u8, available: u8 },

    #[error("Trip is not active: {status}")]
    TripNotActive { status: String },

    #[error("Trip has already departed")]
    TripDeparted,

    #[error("Conditional update failed: expected status {expected}, found {actual}")]
    StatusConflict { expected: String, actual: String },

    #[error("A live booking already exists for passenger {passenger_id} on trip {trip_id}")]
    DuplicateBooking { trip_id: Uuid, passenger_id: Uuid },

    #[error("A pending negotiation already exists for passenger {passenger_id} on trip {trip_id}")]
    DuplicateNegotiation { trip_id: Uuid, passenger_id: Uuid },

    #[error("Store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
