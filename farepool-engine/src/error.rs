use farepool_booking::BookingError;
use farepool_core::StoreError;
use farepool_negotiation::NegotiationError;
use farepool_trip::commission::CommissionError;
use farepool_trip::TripError;

/// Error surface of the engine facade.
///
/// Callers embed the engine behind transports of their own, so the domain
/// errors are collapsed into a small set of outcome categories here; the
/// full detail stays in the message.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not permitted: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::NotFound(_) => EngineError::NotFound(message),
            StoreError::Backend(_) => EngineError::Internal(message),
            // The conditional-update refusals all mean "the world moved".
            _ => EngineError::Conflict(message),
        }
    }
}

impl From<TripError> for EngineError {
    fn from(err: TripError) -> Self {
        let message = err.to_string();
        match err {
            TripError::NotFound(_) => EngineError::NotFound(message),
            TripError::InvalidSeatCount { .. }
            | TripError::InvalidPrice(_)
            | TripError::DepartureInPast => EngineError::Validation(message),
            TripError::Store(e) => e.into(),
            _ => EngineError::Conflict(message),
        }
    }
}

impl From<BookingError> for EngineError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::NotFound(_) => EngineError::NotFound(message),
            BookingError::ZeroSeats => EngineError::Validation(message),
            BookingError::OwnTrip | BookingError::Forbidden(_) => {
                EngineError::Unauthorized(message)
            }
            BookingError::Trip(e) => e.into(),
            BookingError::Store(e) => e.into(),
            _ => EngineError::Conflict(message),
        }
    }
}

impl From<NegotiationError> for EngineError {
    fn from(err: NegotiationError) -> Self {
        let message = err.to_string();
        match err {
            NegotiationError::NotFound(_) => EngineError::NotFound(message),
            NegotiationError::InvalidPrice(_) | NegotiationError::NotNegotiable => {
                EngineError::Validation(message)
            }
            NegotiationError::OwnTrip
            | NegotiationError::OwnOffer
            | NegotiationError::Forbidden(_) => EngineError::Unauthorized(message),
            NegotiationError::Trip(e) => e.into(),
            NegotiationError::Store(e) => e.into(),
            _ => EngineError::Conflict(message),
        }
    }
}

impl From<CommissionError> for EngineError {
    fn from(err: CommissionError) -> Self {
        EngineError::Validation(err.to_string())
    }
}
