use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, CancellationRecord};
use farepool_core::StoreError;

/// Durable-store seam for bookings.
///
/// The store enforces the uniqueness rule (one live booking per trip and
/// passenger) at insert time, and `transition_booking`/`cancel_booking` are
/// atomic conditional updates so that exactly one of two racing callers
/// wins a status change.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a new booking. Fails with `DuplicateBooking` when the
    /// passenger already holds a pending or confirmed booking on the trip.
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Compare-and-set on the booking status, stamping timestamps via
    /// [`Booking::apply_status`]. Fails with `StatusConflict` if the current
    /// status is not `from`.
    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Booking, StoreError>;

    /// Atomically cancel a live booking and attach the cancellation record.
    /// Returns the updated booking together with the status it had before,
    /// so the caller knows whether seats were actually held.
    async fn cancel_booking(
        &self,
        booking_id: Uuid,
        record: &CancellationRecord,
    ) -> Result<(Booking, BookingStatus), StoreError>;

    async fn list_bookings_for_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError>;
}
