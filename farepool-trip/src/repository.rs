use async_trait::async_trait;
use uuid::Uuid;

use crate::trip::{Trip, TripStatus};
use farepool_core::StoreError;

/// Durable-store seam for trips.
///
/// `reserve_seats`, `release_seats` and `transition_trip` are the
/// concurrency-critical operations: each one must be a single atomic
/// conditional update against the stored document. Two service instances
/// confirming the last seat concurrently must serialize inside the store,
/// never both succeed. Read-check-write at the caller is not an
/// implementation option for these.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError>;

    async fn get_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, StoreError>;

    /// Atomically decrement `available_seats` by `seats` and add the
    /// passenger to the roster, but only if the trip is `Active`, has not
    /// departed, and has at least `seats` available. Returns the updated
    /// trip. The roster add is idempotent.
    async fn reserve_seats(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
        seats: u8,
    ) -> Result<Trip, StoreError>;

    /// Atomically hand seats back. The increment only applies if the
    /// passenger was actually on the roster (and is capped at
    /// `total_seats`), so replaying a release is a harmless no-op.
    async fn release_seats(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
        seats: u8,
    ) -> Result<Trip, StoreError>;

    /// Compare-and-set on the trip status. Fails with `StatusConflict` if
    /// the current status is not `from`.
    async fn transition_trip(
        &self,
        trip_id: Uuid,
        from: TripStatus,
        to: TripStatus,
    ) -> Result<Trip, StoreError>;
}
