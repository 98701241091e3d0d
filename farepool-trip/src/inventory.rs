use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::TripRepository;
use crate::trip::{NewTrip, Trip, TripStatus};
use farepool_core::StoreError;

/// Seat inventory service for trips.
///
/// Owns validation and the lazy completion of departed trips; the atomic
/// seat arithmetic itself lives behind [`TripRepository`].
#[derive(Clone)]
pub struct TripInventory {
    trips: Arc<dyn TripRepository>,
    max_seats: u8,
}

impl TripInventory {
    pub fn new(trips: Arc<dyn TripRepository>, max_seats: u8) -> Self {
        Self { trips, max_seats }
    }

    /// Validate and persist a driver's new trip.
    pub async fn publish(&self, spec: NewTrip) -> Result<Trip, TripError> {
        if spec.seats == 0 || spec.seats > self.max_seats {
            return Err(TripError::InvalidSeatCount {
                requested: spec.seats,
                max: self.max_seats,
            });
        }
        if !spec.price.is_finite() || spec.price < 0.0 {
            return Err(TripError::InvalidPrice(spec.price));
        }
        if spec.departs_at <= Utc::now() {
            return Err(TripError::DepartureInPast);
        }

        let trip = Trip::new(spec);
        self.trips.insert_trip(&trip).await?;
        Ok(trip)
    }

    /// Fetch a trip, lazily completing it if its departure time has passed.
    pub async fn get(&self, trip_id: Uuid) -> Result<Trip, TripError> {
        let trip = self.fetch(trip_id).await?;

        if trip.status == TripStatus::Active && trip.has_departed(Utc::now()) {
            return match self
                .trips
                .transition_trip(trip_id, TripStatus::Active, TripStatus::Completed)
                .await
            {
                Ok(updated) => Ok(updated),
                // Another caller beat us to the transition; re-read.
                Err(StoreError::StatusConflict { .. }) => self.fetch(trip_id).await,
                Err(e) => Err(e.into()),
            };
        }

        Ok(trip)
    }

    /// Take seats for a passenger. Fails without side effects when the trip
    /// is not active, has departed, or has fewer seats than requested.
    pub async fn reserve(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
        seats: u8,
    ) -> Result<Trip, TripError> {
        match self.trips.reserve_seats(trip_id, passenger_id, seats).await {
            Ok(trip) => Ok(trip),
            Err(StoreError::NotFound(_)) => Err(TripError::NotFound(trip_id)),
            Err(StoreError::InsufficientCapacity {
                requested,
                available,
            }) => Err(TripError::InsufficientSeats {
                requested,
                available,
            }),
            Err(StoreError::TripNotActive { status }) => Err(TripError::NotActive { status }),
            Err(StoreError::TripDeparted) => Err(TripError::Departed),
            Err(e) => Err(e.into()),
        }
    }

    /// Hand seats back after a cancellation. Safe to replay.
    pub async fn release(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
        seats: u8,
    ) -> Result<Trip, TripError> {
        match self.trips.release_seats(trip_id, passenger_id, seats).await {
            Ok(trip) => Ok(trip),
            Err(StoreError::NotFound(_)) => Err(TripError::NotFound(trip_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Transition `Active → Cancelled`. The caller cascades over bookings.
    pub async fn cancel(&self, trip_id: Uuid) -> Result<Trip, TripError> {
        self.transition(trip_id, TripStatus::Active, TripStatus::Cancelled)
            .await
    }

    /// Transition `Active → Completed`.
    pub async fn complete(&self, trip_id: Uuid) -> Result<Trip, TripError> {
        self.transition(trip_id, TripStatus::Active, TripStatus::Completed)
            .await
    }

    async fn transition(
        &self,
        trip_id: Uuid,
        from: TripStatus,
        to: TripStatus,
    ) -> Result<Trip, TripError> {
        match self.trips.transition_trip(trip_id, from, to.clone()).await {
            Ok(trip) => Ok(trip),
            Err(StoreError::NotFound(_)) => Err(TripError::NotFound(trip_id)),
            Err(StoreError::StatusConflict { actual, .. }) => Err(TripError::InvalidTransition {
                from: actual,
                to: format!("{:?}", to),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, trip_id: Uuid) -> Result<Trip, TripError> {
        self.trips
            .get_trip(trip_id)
            .await?
            .ok_or(TripError::NotFound(trip_id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error("Trip not found: {0}")]
    NotFound(Uuid),

    #[error("Trip is not active: {status}")]
    NotActive { status: String },

    #[error("Trip has already departed")]
    Departed,

    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u8, available: u8 },

    #[error("Invalid seat count: requested {requested}, maximum is {max}")]
    InvalidSeatCount { requested: u8, max: u8 },

    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    #[error("Departure time must be in the future")]
    DepartureInPast,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::{Location, PriceType};
    use async_trait::async_trait;
    use chrono::Duration;
    use farepool_core::geo::GeoPoint;

    /// Accepts every write; enough to exercise the validation layer.
    struct NullRepo;

    #[async_trait]
    impl TripRepository for NullRepo {
        async fn insert_trip(&self, _trip: &Trip) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_trip(&self, _trip_id: Uuid) -> Result<Option<Trip>, StoreError> {
            Ok(None)
        }

        async fn reserve_seats(
            &self,
            trip_id: Uuid,
            _passenger_id: Uuid,
            _seats: u8,
        ) -> Result<Trip, StoreError> {
            Err(StoreError::NotFound(trip_id.to_string()))
        }

        async fn release_seats(
            &self,
            trip_id: Uuid,
            _passenger_id: Uuid,
            _seats: u8,
        ) -> Result<Trip, StoreError> {
            Err(StoreError::NotFound(trip_id.to_string()))
        }

        async fn transition_trip(
            &self,
            trip_id: Uuid,
            _from: TripStatus,
            _to: TripStatus,
        ) -> Result<Trip, StoreError> {
            Err(StoreError::NotFound(trip_id.to_string()))
        }
    }

    fn inventory() -> TripInventory {
        TripInventory::new(Arc::new(NullRepo), 8)
    }

    fn spec(seats: u8, price: f64) -> NewTrip {
        NewTrip {
            driver_id: Uuid::new_v4(),
            departure: Location {
                point: GeoPoint::new(41.3275, 19.8187),
                city: "Tirana".to_string(),
                address: Some("Skanderbeg Square".to_string()),
            },
            destination: Location {
                point: GeoPoint::new(42.0693, 19.5126),
                city: "Shkoder".to_string(),
                address: None,
            },
            departs_at: Utc::now() + Duration::hours(3),
            price,
            price_type: PriceType::Fixed,
            seats,
            distance_km: None,
        }
    }

    #[tokio::test]
    async fn test_publish_accepts_valid_trip() {
        let trip = inventory().publish(spec(4, 1200.0)).await.unwrap();

        assert_eq!(trip.total_seats, 4);
        assert_eq!(trip.available_seats, 4);
        assert_eq!(trip.status, TripStatus::Active);
    }

    #[tokio::test]
    async fn test_publish_rejects_zero_seats() {
        let result = inventory().publish(spec(0, 1200.0)).await;
        assert!(matches!(
            result,
            Err(TripError::InvalidSeatCount { requested: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_rejects_oversized_trip() {
        let result = inventory().publish(spec(9, 1200.0)).await;
        assert!(matches!(
            result,
            Err(TripError::InvalidSeatCount { requested: 9, max: 8 })
        ));
    }

    #[tokio::test]
    async fn test_publish_rejects_negative_price() {
        let result = inventory().publish(spec(4, -10.0)).await;
        assert!(matches!(result, Err(TripError::InvalidPrice(_))));
    }

    #[tokio::test]
    async fn test_publish_rejects_past_departure() {
        let mut s = spec(4, 1200.0);
        s.departs_at = Utc::now() - Duration::minutes(5);

        let result = inventory().publish(s).await;
        assert!(matches!(result, Err(TripError::DepartureInPast)));
    }
}
