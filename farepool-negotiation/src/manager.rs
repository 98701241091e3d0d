use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Negotiation, NegotiationMessage, NegotiationStatus};
use crate::repository::NegotiationRepository;
use farepool_booking::models::{Booking, CancellationRecord};
use farepool_booking::repository::BookingRepository;
use farepool_core::StoreError;
use farepool_shared::PartyRole;
use farepool_trip::inventory::{TripError, TripInventory};
use farepool_trip::trip::PriceType;
use farepool_trip::CommissionPolicy;

/// Manages the offer/counter-offer protocol and its terminal step, where an
/// accepted negotiation turns into a confirmed single-seat booking.
#[derive(Clone)]
pub struct NegotiationManager {
    negotiations: Arc<dyn NegotiationRepository>,
    bookings: Arc<dyn BookingRepository>,
    inventory: TripInventory,
    commission: CommissionPolicy,
}

impl NegotiationManager {
    pub fn new(
        negotiations: Arc<dyn NegotiationRepository>,
        bookings: Arc<dyn BookingRepository>,
        inventory: TripInventory,
        commission: CommissionPolicy,
    ) -> Self {
        Self {
            negotiations,
            bookings,
            inventory,
            commission,
        }
    }

    /// Passenger opens a negotiation with a first offer on a negotiable trip.
    pub async fn open(
        &self,
        passenger_id: Uuid,
        trip_id: Uuid,
        proposed_price: f64,
        body: String,
    ) -> Result<Negotiation, NegotiationError> {
        validate_price(proposed_price)?;

        let trip = self.inventory.get(trip_id).await?;
        if !trip.is_active() {
            return Err(NegotiationError::Trip(TripError::NotActive {
                status: format!("{:?}", trip.status),
            }));
        }
        if trip.has_departed(Utc::now()) {
            return Err(NegotiationError::Trip(TripError::Departed));
        }
        if trip.price_type != PriceType::Negotiable {
            return Err(NegotiationError::NotNegotiable);
        }
        if passenger_id == trip.driver_id {
            return Err(NegotiationError::OwnTrip);
        }

        let negotiation = Negotiation::new(&trip, passenger_id, proposed_price, body);
        match self.negotiations.insert_negotiation(&negotiation).await {
            Ok(()) => {}
            Err(StoreError::DuplicateNegotiation {
                trip_id,
                passenger_id,
            }) => {
                return Err(NegotiationError::Duplicate {
                    trip_id,
                    passenger_id,
                })
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            "Negotiation opened: {} on trip {} at {}",
            negotiation.id,
            trip.id,
            proposed_price
        );
        Ok(negotiation)
    }

    pub async fn get(&self, negotiation_id: Uuid) -> Result<Negotiation, NegotiationError> {
        self.negotiations
            .get_negotiation(negotiation_id)
            .await?
            .ok_or(NegotiationError::NotFound(negotiation_id))
    }

    /// Either party proposes a new price while the negotiation is pending.
    pub async fn counter(
        &self,
        caller_id: Uuid,
        negotiation_id: Uuid,
        price: f64,
        body: String,
    ) -> Result<Negotiation, NegotiationError> {
        validate_price(price)?;

        let negotiation = self.get(negotiation_id).await?;
        let role = self.role_of(&negotiation, caller_id)?;
        if !negotiation.is_open() {
            return Err(NegotiationError::Closed {
                status: format!("{:?}", negotiation.status),
            });
        }

        let message = NegotiationMessage::new(caller_id, role, body, Some(price));
        match self.negotiations.append_message(negotiation_id, message).await {
            Ok(updated) => Ok(updated),
            Err(StoreError::StatusConflict { actual, .. }) => {
                Err(NegotiationError::Closed { status: actual })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Accept the offer currently on the table.
    ///
    /// Only the party who did not place `current_offer` may accept; nobody
    /// gets to declare their own proposal agreed. On success the negotiation
    /// is `Accepted` and a confirmed single-seat booking exists at the
    /// agreed price. When the trip has no seat left, the whole step is
    /// unwound and the negotiation stays pending.
    pub async fn accept(
        &self,
        caller_id: Uuid,
        negotiation_id: Uuid,
    ) -> Result<(Negotiation, Booking), NegotiationError> {
        let negotiation = self.get(negotiation_id).await?;
        let role = self.role_of(&negotiation, caller_id)?;
        if !negotiation.is_open() {
            return Err(NegotiationError::Closed {
                status: format!("{:?}", negotiation.status),
            });
        }
        if role == negotiation.last_offer_by {
            return Err(NegotiationError::OwnOffer);
        }

        // 1. Claim the negotiation. Exactly one accept can win this swap.
        let accepted = match self
            .negotiations
            .transition_negotiation(
                negotiation_id,
                NegotiationStatus::Pending,
                NegotiationStatus::Accepted,
            )
            .await
        {
            Ok(n) => n,
            Err(StoreError::StatusConflict { actual, .. }) => {
                return Err(NegotiationError::Closed { status: actual })
            }
            Err(e) => return Err(e.into()),
        };

        // 2. Lock the agreed price into a booking, confirmed from birth.
        let split = self.commission.split(accepted.current_offer).await;
        let booking = Booking::negotiated(
            accepted.trip_id,
            accepted.passenger_id,
            accepted.driver_id,
            accepted.current_offer,
            split,
            accepted.id,
        );
        if let Err(insert_err) = self.bookings.insert_booking(&booking).await {
            self.reopen(negotiation_id).await;
            return Err(match insert_err {
                StoreError::DuplicateBooking {
                    trip_id,
                    passenger_id,
                } => NegotiationError::AlreadyBooked {
                    trip_id,
                    passenger_id,
                },
                e => e.into(),
            });
        }

        // 3. Take the seat. Negotiated bookings are always single-seat.
        if let Err(reserve_err) = self
            .inventory
            .reserve(accepted.trip_id, accepted.passenger_id, 1)
            .await
        {
            self.discard_booking(&booking, caller_id, role).await;
            self.reopen(negotiation_id).await;
            return Err(reserve_err.into());
        }

        tracing::info!(
            "Negotiation accepted: {} -> booking {} at {}",
            negotiation_id,
            booking.id,
            accepted.current_offer
        );
        Ok((accepted, booking))
    }

    /// Either party walks away; the closing message is recorded and the
    /// negotiation becomes `Rejected`.
    pub async fn reject(
        &self,
        caller_id: Uuid,
        negotiation_id: Uuid,
    ) -> Result<Negotiation, NegotiationError> {
        let negotiation = self.get(negotiation_id).await?;
        let role = self.role_of(&negotiation, caller_id)?;
        if !negotiation.is_open() {
            return Err(NegotiationError::Closed {
                status: format!("{:?}", negotiation.status),
            });
        }

        let closing = NegotiationMessage::new(caller_id, role, "Offer rejected".to_string(), None);
        match self
            .negotiations
            .reject_negotiation(negotiation_id, closing)
            .await
        {
            Ok(rejected) => {
                tracing::info!("Negotiation rejected: {}", negotiation_id);
                Ok(rejected)
            }
            Err(StoreError::StatusConflict { actual, .. }) => {
                Err(NegotiationError::Closed { status: actual })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Expire every pending negotiation on a trip that is going away.
    pub async fn expire_for_trip(
        &self,
        trip_id: Uuid,
    ) -> Result<Vec<Negotiation>, NegotiationError> {
        let expired = self.negotiations.expire_for_trip(trip_id).await?;
        if !expired.is_empty() {
            tracing::info!("Expired {} negotiations on trip {}", expired.len(), trip_id);
        }
        Ok(expired)
    }

    fn role_of(
        &self,
        negotiation: &Negotiation,
        caller_id: Uuid,
    ) -> Result<PartyRole, NegotiationError> {
        negotiation.role_of(caller_id).ok_or_else(|| {
            NegotiationError::Forbidden("caller is not a party to this negotiation".to_string())
        })
    }

    /// Compensation: put a claimed negotiation back to pending.
    async fn reopen(&self, negotiation_id: Uuid) {
        if let Err(err) = self
            .negotiations
            .transition_negotiation(
                negotiation_id,
                NegotiationStatus::Accepted,
                NegotiationStatus::Pending,
            )
            .await
        {
            tracing::warn!(
                "Failed to reopen negotiation {} after accept failure: {}",
                negotiation_id,
                err
            );
        }
    }

    /// Compensation: void a booking whose seat reservation never happened.
    /// The booking held no seats, so this bypasses the release path.
    async fn discard_booking(&self, booking: &Booking, caller_id: Uuid, role: PartyRole) {
        let record = CancellationRecord {
            cancelled_by: caller_id,
            cancelled_by_role: role,
            reason: Some("seat reservation failed".to_string()),
            fee: 0.0,
            position: None,
            cancelled_at: Utc::now(),
        };
        if let Err(err) = self.bookings.cancel_booking(booking.id, &record).await {
            tracing::warn!(
                "Failed to discard booking {} after reservation failure: {}",
                booking.id,
                err
            );
        }
    }
}

fn validate_price(price: f64) -> Result<(), NegotiationError> {
    if !price.is_finite() || price < 0.0 {
        return Err(NegotiationError::InvalidPrice(price));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("Negotiation not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid price offer: {0}")]
    InvalidPrice(f64),

    #[error("Trip price is fixed and not open to negotiation")]
    NotNegotiable,

    #[error("Drivers cannot negotiate on their own trip")]
    OwnTrip,

    #[error("Negotiation is closed: {status}")]
    Closed { status: String },

    #[error("Cannot accept an offer you placed yourself")]
    OwnOffer,

    #[error("A pending negotiation already exists for passenger {passenger_id} on trip {trip_id}")]
    Duplicate { trip_id: Uuid, passenger_id: Uuid },

    #[error("Passenger {passenger_id} already has a live booking on trip {trip_id}")]
    AlreadyBooked { trip_id: Uuid, passenger_id: Uuid },

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Trip(#[from] TripError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use farepool_booking::models::BookingStatus;
    use farepool_core::geo::GeoPoint;
    use farepool_trip::commission;
    use farepool_trip::trip::{Location, NewTrip, Trip, TripStatus};
    use farepool_trip::TripRepository;
    use tokio::sync::RwLock;

    /// One trip under the same conditional-update contract the real store
    /// honors.
    struct SingleTrip {
        trip: RwLock<Trip>,
    }

    #[async_trait]
    impl TripRepository for SingleTrip {
        async fn insert_trip(&self, _trip: &Trip) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, StoreError> {
            let trip = self.trip.read().await;
            Ok((trip.id == trip_id).then(|| trip.clone()))
        }

        async fn reserve_seats(
            &self,
            trip_id: Uuid,
            passenger_id: Uuid,
            seats: u8,
        ) -> Result<Trip, StoreError> {
            let mut trip = self.trip.write().await;
            if trip.id != trip_id {
                return Err(StoreError::NotFound(trip_id.to_string()));
            }
            if trip.status != TripStatus::Active {
                return Err(StoreError::TripNotActive {
                    status: format!("{:?}", trip.status),
                });
            }
            if trip.has_departed(Utc::now()) {
                return Err(StoreError::TripDeparted);
            }
            if trip.available_seats < seats {
                return Err(StoreError::InsufficientCapacity {
                    requested: seats,
                    available: trip.available_seats,
                });
            }
            trip.available_seats -= seats;
            trip.passengers.insert(passenger_id);
            Ok(trip.clone())
        }

        async fn release_seats(
            &self,
            trip_id: Uuid,
            passenger_id: Uuid,
            seats: u8,
        ) -> Result<Trip, StoreError> {
            let mut trip = self.trip.write().await;
            if trip.id != trip_id {
                return Err(StoreError::NotFound(trip_id.to_string()));
            }
            if trip.passengers.remove(&passenger_id) {
                trip.available_seats =
                    trip.available_seats.saturating_add(seats).min(trip.total_seats);
            }
            Ok(trip.clone())
        }

        async fn transition_trip(
            &self,
            trip_id: Uuid,
            from: TripStatus,
            to: TripStatus,
        ) -> Result<Trip, StoreError> {
            let mut trip = self.trip.write().await;
            if trip.id != trip_id {
                return Err(StoreError::NotFound(trip_id.to_string()));
            }
            if trip.status != from {
                return Err(StoreError::StatusConflict {
                    expected: format!("{:?}", from),
                    actual: format!("{:?}", trip.status),
                });
            }
            trip.status = to;
            Ok(trip.clone())
        }
    }

    /// Booking rows with the store's uniqueness and cancellation semantics.
    #[derive(Default)]
    struct BookingRows {
        rows: RwLock<Vec<Booking>>,
    }

    #[async_trait]
    impl BookingRepository for BookingRows {
        async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
            let mut rows = self.rows.write().await;
            if rows.iter().any(|b| {
                b.trip_id == booking.trip_id
                    && b.passenger_id == booking.passenger_id
                    && b.is_live()
            }) {
                return Err(StoreError::DuplicateBooking {
                    trip_id: booking.trip_id,
                    passenger_id: booking.passenger_id,
                });
            }
            rows.push(booking.clone());
            Ok(())
        }

        async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
            let rows = self.rows.read().await;
            Ok(rows.iter().find(|b| b.id == booking_id).cloned())
        }

        async fn transition_booking(
            &self,
            booking_id: Uuid,
            from: BookingStatus,
            to: BookingStatus,
        ) -> Result<Booking, StoreError> {
            let mut rows = self.rows.write().await;
            let booking = rows
                .iter_mut()
                .find(|b| b.id == booking_id)
                .ok_or_else(|| StoreError::NotFound(booking_id.to_string()))?;
            if booking.status != from {
                return Err(StoreError::StatusConflict {
                    expected: format!("{:?}", from),
                    actual: format!("{:?}", booking.status),
                });
            }
            booking.apply_status(to);
            Ok(booking.clone())
        }

        async fn cancel_booking(
            &self,
            booking_id: Uuid,
            record: &CancellationRecord,
        ) -> Result<(Booking, BookingStatus), StoreError> {
            let mut rows = self.rows.write().await;
            let booking = rows
                .iter_mut()
                .find(|b| b.id == booking_id)
                .ok_or_else(|| StoreError::NotFound(booking_id.to_string()))?;
            if !booking.is_live() {
                return Err(StoreError::StatusConflict {
                    expected: "Pending or Confirmed".to_string(),
                    actual: format!("{:?}", booking.status),
                });
            }
            let prior = booking.status.clone();
            booking.apply_status(BookingStatus::Cancelled);
            booking.cancellation = Some(record.clone());
            Ok((booking.clone(), prior))
        }

        async fn list_bookings_for_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError> {
            let rows = self.rows.read().await;
            Ok(rows.iter().filter(|b| b.trip_id == trip_id).cloned().collect())
        }
    }

    /// Negotiation rows; terminal rows refuse every further mutation.
    #[derive(Default)]
    struct NegotiationRows {
        rows: RwLock<Vec<Negotiation>>,
    }

    #[async_trait]
    impl NegotiationRepository for NegotiationRows {
        async fn insert_negotiation(&self, negotiation: &Negotiation) -> Result<(), StoreError> {
            let mut rows = self.rows.write().await;
            if rows.iter().any(|n| {
                n.trip_id == negotiation.trip_id
                    && n.passenger_id == negotiation.passenger_id
                    && n.is_open()
            }) {
                return Err(StoreError::DuplicateNegotiation {
                    trip_id: negotiation.trip_id,
                    passenger_id: negotiation.passenger_id,
                });
            }
            rows.push(negotiation.clone());
            Ok(())
        }

        async fn get_negotiation(
            &self,
            negotiation_id: Uuid,
        ) -> Result<Option<Negotiation>, StoreError> {
            let rows = self.rows.read().await;
            Ok(rows.iter().find(|n| n.id == negotiation_id).cloned())
        }

        async fn append_message(
            &self,
            negotiation_id: Uuid,
            message: NegotiationMessage,
        ) -> Result<Negotiation, StoreError> {
            let mut rows = self.rows.write().await;
            let negotiation = rows
                .iter_mut()
                .find(|n| n.id == negotiation_id)
                .ok_or_else(|| StoreError::NotFound(negotiation_id.to_string()))?;
            if !negotiation.is_open() {
                return Err(StoreError::StatusConflict {
                    expected: "Pending".to_string(),
                    actual: format!("{:?}", negotiation.status),
                });
            }
            negotiation.apply_message(message);
            Ok(negotiation.clone())
        }

        async fn transition_negotiation(
            &self,
            negotiation_id: Uuid,
            from: NegotiationStatus,
            to: NegotiationStatus,
        ) -> Result<Negotiation, StoreError> {
            let mut rows = self.rows.write().await;
            let negotiation = rows
                .iter_mut()
                .find(|n| n.id == negotiation_id)
                .ok_or_else(|| StoreError::NotFound(negotiation_id.to_string()))?;
            if negotiation.status != from {
                return Err(StoreError::StatusConflict {
                    expected: format!("{:?}", from),
                    actual: format!("{:?}", negotiation.status),
                });
            }
            negotiation.apply_status(to);
            Ok(negotiation.clone())
        }

        async fn reject_negotiation(
            &self,
            negotiation_id: Uuid,
            closing: NegotiationMessage,
        ) -> Result<Negotiation, StoreError> {
            let mut rows = self.rows.write().await;
            let negotiation = rows
                .iter_mut()
                .find(|n| n.id == negotiation_id)
                .ok_or_else(|| StoreError::NotFound(negotiation_id.to_string()))?;
            if !negotiation.is_open() {
                return Err(StoreError::StatusConflict {
                    expected: "Pending".to_string(),
                    actual: format!("{:?}", negotiation.status),
                });
            }
            negotiation.apply_message(closing);
            negotiation.apply_status(NegotiationStatus::Rejected);
            Ok(negotiation.clone())
        }

        async fn expire_for_trip(&self, trip_id: Uuid) -> Result<Vec<Negotiation>, StoreError> {
            let mut rows = self.rows.write().await;
            let mut expired = Vec::new();
            for negotiation in rows.iter_mut() {
                if negotiation.trip_id == trip_id && negotiation.is_open() {
                    negotiation.apply_status(NegotiationStatus::Expired);
                    expired.push(negotiation.clone());
                }
            }
            Ok(expired)
        }
    }

    struct Fixture {
        manager: NegotiationManager,
        trips: Arc<SingleTrip>,
        bookings: Arc<BookingRows>,
        trip: Trip,
    }

    fn trip_spec(seats: u8, price_type: PriceType) -> NewTrip {
        NewTrip {
            driver_id: Uuid::new_v4(),
            departure: Location {
                point: GeoPoint::new(41.3275, 19.8187),
                city: "Tirana".to_string(),
                address: None,
            },
            destination: Location {
                point: GeoPoint::new(40.6086, 20.7761),
                city: "Korce".to_string(),
                address: None,
            },
            departs_at: Utc::now() + Duration::hours(5),
            price: 800.0,
            price_type,
            seats,
            distance_km: None,
        }
    }

    fn fixture(seats: u8, price_type: PriceType) -> Fixture {
        let trip = Trip::new(trip_spec(seats, price_type));
        let trips = Arc::new(SingleTrip {
            trip: RwLock::new(trip.clone()),
        });
        let bookings = Arc::new(BookingRows::default());
        let inventory = TripInventory::new(trips.clone(), 8);
        let manager = NegotiationManager::new(
            Arc::new(NegotiationRows::default()),
            bookings.clone(),
            inventory,
            CommissionPolicy::default(),
        );
        Fixture {
            manager,
            trips,
            bookings,
            trip,
        }
    }

    #[tokio::test]
    async fn test_open_validations() {
        let fixed = fixture(3, PriceType::Fixed);
        let err = fixed
            .manager
            .open(Uuid::new_v4(), fixed.trip.id, 700.0, "700?".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::NotNegotiable));

        let fx = fixture(3, PriceType::Negotiable);
        let err = fx
            .manager
            .open(fx.trip.driver_id, fx.trip.id, 700.0, "700?".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::OwnTrip));

        let err = fx
            .manager
            .open(Uuid::new_v4(), fx.trip.id, -1.0, "?".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidPrice(_)));

        let passenger = Uuid::new_v4();
        fx.manager
            .open(passenger, fx.trip.id, 700.0, "700?".to_string())
            .await
            .unwrap();
        let err = fx
            .manager
            .open(passenger, fx.trip.id, 720.0, "720?".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_counter_moves_the_offer() {
        let fx = fixture(3, PriceType::Negotiable);
        let passenger = Uuid::new_v4();
        let negotiation = fx
            .manager
            .open(passenger, fx.trip.id, 600.0, "Would you take 600?".to_string())
            .await
            .unwrap();

        let err = fx
            .manager
            .counter(Uuid::new_v4(), negotiation.id, 650.0, "650".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Forbidden(_)));

        let countered = fx
            .manager
            .counter(fx.trip.driver_id, negotiation.id, 750.0, "750 or nothing".to_string())
            .await
            .unwrap();
        assert_eq!(countered.current_offer, 750.0);
        assert_eq!(countered.last_offer_by, PartyRole::Driver);
        assert_eq!(countered.messages.len(), 2);

        fx.manager.reject(passenger, negotiation.id).await.unwrap();
        let err = fx
            .manager
            .counter(passenger, negotiation.id, 700.0, "700?".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Closed { .. }));
    }

    #[tokio::test]
    async fn test_accept_tie_break_and_booking() {
        let fx = fixture(3, PriceType::Negotiable);
        let passenger = Uuid::new_v4();
        let negotiation = fx
            .manager
            .open(passenger, fx.trip.id, 650.0, "650?".to_string())
            .await
            .unwrap();

        // The opening offer belongs to the passenger; they cannot accept it.
        let err = fx
            .manager
            .accept(passenger, negotiation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::OwnOffer));

        let (accepted, booking) = fx
            .manager
            .accept(fx.trip.driver_id, negotiation.id)
            .await
            .unwrap();
        assert_eq!(accepted.status, NegotiationStatus::Accepted);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.seats, 1);
        assert!((booking.total_price - 650.0).abs() < 1e-9);
        assert!((booking.app_commission + booking.driver_amount - 650.0).abs() < 1e-9);
        assert_eq!(booking.negotiation_id, Some(negotiation.id));

        let stored = fx.trips.trip.read().await;
        assert_eq!(stored.available_seats, 2);
        assert!(stored.passengers.contains(&passenger));
    }

    #[tokio::test]
    async fn test_accept_unwinds_when_reservation_fails() {
        let fx = fixture(1, PriceType::Negotiable);
        let haggler = Uuid::new_v4();
        let negotiation = fx
            .manager
            .open(haggler, fx.trip.id, 650.0, "650?".to_string())
            .await
            .unwrap();

        // The only seat disappears before the driver accepts.
        fx.trips
            .reserve_seats(fx.trip.id, Uuid::new_v4(), 1)
            .await
            .unwrap();

        let err = fx
            .manager
            .accept(fx.trip.driver_id, negotiation.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::Trip(TripError::InsufficientSeats { .. })
        ));

        // Negotiation back on the table, stillborn booking voided, no seat
        // movement for the haggler.
        assert_eq!(
            fx.manager.get(negotiation.id).await.unwrap().status,
            NegotiationStatus::Pending
        );
        let rows = fx.bookings.list_bookings_for_trip(fx.trip.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, BookingStatus::Cancelled);
        let stored = fx.trips.trip.read().await;
        assert_eq!(stored.available_seats, 0);
        assert!(!stored.passengers.contains(&haggler));
    }

    #[tokio::test]
    async fn test_accept_blocked_by_existing_live_booking() {
        let fx = fixture(3, PriceType::Negotiable);
        let passenger = Uuid::new_v4();
        let negotiation = fx
            .manager
            .open(passenger, fx.trip.id, 700.0, "700?".to_string())
            .await
            .unwrap();

        // The passenger also filed a direct request in the meantime.
        let direct = Booking::pending(
            fx.trip.id,
            passenger,
            fx.trip.driver_id,
            1,
            fx.trip.price,
            commission::split(fx.trip.price, commission::DEFAULT_COMMISSION_RATE),
            None,
        );
        fx.bookings.insert_booking(&direct).await.unwrap();

        let err = fx
            .manager
            .accept(fx.trip.driver_id, negotiation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::AlreadyBooked { .. }));

        // Nothing moved: negotiation pending again, no seat taken.
        assert_eq!(
            fx.manager.get(negotiation.id).await.unwrap().status,
            NegotiationStatus::Pending
        );
        assert_eq!(fx.trips.trip.read().await.available_seats, 3);
    }

    #[tokio::test]
    async fn test_reject_appends_closing_message() {
        let fx = fixture(3, PriceType::Negotiable);
        let passenger = Uuid::new_v4();
        let negotiation = fx
            .manager
            .open(passenger, fx.trip.id, 600.0, "600?".to_string())
            .await
            .unwrap();

        let rejected = fx
            .manager
            .reject(fx.trip.driver_id, negotiation.id)
            .await
            .unwrap();
        assert_eq!(rejected.status, NegotiationStatus::Rejected);
        assert_eq!(rejected.messages.len(), 2);

        let err = fx
            .manager
            .accept(fx.trip.driver_id, negotiation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Closed { .. }));
    }
}
