use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use farepool_booking::models::{Booking, BookingStatus, CancellationRecord};
use farepool_booking::repository::BookingRepository;
use farepool_core::StoreError;
use farepool_negotiation::models::{Negotiation, NegotiationMessage, NegotiationStatus};
use farepool_negotiation::repository::NegotiationRepository;
use farepool_trip::repository::TripRepository;
use farepool_trip::trip::{Trip, TripStatus};

/// In-process backend implementing all three repository seams.
///
/// Every conditional update runs inside a single write-lock section, so each
/// repository call is atomic with respect to every other one. No method
/// awaits anything else while holding a lock.
#[derive(Default)]
pub struct MemoryStore {
    trips: RwLock<HashMap<Uuid, Trip>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    negotiations: RwLock<HashMap<Uuid, Negotiation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripRepository for MemoryStore {
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut trips = self.trips.write().await;
        trips.insert(trip.id, trip.clone());
        debug!(trip_id = %trip.id, "Trip stored");
        Ok(())
    }

    async fn get_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, StoreError> {
        let trips = self.trips.read().await;
        Ok(trips.get(&trip_id).cloned())
    }

    async fn reserve_seats(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
        seats: u8,
    ) -> Result<Trip, StoreError> {
        let mut trips = self.trips.write().await;
        let trip = trips
            .get_mut(&trip_id)
            .ok_or_else(|| StoreError::NotFound(format!("trip {}", trip_id)))?;

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
        trip.updated_at = Utc::now();
        debug!(
            trip_id = %trip_id,
            passenger_id = %passenger_id,
            seats,
            available = trip.available_seats,
            "Seats reserved"
        );
        Ok(trip.clone())
    }

    async fn release_seats(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
        seats: u8,
    ) -> Result<Trip, StoreError> {
        let mut trips = self.trips.write().await;
        let trip = trips
            .get_mut(&trip_id)
            .ok_or_else(|| StoreError::NotFound(format!("trip {}", trip_id)))?;

        // Roster membership gates the increment, so a replayed release
        // cannot inflate availability.
        if trip.passengers.remove(&passenger_id) {
            trip.available_seats = trip
                .available_seats
                .saturating_add(seats)
                .min(trip.total_seats);
            trip.updated_at = Utc::now();
            debug!(
                trip_id = %trip_id,
                passenger_id = %passenger_id,
                seats,
                available = trip.available_seats,
                "Seats released"
            );
        }
        Ok(trip.clone())
    }

    async fn transition_trip(
        &self,
        trip_id: Uuid,
        from: TripStatus,
        to: TripStatus,
    ) -> Result<Trip, StoreError> {
        let mut trips = self.trips.write().await;
        let trip = trips
            .get_mut(&trip_id)
            .ok_or_else(|| StoreError::NotFound(format!("trip {}", trip_id)))?;

        if trip.status != from {
            return Err(StoreError::StatusConflict {
                expected: format!("{:?}", from),
                actual: format!("{:?}", trip.status),
            });
        }
        trip.status = to;
        trip.updated_at = Utc::now();
        debug!(trip_id = %trip_id, status = ?trip.status, "Trip status changed");
        Ok(trip.clone())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().await;
        let already_live = bookings.values().any(|b| {
            b.trip_id == booking.trip_id && b.passenger_id == booking.passenger_id && b.is_live()
        });
        if already_live {
            return Err(StoreError::DuplicateBooking {
                trip_id: booking.trip_id,
                passenger_id: booking.passenger_id,
            });
        }
        bookings.insert(booking.id, booking.clone());
        debug!(booking_id = %booking.id, trip_id = %booking.trip_id, "Booking stored");
        Ok(())
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&booking_id).cloned())
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&booking_id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking_id)))?;

        if booking.status != from {
            return Err(StoreError::StatusConflict {
                expected: format!("{:?}", from),
                actual: format!("{:?}", booking.status),
            });
        }
        booking.apply_status(to);
        debug!(booking_id = %booking_id, status = ?booking.status, "Booking status changed");
        Ok(booking.clone())
    }

    async fn cancel_booking(
        &self,
        booking_id: Uuid,
        record: &CancellationRecord,
    ) -> Result<(Booking, BookingStatus), StoreError> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&booking_id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking_id)))?;

        if !booking.is_live() {
            return Err(StoreError::StatusConflict {
                expected: "Pending or Confirmed".to_string(),
                actual: format!("{:?}", booking.status),
            });
        }
        let prior = booking.status.clone();
        booking.apply_status(BookingStatus::Cancelled);
        booking.cancellation = Some(record.clone());
        debug!(booking_id = %booking_id, prior = ?prior, fee = record.fee, "Booking cancelled");
        Ok((booking.clone(), prior))
    }

    async fn list_bookings_for_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| b.trip_id == trip_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NegotiationRepository for MemoryStore {
    async fn insert_negotiation(&self, negotiation: &Negotiation) -> Result<(), StoreError> {
        let mut negotiations = self.negotiations.write().await;
        let already_open = negotiations.values().any(|n| {
            n.trip_id == negotiation.trip_id
                && n.passenger_id == negotiation.passenger_id
                && n.is_open()
        });
        if already_open {
            return Err(StoreError::DuplicateNegotiation {
                trip_id: negotiation.trip_id,
                passenger_id: negotiation.passenger_id,
            });
        }
        negotiations.insert(negotiation.id, negotiation.clone());
        debug!(
            negotiation_id = %negotiation.id,
            trip_id = %negotiation.trip_id,
            "Negotiation stored"
        );
        Ok(())
    }

    async fn get_negotiation(
        &self,
        negotiation_id: Uuid,
    ) -> Result<Option<Negotiation>, StoreError> {
        let negotiations = self.negotiations.read().await;
        Ok(negotiations.get(&negotiation_id).cloned())
    }

    async fn append_message(
        &self,
        negotiation_id: Uuid,
        message: NegotiationMessage,
    ) -> Result<Negotiation, StoreError> {
        let mut negotiations = self.negotiations.write().await;
        let negotiation = negotiations
            .get_mut(&negotiation_id)
            .ok_or_else(|| StoreError::NotFound(format!("negotiation {}", negotiation_id)))?;

        if negotiation.status != NegotiationStatus::Pending {
            return Err(StoreError::StatusConflict {
                expected: format!("{:?}", NegotiationStatus::Pending),
                actual: format!("{:?}", negotiation.status),
            });
        }
        negotiation.apply_message(message);
        debug!(
            negotiation_id = %negotiation_id,
            offer = negotiation.current_offer,
            "Negotiation message appended"
        );
        Ok(negotiation.clone())
    }

    async fn transition_negotiation(
        &self,
        negotiation_id: Uuid,
        from: NegotiationStatus,
        to: NegotiationStatus,
    ) -> Result<Negotiation, StoreError> {
        let mut negotiations = self.negotiations.write().await;
        let negotiation = negotiations
            .get_mut(&negotiation_id)
            .ok_or_else(|| StoreError::NotFound(format!("negotiation {}", negotiation_id)))?;

        if negotiation.status != from {
            return Err(StoreError::StatusConflict {
                expected: format!("{:?}", from),
                actual: format!("{:?}", negotiation.status),
            });
        }
        negotiation.apply_status(to);
        debug!(
            negotiation_id = %negotiation_id,
            status = ?negotiation.status,
            "Negotiation status changed"
        );
        Ok(negotiation.clone())
    }

    async fn reject_negotiation(
        &self,
        negotiation_id: Uuid,
        closing: NegotiationMessage,
    ) -> Result<Negotiation, StoreError> {
        let mut negotiations = self.negotiations.write().await;
        let negotiation = negotiations
            .get_mut(&negotiation_id)
            .ok_or_else(|| StoreError::NotFound(format!("negotiation {}", negotiation_id)))?;

        if negotiation.status != NegotiationStatus::Pending {
            return Err(StoreError::StatusConflict {
                expected: format!("{:?}", NegotiationStatus::Pending),
                actual: format!("{:?}", negotiation.status),
            });
        }
        negotiation.apply_message(closing);
        negotiation.apply_status(NegotiationStatus::Rejected);
        debug!(negotiation_id = %negotiation_id, "Negotiation rejected");
        Ok(negotiation.clone())
    }

    async fn expire_for_trip(&self, trip_id: Uuid) -> Result<Vec<Negotiation>, StoreError> {
        let mut negotiations = self.negotiations.write().await;
        let mut expired = Vec::new();
        for negotiation in negotiations.values_mut() {
            if negotiation.trip_id == trip_id && negotiation.status == NegotiationStatus::Pending {
                negotiation.apply_status(NegotiationStatus::Expired);
                expired.push(negotiation.clone());
            }
        }
        if !expired.is_empty() {
            debug!(trip_id = %trip_id, count = expired.len(), "Pending negotiations expired");
        }
        Ok(expired)
    }
}
