use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, CancellationRecord};
use crate::repository::BookingRepository;
use farepool_core::StoreError;
use farepool_shared::PartyRole;
use farepool_trip::inventory::{TripError, TripInventory};
use farepool_trip::trip::Trip;
use farepool_trip::CommissionPolicy;

/// Manages the booking lifecycle and its interaction with seat inventory.
///
/// Seats are deliberately not reserved when a booking is created; they are
/// taken at confirm time, so a driver who never answers does not hold seats
/// hostage. The cost is that a confirm can lose the capacity race, which is
/// an expected outcome here rather than an exceptional one.
#[derive(Clone)]
pub struct BookingManager {
    bookings: Arc<dyn BookingRepository>,
    inventory: TripInventory,
    commission: CommissionPolicy,
}

impl BookingManager {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        inventory: TripInventory,
        commission: CommissionPolicy,
    ) -> Self {
        Self {
            bookings,
            inventory,
            commission,
        }
    }

    /// Create a pending booking request at the trip's listed price.
    pub async fn create(
        &self,
        passenger_id: Uuid,
        trip_id: Uuid,
        seats: u8,
        passenger_note: Option<String>,
    ) -> Result<Booking, BookingError> {
        if seats == 0 {
            return Err(BookingError::ZeroSeats);
        }

        let trip = self.inventory.get(trip_id).await?;
        ensure_open(&trip)?;

        if passenger_id == trip.driver_id {
            return Err(BookingError::OwnTrip);
        }
        // Pre-check only: the actual allocation is deferred to confirm time.
        if seats > trip.available_seats {
            return Err(BookingError::InsufficientSeats {
                requested: seats,
                available: trip.available_seats,
            });
        }

        let total_price = trip.price * seats as f64;
        let split = self.commission.split(total_price).await;
        let booking = Booking::pending(
            trip.id,
            passenger_id,
            trip.driver_id,
            seats,
            total_price,
            split,
            passenger_note,
        );

        match self.bookings.insert_booking(&booking).await {
            Ok(()) => {}
            Err(StoreError::DuplicateBooking {
                trip_id,
                passenger_id,
            }) => {
                return Err(BookingError::Duplicate {
                    trip_id,
                    passenger_id,
                })
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Booking requested: {} on trip {}", booking.id, trip.id);
        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound(booking_id))
    }

    /// Driver accepts a pending booking: `pending → confirmed`.
    ///
    /// The status swap runs first so exactly one of two racing confirms
    /// proceeds to the seat reservation; if the reservation then fails, the
    /// booking is compensated back to pending.
    pub async fn confirm(&self, driver_id: Uuid, booking_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.get(booking_id).await?;
        if booking.driver_id != driver_id {
            return Err(BookingError::Forbidden(
                "only the trip driver can confirm a booking".to_string(),
            ));
        }

        let confirmed = match self
            .bookings
            .transition_booking(booking_id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
        {
            Ok(b) => b,
            Err(StoreError::StatusConflict { actual, .. }) => {
                return Err(BookingError::InvalidTransition {
                    from: actual,
                    to: "CONFIRMED".to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        match self
            .inventory
            .reserve(confirmed.trip_id, confirmed.passenger_id, confirmed.seats)
            .await
        {
            Ok(_) => {
                tracing::info!("Booking confirmed: {}", booking_id);
                Ok(confirmed)
            }
            Err(reserve_err) => {
                // Put the booking back; the passenger may retry once seats free up.
                if let Err(revert_err) = self
                    .bookings
                    .transition_booking(booking_id, BookingStatus::Confirmed, BookingStatus::Pending)
                    .await
                {
                    tracing::warn!(
                        "Failed to revert booking {} after reservation failure: {}",
                        booking_id,
                        revert_err
                    );
                }
                Err(match reserve_err {
                    TripError::InsufficientSeats {
                        requested,
                        available,
                    } => BookingError::InsufficientSeats {
                        requested,
                        available,
                    },
                    other => other.into(),
                })
            }
        }
    }

    /// Driver declines a pending booking request. No fee, no coordinates;
    /// this is the polite path, distinct from a geofenced cancellation.
    pub async fn reject(
        &self,
        driver_id: Uuid,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        let booking = self.get(booking_id).await?;
        if booking.driver_id != driver_id {
            return Err(BookingError::Forbidden(
                "only the trip driver can reject a booking".to_string(),
            ));
        }
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: format!("{:?}", booking.status),
                to: "CANCELLED".to_string(),
            });
        }

        let record = CancellationRecord {
            cancelled_by: driver_id,
            cancelled_by_role: PartyRole::Driver,
            reason,
            fee: 0.0,
            position: None,
            cancelled_at: Utc::now(),
        };
        let rejected = self.cancel(booking_id, record).await?;
        tracing::info!("Booking rejected: {}", booking_id);
        Ok(rejected)
    }

    /// Cancel a live booking and release its seats if it held any. The fee
    /// and permission question is settled by the arbitrator before this is
    /// called; this method only executes the outcome.
    pub async fn cancel(
        &self,
        booking_id: Uuid,
        record: CancellationRecord,
    ) -> Result<Booking, BookingError> {
        let (cancelled, prior) = match self.bookings.cancel_booking(booking_id, &record).await {
            Ok(outcome) => outcome,
            Err(StoreError::NotFound(_)) => return Err(BookingError::NotFound(booking_id)),
            Err(StoreError::StatusConflict { actual, .. }) => {
                return Err(BookingError::InvalidTransition {
                    from: actual,
                    to: "CANCELLED".to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        if prior == BookingStatus::Confirmed {
            // The booking is already cancelled; a release failure must not
            // undo that, so it is logged and swallowed.
            if let Err(err) = self
                .inventory
                .release(cancelled.trip_id, cancelled.passenger_id, cancelled.seats)
                .await
            {
                tracing::warn!(
                    "Seat release failed for cancelled booking {}: {}",
                    booking_id,
                    err
                );
            }
        }

        tracing::info!("Booking cancelled: {}", booking_id);
        Ok(cancelled)
    }

    /// Cascade-cancel every live booking of a cancelled trip. Best effort
    /// per booking: one failure is logged and the rest still proceed.
    pub async fn cancel_for_trip(
        &self,
        trip: &Trip,
        reason: Option<String>,
    ) -> Result<Vec<Booking>, BookingError> {
        let bookings = self.bookings.list_bookings_for_trip(trip.id).await?;
        let mut cancelled = Vec::new();

        for booking in bookings.into_iter().filter(Booking::is_live) {
            let record = CancellationRecord {
                cancelled_by: trip.driver_id,
                cancelled_by_role: PartyRole::Driver,
                reason: reason.clone(),
                fee: 0.0,
                position: None,
                cancelled_at: Utc::now(),
            };
            match self.cancel(booking.id, record).await {
                Ok(b) => cancelled.push(b),
                Err(err) => {
                    tracing::warn!("Cascade cancel failed for booking {}: {}", booking.id, err)
                }
            }
        }

        Ok(cancelled)
    }

    /// Move every confirmed booking of a completed trip to `completed`.
    /// Pending bookings are left alone; on a completed trip they are void
    /// and readers treat them as expired.
    pub async fn complete_for_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        let bookings = self.bookings.list_bookings_for_trip(trip_id).await?;
        let mut completed = Vec::new();

        for booking in bookings {
            if booking.status != BookingStatus::Confirmed {
                continue;
            }
            match self
                .bookings
                .transition_booking(booking.id, BookingStatus::Confirmed, BookingStatus::Completed)
                .await
            {
                Ok(b) => completed.push(b),
                Err(err) => {
                    tracing::warn!("Cascade complete failed for booking {}: {}", booking.id, err)
                }
            }
        }

        Ok(completed)
    }

    pub async fn for_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(self.bookings.list_bookings_for_trip(trip_id).await?)
    }
}

fn ensure_open(trip: &Trip) -> Result<(), BookingError> {
    if !trip.is_active() {
        return Err(BookingError::Trip(TripError::NotActive {
            status: format!("{:?}", trip.status),
        }));
    }
    if trip.has_departed(Utc::now()) {
        return Err(BookingError::Trip(TripError::Departed));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("Booking must request at least one seat")]
    ZeroSeats,

    #[error("Drivers cannot book seats on their own trip")]
    OwnTrip,

    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u8, available: u8 },

    #[error("Passenger {passenger_id} already has a live booking on trip {trip_id}")]
    Duplicate { trip_id: Uuid, passenger_id: Uuid },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Trip(#[from] TripError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
