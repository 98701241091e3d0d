use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use farepool_booking::arbitrator::{
    ArbitrationConfig, CancellationArbitrator, CancellationRuling,
};
use farepool_booking::models::{Booking, CancellationRecord};
use farepool_booking::repository::BookingRepository;
use farepool_booking::BookingManager;
use farepool_core::geo::GeoPoint;
use farepool_core::notify::Notifier;
use farepool_negotiation::models::Negotiation;
use farepool_negotiation::repository::NegotiationRepository;
use farepool_negotiation::NegotiationManager;
use farepool_shared::{Notification, NotificationEvent, PartyRole, TripSummary};
use farepool_store::{BusinessRules, MemoryStore};
use farepool_trip::repository::TripRepository;
use farepool_trip::trip::{NewTrip, Trip, TripStatus};
use farepool_trip::{CommissionPolicy, CommissionRate, TripInventory};

use crate::error::EngineError;

/// Facade over the marketplace's transactional core.
///
/// Wires the trip inventory, booking lifecycle and negotiation protocol to
/// one repository set, arbitrates geofenced cancellations, and fans out
/// notifications once a state change has committed. Notification delivery
/// is fire-and-forget; a failed send never rolls back a committed change.
#[derive(Clone)]
pub struct Engine {
    trips: TripInventory,
    bookings: BookingManager,
    negotiations: NegotiationManager,
    arbitrator: CancellationArbitrator,
    commission: CommissionPolicy,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        bookings: Arc<dyn BookingRepository>,
        negotiations: Arc<dyn NegotiationRepository>,
        notifier: Arc<dyn Notifier>,
        rules: &BusinessRules,
    ) -> Result<Self, EngineError> {
        let commission = CommissionPolicy::new(rules.commission_rate)?;
        let inventory = TripInventory::new(trips, rules.max_seats_per_trip);
        let arbitrator = CancellationArbitrator::new(ArbitrationConfig {
            proximity_radius_m: rules.proximity_radius_m,
            cancellation_fee: rules.cancellation_fee,
        });

        let booking_manager = BookingManager::new(
            Arc::clone(&bookings),
            inventory.clone(),
            commission.clone(),
        );
        let negotiation_manager = NegotiationManager::new(
            negotiations,
            bookings,
            inventory.clone(),
            commission.clone(),
        );

        Ok(Self {
            trips: inventory,
            bookings: booking_manager,
            negotiations: negotiation_manager,
            arbitrator,
            commission,
            notifier,
        })
    }

    /// Engine over a fresh [`MemoryStore`]. Suitable for embedding and for
    /// tests; production deployments pass their own repositories.
    pub fn in_memory(
        notifier: Arc<dyn Notifier>,
        rules: &BusinessRules,
    ) -> Result<Self, EngineError> {
        let store = Arc::new(MemoryStore::new());
        let trips: Arc<dyn TripRepository> = store.clone();
        let bookings: Arc<dyn BookingRepository> = store.clone();
        let negotiations: Arc<dyn NegotiationRepository> = store;
        Self::new(trips, bookings, negotiations, notifier, rules)
    }

    // ---- trips ----

    /// Driver lists a new trip. Seat count, price and departure time are
    /// validated against the configured rules.
    pub async fn publish_trip(&self, spec: NewTrip) -> Result<Trip, EngineError> {
        let trip = self.trips.publish(spec).await?;
        tracing::info!(
            "Trip published: {} {} -> {} ({} seats at {})",
            trip.id,
            trip.departure.city,
            trip.destination.city,
            trip.total_seats,
            trip.price
        );
        Ok(trip)
    }

    /// Fetch a trip. Reading a departed trip settles it to `Completed`.
    pub async fn get_trip(&self, trip_id: Uuid) -> Result<Trip, EngineError> {
        Ok(self.trips.get(trip_id).await?)
    }

    /// Driver withdraws an active trip. Every live booking is voided with
    /// its seats returned, and open negotiations expire.
    pub async fn cancel_trip(
        &self,
        driver_id: Uuid,
        trip_id: Uuid,
        reason: Option<String>,
    ) -> Result<Trip, EngineError> {
        // 1. Authorize against the stored trip.
        let trip = self.trips.get(trip_id).await?;
        if trip.driver_id != driver_id {
            return Err(EngineError::Unauthorized(
                "only the trip driver can cancel the trip".to_string(),
            ));
        }

        // 2. Close the trip; fails if it is no longer active.
        let cancelled = self.trips.cancel(trip_id).await?;

        // 3. Cascade over bookings, then over negotiations.
        let summary = TripSummary::from(&cancelled);
        let bookings = self
            .bookings
            .cancel_for_trip(&cancelled, reason.clone())
            .await?;
        for booking in &bookings {
            self.dispatch(
                booking.passenger_id,
                NotificationEvent::TripCancelled {
                    trip: summary.clone(),
                    reason: reason.clone(),
                },
            )
            .await;
        }

        let expired = self.negotiations.expire_for_trip(trip_id).await?;
        for negotiation in &expired {
            self.dispatch(
                negotiation.passenger_id,
                NotificationEvent::NegotiationExpired {
                    negotiation_id: negotiation.id,
                    trip: summary.clone(),
                },
            )
            .await;
        }

        tracing::info!(
            "Trip cancelled: {} ({} bookings voided, {} negotiations expired)",
            trip_id,
            bookings.len(),
            expired.len()
        );
        Ok(cancelled)
    }

    /// Driver marks the trip as carried out. Confirmed bookings settle to
    /// `Completed`; whatever was still being negotiated expires.
    pub async fn complete_trip(&self, driver_id: Uuid, trip_id: Uuid) -> Result<Trip, EngineError> {
        // 1. Authorize. The read itself may settle a departed trip.
        let trip = self.trips.get(trip_id).await?;
        if trip.driver_id != driver_id {
            return Err(EngineError::Unauthorized(
                "only the trip driver can complete the trip".to_string(),
            ));
        }

        // 2. Flip the status unless the departed-trip sweep already has.
        let completed = if trip.status == TripStatus::Completed {
            trip
        } else {
            self.trips.complete(trip_id).await?
        };

        // 3. Settle bookings and close out negotiations.
        let summary = TripSummary::from(&completed);
        let bookings = self.bookings.complete_for_trip(trip_id).await?;
        for booking in &bookings {
            self.dispatch(
                booking.passenger_id,
                NotificationEvent::TripCompleted {
                    trip: summary.clone(),
                },
            )
            .await;
        }

        let expired = self.negotiations.expire_for_trip(trip_id).await?;
        for negotiation in &expired {
            self.dispatch(
                negotiation.passenger_id,
                NotificationEvent::NegotiationExpired {
                    negotiation_id: negotiation.id,
                    trip: summary.clone(),
                },
            )
            .await;
        }

        tracing::info!(
            "Trip completed: {} ({} bookings settled)",
            trip_id,
            bookings.len()
        );
        Ok(completed)
    }

    // ---- bookings ----

    /// Passenger requests seats at the listed price. Seats are not held
    /// until the driver confirms.
    pub async fn create_booking(
        &self,
        passenger_id: Uuid,
        trip_id: Uuid,
        seats: u8,
        passenger_note: Option<String>,
    ) -> Result<Booking, EngineError> {
        let booking = self
            .bookings
            .create(passenger_id, trip_id, seats, passenger_note)
            .await?;

        if let Some(trip) = self.trip_summary(booking.trip_id).await {
            self.dispatch(
                booking.driver_id,
                NotificationEvent::BookingRequested {
                    booking_id: booking.id,
                    trip,
                    seats: booking.seats,
                    total_price: booking.total_price,
                    passenger_note: booking.passenger_note.clone(),
                },
            )
            .await;
        }
        Ok(booking)
    }

    /// Driver accepts a pending request; this is the moment seats are taken.
    pub async fn confirm_booking(
        &self,
        driver_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Booking, EngineError> {
        let booking = self.bookings.confirm(driver_id, booking_id).await?;

        if let Some(trip) = self.trip_summary(booking.trip_id).await {
            self.dispatch(
                booking.passenger_id,
                NotificationEvent::BookingConfirmed {
                    booking_id: booking.id,
                    trip,
                    seats: booking.seats,
                    total_price: booking.total_price,
                },
            )
            .await;
        }
        Ok(booking)
    }

    /// Driver declines a pending request. Free of charge on both sides.
    pub async fn reject_booking(
        &self,
        driver_id: Uuid,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, EngineError> {
        let booking = self
            .bookings
            .reject(driver_id, booking_id, reason.clone())
            .await?;

        if let Some(trip) = self.trip_summary(booking.trip_id).await {
            self.dispatch(
                booking.passenger_id,
                NotificationEvent::BookingRejected {
                    booking_id: booking.id,
                    trip,
                    reason,
                },
            )
            .await;
        }
        Ok(booking)
    }

    /// Either party abandons a live booking from wherever they are standing.
    /// The geofence around the departure point decides whether that is
    /// allowed and what it costs; the fee is always borne by the passenger.
    pub async fn cancel_booking(
        &self,
        caller_id: Uuid,
        booking_id: Uuid,
        position: GeoPoint,
        reason: Option<String>,
    ) -> Result<Booking, EngineError> {
        // 1. Establish who is asking and what they hold.
        let booking = self.bookings.get(booking_id).await?;
        let role = booking.role_of(caller_id).ok_or_else(|| {
            EngineError::Unauthorized("caller is not a party to this booking".to_string())
        })?;

        // 2. Rule on the attempt from the submitted coordinates.
        let trip = self.trips.get(booking.trip_id).await?;
        let ruling = self
            .arbitrator
            .decide(role, position, trip.departure.point, &booking.status);
        let fee = match ruling {
            CancellationRuling::Permitted { fee } => fee,
            CancellationRuling::Refused { reason: refusal } => {
                return Err(EngineError::Conflict(refusal.to_string()))
            }
        };

        // 3. Execute the outcome and tell the other side.
        let record = CancellationRecord {
            cancelled_by: caller_id,
            cancelled_by_role: role,
            reason: reason.clone(),
            fee,
            position: Some(position),
            cancelled_at: Utc::now(),
        };
        let cancelled = self.bookings.cancel(booking_id, record).await?;

        let counterparty = match role {
            PartyRole::Passenger => cancelled.driver_id,
            PartyRole::Driver => cancelled.passenger_id,
        };
        if let Some(trip) = self.trip_summary(cancelled.trip_id).await {
            self.dispatch(
                counterparty,
                NotificationEvent::BookingCancelled {
                    booking_id: cancelled.id,
                    trip,
                    cancelled_by: role,
                    fee,
                    reason,
                },
            )
            .await;
        }
        Ok(cancelled)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, EngineError> {
        Ok(self.bookings.get(booking_id).await?)
    }

    pub async fn bookings_for_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, EngineError> {
        Ok(self.bookings.for_trip(trip_id).await?)
    }

    // ---- negotiations ----

    /// Passenger opens a price negotiation on a negotiable trip.
    pub async fn open_negotiation(
        &self,
        passenger_id: Uuid,
        trip_id: Uuid,
        proposed_price: f64,
        message: String,
    ) -> Result<Negotiation, EngineError> {
        let negotiation = self
            .negotiations
            .open(passenger_id, trip_id, proposed_price, message)
            .await?;

        let trip = self.trip_summary(negotiation.trip_id).await;
        if let (Some(trip), Some(opening)) = (trip, negotiation.messages.first()) {
            self.dispatch(
                negotiation.driver_id,
                NotificationEvent::OfferReceived {
                    negotiation_id: negotiation.id,
                    trip,
                    price_offer: negotiation.current_offer,
                    message: opening.body.clone(),
                },
            )
            .await;
        }
        Ok(negotiation)
    }

    /// Either party puts a new price on the table.
    pub async fn counter_offer(
        &self,
        caller_id: Uuid,
        negotiation_id: Uuid,
        price: f64,
        message: String,
    ) -> Result<Negotiation, EngineError> {
        let negotiation = self
            .negotiations
            .counter(caller_id, negotiation_id, price, message)
            .await?;

        if let Some(role) = negotiation.role_of(caller_id) {
            let trip = self.trip_summary(negotiation.trip_id).await;
            if let (Some(trip), Some(latest)) = (trip, negotiation.messages.last()) {
                self.dispatch(
                    negotiation.counterparty(role),
                    NotificationEvent::OfferReceived {
                        negotiation_id: negotiation.id,
                        trip,
                        price_offer: negotiation.current_offer,
                        message: latest.body.clone(),
                    },
                )
                .await;
            }
        }
        Ok(negotiation)
    }

    /// Accept the counterparty's offer. On success the agreed price is
    /// locked into a confirmed single-seat booking.
    pub async fn accept_negotiation(
        &self,
        caller_id: Uuid,
        negotiation_id: Uuid,
    ) -> Result<(Negotiation, Booking), EngineError> {
        let (negotiation, booking) = self.negotiations.accept(caller_id, negotiation_id).await?;

        if let Some(role) = negotiation.role_of(caller_id) {
            if let Some(trip) = self.trip_summary(negotiation.trip_id).await {
                self.dispatch(
                    negotiation.counterparty(role),
                    NotificationEvent::NegotiationAccepted {
                        negotiation_id: negotiation.id,
                        booking_id: booking.id,
                        trip,
                        agreed_price: booking.total_price,
                    },
                )
                .await;
            }
        }
        Ok((negotiation, booking))
    }

    /// Either party walks away from the table.
    pub async fn reject_negotiation(
        &self,
        caller_id: Uuid,
        negotiation_id: Uuid,
    ) -> Result<Negotiation, EngineError> {
        let negotiation = self.negotiations.reject(caller_id, negotiation_id).await?;

        if let Some(role) = negotiation.role_of(caller_id) {
            if let Some(trip) = self.trip_summary(negotiation.trip_id).await {
                self.dispatch(
                    negotiation.counterparty(role),
                    NotificationEvent::NegotiationRejected {
                        negotiation_id: negotiation.id,
                        trip,
                    },
                )
                .await;
            }
        }
        Ok(negotiation)
    }

    pub async fn get_negotiation(&self, negotiation_id: Uuid) -> Result<Negotiation, EngineError> {
        Ok(self.negotiations.get(negotiation_id).await?)
    }

    // ---- commission ----

    pub async fn commission_rate(&self) -> CommissionRate {
        self.commission.current().await
    }

    /// Administrative update of the global commission rate. Applies to
    /// prices locked from now on; existing bookings keep their split.
    pub async fn update_commission_rate(&self, rate: f64) -> Result<CommissionRate, EngineError> {
        let updated = self.commission.set_rate(rate).await?;
        tracing::info!(
            "Commission rate updated to {} (revision {})",
            updated.rate,
            updated.version
        );
        Ok(updated)
    }

    // ---- plumbing ----

    /// Trip context for a notification. A trip that cannot be read is
    /// logged and the notification skipped; the state change it reports
    /// has already committed.
    async fn trip_summary(&self, trip_id: Uuid) -> Option<TripSummary> {
        match self.trips.get(trip_id).await {
            Ok(trip) => Some(TripSummary::from(&trip)),
            Err(err) => {
                tracing::warn!("Could not load trip {} for a notification: {}", trip_id, err);
                None
            }
        }
    }

    async fn dispatch(&self, recipient: Uuid, event: NotificationEvent) {
        let notification = Notification { recipient, event };
        if let Err(err) = self.notifier.deliver(&notification).await {
            tracing::warn!(
                recipient = %recipient,
                kind = notification.event.kind(),
                "Notification delivery failed: {}",
                err
            );
        }
    }
}
