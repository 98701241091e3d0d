use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use farepool_core::geo::GeoPoint;
use farepool_shared::{Masked, PartyRole};
use farepool_trip::commission::CommissionSplit;
use farepool_trip::trip::Trip;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

/// Why and where a booking was cancelled. The canceller's coordinates are
/// kept for audit because the fee decision was made from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub cancelled_by: Uuid,
    pub cancelled_by_role: PartyRole,
    pub reason: Option<String>,
    pub fee: f64,
    pub position: Option<GeoPoint>,
    pub cancelled_at: DateTime<Utc>,
}

/// One passenger's claim on `seats` seats of a trip.
///
/// The price split is computed once, when the price is locked in, and never
/// recomputed; a later commission-rate change must not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    /// Denormalized from the trip for fast authorization checks.
    pub driver_id: Uuid,
    pub seats: u8,
    pub total_price: f64,
    pub app_commission: f64,
    pub driver_amount: f64,
    pub status: BookingStatus,
    /// Set when this booking was produced by accepting a negotiation.
    pub negotiation_id: Option<Uuid>,
    pub passenger_note: Option<Masked<String>>,
    pub cancellation: Option<CancellationRecord>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A direct booking request. Seats are not reserved yet; they stay open
    /// to other passengers until the driver confirms.
    pub fn pending(
        trip_id: Uuid,
        passenger_id: Uuid,
        driver_id: Uuid,
        seats: u8,
        total_price: f64,
        split: CommissionSplit,
        passenger_note: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id,
            passenger_id,
            driver_id,
            seats,
            total_price,
            app_commission: split.app_commission,
            driver_amount: split.driver_amount,
            status: BookingStatus::Pending,
            negotiation_id: None,
            passenger_note: passenger_note.map(Masked::new),
            cancellation: None,
            created_at: now,
            confirmed_at: None,
            updated_at: now,
        }
    }

    /// A booking born from an accepted negotiation: single seat, already
    /// confirmed at the agreed price.
    pub fn negotiated(
        trip_id: Uuid,
        passenger_id: Uuid,
        driver_id: Uuid,
        agreed_price: f64,
        split: CommissionSplit,
        negotiation_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id,
            passenger_id,
            driver_id,
            seats: 1,
            total_price: agreed_price,
            app_commission: split.app_commission,
            driver_amount: split.driver_amount,
            status: BookingStatus::Confirmed,
            negotiation_id: Some(negotiation_id),
            passenger_note: None,
            cancellation: None,
            created_at: now,
            confirmed_at: Some(now),
            updated_at: now,
        }
    }

    /// Apply a status change, stamping the timestamps that go with it.
    pub fn apply_status(&mut self, new_status: BookingStatus) {
        let now = Utc::now();
        match new_status {
            BookingStatus::Confirmed => self.confirmed_at = Some(now),
            // A compensated confirm goes back to pending with the stamp cleared.
            BookingStatus::Pending => self.confirmed_at = None,
            _ => {}
        }
        self.status = new_status;
        self.updated_at = now;
    }

    /// Pending and confirmed bookings hold or may still claim seats.
    pub fn is_live(&self) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// A pending request on a trip that is no longer active will never be
    /// answered. Readers should present it as expired; the stored record
    /// itself is not rewritten.
    pub fn is_stale(&self, trip: &Trip) -> bool {
        self.status == BookingStatus::Pending && !trip.is_active()
    }

    /// Which side of this booking the given participant is, if any.
    pub fn role_of(&self, party_id: Uuid) -> Option<PartyRole> {
        if party_id == self.passenger_id {
            Some(PartyRole::Passenger)
        } else if party_id == self.driver_id {
            Some(PartyRole::Driver)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farepool_trip::commission;

    fn sample_booking() -> Booking {
        Booking::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            2,
            2000.0,
            commission::split(2000.0, 0.16),
            Some("Two large bags".to_string()),
        )
    }

    #[test]
    fn test_pending_booking_split() {
        let booking = sample_booking();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.confirmed_at.is_none());
        assert!((booking.app_commission + booking.driver_amount - booking.total_price).abs() < 1e-9);
    }

    #[test]
    fn test_status_stamps() {
        let mut booking = sample_booking();

        booking.apply_status(BookingStatus::Confirmed);
        assert!(booking.confirmed_at.is_some());

        booking.apply_status(BookingStatus::Pending);
        assert!(booking.confirmed_at.is_none());
        assert!(booking.is_live());

        booking.apply_status(BookingStatus::Cancelled);
        assert!(!booking.is_live());
    }

    #[test]
    fn test_role_resolution() {
        let booking = sample_booking();

        assert_eq!(booking.role_of(booking.passenger_id), Some(PartyRole::Passenger));
        assert_eq!(booking.role_of(booking.driver_id), Some(PartyRole::Driver));
        assert_eq!(booking.role_of(Uuid::new_v4()), None);
    }

    #[test]
    fn test_note_masked_in_debug() {
        let booking = sample_booking();
        let debugged = format!("{:?}", booking);

        assert!(!debugged.contains("Two large bags"));
        assert!(debugged.contains("********"));
    }

    #[test]
    fn test_pending_booking_goes_stale_with_its_trip() {
        use chrono::Duration;
        use farepool_core::geo::GeoPoint;
        use farepool_trip::trip::{Location, NewTrip, PriceType, TripStatus};

        let mut trip = Trip::new(NewTrip {
            driver_id: Uuid::new_v4(),
            departure: Location {
                point: GeoPoint::new(41.3275, 19.8187),
                city: "Tirana".to_string(),
                address: None,
            },
            destination: Location {
                point: GeoPoint::new(42.0693, 19.5126),
                city: "Shkoder".to_string(),
                address: None,
            },
            departs_at: Utc::now() + Duration::hours(2),
            price: 700.0,
            price_type: PriceType::Fixed,
            seats: 3,
            distance_km: None,
        });
        let mut booking = sample_booking();

        assert!(!booking.is_stale(&trip));

        trip.status = TripStatus::Completed;
        assert!(booking.is_stale(&trip));

        // Only a pending request can go stale; settled records keep their
        // own status.
        booking.apply_status(BookingStatus::Confirmed);
        assert!(!booking.is_stale(&trip));
    }
}
