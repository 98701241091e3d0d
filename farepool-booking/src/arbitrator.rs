use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::BookingStatus;
use farepool_core::geo::{haversine_meters, GeoPoint};
use farepool_shared::PartyRole;

/// Tunables for the cancellation geofence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationConfig {
    /// Radius around the departure point inside which a party counts as
    /// "at the meeting point".
    pub proximity_radius_m: f64,
    /// Flat fee, in currency units, charged against the passenger on a
    /// penalized cancellation.
    pub cancellation_fee: f64,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            proximity_radius_m: 500.0,
            cancellation_fee: 200.0,
        }
    }
}

/// Outcome of the arbitration: either the cancellation may proceed with the
/// given fee, or it is refused outright.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CancellationRuling {
    Permitted { fee: f64 },
    Refused { reason: RefusalReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    /// A passenger within the radius is presumed to be at the meeting point
    /// and must settle with the driver in person.
    PassengerAtMeetingPoint,
    /// A driver outside the radius cannot claim a passenger no-show.
    DriverAwayFromMeetingPoint,
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefusalReason::PassengerAtMeetingPoint => {
                write!(f, "passenger is at the meeting point; resolve with the driver directly")
            }
            RefusalReason::DriverAwayFromMeetingPoint => {
                write!(f, "driver must be at the meeting point to cancel")
            }
        }
    }
}

/// Decides whether a cancellation is permitted and what fee applies, using
/// proximity to the departure point as a proxy for who actually showed up.
///
/// This is a trust heuristic, not fraud detection: coordinates are taken as
/// submitted and recorded on the booking for audit.
#[derive(Clone)]
pub struct CancellationArbitrator {
    config: ArbitrationConfig,
}

impl CancellationArbitrator {
    pub fn new(config: ArbitrationConfig) -> Self {
        Self { config }
    }

    /// Rule on a cancellation attempt. The fee, when nonzero, is always
    /// borne by the passenger regardless of who cancelled.
    pub fn decide(
        &self,
        canceller: PartyRole,
        position: GeoPoint,
        departure_point: GeoPoint,
        booking_status: &BookingStatus,
    ) -> CancellationRuling {
        let distance = haversine_meters(position, departure_point);

        match canceller {
            PartyRole::Passenger => {
                if distance <= self.config.proximity_radius_m {
                    return CancellationRuling::Refused {
                        reason: RefusalReason::PassengerAtMeetingPoint,
                    };
                }
                // Pending bookings never held seats, so walking away is free.
                let fee = if *booking_status == BookingStatus::Confirmed {
                    self.config.cancellation_fee
                } else {
                    0.0
                };
                CancellationRuling::Permitted { fee }
            }
            PartyRole::Driver => {
                if distance <= self.config.proximity_radius_m {
                    CancellationRuling::Permitted {
                        fee: self.config.cancellation_fee,
                    }
                } else {
                    CancellationRuling::Refused {
                        reason: RefusalReason::DriverAwayFromMeetingPoint,
                    }
                }
            }
        }
    }
}

impl Default for CancellationArbitrator {
    fn default() -> Self {
        Self::new(ArbitrationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Departure point and positions at controlled distances from it.
    // 0.001 degrees of latitude is about 111 m.
    const DEPARTURE: GeoPoint = GeoPoint { lat: 41.3275, lon: 19.8187 };

    fn at_meters(meters: f64) -> GeoPoint {
        GeoPoint::new(DEPARTURE.lat + meters / 111_320.0, DEPARTURE.lon)
    }

    #[test]
    fn test_far_passenger_pays_fee_on_confirmed() {
        let ruling = CancellationArbitrator::default().decide(
            PartyRole::Passenger,
            at_meters(600.0),
            DEPARTURE,
            &BookingStatus::Confirmed,
        );

        assert_eq!(ruling, CancellationRuling::Permitted { fee: 200.0 });
    }

    #[test]
    fn test_far_passenger_cancels_pending_for_free() {
        let ruling = CancellationArbitrator::default().decide(
            PartyRole::Passenger,
            at_meters(600.0),
            DEPARTURE,
            &BookingStatus::Pending,
        );

        assert_eq!(ruling, CancellationRuling::Permitted { fee: 0.0 });
    }

    #[test]
    fn test_near_passenger_is_refused() {
        let ruling = CancellationArbitrator::default().decide(
            PartyRole::Passenger,
            at_meters(100.0),
            DEPARTURE,
            &BookingStatus::Confirmed,
        );

        assert_eq!(
            ruling,
            CancellationRuling::Refused {
                reason: RefusalReason::PassengerAtMeetingPoint
            }
        );
    }

    #[test]
    fn test_near_driver_may_cancel_with_fee() {
        let ruling = CancellationArbitrator::default().decide(
            PartyRole::Driver,
            at_meters(100.0),
            DEPARTURE,
            &BookingStatus::Confirmed,
        );

        assert_eq!(ruling, CancellationRuling::Permitted { fee: 200.0 });
    }

    #[test]
    fn test_far_driver_is_refused() {
        let ruling = CancellationArbitrator::default().decide(
            PartyRole::Driver,
            at_meters(600.0),
            DEPARTURE,
            &BookingStatus::Confirmed,
        );

        assert_eq!(
            ruling,
            CancellationRuling::Refused {
                reason: RefusalReason::DriverAwayFromMeetingPoint
            }
        );
    }

    #[test]
    fn test_radius_boundary_counts_as_near() {
        // Exactly on the fence is "at the meeting point" for both roles.
        let arbitrator = CancellationArbitrator::new(ArbitrationConfig {
            proximity_radius_m: 500.0,
            cancellation_fee: 200.0,
        });
        let position = at_meters(499.9);

        let passenger = arbitrator.decide(
            PartyRole::Passenger,
            position,
            DEPARTURE,
            &BookingStatus::Confirmed,
        );
        assert!(matches!(passenger, CancellationRuling::Refused { .. }));

        let driver = arbitrator.decide(
            PartyRole::Driver,
            position,
            DEPARTURE,
            &BookingStatus::Confirmed,
        );
        assert!(matches!(driver, CancellationRuling::Permitted { .. }));
    }
}
