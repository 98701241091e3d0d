use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use farepool_core::geo::{haversine_meters, GeoPoint};
use farepool_shared::TripSummary;

/// Hard ceiling on seats per trip; private cars do not get bigger than this.
pub const MAX_TOTAL_SEATS: u8 = 8;

/// Trip status in the lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

/// Whether the listed price is final or open to negotiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    Fixed,
    Negotiable,
}

/// A named point on the route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub point: GeoPoint,
    pub city: String,
    pub address: Option<String>,
}

/// A published ride with a fixed seat inventory.
///
/// `available_seats` is the single correctness-critical counter in the
/// system; it only ever changes through the atomic repository operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub departure: Location,
    pub destination: Location,
    pub departs_at: DateTime<Utc>,
    pub price: f64,
    pub price_type: PriceType,
    pub total_seats: u8,
    pub available_seats: u8,
    pub passengers: HashSet<Uuid>,
    pub status: TripStatus,
    pub distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Driver-supplied fields for publishing a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrip {
    pub driver_id: Uuid,
    pub departure: Location,
    pub destination: Location,
    pub departs_at: DateTime<Utc>,
    pub price: f64,
    pub price_type: PriceType,
    pub seats: u8,
    pub distance_km: Option<f64>,
}

impl Trip {
    pub fn new(spec: NewTrip) -> Self {
        let now = Utc::now();
        let distance_km = spec
            .distance_km
            .or_else(|| Some(haversine_meters(spec.departure.point, spec.destination.point) / 1000.0));
        Self {
            id: Uuid::new_v4(),
            driver_id: spec.driver_id,
            departure: spec.departure,
            destination: spec.destination,
            departs_at: spec.departs_at,
            price: spec.price,
            price_type: spec.price_type,
            total_seats: spec.seats,
            available_seats: spec.seats,
            passengers: HashSet::new(),
            status: TripStatus::Active,
            distance_km,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        self.departs_at <= now
    }

    /// Seats currently held by confirmed occupants.
    pub fn seats_taken(&self) -> u8 {
        self.total_seats - self.available_seats
    }
}

impl From<&Trip> for TripSummary {
    fn from(trip: &Trip) -> Self {
        TripSummary {
            trip_id: trip.id,
            departure_city: trip.departure.city.clone(),
            destination_city: trip.destination.city.clone(),
            departs_at: trip.departs_at,
        }
    }
}
