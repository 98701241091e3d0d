use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::party::PartyRole;
use crate::pii::Masked;

/// Compact trip context attached to every outbound notification so the
/// delivery layer can render a message without a second lookup.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct TripSummary {
    pub trip_id: Uuid,
    pub departure_city: String,
    pub destination_city: String,
    pub departs_at: DateTime<Utc>,
}

/// One outbound message addressed to a single participant.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct Notification {
    pub recipient: Uuid,
    pub event: NotificationEvent,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    BookingRequested {
        booking_id: Uuid,
        trip: TripSummary,
        seats: u8,
        total_price: f64,
        passenger_note: Option<Masked<String>>,
    },
    BookingConfirmed {
        booking_id: Uuid,
        trip: TripSummary,
        seats: u8,
        total_price: f64,
    },
    BookingRejected {
        booking_id: Uuid,
        trip: TripSummary,
        reason: Option<String>,
    },
    BookingCancelled {
        booking_id: Uuid,
        trip: TripSummary,
        cancelled_by: PartyRole,
        fee: f64,
        reason: Option<String>,
    },
    OfferReceived {
        negotiation_id: Uuid,
        trip: TripSummary,
        price_offer: f64,
        message: Masked<String>,
    },
    NegotiationAccepted {
        negotiation_id: Uuid,
        booking_id: Uuid,
        trip: TripSummary,
        agreed_price: f64,
    },
    NegotiationRejected {
        negotiation_id: Uuid,
        trip: TripSummary,
    },
    NegotiationExpired {
        negotiation_id: Uuid,
        trip: TripSummary,
    },
    TripCancelled {
        trip: TripSummary,
        reason: Option<String>,
    },
    TripCompleted {
        trip: TripSummary,
    },
}

impl NotificationEvent {
    /// Stable label for log lines and delivery-side routing.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::BookingRequested { .. } => "BOOKING_REQUESTED",
            NotificationEvent::BookingConfirmed { .. } => "BOOKING_CONFIRMED",
            NotificationEvent::BookingRejected { .. } => "BOOKING_REJECTED",
            NotificationEvent::BookingCancelled { .. } => "BOOKING_CANCELLED",
            NotificationEvent::OfferReceived { .. } => "OFFER_RECEIVED",
            NotificationEvent::NegotiationAccepted { .. } => "NEGOTIATION_ACCEPTED",
            NotificationEvent::NegotiationRejected { .. } => "NEGOTIATION_REJECTED",
            NotificationEvent::NegotiationExpired { .. } => "NEGOTIATION_EXPIRED",
            NotificationEvent::TripCancelled { .. } => "TRIP_CANCELLED",
            NotificationEvent::TripCompleted { .. } => "TRIP_COMPLETED",
        }
    }
}
