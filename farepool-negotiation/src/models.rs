use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use farepool_shared::{Masked, PartyRole};
use farepool_trip::trip::Trip;

/// Negotiation status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

/// One entry in the negotiation's ordered message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationMessage {
    pub sender_id: Uuid,
    pub sender_role: PartyRole,
    pub body: Masked<String>,
    pub price_offer: Option<f64>,
    pub sent_at: DateTime<Utc>,
}

impl NegotiationMessage {
    pub fn new(
        sender_id: Uuid,
        sender_role: PartyRole,
        body: String,
        price_offer: Option<f64>,
    ) -> Self {
        Self {
            sender_id,
            sender_role,
            body: Masked::new(body),
            price_offer,
            sent_at: Utc::now(),
        }
    }
}

/// A turn-based price haggle between one passenger and the trip's driver.
///
/// `current_offer` always mirrors the latest priced message, and
/// `last_offer_by` records whose proposal is on the table. Acceptance
/// authority belongs to the other side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Uuid,
    /// The trip's listed price when the negotiation started.
    pub original_price: f64,
    pub current_offer: f64,
    pub last_offer_by: PartyRole,
    pub status: NegotiationStatus,
    pub messages: Vec<NegotiationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Negotiation {
    /// Open a negotiation with the passenger's first offer; the message log
    /// starts with that offer as its first entry.
    pub fn new(trip: &Trip, passenger_id: Uuid, proposed_price: f64, body: String) -> Self {
        let now = Utc::now();
        let opening = NegotiationMessage::new(
            passenger_id,
            PartyRole::Passenger,
            body,
            Some(proposed_price),
        );
        Self {
            id: Uuid::new_v4(),
            trip_id: trip.id,
            passenger_id,
            driver_id: trip.driver_id,
            original_price: trip.price,
            current_offer: proposed_price,
            last_offer_by: PartyRole::Passenger,
            status: NegotiationStatus::Pending,
            messages: vec![opening],
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message, taking over `current_offer` and `last_offer_by`
    /// when the message carries a price.
    pub fn apply_message(&mut self, message: NegotiationMessage) {
        if let Some(price) = message.price_offer {
            self.current_offer = price;
            self.last_offer_by = message.sender_role;
        }
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn apply_status(&mut self, new_status: NegotiationStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    pub fn is_open(&self) -> bool {
        self.status == NegotiationStatus::Pending
    }

    /// Which side of this negotiation the given participant is, if any.
    pub fn role_of(&self, party_id: Uuid) -> Option<PartyRole> {
        if party_id == self.passenger_id {
            Some(PartyRole::Passenger)
        } else if party_id == self.driver_id {
            Some(PartyRole::Driver)
        } else {
            None
        }
    }

    /// The participant on the other side of `role`.
    pub fn counterparty(&self, role: PartyRole) -> Uuid {
        match role {
            PartyRole::Passenger => self.driver_id,
            PartyRole::Driver => self.passenger_id,
        }
    }
}
