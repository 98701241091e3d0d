use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Negotiation, NegotiationMessage, NegotiationStatus};
use farepool_core::StoreError;

/// Durable-store seam for negotiations.
///
/// Every mutation is conditional on the negotiation still being `Pending`;
/// a terminal negotiation is immutable. Each method is a single atomic
/// update on the negotiation document.
#[async_trait]
pub trait NegotiationRepository: Send + Sync {
    /// Persist a new negotiation. Fails with `DuplicateNegotiation` when the
    /// passenger already has a pending negotiation on the trip.
    async fn insert_negotiation(&self, negotiation: &Negotiation) -> Result<(), StoreError>;

    async fn get_negotiation(&self, negotiation_id: Uuid)
        -> Result<Option<Negotiation>, StoreError>;

    /// Append a message to a pending negotiation, updating the offer fields
    /// via [`Negotiation::apply_message`]. Fails with `StatusConflict` once
    /// the negotiation is terminal.
    async fn append_message(
        &self,
        negotiation_id: Uuid,
        message: NegotiationMessage,
    ) -> Result<Negotiation, StoreError>;

    /// Compare-and-set on the negotiation status.
    async fn transition_negotiation(
        &self,
        negotiation_id: Uuid,
        from: NegotiationStatus,
        to: NegotiationStatus,
    ) -> Result<Negotiation, StoreError>;

    /// Atomically append the closing message and move `Pending → Rejected`.
    async fn reject_negotiation(
        &self,
        negotiation_id: Uuid,
        closing: NegotiationMessage,
    ) -> Result<Negotiation, StoreError>;

    /// Expire every pending negotiation on a trip, returning the ones that
    /// were transitioned. Used when a trip is cancelled or completed.
    async fn expire_for_trip(&self, trip_id: Uuid) -> Result<Vec<Negotiation>, StoreError>;
}
