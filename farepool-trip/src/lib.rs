pub mod commission;
pub mod inventory;
pub mod repository;
pub mod trip;

pub use commission::{CommissionPolicy, CommissionRate, CommissionSplit};
pub use inventory::{TripError, TripInventory};
pub use repository::TripRepository;
pub use trip::{Location, NewTrip, PriceType, Trip, TripStatus};
