pub mod events;
pub mod party;
