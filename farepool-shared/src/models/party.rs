use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a trip a participant is on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyRole {
    Passenger,
    Driver,
}

impl PartyRole {
    /// The other side of the same trip.
    pub fn counterpart(&self) -> PartyRole {
        match self {
            PartyRole::Passenger => PartyRole::Driver,
            PartyRole::Driver => PartyRole::Passenger,
        }
    }
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyRole::Passenger => write!(f, "PASSENGER"),
            PartyRole::Driver => write!(f, "DRIVER"),
        }
    }
}
