use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default platform cut of the client-facing price.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.16;

/// The globally-configured rate, versioned so an audit trail can tell which
/// revision priced a given booking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CommissionRate {
    pub rate: f64,
    pub version: u32,
}

/// Result of splitting a client price between the platform and the driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub app_commission: f64,
    pub driver_amount: f64,
}

impl CommissionSplit {
    pub fn total(&self) -> f64 {
        self.app_commission + self.driver_amount
    }
}

/// Split `client_price` at `rate`. Pure arithmetic; callers supply a price
/// that has already been validated non-negative.
pub fn split(client_price: f64, rate: f64) -> CommissionSplit {
    let app_commission = client_price * rate;
    CommissionSplit {
        app_commission,
        driver_amount: client_price - app_commission,
    }
}

/// Accessor for the mutable global rate.
///
/// The rate is read at the moment a price is locked into a booking and the
/// resulting split is stored on the booking itself. Updating the rate is a
/// privileged administrative action and affects future computations only;
/// already-priced bookings keep their stored split.
#[derive(Clone)]
pub struct CommissionPolicy {
    current: Arc<RwLock<CommissionRate>>,
}

impl CommissionPolicy {
    pub fn new(initial_rate: f64) -> Result<Self, CommissionError> {
        validate_rate(initial_rate)?;
        Ok(Self {
            current: Arc::new(RwLock::new(CommissionRate {
                rate: initial_rate,
                version: 1,
            })),
        })
    }

    /// The rate revision in force right now.
    pub async fn current(&self) -> CommissionRate {
        *self.current.read().await
    }

    /// Split a client price at the current rate.
    pub async fn split(&self, client_price: f64) -> CommissionSplit {
        let rate = self.current().await;
        split(client_price, rate.rate)
    }

    /// Replace the global rate. Not retroactive.
    pub async fn set_rate(&self, rate: f64) -> Result<CommissionRate, CommissionError> {
        validate_rate(rate)?;
        let mut current = self.current.write().await;
        current.rate = rate;
        current.version += 1;
        Ok(*current)
    }
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self {
            current: Arc::new(RwLock::new(CommissionRate {
                rate: DEFAULT_COMMISSION_RATE,
                version: 1,
            })),
        }
    }
}

fn validate_rate(rate: f64) -> Result<(), CommissionError> {
    if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
        return Err(CommissionError::InvalidRate(rate));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CommissionError {
    #[error("Commission rate must be in [0, 1): {0}")]
    InvalidRate(f64),
}
