use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Marketplace policy knobs. Every field has a code-level default so the
/// engine can boot with no config files present; files and `FAREPOOL__`
/// environment variables override per deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct BusinessRules {
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
    #[serde(default = "default_cancellation_fee")]
    pub cancellation_fee: f64,
    #[serde(default = "default_proximity_radius_m")]
    pub proximity_radius_m: f64,
    #[serde(default = "default_max_seats_per_trip")]
    pub max_seats_per_trip: u8,
}

fn default_commission_rate() -> f64 {
    farepool_trip::commission::DEFAULT_COMMISSION_RATE
}

fn default_cancellation_fee() -> f64 {
    200.0
}

fn default_proximity_radius_m() -> f64 {
    500.0
}

fn default_max_seats_per_trip() -> u8 {
    farepool_trip::trip::MAX_TOTAL_SEATS
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            commission_rate: default_commission_rate(),
            cancellation_fee: default_cancellation_fee(),
            proximity_radius_m: default_proximity_radius_m(),
            max_seats_per_trip: default_max_seats_per_trip(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub business_rules: BusinessRules,
}

impl Config {
    /// Layered load: `config/default.toml`, then `config/{RUN_MODE}.toml`,
    /// then `config/local.toml`, then `FAREPOOL__` environment variables.
    /// Later sources win. All files are optional.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let settings = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("FAREPOOL").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
