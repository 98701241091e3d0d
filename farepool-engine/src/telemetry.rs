use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber. `RUST_LOG` overrides the
/// default filter. Embedding applications that bring their own subscriber
/// simply skip this.
pub fn init_tracing() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "farepool_engine=debug,farepool_store=debug,farepool_trip=debug,farepool_booking=debug,farepool_negotiation=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
