pub mod engine;
pub mod error;
pub mod telemetry;

pub use engine::Engine;
pub use error::EngineError;
