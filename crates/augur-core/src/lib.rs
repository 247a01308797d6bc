//! # Augur Core
//!
//! Foundational types shared by every crate of the Augur backend:
//! the unified error type, result aliases, and tracing setup.

pub mod error;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use result::*;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
