//! # Augur Config
//!
//! Configuration management for the Augur backend.
//! Supports layered configuration from files and environment variables,
//! validation, and runtime refresh.

mod app_config;
mod backend;
mod loader;
mod validation;

pub use app_config::*;
pub use backend::*;
pub use loader::*;
pub use validation::*;
