//! Keygate Server Library
//!
//! Gatekeeping for key-protected HTTP APIs: caller resolution, daily quotas,
//! usage telemetry and request body normalization. Shared by the server
//! binary and the integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::AppSettings;
pub use error::{AppError, GateRejection};
pub use gate::{ApiViewConfig, GateRequest, Gatekeeper};
pub use models::runtime_config::AppState;
