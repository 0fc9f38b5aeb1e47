//! Coldline Infrastructure Library
//!
//! This crate provides shared infrastructure components used by Coldline
//! processes:
//! - Telemetry initialization

#[cfg(feature = "observability-basic")]
pub mod telemetry;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};
