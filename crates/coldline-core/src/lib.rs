//! Coldline Core Library
//!
//! This crate provides the domain models, error types and configuration that
//! are shared across all Coldline components.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{LogFormat, SyncConfig, TelemetryConfig};
pub use error::{ErrorMetadata, LogLevel, SyncError};
pub use storage_types::StoreBackend;
