//! Configuration module
//!
//! This module provides the configuration consumed by the sync engine and its
//! process entry point: store backend selection, the request timeout bound,
//! subscription buffering, PIN generation limits and logging.

use std::env;
use std::time::Duration;

use crate::storage_types::StoreBackend;

// Common constants
const STORE_TIMEOUT_MS: u64 = 10_000;
const SUBSCRIPTION_BUFFER: usize = 256;
const PIN_MAX_ATTEMPTS: u32 = 50;
const LOG_FILTER: &str = "coldline=info";

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration handed to the telemetry initialiser
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
    pub format: LogFormat,
}

/// Sync engine configuration
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub environment: String,
    pub store_backend: StoreBackend,
    /// Upper bound on fetch/update/create round trips; exceeded calls are
    /// reported as `StoreUnavailable`.
    pub store_timeout: Duration,
    /// Queued deltas per subscription before the store warns about a slow
    /// reader. Deltas are never dropped.
    pub subscription_buffer: usize,
    pub pin_max_attempts: u32,
    pub telemetry: TelemetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            store_backend: StoreBackend::Memory,
            store_timeout: Duration::from_millis(STORE_TIMEOUT_MS),
            subscription_buffer: SUBSCRIPTION_BUFFER,
            pin_max_attempts: PIN_MAX_ATTEMPTS,
            telemetry: TelemetryConfig {
                default_filter: LOG_FILTER.to_string(),
                format: LogFormat::Text,
            },
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse::<StoreBackend>()?,
            Err(_) => StoreBackend::Memory,
        };

        let store_timeout_ms = env::var("STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| STORE_TIMEOUT_MS.to_string())
            .parse::<u64>()
            .unwrap_or(STORE_TIMEOUT_MS);
        if store_timeout_ms == 0 {
            return Err(anyhow::anyhow!(
                "STORE_TIMEOUT_MS must be greater than zero"
            ));
        }

        let format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(SyncConfig {
            environment,
            store_backend,
            store_timeout: Duration::from_millis(store_timeout_ms),
            subscription_buffer: env::var("SUBSCRIPTION_BUFFER")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(SUBSCRIPTION_BUFFER),
            pin_max_attempts: env::var("PIN_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(PIN_MAX_ATTEMPTS),
            telemetry: TelemetryConfig {
                default_filter: env::var("LOG_FILTER").unwrap_or_else(|_| LOG_FILTER.to_string()),
                format,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}
