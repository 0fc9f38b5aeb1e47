//! Tracing initialization
//!
//! Installs the process-wide tracing subscriber. `RUST_LOG` takes precedence
//! over the configured default filter.

use coldline_core::{LogFormat, TelemetryConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with a plain or JSON fmt layer
///
/// Does nothing when a global subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    if tracing::dispatcher::has_been_set() {
        tracing::debug!("Tracing subscriber already installed");
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", config.default_filter, e))?;

    let (text, json) = match config.format {
        LogFormat::Text => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!(format = ?config.format, "Tracing initialized");
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_default_filter_is_rejected() {
        // Only meaningful when RUST_LOG does not override the default
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            default_filter: "coldline=verbose".to_string(),
            format: LogFormat::Text,
        };
        assert!(init_telemetry(&config).is_err());
    }
}
