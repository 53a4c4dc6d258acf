//! Tracing subscriber setup.

use super::{LogFormat, ObservabilityConfig};
use crate::error::{MetricsError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, else the configured directive.
pub(super) fn filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| MetricsError::Observability(format!("Invalid log filter: {e}")))
}

/// Install the global subscriber.
pub(super) fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter(config)?);
    let location = config.with_location;

    let installed = match config.log_format {
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };

    installed.map_err(|e| MetricsError::Observability(format!("Failed to init tracing: {e}")))
}
