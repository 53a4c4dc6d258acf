//! Logging setup
//!
//! The crate logs through `tracing` macros and never installs a subscriber
//! by itself. Applications that have no subscriber of their own can call
//! [`init`] once at startup.
//!
//! # Usage
//!
//! ```ignore
//! use meterwire::observability::{self, LogFormat, ObservabilityConfig};
//!
//! // From environment variables
//! observability::init(ObservabilityConfig::from_env())?;
//!
//! // Or programmatically
//! let config = ObservabilityConfig::builder()
//!     .log_format(LogFormat::Json)
//!     .log_filter("info,meterwire=debug")
//!     .build();
//! observability::init(config)?;
//! ```

mod config;
mod providers;

pub use config::{LogFormat, ObservabilityConfig, ObservabilityConfigBuilder};

use crate::error::Result;
use tracing::info;

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns [`MetricsError::Observability`](crate::MetricsError::Observability)
/// if the filter directive does not parse or a global subscriber is already
/// installed.
pub fn init(config: ObservabilityConfig) -> Result<()> {
    providers::init_tracing(&config)?;

    info!(
        log_format = ?config.log_format,
        log_filter = %config.log_filter,
        "Observability initialized"
    );
    Ok(())
}
