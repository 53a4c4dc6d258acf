//! # meterwire
//!
//! Request instrumentation and metrics export for Axum applications.
//!
//! A single [`MeterRegistry`] holds counters, gauges, timers and long task
//! timers. At startup a [`bootstrap::RegistryBootstrap`] applies registry
//! configuration (such as common tags) before any binder registers meters,
//! and an [`export::BackendSelector`] picks one export backend.
//!
//! ## Features
//!
//! - **Server timing**: `http_server_requests` per route template, status and exception
//! - **Long tasks**: in-flight request and job gauges
//! - **Client timing**: `http_client_requests` via a client interceptor
//! - **Prometheus**: text exposition scrape endpoint (`prometheus` feature)
//! - **Push backends**: Datadog, Graphite and Ganglia on a fixed step
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use meterwire::export::BackendSelector;
//! use meterwire::observability::{init, ObservabilityConfig};
//! use meterwire::web::{MetricsRouter, RouteTimings, Timed};
//! use meterwire::MetricsConfig;
//!
//! #[tokio::main]
//! async fn main() -> meterwire::Result<()> {
//!     init(ObservabilityConfig::from_env())?;
//!
//!     let config = MetricsConfig::from_env()?;
//!     let backend = BackendSelector::new().select(&config)?;
//!     let _publishing = backend.start();
//!
//!     let routes = RouteTimings::new()
//!         .route("/orders/{id}", [Timed::server_requests()])?;
//!
//!     let app = Router::new()
//!         .route("/orders/{id}", get(|| async { "order" }))
//!         .with_observability(&backend, routes, &config);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod binder;
pub mod bootstrap;
pub mod clock;
pub mod config;
mod error;
pub mod export;
pub mod observability;
mod parse;
pub mod registry;
pub mod task;
pub mod web;

// Re-exports
pub use config::{MetricsConfig, MetricsConfigBuilder};
pub use error::{BootstrapPhase, MetricsError, Result};
pub use parse::{parse_bool, parse_duration};
pub use registry::{MeterRegistry, Tags};
