//! MetricsRouter trait for Axum integration
//!
//! Extension trait that adds request timing and the scrape endpoint to any
//! Axum router.

use super::routes::RouteTimings;
use super::server::TimedRequestsLayer;
use crate::config::MetricsConfig;
#[cfg(feature = "prometheus")]
use crate::export::PrometheusScrape;
use crate::export::MetricsBackend;
use axum::Router;

/// Extension trait for adding metrics to an Axum Router.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get};
/// use meterwire::export::BackendSelector;
/// use meterwire::web::{MetricsRouter, RouteTimings, Timed};
///
/// let config = MetricsConfig::from_env()?;
/// let backend = BackendSelector::new().select(&config)?;
/// let routes = RouteTimings::new().route("/orders/{id}", [Timed::server_requests()])?;
///
/// let app = Router::new()
///     .route("/orders/{id}", get(order))
///     .with_observability(&backend, routes, &config);
///
/// // Now the router has:
/// // - timing on /orders/{id}
/// // - GET /prometheus when the Prometheus backend was selected
/// ```
pub trait MetricsRouter {
    /// Time requests to the routes the layer knows about.
    fn with_request_metrics(self, layer: TimedRequestsLayer) -> Self;

    /// Serve the scrape endpoint at `path`.
    #[cfg(feature = "prometheus")]
    fn with_prometheus_endpoint(self, scrape: PrometheusScrape, path: &str) -> Self;

    /// Request timing plus, for the Prometheus backend, the scrape endpoint
    /// at `prometheus.path`.
    fn with_observability(
        self,
        backend: &MetricsBackend,
        routes: RouteTimings,
        config: &MetricsConfig,
    ) -> Self;
}

impl<S> MetricsRouter for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_request_metrics(self, layer: TimedRequestsLayer) -> Self {
        self.layer(layer)
    }

    #[cfg(feature = "prometheus")]
    fn with_prometheus_endpoint(self, scrape: PrometheusScrape, path: &str) -> Self {
        self.route(
            path,
            axum::routing::get(move || {
                let scrape = scrape.clone();
                async move { scrape.response() }
            }),
        )
    }

    fn with_observability(
        self,
        backend: &MetricsBackend,
        routes: RouteTimings,
        config: &MetricsConfig,
    ) -> Self {
        #[cfg(feature = "prometheus")]
        let router = match backend.scrape() {
            Some(scrape) => self.with_prometheus_endpoint(scrape.clone(), &config.prometheus.path),
            None => self,
        };
        #[cfg(not(feature = "prometheus"))]
        let router = self;

        router.with_request_metrics(TimedRequestsLayer::from_config(
            backend.registry().clone(),
            routes,
            config,
        ))
    }
}
