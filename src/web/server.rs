//! Server request timing for axum and tower services.
//!
//! [`TimedRequestsLayer`] times requests to routes registered in a
//! [`RouteTimings`] table. For every timed request it records:
//!
//! - a timer per short descriptor, tagged `method`, `uri` (route template),
//!   `status` and `exception` plus the descriptor's extra tags
//! - an in-flight sample per long-task descriptor, tagged with the
//!   descriptor's extra tags only, stopped when the request completes
//!
//! Requests to routes without timings pass straight through and create no
//! meters.
//!
//! # Example
//!
//! ```ignore
//! use axum::{routing::get, Router};
//! use meterwire::web::{RouteTimings, Timed, TimedRequestsLayer};
//!
//! let routes = RouteTimings::new()
//!     .route("/api/c1/{id}", [Timed::server_requests().extra_tag("public", "true")])?;
//!
//! let app = Router::new()
//!     .route("/api/c1/{id}", get(handler))
//!     .layer(TimedRequestsLayer::new(registry.clone(), routes));
//! ```

use super::routes::RouteTimings;
use super::tags::{simple_type_name, DefaultWebTags, ExceptionNames, WebTagsProvider, NONE};
use super::timed::Timed;
use crate::clock::elapsed_since;
use crate::config::{MetricsConfig, DEFAULT_SERVER_REQUESTS_NAME};
use crate::registry::{LongTaskSample, MeterRegistry};
use axum::extract::{FromRequestParts, MatchedPath};
use futures_util::future::BoxFuture;
use http::request::Parts;
use http::{Method, Request, Response};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::error::Error;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct ServerRequestMetrics {
    registry: Arc<MeterRegistry>,
    routes: RouteTimings,
    server_requests_name: String,
    tags: Arc<dyn WebTagsProvider>,
    exception_names: ExceptionNames,
}

/// Layer that times server requests.
#[derive(Debug, Clone)]
pub struct TimedRequestsLayer {
    metrics: Arc<ServerRequestMetrics>,
}

impl TimedRequestsLayer {
    pub fn new(registry: Arc<MeterRegistry>, routes: RouteTimings) -> Self {
        Self {
            metrics: Arc::new(ServerRequestMetrics {
                registry,
                routes,
                server_requests_name: DEFAULT_SERVER_REQUESTS_NAME.to_string(),
                tags: Arc::new(DefaultWebTags),
                exception_names: ExceptionNames::new(),
            }),
        }
    }

    /// Layer using the configured server request timer name.
    pub fn from_config(
        registry: Arc<MeterRegistry>,
        routes: RouteTimings,
        config: &MetricsConfig,
    ) -> Self {
        Self::new(registry, routes).server_requests_name(config.server_requests_name.clone())
    }

    /// Name used by [`Timed::server_requests`] descriptors.
    pub fn server_requests_name(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.metrics).server_requests_name = name.into();
        self
    }

    /// Replace the default `method`/`uri`/`status`/`exception` tags.
    pub fn tags_provider(mut self, provider: impl WebTagsProvider + 'static) -> Self {
        Arc::make_mut(&mut self.metrics).tags = Arc::new(provider);
        self
    }

    /// Names for errors that reach the layer as trait objects, such as a
    /// `tower::BoxError` returned by the inner service.
    pub fn exception_names(mut self, names: ExceptionNames) -> Self {
        Arc::make_mut(&mut self.metrics).exception_names = names;
        self
    }

    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.metrics.registry
    }
}

impl<S> Layer<S> for TimedRequestsLayer {
    type Service = TimedRequests<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimedRequests {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

/// Service produced by [`TimedRequestsLayer`].
#[derive(Debug, Clone)]
pub struct TimedRequests<S> {
    inner: S,
    metrics: Arc<ServerRequestMetrics>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TimedRequests<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        let Some(context) = RequestTimingContext::begin(self.metrics.clone(), &req) else {
            return Box::pin(inner.call(req));
        };
        req.extensions_mut().insert(context.tagger.clone());

        Box::pin(async move {
            let result = inner.call(req).await;
            match &result {
                Ok(response) => {
                    let exception = context.tagger.take().unwrap_or_else(|| NONE.to_string());
                    context.complete(response.status().as_str(), &exception);
                }
                Err(e) => {
                    let exception = context.metrics.exception_names.name_of(e);
                    context.complete("500", &exception);
                }
            }
            result
        })
    }
}

/// Timing state of one in-flight request.
struct RequestTimingContext {
    metrics: Arc<ServerRequestMetrics>,
    method: Method,
    template: String,
    timings: Vec<Timed>,
    start_nanos: u64,
    long_tasks: Vec<LongTaskSample>,
    tagger: ExceptionTagger,
}

impl RequestTimingContext {
    /// Start timing if the request's route has timings.
    fn begin<B>(metrics: Arc<ServerRequestMetrics>, req: &Request<B>) -> Option<Self> {
        let method = req.method().clone();
        let (template, timings) = match req.extensions().get::<MatchedPath>() {
            Some(matched) => {
                let timings = metrics.routes.for_pattern(&method, matched.as_str())?;
                (matched.as_str().to_string(), timings.to_vec())
            }
            None => {
                let (template, timings) = metrics.routes.for_path(&method, req.uri().path())?;
                (template.to_string(), timings.to_vec())
            }
        };

        let start_nanos = metrics.registry.clock().monotonic_nanos();
        let long_tasks = timings
            .iter()
            .filter(|timed| timed.is_long_task())
            .filter_map(|timed| {
                let name = timed.resolve_name(Some(metrics.server_requests_name.as_str()))?;
                match metrics.registry.long_task_timer(name, timed.tags()) {
                    Ok(timer) => Some(timer.start()),
                    Err(e) => {
                        warn!(route = %template, error = %e, "Failed to start long task timer");
                        None
                    }
                }
            })
            .collect();

        let tagger = ExceptionTagger::active(metrics.clone());
        Some(Self {
            metrics,
            method,
            template,
            timings,
            start_nanos,
            long_tasks,
            tagger,
        })
    }

    /// Stop long tasks and record one observation per short timer.
    fn complete(self, status: &str, exception: &str) {
        let Self {
            metrics,
            method,
            template,
            timings,
            start_nanos,
            long_tasks,
            ..
        } = self;

        for sample in long_tasks {
            sample.stop();
        }

        let elapsed = elapsed_since(metrics.registry.clock().as_ref(), start_nanos);
        let base = metrics
            .tags
            .server_request_tags(&method, &template, status, exception);

        for timed in timings.iter().filter(|timed| !timed.is_long_task()) {
            let Some(name) = timed.resolve_name(Some(metrics.server_requests_name.as_str())) else {
                continue;
            };
            let tags = base.clone().and_tags(timed.tags());
            match metrics
                .registry
                .timer_with_quantiles(name, &tags, timed.quantile_list())
            {
                Ok(timer) => timer.record(elapsed),
                Err(e) => warn!(name, route = %template, error = %e, "Failed to record request timing"),
            }
        }

        debug!(
            method = %method,
            route = %template,
            status,
            exception,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request timed"
        );
    }
}

/// Lets a handler name the error it handled, for the `exception` tag.
///
/// Available as an axum extractor. Outside a timed request it does nothing.
///
/// ```ignore
/// async fn handler(tagger: ExceptionTagger) -> Response {
///     match do_work().await {
///         Ok(body) => body.into_response(),
///         Err(e) => {
///             tagger.tag_with_exception(&e);
///             StatusCode::INTERNAL_SERVER_ERROR.into_response()
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExceptionTagger {
    state: Option<Arc<TaggerState>>,
}

#[derive(Debug)]
struct TaggerState {
    exception: Mutex<Option<String>>,
    metrics: Arc<ServerRequestMetrics>,
}

impl ExceptionTagger {
    fn active(metrics: Arc<ServerRequestMetrics>) -> Self {
        Self {
            state: Some(Arc::new(TaggerState {
                exception: Mutex::new(None),
                metrics,
            })),
        }
    }

    /// Tag the request with the name of `error`.
    ///
    /// Concrete errors are named by their simple type name. A boxed
    /// `dyn Error` is named by its concrete type when the layer's
    /// [`ExceptionNames`] knows it.
    pub fn tag_with_exception<E: 'static>(&self, error: &E) {
        if let Some(state) = &self.state {
            let name = state.metrics.exception_names.name_of(error);
            *state.exception.lock() = Some(name);
        }
    }

    /// Tag the request with the name of a borrowed trait object, resolved
    /// through the layer's [`ExceptionNames`]. Unknown types are tagged
    /// `Error`.
    pub fn tag_with_error(&self, error: &(dyn Error + 'static)) {
        if let Some(state) = &self.state {
            let name = state
                .metrics
                .exception_names
                .resolve(error)
                .unwrap_or_else(|| simple_type_name::<dyn Error>().to_string());
            *state.exception.lock() = Some(name);
        }
    }

    /// Tag the request with an explicit exception name.
    pub fn tag_with_exception_name(&self, name: impl Into<String>) {
        if let Some(state) = &self.state {
            *state.exception.lock() = Some(name.into());
        }
    }

    /// True inside a timed request.
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    fn take(&self) -> Option<String> {
        self.state
            .as_ref()
            .and_then(|state| state.exception.lock().take())
    }
}

impl<S> FromRequestParts<S> for ExceptionTagger
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ExceptionTagger>()
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Tags;
    use axum::body::Body;
    use axum::extract::Path;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use http::StatusCode;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    struct Exception1;

    #[derive(Debug)]
    struct Exception2;

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn app(registry: Arc<MeterRegistry>, routes: RouteTimings) -> Router {
        Router::new()
            .route("/api/c1/{id}", get(|Path(id): Path<String>| async move { id }))
            .route("/api/c1/untimed/{id}", get(|| async { "untimed" }))
            .route("/api/c1/unnamed/{id}", get(|| async { "unnamed" }))
            .route(
                "/api/c1/error/{id}",
                get(|tagger: ExceptionTagger| async move {
                    tagger.tag_with_exception(&Exception1);
                    (StatusCode::INTERNAL_SERVER_ERROR, "handled").into_response()
                }),
            )
            .layer(TimedRequestsLayer::new(registry, routes))
    }

    fn routes() -> RouteTimings {
        RouteTimings::new()
            .route(
                "/api/c1/{id}",
                [Timed::server_requests().extra_tag("public", "true")],
            )
            .unwrap()
            .route("/api/c1/unnamed/{id}", [Timed::unnamed()])
            .unwrap()
            .route("/api/c1/error/{id}", [Timed::server_requests()])
            .unwrap()
    }

    #[tokio::test]
    async fn test_timed_route_records_templated_uri() {
        let registry = Arc::new(MeterRegistry::new());
        let response = app(registry.clone(), routes())
            .oneshot(get_request("/api/c1/10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let timer = registry
            .find("http_server_requests")
            .tags(&Tags::from([
                ("public", "true"),
                ("method", "GET"),
                ("status", "200"),
                ("uri", "/api/c1/{id}"),
                ("exception", "none"),
            ]))
            .timer()
            .unwrap();
        assert_eq!(timer.count(), 1);
    }

    #[tokio::test]
    async fn test_untimed_and_unnamed_routes_create_no_meters() {
        let registry = Arc::new(MeterRegistry::new());
        let app = app(registry.clone(), routes());

        let untimed = app.clone().oneshot(get_request("/api/c1/untimed/10")).await.unwrap();
        let unnamed = app.oneshot(get_request("/api/c1/unnamed/10")).await.unwrap();

        assert_eq!(untimed.status(), StatusCode::OK);
        assert_eq!(unnamed.status(), StatusCode::OK);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_identical_requests_share_one_timer() {
        let registry = Arc::new(MeterRegistry::new());
        let app = app(registry.clone(), routes());

        for id in ["1", "2", "3"] {
            app.clone()
                .oneshot(get_request(&format!("/api/c1/{id}")))
                .await
                .unwrap();
        }

        let timers = registry.find("http_server_requests").meters();
        assert_eq!(timers.len(), 1);
        assert_eq!(
            registry.find("http_server_requests").timer().unwrap().count(),
            3
        );
    }

    #[tokio::test]
    async fn test_handled_exception_is_tagged() {
        let registry = Arc::new(MeterRegistry::new());
        let response = app(registry.clone(), routes())
            .oneshot(get_request("/api/c1/error/10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let timer = registry
            .find("http_server_requests")
            .tag("exception", "Exception1")
            .tag("status", "500")
            .tag("uri", "/api/c1/error/{id}")
            .timer()
            .unwrap();
        assert_eq!(timer.count(), 1);
    }

    #[tokio::test]
    async fn test_unhandled_error_is_tagged_and_propagated() {
        let registry = Arc::new(MeterRegistry::new());
        let routes = RouteTimings::new()
            .route("/api/c1/unhandled/{id}", [Timed::server_requests()])
            .unwrap();

        let service = TimedRequestsLayer::new(registry.clone(), routes).layer(tower::service_fn(
            |_req: Request<Body>| async { Err::<Response<Body>, _>(Exception2) },
        ));

        let result = service.oneshot(get_request("/api/c1/unhandled/10")).await;
        assert!(matches!(result, Err(Exception2)));

        let timer = registry
            .find("http_server_requests")
            .tag("exception", "Exception2")
            .tag("status", "500")
            .tag("uri", "/api/c1/unhandled/{id}")
            .timer()
            .unwrap();
        assert_eq!(timer.count(), 1);
    }

    #[derive(Debug)]
    struct NotFound;

    impl std::fmt::Display for NotFound {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("not found")
        }
    }

    impl Error for NotFound {}

    type BoxError = Box<dyn Error + Send + Sync>;

    fn boxed_error_layer(registry: Arc<MeterRegistry>, names: ExceptionNames) -> TimedRequestsLayer {
        let routes = RouteTimings::new()
            .route("/api/c1/boxed/{id}", [Timed::server_requests()])
            .unwrap();
        TimedRequestsLayer::new(registry, routes).exception_names(names)
    }

    async fn fail_with_not_found(_req: Request<Body>) -> Result<Response<Body>, BoxError> {
        Err(Box::new(NotFound))
    }

    #[tokio::test]
    async fn test_unhandled_boxed_error_is_named_by_concrete_type() {
        let registry = Arc::new(MeterRegistry::new());
        let service = boxed_error_layer(
            registry.clone(),
            ExceptionNames::new().exception_type::<NotFound>(),
        )
        .layer(tower::service_fn(fail_with_not_found));

        let result = service.oneshot(get_request("/api/c1/boxed/1")).await;
        assert!(result.unwrap_err().is::<NotFound>());

        let timer = registry
            .find("http_server_requests")
            .tag("exception", "NotFound")
            .tag("status", "500")
            .timer()
            .unwrap();
        assert_eq!(timer.count(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_boxed_error_is_tagged_error() {
        let registry = Arc::new(MeterRegistry::new());
        let service = boxed_error_layer(registry.clone(), ExceptionNames::new())
            .layer(tower::service_fn(fail_with_not_found));

        service.oneshot(get_request("/api/c1/boxed/1")).await.unwrap_err();

        let timer = registry.find("http_server_requests").timer().unwrap();
        assert_eq!(timer.id().tag("exception"), Some("Error"));
    }

    #[tokio::test]
    async fn test_handled_trait_object_errors_are_tagged() {
        let registry = Arc::new(MeterRegistry::new());
        let routes = RouteTimings::new()
            .route("/api/c1/dyn/{id}", [Timed::named("dyn_requests")])
            .unwrap()
            .route("/api/c1/box/{id}", [Timed::named("box_requests")])
            .unwrap()
            .route("/api/c1/unknown/{id}", [Timed::named("unknown_requests")])
            .unwrap();

        let failing = || -> Result<(), BoxError> { Err(Box::new(NotFound)) };
        let app = Router::new()
            .route(
                "/api/c1/dyn/{id}",
                get(move |tagger: ExceptionTagger| async move {
                    if let Err(e) = failing() {
                        tagger.tag_with_error(&*e);
                    }
                    StatusCode::NOT_FOUND
                }),
            )
            .route(
                "/api/c1/box/{id}",
                get(move |tagger: ExceptionTagger| async move {
                    if let Err(e) = failing() {
                        tagger.tag_with_exception(&e);
                    }
                    StatusCode::NOT_FOUND
                }),
            )
            .route(
                "/api/c1/unknown/{id}",
                get(|tagger: ExceptionTagger| async move {
                    let e = std::io::Error::other("boom");
                    tagger.tag_with_error(&e);
                    StatusCode::INTERNAL_SERVER_ERROR
                }),
            )
            .layer(
                TimedRequestsLayer::new(registry.clone(), routes)
                    .exception_names(ExceptionNames::new().exception_type::<NotFound>()),
            );

        for uri in ["/api/c1/dyn/1", "/api/c1/box/1", "/api/c1/unknown/1"] {
            app.clone().oneshot(get_request(uri)).await.unwrap();
        }

        for name in ["dyn_requests", "box_requests"] {
            let timer = registry.find(name).timer().unwrap();
            assert_eq!(timer.id().tag("exception"), Some("NotFound"), "{name}");
            assert_eq!(timer.id().tag("status"), Some("404"), "{name}");
        }
        let unknown = registry.find("unknown_requests").timer().unwrap();
        assert_eq!(unknown.id().tag("exception"), Some("Error"));
    }

    #[tokio::test]
    async fn test_route_quantiles_are_visible_as_gauges() {
        let registry = Arc::new(MeterRegistry::new());
        let routes = RouteTimings::new()
            .route(
                "/api/c1/quantiles/{id}",
                [Timed::server_requests().quantiles(&[0.5, 0.95])],
            )
            .unwrap();
        let app = Router::new()
            .route("/api/c1/quantiles/{id}", get(|| async { "ok" }))
            .layer(TimedRequestsLayer::new(registry.clone(), routes));

        app.oneshot(get_request("/api/c1/quantiles/10")).await.unwrap();

        for q in ["0.5", "0.95"] {
            assert!(registry
                .find("http_server_requests.quantiles")
                .tag("quantile", q)
                .gauge()
                .is_some());
        }
    }

    #[tokio::test]
    async fn test_regex_route_template() {
        let registry = Arc::new(MeterRegistry::new());
        let routes = RouteTimings::new()
            .route(r"/api/c1/regex/{id:\.[a-z]+}", [Timed::server_requests()])
            .unwrap();
        let service = TimedRequestsLayer::new(registry.clone(), routes).layer(tower::service_fn(
            |_req: Request<Body>| async { Ok::<_, Infallible>(Response::new(Body::empty())) },
        ));

        service
            .clone()
            .oneshot(get_request("/api/c1/regex/.abc"))
            .await
            .unwrap();
        service.oneshot(get_request("/api/c1/regex/abc")).await.unwrap();

        let timer = registry
            .find("http_server_requests")
            .tag("uri", r"/api/c1/regex/{id:\.[a-z]+}")
            .timer()
            .unwrap();
        assert_eq!(timer.count(), 1);
    }

    #[tokio::test]
    async fn test_long_task_is_active_while_request_runs() {
        let registry = Arc::new(MeterRegistry::new());
        let release = Arc::new(Notify::new());

        let routes = RouteTimings::new()
            .route(
                "/api/c1/long/{id}",
                [
                    Timed::server_requests(),
                    Timed::named("my_long_request")
                        .extra_tag("region", "test")
                        .long_task(),
                ],
            )
            .unwrap();

        let wait = release.clone();
        let app = Router::new()
            .route(
                "/api/c1/long/{id}",
                get(move || {
                    let wait = wait.clone();
                    async move {
                        wait.notified().await;
                        "done"
                    }
                }),
            )
            .layer(TimedRequestsLayer::new(registry.clone(), routes));

        let request = tokio::spawn(app.oneshot(get_request("/api/c1/long/10")));

        let long_task = loop {
            if let Some(timer) = registry
                .find("my_long_request")
                .tag("region", "test")
                .long_task_timer()
            {
                break timer;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert_eq!(long_task.active_tasks(), 1);
        assert!(registry.find("http_server_requests").timer().is_none());

        release.notify_one();
        let response = request.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(long_task.active_tasks(), 0);
        let timer = registry
            .find("http_server_requests")
            .tag("status", "200")
            .tag("uri", "/api/c1/long/{id}")
            .timer()
            .unwrap();
        assert_eq!(timer.count(), 1);
    }

    #[tokio::test]
    async fn test_registration_failure_keeps_response() {
        let registry = Arc::new(MeterRegistry::new());
        registry
            .counter(
                "conflict",
                &Tags::from([
                    ("method", "GET"),
                    ("uri", "/api/c1/{id}"),
                    ("status", "200"),
                    ("exception", "none"),
                ]),
            )
            .unwrap();

        let routes = RouteTimings::new()
            .route("/api/c1/{id}", [Timed::named("conflict")])
            .unwrap();
        let response = app(registry.clone(), routes)
            .oneshot(get_request("/api/c1/10"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(registry.find("conflict").counter().unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_configured_name_and_tagger_outside_timed_request() {
        let registry = Arc::new(MeterRegistry::new());
        let config = MetricsConfig::builder()
            .server_requests_name("inbound_requests")
            .build();
        let routes = RouteTimings::new()
            .route("/api/c1/{id}", [Timed::server_requests()])
            .unwrap();

        let app = Router::new()
            .route("/api/c1/{id}", get(|| async { "ok" }))
            .route(
                "/plain",
                get(|tagger: ExceptionTagger| async move { tagger.is_active().to_string() }),
            )
            .layer(TimedRequestsLayer::from_config(registry.clone(), routes, &config));

        app.clone().oneshot(get_request("/api/c1/7")).await.unwrap();
        let plain = app.oneshot(get_request("/plain")).await.unwrap();
        let body = http_body_util::BodyExt::collect(plain.into_body())
            .await
            .unwrap()
            .to_bytes();

        assert_eq!(&body[..], b"false");
        assert_eq!(registry.find("inbound_requests").timer().unwrap().count(), 1);
        assert!(registry.find("http_server_requests").timer().is_none());
    }
}
