//! Instrumented outbound HTTP client.
//!
//! A [`RestClient`] sends requests through a chain of [`ClientInterceptor`]s
//! and finally a [`Transport`]. Clients built by a [`ClientFactory`] get a
//! [`MetricsClientInterceptor`] at the front of the chain, which times every
//! exchange into `http_client_requests` (or the configured name) tagged with
//! `method`, `uri` (the unexpanded URI template) and `status`.
//!
//! # Example
//!
//! ```ignore
//! use meterwire::web::{ClientFactory, ReqwestTransport};
//!
//! let factory = ClientFactory::new(registry.clone(), &config);
//! let client = factory
//!     .builder(ReqwestTransport::new())
//!     .base_url("http://inventory:8080".parse()?)
//!     .build();
//!
//! // Recorded with uri="/items/{id}", not "/items/42"
//! let body = client.get_for_string("/items/{id}", &[&42]).await?;
//! ```

use super::tags::{DefaultWebTags, WebTagsProvider};
use crate::clock::elapsed_since;
use crate::config::MetricsConfig;
use crate::registry::MeterRegistry;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Errors from outbound requests.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("URI template {template} expects {expected} variables, got {actual}")]
    TemplateArity {
        template: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: StatusCode, url: String },
}

/// An outbound request.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub method: Method,
    pub url: Url,
    /// The template the URL was expanded from, if any
    pub uri_template: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ClientRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            uri_template: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.uri_template = Some(template.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A response to an outbound request.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ClientResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Sends a request over the wire.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, request: ClientRequest) -> Result<ClientResponse, ClientError>;
}

/// Wraps the execution of a request.
///
/// Implementations call [`Execution::execute`] to continue down the chain,
/// or return early without it.
#[async_trait]
pub trait ClientInterceptor: Send + Sync + fmt::Debug {
    async fn intercept(
        &self,
        request: ClientRequest,
        execution: Execution<'_>,
    ) -> Result<ClientResponse, ClientError>;
}

/// The rest of an interceptor chain.
pub struct Execution<'a> {
    interceptors: &'a [Arc<dyn ClientInterceptor>],
    transport: &'a dyn Transport,
}

impl Execution<'_> {
    /// Run the next interceptor, or the transport once none are left.
    pub async fn execute(self, request: ClientRequest) -> Result<ClientResponse, ClientError> {
        match self.interceptors.split_first() {
            Some((next, rest)) => {
                let execution = Execution {
                    interceptors: rest,
                    transport: self.transport,
                };
                next.intercept(request, execution).await
            }
            None => self.transport.send(request).await,
        }
    }
}

/// Times every exchange that passes through it.
#[derive(Debug)]
pub struct MetricsClientInterceptor {
    registry: Arc<MeterRegistry>,
    name: String,
    tags: Arc<dyn WebTagsProvider>,
}

impl MetricsClientInterceptor {
    pub fn new(registry: Arc<MeterRegistry>, name: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
            tags: Arc::new(DefaultWebTags),
        }
    }

    /// Replace the default `method`/`uri`/`status` tags.
    pub fn with_tags_provider(mut self, provider: impl WebTagsProvider + 'static) -> Self {
        self.tags = Arc::new(provider);
        self
    }
}

#[async_trait]
impl ClientInterceptor for MetricsClientInterceptor {
    async fn intercept(
        &self,
        request: ClientRequest,
        execution: Execution<'_>,
    ) -> Result<ClientResponse, ClientError> {
        let clock = self.registry.clock();
        let start = clock.monotonic_nanos();
        let method = request.method.clone();
        let template = request.uri_template.clone();

        let result = execution.execute(request).await;

        let elapsed = elapsed_since(clock.as_ref(), start);
        let status = result.as_ref().ok().map(|response| response.status);
        let tags = self
            .tags
            .client_request_tags(&method, template.as_deref(), status);
        match self.registry.timer(&self.name, &tags) {
            Ok(timer) => timer.record(elapsed),
            Err(e) => warn!(name = %self.name, error = %e, "Failed to record client request timing"),
        }
        result
    }
}

/// Template-aware HTTP client with an interceptor chain.
#[derive(Debug, Clone)]
pub struct RestClient {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
    base_url: Option<Url>,
}

impl RestClient {
    /// Builder for an uninstrumented client.
    pub fn builder(transport: impl Transport + 'static) -> RestClientBuilder {
        RestClientBuilder {
            transport: Arc::new(transport),
            interceptors: Vec::new(),
            base_url: None,
            metrics: None,
        }
    }

    /// Interceptors in the order they run.
    pub fn interceptors(&self) -> &[Arc<dyn ClientInterceptor>] {
        &self.interceptors
    }

    /// Build a request for `template` expanded with `vars`, resolved
    /// against the base URL if one is set.
    pub fn request(
        &self,
        method: Method,
        template: &str,
        vars: &[&(dyn fmt::Display + Sync)],
    ) -> Result<ClientRequest, ClientError> {
        let expanded = expand_template(template, vars)?;
        let url = match &self.base_url {
            Some(base) => base.join(&expanded),
            None => Url::parse(&expanded),
        }
        .map_err(|source| ClientError::InvalidUrl {
            url: expanded.clone(),
            source,
        })?;
        Ok(ClientRequest::new(method, url).with_template(template))
    }

    /// Send a request through the interceptor chain.
    pub async fn exchange(&self, request: ClientRequest) -> Result<ClientResponse, ClientError> {
        debug!(method = %request.method, url = %request.url, "Sending request");
        Execution {
            interceptors: &self.interceptors,
            transport: self.transport.as_ref(),
        }
        .execute(request)
        .await
    }

    /// GET a templated URL and return the body as text.
    ///
    /// # Errors
    ///
    /// [`ClientError::HttpStatus`] for non-2xx responses, in addition to
    /// template, URL and transport errors.
    pub async fn get_for_string(
        &self,
        template: &str,
        vars: &[&(dyn fmt::Display + Sync)],
    ) -> Result<String, ClientError> {
        let request = self.request(Method::GET, template, vars)?;
        let url = request.url.to_string();
        let response = self.exchange(request).await?;
        if !response.status.is_success() {
            return Err(ClientError::HttpStatus {
                status: response.status,
                url,
            });
        }
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }
}

/// Builder for [`RestClient`].
pub struct RestClientBuilder {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
    base_url: Option<Url>,
    metrics: Option<ClientFactory>,
}

impl RestClientBuilder {
    /// Append an interceptor.
    pub fn interceptor(mut self, interceptor: impl ClientInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Resolve relative templates against this URL.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn build(self) -> RestClient {
        let client = RestClient {
            transport: self.transport,
            interceptors: self.interceptors,
            base_url: self.base_url,
        };
        match &self.metrics {
            Some(factory) => factory.instrument(client),
            None => client,
        }
    }
}

/// Produces clients instrumented with a shared [`MetricsClientInterceptor`].
#[derive(Debug, Clone)]
pub struct ClientFactory {
    interceptor: Arc<dyn ClientInterceptor>,
}

impl ClientFactory {
    pub fn new(registry: Arc<MeterRegistry>, config: &MetricsConfig) -> Self {
        Self::with_interceptor(MetricsClientInterceptor::new(
            registry,
            config.client_requests_name.clone(),
        ))
    }

    pub fn with_interceptor(interceptor: MetricsClientInterceptor) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
        }
    }

    /// The shared metrics interceptor.
    pub fn interceptor(&self) -> &Arc<dyn ClientInterceptor> {
        &self.interceptor
    }

    /// Builder whose client is instrumented on `build`.
    pub fn builder(&self, transport: impl Transport + 'static) -> RestClientBuilder {
        RestClientBuilder {
            metrics: Some(self.clone()),
            ..RestClient::builder(transport)
        }
    }

    /// Put the metrics interceptor in front of the client's interceptors.
    /// Already instrumented clients are returned unchanged.
    pub fn instrument(&self, mut client: RestClient) -> RestClient {
        let ours = Arc::as_ptr(&self.interceptor) as *const ();
        let present = client
            .interceptors
            .iter()
            .any(|i| Arc::as_ptr(i) as *const () == ours);
        if !present {
            client.interceptors.insert(0, self.interceptor.clone());
        }
        client
    }
}

/// Substitute `{...}` placeholders in order.
pub fn expand_template(
    template: &str,
    vars: &[&(dyn fmt::Display + Sync)],
) -> Result<String, ClientError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut placeholders = 0;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        if let Some(var) = vars.get(placeholders) {
            out.push_str(&var.to_string());
        }
        placeholders += 1;
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);

    if placeholders != vars.len() {
        return Err(ClientError::TemplateArity {
            template: template.to_string(),
            expected: placeholders,
            actual: vars.len(),
        });
    }
    Ok(out)
}

/// [`Transport`] backed by `reqwest`.
#[cfg(feature = "reqwest-transport")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest-transport")]
impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "reqwest-transport")]
#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ClientRequest) -> Result<ClientResponse, ClientError> {
        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(ClientResponse {
            status,
            headers,
            body,
        })
    }
}
