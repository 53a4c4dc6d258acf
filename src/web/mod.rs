//! HTTP instrumentation: server request timing, the instrumented client and
//! axum router integration.

pub mod client;
mod router;
mod routes;
mod server;
mod tags;
mod timed;

#[cfg(feature = "reqwest-transport")]
pub use client::ReqwestTransport;
pub use client::{
    expand_template, ClientError, ClientFactory, ClientInterceptor, ClientRequest,
    ClientResponse, Execution, MetricsClientInterceptor, RestClient, RestClientBuilder, Transport,
};
pub use router::MetricsRouter;
pub use routes::{RouteTemplate, RouteTimings};
pub use server::{ExceptionTagger, TimedRequests, TimedRequestsLayer};
pub use tags::{
    simple_type_name, DefaultWebTags, ExceptionNames, WebTagsProvider, CLIENT_ERROR, NONE,
};
pub use timed::{Timed, TimerName};
