//! Tags attached to request timers.

use crate::registry::Tags;
use http::{Method, StatusCode};
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Placeholder for a tag with no value (no exception, no URI template).
pub const NONE: &str = "none";

/// Status tag for client requests that never produced a response.
pub const CLIENT_ERROR: &str = "CLIENT_ERROR";

/// Computes the tags of server and client request timers.
///
/// Static tags declared on a [`Timed`](super::Timed) descriptor are merged on
/// top of these and win on key collisions.
pub trait WebTagsProvider: Send + Sync + fmt::Debug {
    /// Tags for one completed server request.
    fn server_request_tags(
        &self,
        method: &Method,
        uri_template: &str,
        status: &str,
        exception: &str,
    ) -> Tags;

    /// Tags for one completed client request. `status` is `None` when the
    /// transport failed before a response arrived.
    fn client_request_tags(
        &self,
        method: &Method,
        uri_template: Option<&str>,
        status: Option<StatusCode>,
    ) -> Tags;
}

/// `method`, `uri`, `status` and `exception` tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWebTags;

impl WebTagsProvider for DefaultWebTags {
    fn server_request_tags(
        &self,
        method: &Method,
        uri_template: &str,
        status: &str,
        exception: &str,
    ) -> Tags {
        Tags::empty()
            .and("method", method.as_str())
            .and("uri", uri_template)
            .and("status", status)
            .and("exception", exception)
    }

    fn client_request_tags(
        &self,
        method: &Method,
        uri_template: Option<&str>,
        status: Option<StatusCode>,
    ) -> Tags {
        let status = match status {
            Some(status) => status.as_u16().to_string(),
            None => CLIENT_ERROR.to_string(),
        };
        Tags::empty()
            .and("method", method.as_str())
            .and("uri", uri_template.unwrap_or(NONE))
            .and("status", status)
    }
}

/// Unqualified name of a type: `my_app::errors::Exception1` becomes
/// `Exception1`.
///
/// `Box`, `Arc` and `Rc` are looked through, and trait objects lose their
/// `dyn` keyword and `+ Send + Sync` bounds, so `Box<dyn Error + Send + Sync>`
/// becomes `Error`. Other generic types keep only their base name.
pub fn simple_type_name<T: ?Sized>() -> &'static str {
    let mut name = std::any::type_name::<T>();
    loop {
        name = name.trim();
        name = name.strip_prefix("dyn ").unwrap_or(name);

        let head_end = name.find(|c: char| c == '<' || c == '+').unwrap_or(name.len());
        let head = name[..head_end].trim_end();
        let simple = head.rsplit("::").next().unwrap_or(head);

        if matches!(simple, "Box" | "Arc" | "Rc") && name[head_end..].starts_with('<') {
            if let Some(inner) = name[head_end + 1..].strip_suffix('>') {
                name = inner;
                continue;
            }
        }
        return simple;
    }
}

type ErrorNamer = Arc<dyn Fn(&(dyn Error + 'static)) -> Option<String> + Send + Sync>;

/// Names errors whose concrete type is hidden behind a trait object.
///
/// A `Box<dyn Error + Send + Sync>` only reveals its concrete type by
/// downcasting, so the types worth naming are registered up front:
///
/// ```ignore
/// let names = ExceptionNames::new()
///     .exception_type::<NotFound>()
///     .exception_name(|e: &std::io::Error| format!("Io{:?}", e.kind()));
/// ```
///
/// Unregistered errors fall back to [`simple_type_name`] of the static type.
#[derive(Clone, Default)]
pub struct ExceptionNames {
    namers: Vec<ErrorNamer>,
}

impl fmt::Debug for ExceptionNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionNames")
            .field("namers", &self.namers.len())
            .finish()
    }
}

impl ExceptionNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name errors of type `E` by its simple type name.
    pub fn exception_type<E: Error + 'static>(self) -> Self {
        self.exception_name(|_: &E| simple_type_name::<E>().to_string())
    }

    /// Name errors of type `E` with `namer`. Earlier registrations win.
    pub fn exception_name<E, F>(mut self, namer: F) -> Self
    where
        E: Error + 'static,
        F: Fn(&E) -> String + Send + Sync + 'static,
    {
        self.namers
            .push(Arc::new(move |error: &(dyn Error + 'static)| {
                error.downcast_ref::<E>().map(&namer)
            }));
        self
    }

    /// Name of a type-erased error, if its concrete type is registered.
    pub fn resolve(&self, error: &(dyn Error + 'static)) -> Option<String> {
        self.namers.iter().find_map(|namer| namer(error))
    }

    /// Name of an error of static type `E`.
    ///
    /// Boxed trait objects are resolved by their concrete type when it is
    /// registered. Anything else is named by [`simple_type_name`].
    pub fn name_of<E: 'static>(&self, error: &E) -> String {
        let any: &dyn Any = error;
        let erased: Option<&(dyn Error + 'static)> =
            if let Some(boxed) = any.downcast_ref::<Box<dyn Error + Send + Sync>>() {
                Some(&**boxed)
            } else if let Some(boxed) = any.downcast_ref::<Box<dyn Error + Send>>() {
                Some(&**boxed)
            } else if let Some(boxed) = any.downcast_ref::<Box<dyn Error>>() {
                Some(&**boxed)
            } else {
                None
            };

        erased
            .and_then(|error| self.resolve(error))
            .unwrap_or_else(|| simple_type_name::<E>().to_string())
    }
}
