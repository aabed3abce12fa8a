//! Incoming HTTP request type.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method};
use tracing::warn;

/// Everything about a request except its body.
///
/// Terminate hooks receive a `Head` rather than a [`Request`]: by the time
/// they run the request itself has been consumed by the chain.
#[derive(Clone, Debug, Default)]
pub struct Head {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) params: HashMap<String, String>,
    pub(crate) bound: HashMap<String, Arc<dyn Any + Send + Sync>>,
    pub(crate) extensions: Extensions,
}

impl Head {
    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn extensions(&self) -> &Extensions { &self.extensions }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the value a [`Router::bind`](crate::Router::bind) resolver
    /// produced for the named parameter.
    pub fn bound<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.bound.get(key).and_then(|v| v.downcast_ref::<T>())
    }
}

impl Head {
    /// Method and path only, for hooks whose request never came back.
    pub(crate) fn bare(method: Method, path: String) -> Self {
        Self { method, path, ..Self::default() }
    }
}

/// Where a request leaves its head when it is dropped inside a pipeline.
#[derive(Clone, Debug, Default)]
pub(crate) struct HeadSlot(Arc<Mutex<Option<Head>>>);

impl HeadSlot {
    pub(crate) fn put(&self, head: Head) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(head);
    }

    pub(crate) fn take(&self) -> Option<Head> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// An incoming HTTP request: a [`Head`] and a fully buffered body.
#[derive(Debug)]
pub struct Request {
    pub(crate) head: Head,
    pub(crate) body: Bytes,
    pub(crate) slot: Option<HeadSlot>,
}

impl Drop for Request {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.put(std::mem::take(&mut self.head));
        }
    }
}

impl Request {
    /// Builds a request by hand. `path` may carry a `?query` suffix.
    ///
    /// ```rust
    /// use onion::{Method, Request};
    ///
    /// let req = Request::new(Method::GET, "/users/42?verbose=1")
    ///     .with_header("authorization", "Bearer secret");
    /// assert_eq!(req.path(), "/users/42");
    /// assert_eq!(req.query(), Some("verbose=1"));
    /// ```
    pub fn new(method: Method, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_owned(), Some(q.to_owned())),
            None => (path.to_owned(), None),
        };
        Self {
            head: Head { method, path, query, ..Head::default() },
            body: Bytes::new(),
            slot: None,
        }
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        let head = Head {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            params: HashMap::new(),
            bound: HashMap::new(),
            extensions: parts.extensions,
        };
        Self { head, body, slot: None }
    }

    /// Appends a header. Invalid names or values are dropped with a warning.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.head.headers.append(name, value);
            }
            _ => warn!(header = name, "dropping invalid request header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn head(&self) -> &Head { &self.head }
    pub fn method(&self) -> &Method { &self.head.method }
    pub fn path(&self) -> &str { &self.head.path }
    pub fn query(&self) -> Option<&str> { self.head.query() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.head.headers }
    pub fn header(&self, name: &str) -> Option<&str> { self.head.header(name) }
    pub fn param(&self, key: &str) -> Option<&str> { self.head.param(key) }
    pub fn extensions(&self) -> &Extensions { &self.head.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.head.extensions }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn bound<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.head.bound(key)
    }
}
