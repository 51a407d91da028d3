use crate::{errors::TransportFault, Method};
use memchr::memchr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Parsed HTTP request as handed over by the transport.
///
/// The router only reads from it: method and path drive matching, headers
/// and body are exposed to handlers through [`Ctx`](crate::Ctx).
///
/// # Examples
/// ```
/// use maker_router::{Method, Request};
///
/// let req = Request::new(Method::Get, "/api/users/42?fields=name")
///     .with_header("Accept", "application/json");
///
/// assert_eq!(req.path(), "/api/users/42");
/// assert_eq!(req.query(), Some("fields=name"));
/// assert_eq!(req.header("accept"), Some("application/json"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: Method,
    target: String,
    path_end: usize,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    cancellation: Option<Cancellation>,
}

impl Request {
    /// Creates a request for `target` (path with an optional `?query`).
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        let target = target.into();
        let path_end = memchr(b'?', target.as_bytes()).unwrap_or(target.len());

        Self {
            method,
            target,
            path_end,
            headers: Vec::new(),
            body: Vec::new(),
            cancellation: None,
        }
    }

    /// Builds a request from the raw request-line tokens.
    ///
    /// # Errors
    /// [`TransportFault::BadRequest`] when the method is unknown or the
    /// target is not valid `UTF-8`.
    pub fn from_parts(method: &[u8], target: &[u8]) -> Result<Self, TransportFault> {
        let method = Method::from_bytes(method)
            .ok_or_else(|| TransportFault::BadRequest("invalid HTTP method".to_string()))?;
        let target = simdutf8::basic::from_utf8(target)
            .map_err(|_| TransportFault::BadRequest("request target is not UTF-8".to_string()))?;

        Ok(Self::new(method, target))
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Attaches the flag the transport raises when the client goes away.
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Full request target, path and query.
    #[inline(always)]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target without its query string.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.target[..self.path_end]
    }

    /// The query string without the leading `?`.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.target.get(self.path_end + 1..)
    }

    /// Returns the first header value with case-insensitive name matching
    /// (per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)).
    /// Uses linear search.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the transport has cancelled this request.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, Cancellation::is_cancelled)
    }
}

/// Cancellation signal shared between the transport and a dispatch.
///
/// The dispatcher only looks at it before invoking each handler; a running
/// handler is never interrupted.
///
/// # Examples
/// ```
/// use maker_router::{Cancellation, Method, Request};
///
/// let cancel = Cancellation::new();
/// let req = Request::new(Method::Get, "/").with_cancellation(cancel.clone());
///
/// assert!(!req.is_cancelled());
/// cancel.cancel(); // e.g. the client disconnected
/// assert!(req.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
