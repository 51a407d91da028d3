use crate::{
    errors::{Error, RouteError},
    router::path::{MatchOptions, PathMatcher},
    Ctx, Method,
};
use std::{
    fmt,
    sync::{Arc, OnceLock},
};

/// A unit of request processing.
///
/// A handler ends the chain by returning without calling
/// [`Ctx::next`](crate::Ctx::next), continues it by calling `next`, or fails
/// by returning an [`Error`].
pub type Handler = Arc<dyn Fn(&mut Ctx<'_>) -> Result<(), Error> + Send + Sync>;

/// Wraps a closure into a [`Handler`].
///
/// # Examples
/// ```
/// use maker_router::{handler, App, Method, Request};
///
/// let app = App::new();
/// app.get("/ping", handler(|ctx| ctx.send("pong")));
///
/// let resp = app.handle(&Request::new(Method::Get, "/ping"));
/// assert_eq!(resp.body_bytes(), b"pong");
/// ```
#[inline]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Ctx<'_>) -> Result<(), Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Anything that can be registered as a handler chain.
pub trait IntoHandlers {
    fn into_handlers(self) -> Vec<Handler>;
}

impl IntoHandlers for Handler {
    #[inline]
    fn into_handlers(self) -> Vec<Handler> {
        vec![self]
    }
}

impl IntoHandlers for Vec<Handler> {
    #[inline]
    fn into_handlers(self) -> Vec<Handler> {
        self
    }
}

impl<const N: usize> IntoHandlers for [Handler; N] {
    #[inline]
    fn into_handlers(self) -> Vec<Handler> {
        self.into()
    }
}

impl IntoHandlers for &[Handler] {
    #[inline]
    fn into_handlers(self) -> Vec<Handler> {
        self.to_vec()
    }
}

/// No handlers, used by [`App::group`](crate::App::group) without group middleware.
impl IntoHandlers for () {
    #[inline]
    fn into_handlers(self) -> Vec<Handler> {
        Vec::new()
    }
}

/// What a route answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    /// Middleware: matched by prefix for every method.
    Use,
    Verb(Method),
}

impl RouteMethod {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            RouteMethod::Use => "USE",
            RouteMethod::Verb(method) => method.as_str(),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered route.
///
/// Everything but the [name](Route::set_name) is fixed once the route is
/// in the table.
pub struct Route {
    method: RouteMethod,
    pattern: String,
    matcher: PathMatcher,
    handlers: Box<[Handler]>,
    position: usize,
    name: OnceLock<String>,
}

impl Route {
    pub(crate) fn new(
        method: RouteMethod,
        pattern: &str,
        handlers: Vec<Handler>,
        position: usize,
        options: MatchOptions,
    ) -> Result<Self, RouteError> {
        if handlers.is_empty() {
            return Err(RouteError::EmptyHandlers {
                method: method.as_str(),
                path: pattern.to_string(),
            });
        }

        let options = MatchOptions {
            prefix: method == RouteMethod::Use,
            ..options
        };
        let matcher = PathMatcher::compile(pattern, options)?;

        Ok(Self {
            method,
            pattern: pattern.to_string(),
            matcher,
            handlers: handlers.into_boxed_slice(),
            position,
            name: OnceLock::new(),
        })
    }

    #[inline(always)]
    pub const fn method(&self) -> RouteMethod {
        self.method
    }

    /// The pattern as registered, including any group prefix.
    #[inline(always)]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[inline(always)]
    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    #[inline(always)]
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Registration order, unique per app.
    #[inline(always)]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Names the route. Only the first name sticks.
    ///
    /// Returns `false` if the route was already named.
    pub fn set_name(&self, name: impl Into<String>) -> bool {
        self.name.set(name.into()).is_ok()
    }

    /// Whether two entries describe the same middleware for enumeration.
    pub(crate) fn same_middleware(&self, other: &Route) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        matches!((self.name(), other.name()), (Some(a), Some(b)) if a == b)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("handlers", &self.handlers.len())
            .field("position", &self.position)
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        handler(|_| Ok(()))
    }

    #[test]
    fn rejects_empty_chain() {
        let err = Route::new(
            RouteMethod::Verb(Method::Get),
            "/x",
            Vec::new(),
            0,
            MatchOptions::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            RouteError::EmptyHandlers {
                method: "GET",
                path: "/x".to_string()
            }
        );
    }

    #[test]
    fn use_routes_match_by_prefix() {
        let mw = Route::new(RouteMethod::Use, "/api", vec![noop()], 0, MatchOptions::default())
            .unwrap();
        let get = Route::new(
            RouteMethod::Verb(Method::Get),
            "/api",
            vec![noop()],
            1,
            MatchOptions::default(),
        )
        .unwrap();

        let mut params = Vec::new();
        assert!(mw.matcher().matches("/api/ping", &mut params));
        assert!(!get.matcher().matches("/api/ping", &mut params));
    }

    #[test]
    fn first_name_wins() {
        let route = Route::new(RouteMethod::Use, "/", vec![noop()], 0, MatchOptions::default())
            .unwrap();

        assert_eq!(route.name(), None);
        assert!(route.set_name("logger"));
        assert!(!route.set_name("other"));
        assert_eq!(route.name(), Some("logger"));
    }

    #[test]
    fn middleware_identity() {
        let make = || {
            Route::new(RouteMethod::Use, "/", vec![noop()], 0, MatchOptions::default()).unwrap()
        };
        let (a, b) = (make(), make());

        assert!(a.same_middleware(&a));
        assert!(!a.same_middleware(&b));

        a.set_name("cors");
        b.set_name("cors");
        assert!(a.same_middleware(&b));
    }

    #[test]
    fn handler_sources() {
        assert_eq!(noop().into_handlers().len(), 1);
        assert_eq!([noop(), noop()].into_handlers().len(), 2);
        assert_eq!(vec![noop(); 3].into_handlers().len(), 3);
        assert!(().into_handlers().is_empty());
    }
}
