//! Per-request context and the continuation protocol.
//!
//! A [`Ctx`] borrows the request, the response builder and the route table
//! for exactly one dispatch. Its mutable cursor state lives in a pooled
//! core that is reset every time it is handed out.

use crate::{
    errors::Error,
    http::{request::Request, response::Response, types::StatusCode},
    router::{route::Route, table::RouteTable},
    Method, Settings, WriteBuffer,
};
use crossbeam::queue::ArrayQueue;
use std::{borrow::Cow, ops::Range};
use tracing::{debug, trace};

/// Reusable cursor state of a dispatch.
#[derive(Debug, Default)]
pub(crate) struct CtxCore {
    /// Next entry of the method stack to test
    index_route: usize,
    /// Handler of the current route that is running
    index_handler: usize,
    params: Vec<Range<usize>>,
    err: Option<Error>,
    cancelled: bool,
}

impl CtxCore {
    #[inline]
    fn reset(&mut self) {
        self.index_route = 0;
        self.index_handler = 0;
        self.params.clear();
        self.err = None;
        self.cancelled = false;
    }
}

/// Bounded free-list of [`CtxCore`]s.
///
/// A pool of size zero allocates per request.
pub(crate) struct CtxPool(Option<ArrayQueue<Box<CtxCore>>>);

impl CtxPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self((capacity > 0).then(|| ArrayQueue::new(capacity)))
    }

    #[inline]
    pub(crate) fn acquire(&self) -> Box<CtxCore> {
        match self.0.as_ref().and_then(ArrayQueue::pop) {
            Some(mut core) => {
                core.reset();
                core
            }
            None => Box::default(),
        }
    }

    #[inline]
    pub(crate) fn release(&self, core: Box<CtxCore>) {
        if let Some(queue) = &self.0 {
            // A full pool drops the extra core
            let _ = queue.push(core);
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.0.as_ref().map_or(0, ArrayQueue::len)
    }
}

/// The per-request carrier handed to every handler.
///
/// Handlers read the request through it, write the [`Response`], and
/// steer the chain with [`next`](Ctx::next) and [`fail`](Ctx::fail). A `Ctx`
/// cannot outlive the handler call that receives it.
///
/// # Examples
/// ```
/// use maker_router::{handler, App, Method, Request, StatusCode};
///
/// let app = App::new();
/// app.middleware(handler(|ctx| {
///     ctx.set("x-powered-by", "maker");
///     ctx.next()
/// }));
/// app.get("/hello/:name", handler(|ctx| {
///     let name = ctx.param("name").unwrap_or("stranger").to_string();
///     ctx.status(StatusCode::Ok).send(format!("Hello, {name}!"))
/// }));
///
/// let resp = app.handle(&Request::new(Method::Get, "/hello/ferris"));
/// assert_eq!(resp.body_bytes(), b"Hello, ferris!");
/// assert_eq!(resp.header("X-Powered-By"), Some("maker"));
/// ```
pub struct Ctx<'a> {
    table: &'a RouteTable,
    settings: &'a Settings,
    request: &'a Request,
    response: &'a mut Response,
    route: Option<&'a Route>,
    core: Box<CtxCore>,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(
        table: &'a RouteTable,
        settings: &'a Settings,
        request: &'a Request,
        response: &'a mut Response,
        core: Box<CtxCore>,
    ) -> Self {
        Self {
            table,
            settings,
            request,
            response,
            route: None,
            core,
        }
    }

    pub(crate) fn into_core(self) -> Box<CtxCore> {
        self.core
    }

    #[inline]
    pub(crate) fn take_error(&mut self) -> Option<Error> {
        self.core.err.take()
    }
}

// Continuation
impl<'a> Ctx<'a> {
    /// Passes control on.
    ///
    /// Runs the next handler of the current route, or once those are used up,
    /// resumes the scan for the next route matching this request. Parameters
    /// are rebound from that route's own pattern.
    ///
    /// Does nothing after [`fail`](Ctx::fail) or a cancellation.
    ///
    /// # Errors
    /// Whatever the rest of the chain returns, and a `404` when no further
    /// route matches. Propagate it with `?` so it reaches the error handler.
    pub fn next(&mut self) -> Result<(), Error> {
        if self.core.err.is_some() || self.core.cancelled {
            return Ok(());
        }

        let Some(route) = self.route else {
            return self.next_route();
        };

        self.core.index_handler += 1;
        match self.core.index_handler < route.handlers().len() {
            true => self.invoke(route, self.core.index_handler),
            false => self.next_route(),
        }
    }

    /// Resumes the table scan at the saved position.
    pub(crate) fn next_route(&mut self) -> Result<(), Error> {
        let table: &'a RouteTable = self.table;
        let request: &'a Request = self.request;
        let (method, path) = (request.method(), request.path());
        let stack = table.stack(method);

        while let Some(route) = stack.get(self.core.index_route) {
            let route: &'a Route = route;
            self.core.index_route += 1;

            if route.matcher().matches(path, &mut self.core.params) {
                trace!(
                    method = %route.method(),
                    pattern = route.pattern(),
                    position = route.position(),
                    "route matched"
                );
                self.route = Some(route);
                self.core.index_handler = 0;
                return self.invoke(route, 0);
            }
        }

        self.route = None;
        self.core.params.clear();
        debug!(%method, path, "no route matched");
        Err(Error::not_found(method, path))
    }

    #[inline]
    fn invoke(&mut self, route: &'a Route, index: usize) -> Result<(), Error> {
        if self.check_cancelled() {
            return Ok(());
        }
        (route.handlers()[index])(self)
    }

    /// Latches the request's cancellation flag; only called at handler
    /// boundaries.
    pub(crate) fn check_cancelled(&mut self) -> bool {
        if !self.core.cancelled && self.request.is_cancelled() {
            debug!(path = self.request.path(), "request cancelled, skipping handlers");
            self.core.cancelled = true;
        }
        self.core.cancelled
    }

    /// Stores an error and stops the chain.
    ///
    /// Later calls to [`next`](Ctx::next) do nothing; the error handler
    /// receives the first stored error once the dispatch unwinds. Returning
    /// `Err` from a handler has the same effect.
    pub fn fail(&mut self, err: impl Into<Error>) {
        if self.core.err.is_none() {
            self.core.err = Some(err.into());
        }
    }

    /// The error stored with [`fail`](Ctx::fail), if any.
    #[inline]
    pub fn error(&self) -> Option<&Error> {
        self.core.err.as_ref()
    }

    /// Whether a cancellation was observed at a handler boundary.
    #[inline]
    pub(crate) const fn cancel_observed(&self) -> bool {
        self.core.cancelled
    }

    /// Whether the transport cancelled this request.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.core.cancelled || self.request.is_cancelled()
    }
}

// Request
impl<'a> Ctx<'a> {
    #[inline(always)]
    pub fn method(&self) -> Method {
        self.request.method()
    }

    /// Request path without the query string.
    #[inline(always)]
    pub fn path(&self) -> &'a str {
        self.request.path()
    }

    #[inline]
    pub fn query(&self) -> Option<&'a str> {
        self.request.query()
    }

    /// Value bound to a pattern parameter by the current route.
    ///
    /// The trailing wildcard is available as `"*"`.
    pub fn param(&self, name: &str) -> Option<&'a str> {
        let index = self.route?.matcher().param_index(name)?;
        let range = self.core.params.get(index)?.clone();
        self.request.path().get(range)
    }

    /// Every bound parameter of the current route, in pattern order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &'a str)> + '_ {
        let path = self.request.path();
        let names = self.route.map_or(&[][..], |r| r.matcher().param_names());

        names
            .iter()
            .zip(self.core.params.iter())
            .map(move |(name, range)| (name.as_str(), &path[range.clone()]))
    }

    /// Request header, matched case-insensitively.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.request.header(name)
    }

    #[inline]
    pub fn body(&self) -> &'a [u8] {
        self.request.body()
    }

    #[inline(always)]
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// The route whose handler is running, `None` inside the error handler
    /// when nothing matched.
    #[inline(always)]
    pub fn route(&self) -> Option<&'a Route> {
        self.route
    }

    #[inline(always)]
    pub fn settings(&self) -> &'a Settings {
        self.settings
    }
}

// Response
impl<'a> Ctx<'a> {
    #[inline(always)]
    pub fn response(&mut self) -> &mut Response {
        self.response
    }

    /// Sets the response status.
    ///
    /// # Examples
    /// ```
    /// # maker_router::run_test(|ctx| {
    /// use maker_router::StatusCode;
    ///
    /// ctx.status(StatusCode::Created)
    ///     .set("location", "/users/7")
    ///     .send("created")
    /// # });
    /// ```
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.response.status(status);
        self
    }

    /// Sets a response header.
    #[inline]
    pub fn set<V: WriteBuffer>(&mut self, name: impl Into<Cow<'static, str>>, value: V) -> &mut Self {
        self.response.set_header(name, value);
        self
    }

    /// Replaces the response body.
    ///
    /// Returns `Ok(())` so it can end a handler directly.
    #[inline]
    pub fn send<T: WriteBuffer>(&mut self, body: T) -> Result<(), Error> {
        self.response.body(body);
        Ok(())
    }

    /// Sets the status and, if the body is still empty, its reason phrase.
    ///
    /// # Examples
    /// ```
    /// # let resp = maker_router::run_test(|ctx| {
    /// use maker_router::StatusCode;
    ///
    /// ctx.send_status(StatusCode::NotFound)
    /// # });
    /// # assert_eq!(resp.body_bytes(), b"Not Found");
    /// ```
    pub fn send_status(&mut self, status: StatusCode) -> Result<(), Error> {
        self.response.status(status);
        if self.response.body_bytes().is_empty() {
            self.response.body(status.reason());
        }
        Ok(())
    }
}


#[cfg(test)]
mod ctx_tests {
    use crate::{handler, tools::body, App, Error, Method, Request, StatusCode};
    use std::sync::{Arc, Mutex};

    #[test]
    fn params_and_request_views() {
        let app = App::new();
        app.post(
            "/orgs/:org/files/*",
            handler(|ctx| {
                let listed: Vec<String> = ctx.params().map(|(k, v)| format!("{k}={v}")).collect();
                let summary = format!(
                    "{} {} {:?} {:?} {}",
                    ctx.method(),
                    listed.join(","),
                    ctx.query(),
                    ctx.get("x-trace"),
                    ctx.body().len()
                );
                ctx.send(summary)
            }),
        );

        let req = Request::new(Method::Post, "/orgs/Rust/files/a/b.txt?dl=1")
            .with_header("X-Trace", "t1")
            .with_body("12345");

        assert_eq!(
            body(&app.handle(&req)),
            r#"POST org=Rust,*=a/b.txt Some("dl=1") Some("t1") 5"#
        );
    }

    #[test]
    fn missing_param_is_none() {
        let app = App::new();
        app.get(
            "/users/:id",
            handler(|ctx| {
                assert_eq!(ctx.param("name"), None);
                assert_eq!(ctx.param("*"), None);
                ctx.send(ctx.param("id").unwrap_or_default().to_string())
            }),
        );

        assert_eq!(body(&app.handle(&Request::new(Method::Get, "/users/9"))), "9");
    }

    #[test]
    fn fail_stops_next() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = App::new();

        let log = Arc::clone(&seen);
        app.middleware(handler(move |ctx| {
            log.lock().unwrap().push("first");
            ctx.fail(Error::new(StatusCode::Forbidden, "nope"));
            ctx.fail(StatusCode::Gone);
            assert_eq!(ctx.error().map(Error::code), Some(StatusCode::Forbidden));
            ctx.next()
        }));
        let log = Arc::clone(&seen);
        app.get(
            "/",
            handler(move |ctx| {
                log.lock().unwrap().push("second");
                ctx.send("unreachable")
            }),
        );

        let resp = app.handle(&Request::new(Method::Get, "/"));
        assert_eq!(resp.status_code(), StatusCode::Forbidden);
        assert_eq!(body(&resp), "nope");
        assert_eq!(*seen.lock().unwrap(), ["first"]);
    }

    #[test]
    fn send_status() {
        let app = App::new();
        app.get("/empty", handler(|ctx| ctx.send_status(StatusCode::Accepted)));
        app.get(
            "/full",
            handler(|ctx| {
                ctx.send("kept")?;
                ctx.send_status(StatusCode::Created)
            }),
        );

        let resp = app.handle(&Request::new(Method::Get, "/empty"));
        assert_eq!(resp.status_code(), StatusCode::Accepted);
        assert_eq!(body(&resp), "Accepted");

        let resp = app.handle(&Request::new(Method::Get, "/full"));
        assert_eq!(resp.status_code(), StatusCode::Created);
        assert_eq!(body(&resp), "kept");
    }

    #[test]
    fn route_handle_is_visible() {
        let app = App::new();
        app.get(
            "/r/:x",
            handler(|ctx| {
                let route = ctx.route().map(|r| r.pattern().to_string());
                ctx.send(route.unwrap_or_default())
            }),
        );

        assert_eq!(body(&app.handle(&Request::new(Method::Get, "/r/1"))), "/r/:x");
    }
}
