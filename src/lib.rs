//! maker_router - Ordered, first-match HTTP routing and middleware dispatch
//!
//! The dispatch core of a web application: handlers are registered against
//! methods and path patterns, and every incoming request is driven through
//! the matching handler chains in registration order. The network transport
//! stays outside; it hands over a parsed [`Request`] and gets a populated
//! [`Response`] back.
//!
//! # Routing Model
//!
//! - **Method stacks** - one ordered route list per HTTP method, scanned
//!   first-match-wins; a later, more specific pattern never overrides an
//!   earlier one
//! - **Patterns** - literal segments, `:name` parameters and a trailing `*`
//!   wildcard, compiled once at registration
//! - **Middleware** - prefix routes interleaved with all other routes in
//!   registration order
//! - **Continuation** - handlers pass control with [`Ctx::next`], first to
//!   the rest of their chain and then to the next matching route
//! - **Errors** - one error handler, called at most once per request, for
//!   handler failures, unmatched requests and transport faults
//!
//! # Concurrency
//!
//! - Route table published as an immutable snapshot, read without locks
//! - Registration and transport initialization serialized by one mutex that
//!   dispatch never takes
//! - Per-request contexts drawn from a bounded lock-free pool
//! - Cancellation observed between handlers
//!
//! # Examples
//!
//! Quick start:
//! ```
//! use maker_router::{handler, App, Method, Request};
//!
//! let app = App::new();
//! app.get("/", handler(|ctx| ctx.send("Hello World!")));
//!
//! let resp = app.handle(&Request::new(Method::Get, "/"));
//! assert_eq!(resp.body_bytes(), b"Hello World!");
//! ```
//! Middleware, parameters and errors:
//! ```
//! use maker_router::{handler, App, Error, Method, Request, StatusCode};
//!
//! let app = App::new();
//! app.middleware_at("/api", handler(|ctx| {
//!     if ctx.get("authorization").is_none() {
//!         return Err(Error::new(StatusCode::Unauthorized, "missing token"));
//!     }
//!     ctx.next()
//! }));
//! app.get("/api/users/:id", handler(|ctx| {
//!     let id: u64 = ctx.param("id").unwrap_or_default().parse()?;
//!     ctx.send(id * 2)
//! }));
//!
//! let req = Request::new(Method::Get, "/api/users/21").with_header("Authorization", "t");
//! assert_eq!(app.handle(&req).body_bytes(), b"42");
//!
//! let resp = app.handle(&Request::new(Method::Get, "/api/users/21"));
//! assert_eq!(resp.status_code(), StatusCode::Unauthorized);
//! assert_eq!(resp.body_bytes(), b"missing token");
//! ```
//! Advanced configuration:
//! ```
//! use maker_router::{App, Settings};
//! use std::time::Duration;
//!
//! let app = App::builder()
//!     .settings(Settings {
//!         strict_routing: true,
//!         case_sensitive: true,
//!         read_timeout: Some(Duration::from_secs(5)),
//!         ctx_pool_size: 4096, // More idle contexts for bursty load
//!         ..Settings::default()
//!     })
//!     .build();
//!
//! let transport = app.init();
//! assert_eq!(transport.idle_timeout, Some(Duration::from_secs(5)));
//! ```

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod app;
pub(crate) mod ctx;
pub(crate) mod errors;
pub mod fs;
pub mod router;
pub mod settings;

pub use crate::{
    app::{dispatch::default_error_handler, AppBuilder, ErrorHandler, Group, App},
    ctx::Ctx,
    errors::{Error, RouteError, SettingsError, TransportFault},
    fs::{Dir, FileServer, Served, StaticOptions},
    http::{
        request::{Cancellation, Request},
        response::{
            write::{BodyWriter, WriteBuffer},
            Response,
        },
        types::{Method, StatusCode, UnknownMethod},
    },
    router::{handler, Handler, IntoHandlers, Route, RouteMethod},
    settings::{Settings, TransportConfig},
};

#[doc(hidden)]
pub fn run_test<F: FnOnce(&mut Ctx<'_>) -> Result<(), Error>>(f: F) -> Response {
    let app = App::new();
    let table = app.table();
    let request = Request::default();
    let mut response = Response::new();

    {
        let mut ctx = Ctx::new(&table, app.settings(), &request, &mut response, Box::default());
        let _ = f(&mut ctx);
    }
    response
}
