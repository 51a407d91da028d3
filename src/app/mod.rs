//! The application: settings, route table and the registration surface.

use crate::{
    ctx::CtxPool,
    errors::{Error, RouteError},
    fs::{FileServer, StaticOptions},
    router::{
        path::{self, MatchOptions},
        route::{Handler, IntoHandlers, Route, RouteMethod},
        table::RouteTable,
    },
    Ctx, Method, Settings, TransportConfig,
};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

pub(crate) mod dispatch;
pub(crate) mod group;

pub use group::Group;

/// Hook receiving every error of a dispatch, at most once per request.
pub type ErrorHandler = Arc<dyn Fn(&mut Ctx<'_>, Error) + Send + Sync>;

/// Generates one registration method per HTTP verb, delegating to `add`.
macro_rules! verb_methods {
    ($($(#[$docs:meta])* $name:ident => $method:ident;)+) => {
        $(
            $(#[$docs])*
            #[track_caller]
            #[inline]
            pub fn $name(&self, path: &str, handlers: impl IntoHandlers) -> Arc<Route> {
                self.add(Method::$method, path, handlers)
            }
        )+
    };
}
pub(crate) use verb_methods;

/// An HTTP application: an ordered route table plus the hooks that run
/// every dispatch.
///
/// Routes are registered during startup through `&self` and can then be
/// served from any number of threads at once.
///
/// # Examples
/// ```
/// use maker_router::{handler, App, Method, Request, StatusCode};
///
/// let app = App::new();
/// app.get("/users/:id", handler(|ctx| {
///     let id = ctx.param("id").unwrap_or_default().to_string();
///     ctx.send(id)
/// }));
///
/// let resp = app.handle(&Request::new(Method::Get, "/users/42"));
/// assert_eq!(resp.status_code(), StatusCode::Ok);
/// assert_eq!(resp.body_bytes(), b"42");
///
/// let resp = app.handle(&Request::new(Method::Get, "/nope"));
/// assert_eq!(resp.status_code(), StatusCode::NotFound);
/// assert_eq!(resp.body_bytes(), b"Cannot GET /nope");
/// ```
pub struct App {
    settings: Settings,
    table: ArcSwap<RouteTable>,
    registry: Mutex<Registry>,
    pool: CtxPool,
    error_handler: ErrorHandler,
}

/// State only touched while registering or initializing.
#[derive(Default)]
struct Registry {
    transport: Option<TransportConfig>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Creates an app with default [`Settings`] and the default error handler.
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new builder for configuring the app.
    ///
    /// # Examples
    /// ```
    /// use maker_router::{App, Settings, StatusCode};
    ///
    /// let app = App::builder()
    ///     .settings(Settings {
    ///         case_sensitive: true,
    ///         ..Settings::default() // Required line
    ///     })
    ///     .error_handler(|ctx, err| {
    ///         ctx.status(err.code()).set("content-type", "application/json");
    ///         let _ = ctx.send(format!(r#"{{"error":"{}"}}"#, err.message()));
    ///     })
    ///     .build();
    ///
    /// assert!(app.settings().case_sensitive);
    /// ```
    #[inline]
    pub fn builder() -> AppBuilder {
        AppBuilder {
            settings: None,
            error_handler: None,
        }
    }

    #[inline(always)]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Snapshot of the current route table.
    #[inline]
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Every registered route once, in registration order.
    ///
    /// `HEAD` routes derived from `GET` registrations are left out, and
    /// middleware sharing a [name](Route::set_name) is listed once.
    ///
    /// # Examples
    /// ```
    /// use maker_router::{handler, App};
    ///
    /// let app = App::new();
    /// app.middleware(handler(|ctx| ctx.next())).set_name("logger");
    /// app.get("/", handler(|ctx| ctx.send("home")));
    /// app.middleware(handler(|ctx| ctx.next())).set_name("logger");
    ///
    /// for route in app.routes() {
    ///     println!("{}\t{}", route.method(), route.pattern());
    /// }
    /// assert_eq!(app.routes().len(), 2);
    /// ```
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.table.load().routes()
    }

    /// Freezes the transport-facing settings.
    ///
    /// The first call builds the [`TransportConfig`]; later calls return the
    /// same snapshot.
    pub fn init(&self) -> TransportConfig {
        let mut registry = self.registry.lock();

        registry
            .transport
            .get_or_insert_with(|| {
                let config = TransportConfig::from(&self.settings);
                info!(
                    routes = self.table.load().len(),
                    concurrency = config.concurrency,
                    body_limit = config.max_request_body_size,
                    keep_alive = config.keep_alive,
                    "transport initialized"
                );
                config
            })
            .clone()
    }
}

// Registration
impl App {
    /// Appends a route under the registration lock.
    fn register(
        &self,
        method: RouteMethod,
        pattern: &str,
        handlers: Vec<Handler>,
    ) -> Result<Arc<Route>, RouteError> {
        let _registry = self.registry.lock();

        let mut table = RouteTable::clone(&self.table.load());
        let route = Arc::new(Route::new(
            method,
            pattern,
            handlers,
            table.next_position(),
            self.match_options(),
        )?);

        table.push(Arc::clone(&route));
        self.table.store(Arc::new(table));

        debug!(
            %method,
            pattern,
            position = route.position(),
            handlers = route.handlers().len(),
            "route registered"
        );
        Ok(route)
    }

    #[track_caller]
    fn register_or_panic(
        &self,
        method: RouteMethod,
        pattern: &str,
        handlers: Vec<Handler>,
    ) -> Arc<Route> {
        match self.register(method, pattern, handlers) {
            Ok(route) => route,
            Err(err) => {
                error!(%method, pattern, %err, "invalid route registration");
                panic!("invalid route registration: {err}");
            }
        }
    }

    #[inline]
    fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.settings.case_sensitive,
            strict: self.settings.strict_routing,
            prefix: false,
        }
    }

    /// Registers a route, reporting configuration problems instead of
    /// panicking.
    ///
    /// # Errors
    /// [`RouteError`] when `handlers` is empty or `path` is malformed.
    ///
    /// # Examples
    /// ```
    /// use maker_router::{handler, App, Method, RouteError};
    ///
    /// let app = App::new();
    /// assert!(app.try_add(Method::Get, "/ok", handler(|ctx| ctx.send("ok"))).is_ok());
    ///
    /// let err = app.try_add(Method::Get, "/files/*/x", handler(|_| Ok(()))).unwrap_err();
    /// assert_eq!(err, RouteError::MisplacedWildcard("/files/*/x".to_string()));
    /// ```
    #[inline]
    pub fn try_add(
        &self,
        method: Method,
        path: &str,
        handlers: impl IntoHandlers,
    ) -> Result<Arc<Route>, RouteError> {
        self.register(RouteMethod::Verb(method), path, handlers.into_handlers())
    }

    /// Registers middleware under `prefix` without panicking.
    ///
    /// # Errors
    /// Same as [`try_add`](Self::try_add).
    #[inline]
    pub fn try_middleware_at(
        &self,
        prefix: &str,
        handlers: impl IntoHandlers,
    ) -> Result<Arc<Route>, RouteError> {
        self.register(RouteMethod::Use, prefix, handlers.into_handlers())
    }

    /// Registers a route for one method.
    ///
    /// # Panics
    /// On an empty handler list or a malformed pattern; the problem is
    /// logged first. Use [`try_add`](Self::try_add) to handle it instead.
    #[track_caller]
    #[inline]
    pub fn add(&self, method: Method, path: &str, handlers: impl IntoHandlers) -> Arc<Route> {
        self.register_or_panic(RouteMethod::Verb(method), path, handlers.into_handlers())
    }

    /// Registers middleware for every method and path.
    ///
    /// Same as [`middleware_at("/", ..)`](Self::middleware_at).
    #[track_caller]
    #[inline]
    pub fn middleware(&self, handlers: impl IntoHandlers) -> Arc<Route> {
        self.middleware_at("/", handlers)
    }

    /// Registers middleware for every method on paths starting with the
    /// whole segments of `prefix`: `/api` covers `/api` and `/api/users`
    /// but not `/apis`.
    ///
    /// Middleware is ordered with all other routes by registration.
    ///
    /// # Panics
    /// Same as [`add`](Self::add).
    #[track_caller]
    #[inline]
    pub fn middleware_at(&self, prefix: &str, handlers: impl IntoHandlers) -> Arc<Route> {
        self.register_or_panic(RouteMethod::Use, prefix, handlers.into_handlers())
    }

    verb_methods! {
        /// Registers a `GET` route; it also answers `HEAD`.
        get => Get;
        /// Registers a `HEAD` route.
        head => Head;
        post => Post;
        put => Put;
        delete => Delete;
        connect => Connect;
        options => Options;
        trace => Trace;
        patch => Patch;
    }

    /// Registers the same chain for every method, one route each.
    #[track_caller]
    pub fn all(&self, path: &str, handlers: impl IntoHandlers) -> Vec<Arc<Route>> {
        let handlers = handlers.into_handlers();
        Method::ALL
            .iter()
            .map(|&method| self.add(method, path, handlers.clone()))
            .collect()
    }

    /// Opens a group of routes sharing `prefix`.
    ///
    /// Non-empty `handlers` are registered as middleware on the prefix.
    ///
    /// # Examples
    /// ```
    /// use maker_router::{handler, App, Method, Request};
    ///
    /// let app = App::new();
    /// let api = app.group("/api", handler(|ctx| {
    ///     ctx.set("x-api", "1");
    ///     ctx.next()
    /// }));
    /// let v1 = api.group("/v1", ());
    /// v1.get("/users", handler(|ctx| ctx.send("users")));
    ///
    /// let resp = app.handle(&Request::new(Method::Get, "/api/v1/users"));
    /// assert_eq!(resp.body_bytes(), b"users");
    /// assert_eq!(resp.header("x-api"), Some("1"));
    /// ```
    #[track_caller]
    pub fn group(&self, prefix: &str, handlers: impl IntoHandlers) -> Group<'_> {
        let handlers = handlers.into_handlers();
        if !handlers.is_empty() {
            self.middleware_at(prefix, handlers);
        }
        Group::new(self, path::join(prefix, ""))
    }

    /// Serves files below `prefix` through `root`.
    ///
    /// Registers `GET` (and so `HEAD`) on `prefix/*`. When `root` reports a
    /// file as missing or forbidden, the response is cleared and dispatch
    /// moves on to the next matching route.
    ///
    /// # Examples
    /// ```
    /// use maker_router::{App, Dir, StaticOptions};
    ///
    /// let app = App::new();
    /// let route = app.static_files("/assets", Dir::new("./public"), StaticOptions::default());
    /// assert_eq!(route.pattern(), "/assets/*");
    /// ```
    #[track_caller]
    pub fn static_files<F: FileServer>(
        &self,
        prefix: &str,
        root: F,
        options: StaticOptions,
    ) -> Arc<Route> {
        let prefix = prefix.strip_suffix('*').unwrap_or(prefix);
        let pattern = path::join(prefix, path::WILDCARD);
        self.get(&pattern, crate::fs::static_handler(root, options))
    }
}

/// Builder for configuring and creating [`App`] instances.
pub struct AppBuilder {
    settings: Option<Settings>,
    error_handler: Option<ErrorHandler>,
}

impl AppBuilder {
    /// Sets the application [`Settings`]; zero sizes fall back to defaults.
    #[inline(always)]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replaces the default error handler.
    ///
    /// The handler is called at most once per dispatch, with the first error
    /// raised by a handler, or the `404` when no route matched.
    #[inline(always)]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Ctx<'_>, Error) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Finalizes the builder and constructs an [`App`] instance.
    pub fn build(self) -> App {
        let settings = self.settings.unwrap_or_default().normalized();

        App {
            pool: CtxPool::new(settings.ctx_pool_size),
            settings,
            table: ArcSwap::from_pointee(RouteTable::default()),
            registry: Mutex::new(Registry::default()),
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(dispatch::default_error_handler)),
        }
    }
}
