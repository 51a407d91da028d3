use crate::{
    app::App,
    errors::{Error, TransportFault},
    http::{request::Request, response::Response},
    Ctx,
};
use tracing::{debug, trace};

/// Writes the error code as the status and its message as a plain-text body.
pub fn default_error_handler(ctx: &mut Ctx<'_>, err: Error) {
    ctx.status(err.code())
        .set("content-type", "text/plain; charset=utf-8");
    let _ = ctx.send(err.message());
}

impl App {
    /// Dispatches one request and returns the finished response.
    #[inline]
    pub fn handle(&self, request: &Request) -> Response {
        let mut response = Response::new();
        self.handle_into(request, &mut response);
        response
    }

    /// Dispatches one request into a reused response builder.
    ///
    /// The builder is reset first. Routes of the request's method are tried
    /// in registration order; when the chain ends with an error (or nothing
    /// matches) the error handler runs exactly once. A request cancelled by
    /// the transport stops before the next handler and skips the error
    /// handler. The response is then [aborted](Response::is_aborted) unless
    /// it was already [committed](Response::commit). A cancellation arriving
    /// after the last handler returned is ignored.
    ///
    /// # Examples
    /// ```
    /// use maker_router::{handler, App, Method, Request, Response};
    ///
    /// let app = App::new();
    /// app.get("/", handler(|ctx| ctx.send("root")));
    ///
    /// let mut resp = Response::new();
    /// for _ in 0..3 {
    ///     app.handle_into(&Request::new(Method::Get, "/"), &mut resp);
    ///     assert_eq!(resp.body_bytes(), b"root");
    /// }
    /// ```
    pub fn handle_into(&self, request: &Request, response: &mut Response) {
        response.reset(self.settings.write_buffer_size);

        let table = self.table.load_full();
        let mut ctx = Ctx::new(
            &table,
            &self.settings,
            request,
            response,
            self.pool.acquire(),
        );

        trace!(method = %request.method(), path = request.path(), "dispatch");
        let result = match ctx.check_cancelled() {
            true => Ok(()),
            false => ctx.next_route(),
        };
        let err = ctx.take_error().or(result.err());

        if ctx.cancel_observed() {
            match ctx.response().is_committed() {
                false => {
                    debug!(path = request.path(), "dispatch cancelled, response aborted");
                    ctx.response().abort();
                }
                true => debug!(path = request.path(), "dispatch cancelled after commit"),
            }
        } else if let Some(err) = err {
            debug!(
                code = err.code().as_u16(),
                message = err.message(),
                "escalating to error handler"
            );
            (self.error_handler)(&mut ctx, err);
        }

        self.pool.release(ctx.into_core());
    }

    /// Reports a fault raised by the transport before routing.
    ///
    /// The fault goes through the same error handler as routing errors, with
    /// an empty request in the context.
    ///
    /// # Examples
    /// ```
    /// use maker_router::{App, StatusCode, TransportFault};
    ///
    /// let resp = App::new().handle_fault(TransportFault::BodyTooLarge);
    /// assert_eq!(resp.status_code(), StatusCode::PayloadTooLarge);
    /// assert_eq!(resp.body_bytes(), b"Payload Too Large");
    /// ```
    pub fn handle_fault(&self, fault: TransportFault) -> Response {
        let request = Request::default();
        let mut response = Response::new();

        let table = self.table.load_full();
        let mut ctx = Ctx::new(
            &table,
            &self.settings,
            &request,
            &mut response,
            self.pool.acquire(),
        );

        debug!(%fault, "transport fault");
        (self.error_handler)(&mut ctx, fault.into());

        self.pool.release(ctx.into_core());
        response
    }
}


#[cfg(test)]
mod ordering_tests {
    use crate::{handler, tools::body, App, Method, Request, Settings, StatusCode};

    #[test]
    fn first_match_wins() {
        let app = App::new();
        app.get("/users/*", handler(|ctx| ctx.send("broad")));
        app.get("/users/:id", handler(|ctx| ctx.send("specific")));
        app.get("/users/me", handler(|ctx| ctx.send("exact")));

        for path in ["/users/me", "/users/7", "/users/a/b"] {
            assert_eq!(body(&app.handle(&Request::new(Method::Get, path))), "broad");
        }
    }

    #[test]
    fn same_request_same_result() {
        let app = App::new();
        app.get(
            "/:a/x/:b",
            handler(|ctx| {
                let params: Vec<_> = ctx.params().map(|(k, v)| format!("{k}:{v}")).collect();
                let pos = ctx.route().map(|r| r.position()).unwrap_or_default();
                ctx.send(format!("{pos} {}", params.join(" ")))
            }),
        );

        let req = Request::new(Method::Get, "/one/x/two");
        let first = app.handle(&req);
        let second = app.handle(&req);
        assert_eq!(first, second);
        assert_eq!(body(&first), "0 a:one b:two");
    }

    #[test]
    fn fallthrough_then_not_found() {
        let app = App::new();
        app.get(
            "/files/:name",
            handler(|ctx| {
                ctx.set("x-first", ctx.param("name").unwrap_or_default().to_string());
                ctx.next()
            }),
        );
        app.get(
            "/files/*",
            handler(|ctx| {
                // Fresh bindings from this route's own pattern
                assert_eq!(ctx.param("name"), None);
                ctx.set("x-second", ctx.param("*").unwrap_or_default().to_string());
                ctx.next()
            }),
        );

        let resp = app.handle(&Request::new(Method::Get, "/files/report.pdf"));
        assert_eq!(resp.header("x-first"), Some("report.pdf"));
        assert_eq!(resp.header("x-second"), Some("report.pdf"));
        assert_eq!(resp.status_code(), StatusCode::NotFound);
        assert_eq!(body(&resp), "Cannot GET /files/report.pdf");
    }

    #[test]
    fn fallthrough_skips_non_matching() {
        let app = App::new();
        app.middleware(handler(|ctx| {
            ctx.set("x-mw", "all");
            ctx.next()
        }));
        app.get("/a", handler(|ctx| ctx.send("a")));
        app.post("/b", handler(|ctx| ctx.send("post b")));
        app.get("/b", handler(|ctx| ctx.send("get b")));

        let resp = app.handle(&Request::new(Method::Get, "/b"));
        assert_eq!(resp.header("x-mw"), Some("all"));
        assert_eq!(body(&resp), "get b");
    }

    #[test]
    fn middleware_order_is_registration_order() {
        let app = App::new();
        app.get("/early", handler(|ctx| ctx.send("early")));
        app.middleware(handler(|ctx| {
            ctx.set("x-late", "1");
            ctx.next()
        }));
        app.get("/late", handler(|ctx| ctx.send("late")));

        let resp = app.handle(&Request::new(Method::Get, "/early"));
        assert_eq!(resp.header("x-late"), None);

        let resp = app.handle(&Request::new(Method::Get, "/late"));
        assert_eq!(resp.header("x-late"), Some("1"));
    }

    #[test]
    fn head_follows_get() {
        let app = App::new();
        app.get("/doc", handler(|ctx| ctx.send("doc")));
        app.head("/only-head", handler(|ctx| ctx.send_status(StatusCode::NoContent)));

        let resp = app.handle(&Request::new(Method::Head, "/doc"));
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(body(&resp), "doc");

        let resp = app.handle(&Request::new(Method::Get, "/only-head"));
        assert_eq!(resp.status_code(), StatusCode::NotFound);

        let resp = app.handle(&Request::new(Method::Post, "/doc"));
        assert_eq!(body(&resp), "Cannot POST /doc");
    }

    #[test]
    fn case_and_strict_settings() {
        let loose = App::new();
        let strict = App::builder()
            .settings(Settings {
                case_sensitive: true,
                strict_routing: true,
                ..Settings::default()
            })
            .build();

        for app in [&loose, &strict] {
            app.get("/Foo", handler(|ctx| ctx.send("foo")));
            app.get("/bar", handler(|ctx| ctx.send("bar")));
        }

        let status = |app: &App, path| app.handle(&Request::new(Method::Get, path)).status_code();

        assert_eq!(status(&loose, "/foo"), StatusCode::Ok);
        assert_eq!(status(&loose, "/bar/"), StatusCode::Ok);
        assert_eq!(status(&strict, "/foo"), StatusCode::NotFound);
        assert_eq!(status(&strict, "/Foo"), StatusCode::Ok);
        assert_eq!(status(&strict, "/bar/"), StatusCode::NotFound);
    }

    #[test]
    fn strict_middleware_prefix_with_slash() {
        let app = App::builder()
            .settings(Settings {
                strict_routing: true,
                ..Settings::default()
            })
            .build();

        app.middleware_at("/api/", handler(|ctx| {
            ctx.set("x-mw", "1");
            ctx.next()
        }));
        app.get("/api/ping", handler(|ctx| ctx.send("pong")));

        let resp = app.handle(&Request::new(Method::Get, "/api/ping"));
        assert_eq!(resp.header("x-mw"), Some("1"));
        assert_eq!(body(&resp), "pong");
    }

    #[test]
    fn query_is_not_part_of_path() {
        let app = App::new();
        app.get("/search", handler(|ctx| ctx.send(ctx.query().unwrap_or_default().to_string())));

        let resp = app.handle(&Request::new(Method::Get, "/search?q=rust"));
        assert_eq!(body(&resp), "q=rust");
    }
}


#[cfg(test)]
mod concurrency_tests {
    use crate::{handler, tools::body, App, Method, Request};
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_dispatch_is_isolated() {
        let app = Arc::new(App::new());
        app.middleware_at(
            "/users",
            handler(|ctx| {
                ctx.set("x-seen", "1");
                ctx.next()
            }),
        );
        app.get(
            "/users/:id/posts/:post",
            handler(|ctx| {
                let id = ctx.param("id").unwrap_or_default();
                let post = ctx.param("post").unwrap_or_default();
                ctx.send(format!("{id}-{post}"))
            }),
        );

        let mut tasks = Vec::new();
        for task in 0..16 {
            let app = Arc::clone(&app);
            tasks.push(tokio::spawn(async move {
                for i in 0..200 {
                    let path = format!("/users/{task}/posts/{i}");
                    let resp = app.handle(&Request::new(Method::Get, path));
                    assert_eq!(body(&resp), format!("{task}-{i}"));
                    assert_eq!(resp.header("x-seen"), Some("1"));
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
    }
}
