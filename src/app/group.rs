use crate::{
    app::{verb_methods, App},
    fs::{FileServer, StaticOptions},
    router::{path, route::IntoHandlers, route::Route},
    Method,
};
use std::sync::Arc;

/// Routes sharing a path prefix, created by [`App::group`].
///
/// Every path given to a group is joined onto its prefix; groups nest.
#[derive(Clone)]
pub struct Group<'a> {
    app: &'a App,
    prefix: String,
}

impl<'a> Group<'a> {
    #[inline]
    pub(crate) fn new(app: &'a App, prefix: String) -> Self {
        Self { app, prefix }
    }

    #[inline(always)]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers middleware on the group prefix.
    #[track_caller]
    #[inline]
    pub fn middleware(&self, handlers: impl IntoHandlers) -> Arc<Route> {
        self.app.middleware_at(&self.prefix, handlers)
    }

    /// Registers middleware on `prefix` below the group prefix.
    #[track_caller]
    #[inline]
    pub fn middleware_at(&self, prefix: &str, handlers: impl IntoHandlers) -> Arc<Route> {
        self.app.middleware_at(&path::join(&self.prefix, prefix), handlers)
    }

    #[track_caller]
    #[inline]
    pub fn add(&self, method: Method, path: &str, handlers: impl IntoHandlers) -> Arc<Route> {
        self.app.add(method, &path::join(&self.prefix, path), handlers)
    }

    verb_methods! {
        get => Get;
        head => Head;
        post => Post;
        put => Put;
        delete => Delete;
        connect => Connect;
        options => Options;
        trace => Trace;
        patch => Patch;
    }

    #[track_caller]
    pub fn all(&self, path: &str, handlers: impl IntoHandlers) -> Vec<Arc<Route>> {
        self.app.all(&path::join(&self.prefix, path), handlers)
    }

    /// Opens a nested group.
    #[track_caller]
    pub fn group(&self, prefix: &str, handlers: impl IntoHandlers) -> Group<'a> {
        self.app.group(&path::join(&self.prefix, prefix), handlers)
    }

    #[track_caller]
    pub fn static_files<F: FileServer>(
        &self,
        prefix: &str,
        root: F,
        options: StaticOptions,
    ) -> Arc<Route> {
        self.app
            .static_files(&path::join(&self.prefix, prefix), root, options)
    }
}

#[cfg(test)]
mod tests {
    use crate::{handler, tools::body, App, Method, Request};

    #[test]
    fn prefixes_join() {
        let app = App::new();
        let api = app.group("/api/", ());
        let v2 = api.group("v2", ());

        api.get("/status", handler(|ctx| ctx.send("ok")));
        v2.post("/items/:id", handler(|ctx| ctx.send(ctx.path().to_string())));
        v2.get("", handler(|ctx| ctx.send("v2 root")));

        let patterns: Vec<_> = app.routes().iter().map(|r| r.pattern().to_string()).collect();
        assert_eq!(patterns, ["/api/status", "/api/v2/items/:id", "/api/v2"]);
        assert_eq!(v2.prefix(), "/api/v2");

        let resp = app.handle(&Request::new(Method::Post, "/api/v2/items/7"));
        assert_eq!(body(&resp), "/api/v2/items/7");
        assert_eq!(body(&app.handle(&Request::new(Method::Get, "/api/v2/"))), "v2 root");
    }

    #[test]
    fn group_middleware_is_scoped() {
        let app = App::new();
        let admin = app.group(
            "/admin",
            handler(|ctx| {
                ctx.set("x-admin", "yes");
                ctx.next()
            }),
        );
        admin.get("/panel", handler(|ctx| ctx.send("panel")));
        admin.middleware_at(
            "/secret",
            handler(|ctx| ctx.send_status(crate::StatusCode::Unauthorized)),
        );
        admin.get("/secret/data", handler(|ctx| ctx.send("leaked")));
        app.get("/public", handler(|ctx| ctx.send("public")));

        let resp = app.handle(&Request::new(Method::Get, "/admin/panel"));
        assert_eq!(resp.header("x-admin"), Some("yes"));
        assert_eq!(body(&resp), "panel");

        let resp = app.handle(&Request::new(Method::Get, "/admin/secret/data"));
        assert_eq!(resp.status_code().as_u16(), 401);
        assert_eq!(body(&resp), "Unauthorized");

        let resp = app.handle(&Request::new(Method::Get, "/public"));
        assert_eq!(resp.header("x-admin"), None);
    }
}
