//! Static file serving boundary.
//!
//! The router only registers the catch-all route and delegates to a
//! [`FileServer`]. Compression, byte ranges and directory listings belong to
//! the file server; [`Dir`] is a minimal one that reads files from disk.

use crate::{
    errors::Error,
    router::{
        path::WILDCARD,
        route::{handler, Handler},
    },
    Ctx, Method,
};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, trace};

/// Options handed to the [`FileServer`] on every request.
///
/// # Examples
/// ```
/// use maker_router::StaticOptions;
///
/// let options = StaticOptions {
///     browse: true,
///     ..StaticOptions::default() // Required line
/// };
/// assert_eq!(options.index, "index.html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticOptions {
    /// Serve compressed variants when the client accepts them (default: `false`).
    pub compress: bool,
    /// Honour `Range` requests (default: `false`).
    pub byte_range: bool,
    /// List directories without an index file (default: `false`).
    pub browse: bool,
    /// File served for a directory (default: `"index.html"`).
    pub index: String,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            compress: false,
            byte_range: false,
            browse: false,
            index: "index.html".to_string(),
        }
    }
}

/// Result of a [`FileServer::serve`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// The response was written.
    Done,
    /// No such file; the router tries the next route.
    NotFound,
    /// The path may not be served; the router tries the next route.
    Forbidden,
}

/// Resolves request paths to files and writes them into the response.
pub trait FileServer: Send + Sync + 'static {
    /// Serves `path`, the part of the request path below the static prefix
    /// (no leading slash, possibly empty).
    ///
    /// # Errors
    /// Failures other than a missing or forbidden file; they reach the
    /// error handler.
    fn serve(&self, ctx: &mut Ctx<'_>, path: &str, options: &StaticOptions)
        -> Result<Served, Error>;
}

pub(crate) fn static_handler<F: FileServer>(root: F, options: StaticOptions) -> Handler {
    handler(move |ctx| {
        let path = ctx.param(WILDCARD).unwrap_or_default();

        match root.serve(ctx, path, &options)? {
            Served::Done => Ok(()),
            outcome => {
                trace!(path, ?outcome, "static file unavailable, falling through");
                ctx.response().clear();
                ctx.next()
            }
        }
    })
}

/// Serves files from a directory on disk.
///
/// Paths containing `..` are refused, directories are answered with
/// [`StaticOptions::index`]. Compression, ranges and listings are not
/// implemented and those options are ignored. Reads are blocking.
///
/// # Examples
/// ```no_run
/// use maker_router::{App, Dir, StaticOptions};
///
/// let app = App::new();
/// app.static_files("/", Dir::new("./public"), StaticOptions::default());
/// ```
#[derive(Debug, Clone)]
pub struct Dir {
    root: PathBuf,
}

impl Dir {
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a request path below the root, `None` if it tries to leave it.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();

        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." || segment.contains('\\') || segment.contains('\0') {
                return None;
            }

            match Path::new(segment).components().next() {
                Some(Component::Normal(_)) => resolved.push(segment),
                _ => return None,
            }
        }
        Some(resolved)
    }

    fn content_type(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("html" | "htm") => "text/html; charset=utf-8",
            Some("css") => "text/css; charset=utf-8",
            Some("js" | "mjs") => "text/javascript; charset=utf-8",
            Some("json") => "application/json",
            Some("txt") => "text/plain; charset=utf-8",
            Some("xml") => "application/xml",
            Some("svg") => "image/svg+xml",
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("ico") => "image/x-icon",
            Some("wasm") => "application/wasm",
            Some("pdf") => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

impl FileServer for Dir {
    fn serve(
        &self,
        ctx: &mut Ctx<'_>,
        path: &str,
        options: &StaticOptions,
    ) -> Result<Served, Error> {
        if !matches!(ctx.method(), Method::Get | Method::Head) {
            return Ok(Served::NotFound);
        }

        let Some(mut file) = self.resolve(path) else {
            debug!(path, "static path escapes the root");
            return Ok(Served::Forbidden);
        };

        if file.is_dir() {
            if options.index.is_empty() {
                return Ok(Served::Forbidden);
            }
            file.push(&options.index);
        }

        match fs::read(&file) {
            Ok(content) => {
                ctx.set("content-type", Self::content_type(&file))
                    .send(content)?;
                Ok(Served::Done)
            }
            Err(err) => match err.kind() {
                io::ErrorKind::NotFound => Ok(Served::NotFound),
                io::ErrorKind::PermissionDenied => Ok(Served::Forbidden),
                _ => Err(err.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tools::body, App, Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Temporary directory removed on drop.
    struct Fixture(PathBuf);

    impl Fixture {
        fn new(name: &str) -> Self {
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            let dir = std::env::temp_dir().join(format!(
                "maker_router_{name}_{}_{}",
                std::process::id(),
                COUNTER.fetch_add(1, Ordering::SeqCst)
            ));

            fs::create_dir_all(dir.join("docs")).unwrap();
            fs::write(dir.join("hello.txt"), "hello file").unwrap();
            fs::write(dir.join("docs/index.html"), "<h1>docs</h1>").unwrap();
            Self(dir)
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn resolve_rejects_escapes() {
        let dir = Dir::new("/srv/www");

        assert_eq!(dir.resolve(""), Some(PathBuf::from("/srv/www")));
        assert_eq!(dir.resolve("a/./b"), Some(PathBuf::from("/srv/www/a/b")));
        assert_eq!(dir.resolve("a//b/"), Some(PathBuf::from("/srv/www/a/b")));
        assert_eq!(dir.resolve("../etc/passwd"), None);
        assert_eq!(dir.resolve("a/../../x"), None);
        assert_eq!(dir.resolve("a\\..\\x"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(Dir::content_type(Path::new("a.HTML")), "text/html; charset=utf-8");
        assert_eq!(Dir::content_type(Path::new("a.png")), "image/png");
        assert_eq!(Dir::content_type(Path::new("Makefile")), "application/octet-stream");
    }

    #[test]
    fn serves_files_and_index() {
        let fixture = Fixture::new("serve");
        let app = App::new();
        app.static_files("/static", Dir::new(&fixture.0), StaticOptions::default());

        let resp = app.handle(&Request::new(Method::Get, "/static/hello.txt"));
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(body(&resp), "hello file");
        assert_eq!(resp.header("content-type"), Some("text/plain; charset=utf-8"));

        let resp = app.handle(&Request::new(Method::Head, "/static/hello.txt"));
        assert_eq!(resp.status_code(), StatusCode::Ok);

        let resp = app.handle(&Request::new(Method::Get, "/static/docs/"));
        assert_eq!(body(&resp), "<h1>docs</h1>");
    }

    #[test]
    fn missing_files_fall_through() {
        let fixture = Fixture::new("fallthrough");
        let app = App::new();
        app.static_files("/", Dir::new(&fixture.0), StaticOptions::default());
        app.get("/api/status", handler(|ctx| ctx.send("up")));

        let resp = app.handle(&Request::new(Method::Get, "/hello.txt"));
        assert_eq!(body(&resp), "hello file");

        let resp = app.handle(&Request::new(Method::Get, "/api/status"));
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(resp.header("content-type"), None);
        assert_eq!(body(&resp), "up");

        let resp = app.handle(&Request::new(Method::Get, "/nothing.css"));
        assert_eq!(resp.status_code(), StatusCode::NotFound);
        assert_eq!(body(&resp), "Cannot GET /nothing.css");
    }

    #[test]
    fn forbidden_falls_through() {
        struct Locked;

        impl FileServer for Locked {
            fn serve(&self, ctx: &mut Ctx<'_>, _: &str, _: &StaticOptions) -> Result<Served, Error> {
                ctx.status(StatusCode::Forbidden).set("x-partial", "1");
                ctx.send("half-written")?;
                Ok(Served::Forbidden)
            }
        }

        let app = App::new();
        app.static_files("/vault", Locked, StaticOptions::default());
        app.get("/vault/*", handler(|ctx| ctx.send("fallback")));

        let resp = app.handle(&Request::new(Method::Get, "/vault/gold"));
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(resp.header("x-partial"), None);
        assert_eq!(body(&resp), "fallback");
    }

    #[test]
    fn options_reach_server() {
        struct Echo;

        impl FileServer for Echo {
            fn serve(&self, ctx: &mut Ctx<'_>, path: &str, opts: &StaticOptions) -> Result<Served, Error> {
                ctx.send(format!("{path}|{}|{}", opts.compress, opts.index))?;
                Ok(Served::Done)
            }
        }

        let app = App::new();
        let options = StaticOptions {
            compress: true,
            index: "home.html".to_string(),
            ..StaticOptions::default()
        };
        app.static_files("/files", Echo, options);

        let resp = app.handle(&Request::new(Method::Get, "/files/a/b.txt"));
        assert_eq!(body(&resp), "a/b.txt|true|home.html");

        let resp = app.handle(&Request::new(Method::Get, "/files"));
        assert_eq!(body(&resp), "|true|home.html");
    }
}
