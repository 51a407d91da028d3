//! Application settings
//!
//! Settings are fixed when the [`App`](crate::App) is built. Two fields change
//! how patterns are compiled ([`strict_routing`](Settings::strict_routing) and
//! [`case_sensitive`](Settings::case_sensitive)); the rest are handed to the
//! transport through [`TransportConfig`] and never touch the dispatch path.
//!
//! # Examples
//!
//! ```
//! use maker_router::{App, Settings};
//!
//! let app = App::builder()
//!     .settings(Settings {
//!         strict_routing: true,
//!         body_limit: 16 * 1024,
//!         ..Settings::default() // Required line
//!     })
//!     .build();
//!
//! assert!(app.settings().strict_routing);
//! ```
//!
//! Loading from TOML (every key is optional):
//! ```
//! use maker_router::Settings;
//!
//! let settings = Settings::from_toml_str(r#"
//!     case_sensitive = true
//!     server_header = "maker"
//! "#).unwrap();
//!
//! assert!(settings.case_sensitive);
//! assert_eq!(settings.body_limit, 4 * 1024 * 1024);
//! ```

use crate::errors::SettingsError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Routing behaviour and transport parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Value of the `Server` response header, empty to omit it (default: `""`).
    pub server_header: String,

    /// Treat `/foo` and `/foo/` as different paths (default: `false`).
    pub strict_routing: bool,

    /// Treat `/FoO` and `/foo` as different paths (default: `false`).
    ///
    /// Only literal segments are folded; parameter values keep the case
    /// the client sent.
    pub case_sensitive: bool,

    /// Ask the transport to hand out owned copies of request data instead of
    /// views into its reusable buffers (default: `false`).
    ///
    /// Views handed to handlers by this crate are already bounded by the
    /// request's lifetime, so this only matters to the transport.
    pub immutable: bool,

    /// Generate `ETag` headers in the transport (default: `false`).
    pub etag: bool,

    /// Maximum accepted body size in bytes (default: `4 MiB`).
    pub body_limit: usize,

    /// Maximum number of concurrent connections (default: `262144`).
    pub concurrency: usize,

    /// Close connections after the first response (default: `false`).
    pub disable_keepalive: bool,

    /// Omit the default `Date` header (default: `false`).
    pub disable_default_date: bool,

    /// Omit the default `Content-Type` header (default: `false`).
    pub disable_default_content_type: bool,

    /// Keep header names exactly as sent (default: `false`).
    pub disable_header_normalizing: bool,

    /// Time allowed to read a full request (default: unlimited).
    pub read_timeout: Option<Duration>,

    /// Time allowed to write a full response (default: unlimited).
    pub write_timeout: Option<Duration>,

    /// Time to wait for the next keep-alive request (default: `read_timeout`).
    pub idle_timeout: Option<Duration>,

    /// Per-connection read buffer; also bounds the header size (default: `4096`).
    pub read_buffer_size: usize,

    /// Per-connection write buffer (default: `4096`).
    pub write_buffer_size: usize,

    /// Suffix used by file servers that cache compressed files (default: `".maker.gz"`).
    pub compressed_file_suffix: String,

    /// Number of idle request contexts kept for reuse (default: `1024`).
    pub ctx_pool_size: usize,
}

impl Settings {
    pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;
    pub const DEFAULT_CONCURRENCY: usize = 256 * 1024;
    pub const DEFAULT_BUFFER_SIZE: usize = 4096;
    pub const DEFAULT_COMPRESSED_SUFFIX: &'static str = ".maker.gz";
    pub const DEFAULT_CTX_POOL_SIZE: usize = 1024;

    /// Parses settings from a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(src)?;
        Ok(settings.normalized())
    }

    /// Reads and parses a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Replaces zero sizes and empty suffixes with their defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if self.body_limit == 0 {
            self.body_limit = Self::DEFAULT_BODY_LIMIT;
        }
        if self.concurrency == 0 {
            self.concurrency = Self::DEFAULT_CONCURRENCY;
        }
        if self.read_buffer_size == 0 {
            self.read_buffer_size = Self::DEFAULT_BUFFER_SIZE;
        }
        if self.write_buffer_size == 0 {
            self.write_buffer_size = Self::DEFAULT_BUFFER_SIZE;
        }
        if self.compressed_file_suffix.is_empty() {
            self.compressed_file_suffix = Self::DEFAULT_COMPRESSED_SUFFIX.to_string();
        }
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_header: String::new(),
            strict_routing: false,
            case_sensitive: false,
            immutable: false,
            etag: false,
            body_limit: Self::DEFAULT_BODY_LIMIT,
            concurrency: Self::DEFAULT_CONCURRENCY,
            disable_keepalive: false,
            disable_default_date: false,
            disable_default_content_type: false,
            disable_header_normalizing: false,
            read_timeout: None,
            write_timeout: None,
            idle_timeout: None,
            read_buffer_size: Self::DEFAULT_BUFFER_SIZE,
            write_buffer_size: Self::DEFAULT_BUFFER_SIZE,
            compressed_file_suffix: Self::DEFAULT_COMPRESSED_SUFFIX.to_string(),
            ctx_pool_size: Self::DEFAULT_CTX_POOL_SIZE,
        }
    }
}

/// Snapshot of the transport-facing settings, produced by [`App::init`](crate::App::init).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// `None` when no `Server` header should be sent.
    pub server_name: Option<String>,
    pub concurrency: usize,
    pub max_request_body_size: usize,
    pub keep_alive: bool,
    pub immutable: bool,
    pub etag: bool,
    pub default_date: bool,
    pub default_content_type: bool,
    pub normalize_header_names: bool,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
}

impl From<&Settings> for TransportConfig {
    fn from(s: &Settings) -> Self {
        Self {
            server_name: (!s.server_header.is_empty()).then(|| s.server_header.clone()),
            concurrency: s.concurrency,
            max_request_body_size: s.body_limit,
            keep_alive: !s.disable_keepalive,
            immutable: s.immutable,
            etag: s.etag,
            default_date: !s.disable_default_date,
            default_content_type: !s.disable_default_content_type,
            normalize_header_names: !s.disable_header_normalizing,
            read_timeout: s.read_timeout,
            write_timeout: s.write_timeout,
            idle_timeout: s.idle_timeout.or(s.read_timeout),
            read_buffer_size: s.read_buffer_size,
            write_buffer_size: s.write_buffer_size,
        }
    }
}
