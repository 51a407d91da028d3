//! Route pattern compilation and matching.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! | Segment | Matches                                        | Bound as |
//! |---------|------------------------------------------------|----------|
//! | `users` | exactly that text                              | -        |
//! | `:id`   | one non-empty segment                          | `id`     |
//! | `*`     | the rest of the path, possibly empty (last only) | `*`    |
//!
//! Patterns are compiled once at registration; matching only walks the path
//! and records byte ranges, so a dispatch never allocates here.

use crate::errors::RouteError;
use memchr::memchr;
use std::ops::Range;

/// Reserved parameter name of the trailing wildcard.
pub const WILDCARD: &str = "*";

/// How a pattern is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchOptions {
    /// Literal segments must match case exactly.
    pub case_sensitive: bool,
    /// A trailing slash is significant.
    pub strict: bool,
    /// The pattern only has to match a leading run of whole segments.
    pub prefix: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(Box<str>),
    Param,
    Wildcard,
}

/// A compiled route pattern.
///
/// # Examples
/// ```
/// use maker_router::router::{MatchOptions, PathMatcher};
///
/// let matcher = PathMatcher::compile("/users/:id/*", MatchOptions::default()).unwrap();
/// let mut params = Vec::new();
///
/// let path = "/USERS/42/avatar/big.png";
/// assert!(matcher.matches(path, &mut params));
/// assert_eq!(&path[params[0].clone()], "42");
/// assert_eq!(&path[params[1].clone()], "avatar/big.png");
/// assert_eq!(matcher.param_names(), ["id", "*"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    segments: Vec<Segment>,
    names: Vec<String>,
    options: MatchOptions,
}

impl PathMatcher {
    /// Compiles `pattern`.
    ///
    /// An empty pattern is the root `/` and a missing leading slash is added.
    /// Prefix patterns drop trailing slashes even in strict mode.
    ///
    /// # Errors
    /// - [`RouteError::MisplacedWildcard`] when `*` is not the last segment
    /// - [`RouteError::EmptyParamName`] for a bare `:`
    /// - [`RouteError::DuplicateParam`] when a name is bound twice
    pub fn compile(pattern: &str, options: MatchOptions) -> Result<Self, RouteError> {
        let normalized = normalize_pattern(pattern, options.strict && !options.prefix);

        let mut segments = Vec::new();
        let mut names: Vec<String> = Vec::new();

        let bind = |name: &str, names: &mut Vec<String>| {
            if names.iter().any(|n| n == name) {
                return Err(RouteError::DuplicateParam {
                    path: normalized.clone(),
                    name: name.to_string(),
                });
            }
            names.push(name.to_string());
            Ok(())
        };

        let rest = &normalized[1..];
        if !rest.is_empty() {
            let raw: Vec<&str> = rest.split('/').collect();
            let last = raw.len() - 1;

            for (i, part) in raw.into_iter().enumerate() {
                if part == WILDCARD {
                    if i != last {
                        return Err(RouteError::MisplacedWildcard(normalized.clone()));
                    }
                    bind(WILDCARD, &mut names)?;
                    segments.push(Segment::Wildcard);
                } else if let Some(name) = part.strip_prefix(':') {
                    if name.is_empty() {
                        return Err(RouteError::EmptyParamName(normalized.clone()));
                    }
                    bind(name, &mut names)?;
                    segments.push(Segment::Param);
                } else if options.case_sensitive {
                    segments.push(Segment::Literal(part.into()));
                } else {
                    segments.push(Segment::Literal(part.to_ascii_lowercase().into()));
                }
            }
        }

        Ok(Self {
            segments,
            names,
            options,
        })
    }

    /// Tests `path` and writes one byte range per parameter into `params`,
    /// in the order of [`param_names`](Self::param_names).
    ///
    /// `params` is cleared first; on failure its content is unspecified.
    /// Ranges index into `path` itself.
    pub fn matches(&self, path: &str, params: &mut Vec<Range<usize>>) -> bool {
        params.clear();

        let bytes = path.as_bytes();
        if bytes.first() != Some(&b'/') {
            return false;
        }

        let end = match self.options.strict {
            true => bytes.len(),
            false => trimmed_len(bytes),
        };
        // Start of the next unread segment, `None` once the path is consumed
        let mut cursor = (end > 1).then_some(1);

        for segment in &self.segments {
            let start = match (segment, cursor) {
                (Segment::Wildcard, _) => {
                    params.push(cursor.unwrap_or(end)..end);
                    return true;
                }
                (_, None) => return false,
                (_, Some(start)) => start,
            };
            let stop = memchr(b'/', &bytes[start..end]).map_or(end, |i| start + i);
            cursor = (stop < end).then_some(stop + 1);

            let value = &path[start..stop];
            match segment {
                Segment::Literal(literal) if self.options.case_sensitive => {
                    if value != &**literal {
                        return false;
                    }
                }
                Segment::Literal(literal) => {
                    if !value.eq_ignore_ascii_case(literal) {
                        return false;
                    }
                }
                Segment::Param => {
                    if value.is_empty() {
                        return false;
                    }
                    params.push(start..stop);
                }
                Segment::Wildcard => {}
            }
        }

        self.options.prefix || cursor.is_none()
    }

    /// Parameter names in binding order; the wildcard appears as `*`.
    #[inline]
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Position of a parameter in the ranges written by [`matches`](Self::matches).
    #[inline]
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    #[inline(always)]
    pub const fn options(&self) -> MatchOptions {
        self.options
    }
}

/// Joins a group prefix and a route path without doubling slashes.
pub(crate) fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => prefix_with_slash(prefix),
        (false, false) => format!("{}/{path}", prefix_with_slash(prefix)),
    }
}

fn prefix_with_slash(prefix: &str) -> String {
    match prefix.starts_with('/') {
        true => prefix.to_string(),
        false => format!("/{prefix}"),
    }
}

fn normalize_pattern(pattern: &str, strict: bool) -> String {
    let mut normalized = match pattern.starts_with('/') {
        true => pattern.to_string(),
        false => format!("/{pattern}"),
    };

    if !strict {
        let len = trimmed_len(normalized.as_bytes());
        normalized.truncate(len);
    }
    normalized
}

/// Length of `path` without trailing slashes, never below 1.
#[inline]
fn trimmed_len(path: &[u8]) -> usize {
    let mut len = path.len();
    while len > 1 && path[len - 1] == b'/' {
        len -= 1;
    }
    len
}
