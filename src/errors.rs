use crate::{Method, StatusCode};
use std::{borrow::Cow, io};

/// A classified request failure: an HTTP status plus a human-readable message.
///
/// Handlers return it (or store it with [`Ctx::fail`](crate::Ctx::fail)) to
/// stop their chain; the dispatcher hands it to the configured error handler
/// exactly once.
///
/// # Examples
/// ```
/// use maker_router::{Error, StatusCode};
///
/// let err = Error::new(StatusCode::ImaTeapot, "short and stout");
/// assert_eq!(err.code(), StatusCode::ImaTeapot);
/// assert_eq!(err.to_string(), "short and stout");
///
/// // Without a message the reason phrase is used
/// assert_eq!(Error::from_status(StatusCode::NotFound).message(), "Not Found");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    code: StatusCode,
    message: Cow<'static, str>,
}

impl Error {
    /// Creates an error with an explicit message.
    #[inline]
    pub fn new(code: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an error whose message is the status reason phrase.
    #[inline]
    pub const fn from_status(code: StatusCode) -> Self {
        Self {
            code,
            message: Cow::Borrowed(code.reason()),
        }
    }

    #[inline]
    pub const fn code(&self) -> StatusCode {
        self.code
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error produced when no route accepts a request.
    pub fn not_found(method: Method, path: &str) -> Self {
        Self::new(StatusCode::NotFound, format!("Cannot {method} {path}"))
    }

    /// A `500` carrying the display text of any other error.
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        Self::new(StatusCode::InternalServerError, err.to_string())
    }
}

impl From<StatusCode> for Error {
    #[inline]
    fn from(code: StatusCode) -> Self {
        Self::from_status(code)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::internal(err)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::internal(err)
    }
}

// TRANSPORT

/// Faults raised by the transport before a request reaches routing.
///
/// Each kind maps onto one structured [`Error`] so that every failure,
/// wherever it originates, reaches the same error handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFault {
    #[error("request header fields too large")]
    HeaderTooLarge,
    #[error("request timeout")]
    Timeout,
    #[error("request body exceeds the configured limit")]
    BodyTooLarge,
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl TransportFault {
    /// Classifies an I/O error reported by the transport.
    ///
    /// Timeouts map to [`Timeout`](Self::Timeout); everything else is treated
    /// as a malformed request.
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            _ => Self::BadRequest(err.to_string()),
        }
    }

    #[inline]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::HeaderTooLarge => StatusCode::RequestHeaderFieldsTooLarge,
            Self::Timeout => StatusCode::RequestTimeout,
            Self::BodyTooLarge => StatusCode::PayloadTooLarge,
            Self::BadRequest(_) => StatusCode::BadRequest,
        }
    }
}

impl From<TransportFault> for Error {
    fn from(fault: TransportFault) -> Self {
        Error::from_status(fault.status())
    }
}

// CONFIGURATION

/// Fatal registration problems, detected before the first request is served.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("{method} {path}: at least one handler is required")]
    EmptyHandlers { method: &'static str, path: String },
    #[error("`{0}`: the `*` wildcard must be the last segment")]
    MisplacedWildcard(String),
    #[error("`{0}`: parameter segment without a name")]
    EmptyParamName(String),
    #[error("`{path}`: parameter `{name}` is declared twice")]
    DuplicateParam { path: String, name: String },
}

/// Errors while loading [`Settings`](crate::Settings).
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_message_is_reason_phrase() {
        let err = Error::from_status(StatusCode::ImaTeapot);
        assert_eq!(err.code(), StatusCode::ImaTeapot);
        assert_eq!(err.message(), "I'm a teapot");
    }

    #[test]
    fn not_found_message() {
        let err = Error::not_found(Method::Delete, "/users/7");
        assert_eq!(err.code(), StatusCode::NotFound);
        assert_eq!(err.to_string(), "Cannot DELETE /users/7");
    }

    #[test]
    fn foreign_errors_are_internal() {
        let err: Error = "x".parse::<u8>().unwrap_err().into();
        assert_eq!(err.code(), StatusCode::InternalServerError);

        let err: Error = io::Error::new(io::ErrorKind::Other, "disk on fire").into();
        assert_eq!(err.code(), StatusCode::InternalServerError);
        assert_eq!(err.message(), "disk on fire");
    }

    #[test]
    fn transport_faults() {
        let cases = [
            (TransportFault::HeaderTooLarge, 431),
            (TransportFault::Timeout, 408),
            (TransportFault::BodyTooLarge, 413),
            (TransportFault::BadRequest("junk".into()), 400),
        ];

        for (fault, code) in cases {
            assert_eq!(Error::from(fault).code().as_u16(), code);
        }
    }

    #[test]
    fn classify_io() {
        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(TransportFault::classify(&timeout), TransportFault::Timeout);

        let other = io::Error::new(io::ErrorKind::InvalidData, "garbage");
        assert_eq!(
            TransportFault::classify(&other),
            TransportFault::BadRequest("garbage".to_string())
        );
    }
}
