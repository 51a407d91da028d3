//! Response builder filled in by handlers and flushed by the transport.

use crate::{http::types::StatusCode, BodyWriter, WriteBuffer};
use std::{borrow::Cow, rc::Rc, sync::Arc};

/// HTTP response builder.
///
/// Handlers set the status, headers and body; the transport serializes the
/// result once dispatch returns. Unlike a wire-level writer the builder can be
/// changed in any order until the transport [commits](Response::commit) it.
///
/// # Examples
/// ```
/// use maker_router::{Response, StatusCode};
///
/// let mut resp = Response::new();
/// resp.status(StatusCode::Created)
///     .set_header("content-type", "text/plain")
///     .body("made it");
///
/// assert_eq!(resp.status_code(), StatusCode::Created);
/// assert_eq!(resp.header("Content-Type"), Some("text/plain"));
/// assert_eq!(resp.body_bytes(), b"made it");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(Cow<'static, str>, String)>,
    body: Vec<u8>,
    committed: bool,
    aborted: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a builder whose body buffer is pre-allocated.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: Vec::new(),
            body: Vec::with_capacity(capacity),
            committed: false,
            aborted: false,
        }
    }

    /// Clears all state so the builder can serve the next request.
    ///
    /// Buffers that grew beyond `max_capacity` are released instead of kept.
    #[inline]
    pub fn reset(&mut self, max_capacity: usize) {
        if self.body.capacity() > max_capacity {
            self.body = Vec::with_capacity(max_capacity);
        }
        self.clear();
        self.committed = false;
        self.aborted = false;
    }

    /// Drops status, headers and body written so far, keeping the buffers.
    #[inline]
    pub fn clear(&mut self) -> &mut Self {
        self.status = StatusCode::Ok;
        self.headers.clear();
        self.body.clear();
        self
    }
}

// Status and headers
impl Response {
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    #[inline(always)]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Sets a header, replacing any existing value with the same name
    /// (compared case-insensitively).
    pub fn set_header<V: WriteBuffer>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        value: V,
    ) -> &mut Self {
        let name = name.into();
        let value = Self::header_value(value);

        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some((_, v)) => *v = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Adds a header without touching existing values, e.g. `set-cookie`.
    pub fn append_header<V: WriteBuffer>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        value: V,
    ) -> &mut Self {
        let value = Self::header_value(value);
        self.headers.push((name.into(), value));
        self
    }

    /// Removes every header with this name.
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self
    }

    /// Returns the first header value with this name.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_ref(), v.as_str()))
    }

    fn header_value<V: WriteBuffer>(value: V) -> String {
        let mut buffer = Vec::new();
        value.write_to(&mut buffer);

        match String::from_utf8(buffer) {
            Ok(value) => value,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}

// Body
impl Response {
    /// Replaces the body.
    #[inline]
    pub fn body<T: WriteBuffer>(&mut self, data: T) -> &mut Self {
        self.body.clear();
        data.write_to(&mut self.body);
        self
    }

    /// Appends to the body.
    #[inline]
    pub fn write<T: WriteBuffer>(&mut self, data: T) -> &mut Self {
        data.write_to(&mut self.body);
        self
    }

    /// Replaces the body with the output of a closure.
    ///
    /// # Examples
    /// ```
    /// use maker_router::Response;
    /// use std::io::Write;
    ///
    /// let mut resp = Response::new();
    /// resp.body_with(|w| {
    ///     w.write("id=");
    ///     let _ = write!(w, "{}", 42);
    /// });
    ///
    /// assert_eq!(resp.body_bytes(), b"id=42");
    /// ```
    #[inline]
    pub fn body_with<F: FnOnce(&mut BodyWriter)>(&mut self, f: F) -> &mut Self {
        self.body.clear();
        f(&mut BodyWriter(&mut self.body));
        self
    }

    #[inline(always)]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub fn clear_body(&mut self) -> &mut Self {
        self.body.clear();
        self
    }
}

// Transport state
impl Response {
    /// Marks the status line and headers as written to the wire.
    ///
    /// Called by the transport when it starts streaming a response; after
    /// this point a cancelled dispatch can no longer be reported cleanly.
    #[inline]
    pub fn commit(&mut self) {
        self.committed = true;
    }

    #[inline(always)]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    /// Set when dispatch stopped because the request was cancelled; the
    /// transport should drop the response instead of sending it.
    #[inline(always)]
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    #[inline]
    pub(crate) fn abort(&mut self) {
        self.aborted = true;
    }

    #[inline]
    const fn number_to_bytes(mut n: u128) -> ([u8; 39], usize) {
        let mut buffer = [b'0'; 39];
        let mut i = 39;

        if n == 0 {
            return (buffer, 38);
        }

        while n > 0 {
            i -= 1;
            buffer[i] = b'0' + (n % 10) as u8;
            n /= 10;
        }

        (buffer, i)
    }
}

pub mod write {
    use super::*;

    /// Writer for constructing the response body.
    /// Used in [body_with](Response::body_with).
    ///
    /// # Examples
    ///
    /// With [WriteBuffer]:
    /// ```
    /// use maker_router::Response;
    ///
    /// let mut resp = Response::new();
    /// resp.body_with(|w| {
    ///     w.write("count: ");
    ///     w.write(3);
    ///     w.write(true);
    /// });
    /// assert_eq!(resp.body_bytes(), b"count: 3true");
    /// ```
    #[derive(Debug)]
    pub struct BodyWriter<'a>(pub(crate) &'a mut Vec<u8>);

    impl BodyWriter<'_> {
        /// Appends content to the response body.
        #[inline]
        pub fn write<T: WriteBuffer>(&mut self, value: T) {
            value.write_to(self.0);
        }
    }

    impl std::io::Write for BodyWriter<'_> {
        #[inline]
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        #[inline]
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Trait for writing data to the [`Response`] buffer.
    ///
    /// Implemented for common types like strings, bytes, booleans
    /// and numeric types (excluding floating-point numbers)
    ///
    /// # Note on Floating-Point
    /// Floating-point numbers are not implemented to avoid locale-dependent
    /// formatting and precision issues in protocol headers.
    ///
    /// # Example
    /// ```
    /// use maker_router::WriteBuffer;
    ///
    /// struct MyString(String);
    ///
    /// impl WriteBuffer for MyString {
    ///     fn write_to(&self, buffer: &mut Vec<u8>) {
    ///         buffer.extend_from_slice(self.0.as_bytes())
    ///     }
    /// }
    /// ```
    pub trait WriteBuffer {
        /// Writes the value's representation directly to the buffer.
        fn write_to(&self, buffer: &mut Vec<u8>);
    }

    macro_rules! impl_write_buffer {
        (bytes, $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    let closure = $conn;
                    closure(self, buffer);
                }
            })*
        };
        (number($type:ty), $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    $conn(*self as $type, buffer);
                }
            })*
        };
    }

    impl<T: WriteBuffer + ?Sized> WriteBuffer for &T {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            T::write_to(*self, buffer);
        }
    }
    impl WriteBuffer for str {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self.as_bytes());
        }
    }
    impl WriteBuffer for [u8] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl_write_buffer! {
        bytes, |value: &str, buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value.as_bytes());
        } => String, Box<str>, Cow<'_, str>, Arc<str>, Rc<str>
    }
    impl_write_buffer! {
        bytes, |value: &[u8], buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value);
        } => Vec<u8>, Box<[u8]>, Cow<'_, [u8]>, Arc<[u8]>, Rc<[u8]>
    }
    impl<const N: usize> WriteBuffer for [u8; N] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl_write_buffer! {
        number(u128), impl_write_buffer_u128 => u8, u16, u32, u64, u128, usize
    }
    impl_write_buffer! {
        number(i128), impl_write_buffer_i128 => i8, i16, i32, i64, i128, isize
    }
    impl WriteBuffer for bool {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(match self {
                true => b"true",
                false => b"false",
            });
        }
    }
    impl WriteBuffer for char {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            let mut buf = [0u8; 4];
            buffer.extend_from_slice(self.encode_utf8(&mut buf).as_bytes());
        }
    }

    #[inline(always)]
    fn impl_write_buffer_u128(value: u128, buffer: &mut Vec<u8>) {
        let (arr, start) = Response::number_to_bytes(value);
        buffer.extend_from_slice(&arr[start..]);
    }

    #[inline(always)]
    fn impl_write_buffer_i128(value: i128, buffer: &mut Vec<u8>) {
        if value < 0 {
            buffer.push(b'-');
        }
        let abs = value.unsigned_abs();

        let (arr, start) = Response::number_to_bytes(abs);
        buffer.extend_from_slice(&arr[start..]);
    }
}

#[cfg(test)]
mod header_tests {
    use super::*;

    #[test]
    fn set_replaces_case_insensitively() {
        let mut resp = Response::new();
        resp.set_header("Content-Type", "text/html")
            .set_header("content-type", "text/plain");

        assert_eq!(resp.headers().count(), 1);
        assert_eq!(resp.header("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn append_keeps_all() {
        let mut resp = Response::new();
        resp.append_header("set-cookie", "a=1")
            .append_header("set-cookie", "b=2");

        let cookies: Vec<_> = resp
            .headers()
            .filter(|(n, _)| *n == "set-cookie")
            .map(|(_, v)| v)
            .collect();
        assert_eq!(cookies, ["a=1", "b=2"]);

        resp.remove_header("Set-Cookie");
        assert_eq!(resp.header("set-cookie"), None);
    }

    #[test]
    fn typed_values() {
        let mut resp = Response::new();
        resp.set_header("x-id", 128)
            .set_header("x-neg", -5i32)
            .set_header("x-cache", true);

        assert_eq!(resp.header("x-id"), Some("128"));
        assert_eq!(resp.header("x-neg"), Some("-5"));
        assert_eq!(resp.header("x-cache"), Some("true"));
    }
}

#[cfg(test)]
mod body_tests {
    use super::*;

    #[test]
    fn body_replaces_write_appends() {
        let mut resp = Response::new();
        resp.body("first").body("second");
        assert_eq!(resp.body_bytes(), b"second");

        resp.write(' ').write(0u8).write(String::from("!"));
        assert_eq!(resp.body_bytes(), b"second 0!");
    }

    #[test]
    fn numbers() {
        let cases: [(i128, &[u8]); 4] = [
            (0, b"0"),
            (7, b"7"),
            (-42, b"-42"),
            (i64::MAX as i128, b"9223372036854775807"),
        ];

        for (value, expected) in cases {
            let mut resp = Response::new();
            resp.body(value);
            assert_eq!(resp.body_bytes(), expected);
        }
    }

    #[test]
    fn reset() {
        let mut resp = Response::with_capacity(8);
        resp.status(StatusCode::NotFound)
            .set_header("x", "y")
            .body([b'a'; 64]);
        resp.commit();
        resp.abort();

        resp.reset(16);
        assert_eq!(resp, Response::new());
        assert!(resp.body.capacity() < 64);
    }
}
