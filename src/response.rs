//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! A handler never returns a response; it builds one and hands it to
//! [`Request::send`](crate::Request::send). The body is either buffered bytes
//! or a reader. The transport pulls a reader in fixed-size chunks after the
//! handler has returned, so files never sit in memory whole.

use std::fmt;
use std::io::Read;

use bytes::Bytes;

use crate::status::Status;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    Css,          // text/css
    Html,         // text/html; charset=utf-8
    Javascript,   // application/javascript
    Json,         // application/json
    OctetStream,  // application/octet-stream  (binary / file download)
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Html        => "text/html; charset=utf-8",
            Self::Javascript  => "application/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }

    /// Content type for a resource path, from its extension.
    ///
    /// ```rust
    /// use kestrel::ContentType;
    /// assert_eq!(ContentType::for_path("/www/index.htm"), "text/html; charset=utf-8");
    /// assert_eq!(ContentType::for_path("/www/app.JS"), "application/javascript");
    /// assert_eq!(ContentType::for_path("/www/blob"), "application/octet-stream");
    /// ```
    pub fn for_path(path: &str) -> &'static str {
        let name = path.rsplit('/').next().unwrap_or(path);
        let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("html" | "htm") => Self::Html.as_str(),
            Some("css")          => Self::Css.as_str(),
            Some("js" | "mjs")   => Self::Javascript.as_str(),
            Some("json")         => Self::Json.as_str(),
            Some("txt")          => Self::Text.as_str(),
            Some("xml")          => "text/xml",
            Some("png")          => "image/png",
            Some("gif")          => "image/gif",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("ico")          => "image/x-icon",
            Some("svg")          => "image/svg+xml",
            Some("woff")         => "font/woff",
            Some("woff2")        => "font/woff2",
            Some("ttf")          => "font/ttf",
            Some("pdf")          => "application/pdf",
            Some("zip")          => "application/zip",
            Some("gz")           => "application/x-gzip",
            _                    => Self::OctetStream.as_str(),
        }
    }
}

// ── Body ──────────────────────────────────────────────────────────────────────

/// Response payload.
pub enum Body {
    Empty,
    Bytes(Bytes),
    /// Read chunk by chunk by the transport once the handler has returned.
    Reader(Box<dyn Read + Send>),
}

impl Body {
    /// Reads the whole body into memory.
    ///
    /// A failing reader surfaces its error here; nothing is retried.
    pub fn into_bytes(self) -> std::io::Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(b) => Ok(b),
            Self::Reader(mut r) => {
                let mut buf = Vec::new();
                r.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Reader(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Reader(_) => f.write_str("Reader"),
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use kestrel::{Response, Status};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(Status::NoContent);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use kestrel::Response;
///
/// Response::builder()
///     .status(418u16)
///     .header("x-brew", "tea")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder()
///     .header("cache-control", "max-age=600")
///     .stream("text/css", std::io::Cursor::new(b"body{}".to_vec()));
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Body,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: u16,
}

impl Response {
    /// `200 OK` — `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::bytes_raw("application/json", body)
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes_raw("text/plain; charset=utf-8", body.into().into_bytes())
    }

    /// Response with no body. Accepts a [`Status`] or a raw `u16`.
    pub fn status(code: impl Into<u16>) -> Self {
        Self { body: Body::Empty, headers: Vec::new(), status: code.into() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: Status::Ok.into() }
    }

    fn bytes_raw(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            body: Body::Bytes(Bytes::from(body)),
            headers: vec![("content-type".to_owned(), content_type.to_owned())],
            status: Status::Ok.into(),
        }
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Body { &self.body }
    pub fn into_body(self) -> Body { self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `Status::Ok` (200).
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish("application/json", Body::Bytes(Bytes::from(body)))
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", Body::Bytes(Bytes::from(body.into())))
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.finish(content_type.as_str(), Body::Bytes(Bytes::from(body)))
    }

    /// Terminate with a body streamed from `reader`.
    pub fn stream(self, content_type: &str, reader: impl Read + Send + 'static) -> Response {
        self.finish(content_type, Body::Reader(Box::new(reader)))
    }

    /// Terminate with no body (e.g. `Status::NoContent`).
    pub fn no_body(self) -> Response {
        Response { body: Body::Empty, headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Body) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Anything implementing this can be passed to
/// [`Request::send`](crate::Request::send).
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// `request.send(Status::NotFound)`
impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::status(self) }
}

/// `request.send(500)`
impl IntoResponse for u16 {
    fn into_response(self) -> Response { Response::status(self) }
}
