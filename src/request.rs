//! Incoming HTTP request type.
//!
//! A [`Request`] is both the input to the handler chain and the place the
//! chosen handler leaves its answer: handlers call [`Request::send`] and the
//! transport collects the result with [`Request::take_response`].

use tracing::warn;

use crate::method::Method;
use crate::response::{IntoResponse, Response};

/// Interest marker meaning "retain every request header".
pub const ALL_HEADERS: &str = "ANY";

/// An incoming HTTP request.
pub struct Request {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    interesting_headers: Vec<String>,
    response: Option<Response>,
}

impl Request {
    /// A request for `url`, the decoded path without the query string.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            interesting_headers: Vec::new(),
            response: None,
        }
    }

    /// Appends a header. Returns `self` for chaining.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn url(&self) -> &str { &self.url }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the client declared it can decode a gzip body.
    ///
    /// Reads `Accept-Encoding`; `gzip` or `*` with a non-zero q-value counts.
    pub fn accepts_gzip(&self) -> bool {
        let Some(value) = self.header("accept-encoding") else {
            return false;
        };
        value.split(',').any(|entry| {
            let mut parts = entry.split(';');
            let coding = parts.next().unwrap_or("").trim();
            if !coding.eq_ignore_ascii_case("gzip") && coding != "*" {
                return false;
            }
            parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .all(|q| q.trim().parse::<f32>().map_or(true, |q| q > 0.0))
        })
    }

    /// Asks the transport to retain the named header for this request.
    /// [`ALL_HEADERS`] retains every header.
    pub fn add_interesting_header(&mut self, name: &str) {
        if !self.interesting_headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            self.interesting_headers.push(name.to_owned());
        }
    }

    pub fn interesting_headers(&self) -> &[String] { &self.interesting_headers }

    /// True once a handler registered the [`ALL_HEADERS`] marker.
    pub fn wants_all_headers(&self) -> bool {
        self.interesting_headers.iter().any(|h| h == ALL_HEADERS)
    }

    /// Records the response for this request. The first response sent wins.
    pub fn send(&mut self, response: impl IntoResponse) {
        if self.response.is_some() {
            warn!(url = %self.url, "response already sent, ignoring");
            return;
        }
        self.response = Some(response.into_response());
    }

    pub fn is_sent(&self) -> bool { self.response.is_some() }
    pub fn response(&self) -> Option<&Response> { self.response.as_ref() }
    pub fn take_response(&mut self) -> Option<Response> { self.response.take() }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("sent", &self.response.is_some())
            .finish_non_exhaustive()
    }
}

/// Returns `true` when `url` is `prefix` itself or lies below it.
///
/// Matches whole path segments: `/static` covers `/static/a.png` but not
/// `/staticfoo`. An empty prefix covers everything, while `/` covers only
/// itself.
pub(crate) fn matches_prefix(url: &str, prefix: &str) -> bool {
    match url.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches_whole_segments() {
        assert!(matches_prefix("/static", "/static"));
        assert!(matches_prefix("/static/img.png", "/static"));
        assert!(!matches_prefix("/staticfoo", "/static"));
        assert!(!matches_prefix("/stat", "/static"));
        assert!(matches_prefix("/anything", ""));
        assert!(matches_prefix("/", "/"));
        assert!(!matches_prefix("/x", "/"));
        assert!(matches_prefix("/api/", "/api/"));
        assert!(!matches_prefix("/api/x", "/api/"));
    }

    #[test]
    fn gzip_capability_honours_q_values() {
        let req = |v: &str| Request::new(Method::Get, "/").with_header("Accept-Encoding", v);
        assert!(req("gzip, deflate, br").accepts_gzip());
        assert!(req("br;q=1.0, GZIP;q=0.5").accepts_gzip());
        assert!(req("*").accepts_gzip());
        assert!(!req("gzip;q=0").accepts_gzip());
        assert!(!req("deflate, br").accepts_gzip());
        assert!(!Request::new(Method::Get, "/").accepts_gzip());
    }

    #[test]
    fn first_send_wins() {
        let mut req = Request::new(Method::Get, "/");
        req.send(200u16);
        req.send(500u16);
        assert_eq!(req.take_response().map(|r| r.status_code()), Some(200));
        assert!(!req.is_sent());
    }

    #[test]
    fn interest_markers_are_deduplicated() {
        let mut req = Request::new(Method::Get, "/");
        req.add_interesting_header(ALL_HEADERS);
        req.add_interesting_header("any");
        assert_eq!(req.interesting_headers().len(), 1);
        assert!(req.wants_all_headers());
    }
}
