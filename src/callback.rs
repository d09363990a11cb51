//! Handler that hands matching requests to user callbacks.

use std::sync::Arc;

use tracing::warn;

use crate::handler::{BodyCallback, Handler, RequestCallback, UploadCallback};
use crate::method::MethodFilter;
use crate::request::{self, ALL_HEADERS, Request};
use crate::status::Status;

/// Binds a URI prefix and a method filter to up to three callbacks.
///
/// Without a request callback the handler never matches, so a half-built
/// handler can sit in the chain harmlessly.
///
/// ```rust
/// use kestrel::{CallbackHandler, Handler, Method, Request, Response};
///
/// let api = CallbackHandler::new()
///     .uri("/api")
///     .method(Method::Post)
///     .on_request(|req: &mut Request| req.send(Response::text("stored")))
///     .on_body(|_req: &mut Request, data: &[u8], index: usize, total: usize| {
///         println!("{index}+{} of {total}", data.len());
///     });
///
/// let mut req = Request::new(Method::Post, "/api/items");
/// assert!(api.can_handle(&mut req));
/// ```
#[derive(Clone, Default)]
pub struct CallbackHandler {
    uri: String,
    method: MethodFilter,
    on_request: Option<RequestCallback>,
    on_upload: Option<UploadCallback>,
    on_body: Option<BodyCallback>,
}

impl CallbackHandler {
    /// A handler matching every URI and method, with no callbacks bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// URI prefix to match. Empty matches every URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.set_uri(uri);
        self
    }

    pub fn method(mut self, method: impl Into<MethodFilter>) -> Self {
        self.set_method(method);
        self
    }

    pub fn on_request(mut self, f: impl Fn(&mut Request) + Send + Sync + 'static) -> Self {
        self.set_on_request(f);
        self
    }

    pub fn on_upload(
        mut self,
        f: impl Fn(&mut Request, &str, usize, &[u8], bool) + Send + Sync + 'static,
    ) -> Self {
        self.set_on_upload(f);
        self
    }

    pub fn on_body(
        mut self,
        f: impl Fn(&mut Request, &[u8], usize, usize) + Send + Sync + 'static,
    ) -> Self {
        self.set_on_body(f);
        self
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    pub fn set_method(&mut self, method: impl Into<MethodFilter>) {
        self.method = method.into();
    }

    pub fn set_on_request(&mut self, f: impl Fn(&mut Request) + Send + Sync + 'static) {
        self.on_request = Some(Arc::new(f));
    }

    pub fn set_on_upload(
        &mut self,
        f: impl Fn(&mut Request, &str, usize, &[u8], bool) + Send + Sync + 'static,
    ) {
        self.on_upload = Some(Arc::new(f));
    }

    pub fn set_on_body(&mut self, f: impl Fn(&mut Request, &[u8], usize, usize) + Send + Sync + 'static) {
        self.on_body = Some(Arc::new(f));
    }

    pub fn uri_prefix(&self) -> &str { &self.uri }
    pub fn method_filter(&self) -> MethodFilter { self.method }
}

impl Handler for CallbackHandler {
    fn can_handle(&self, req: &mut Request) -> bool {
        if self.on_request.is_none() {
            return false;
        }
        if !self.method.matches(req.method()) {
            return false;
        }
        if !self.uri.is_empty() && !request::matches_prefix(req.url(), &self.uri) {
            return false;
        }
        req.add_interesting_header(ALL_HEADERS);
        true
    }

    fn handle_request(&self, req: &mut Request) {
        match &self.on_request {
            Some(f) => f(req),
            None => {
                warn!(url = %req.url(), "callback handler has no request callback");
                req.send(Status::InternalServerError);
            }
        }
    }

    fn handle_upload(&self, req: &mut Request, filename: &str, index: usize, data: &[u8], is_final: bool) {
        if let Some(f) = &self.on_upload {
            f(req, filename, index, data, is_final);
        }
    }

    fn handle_body(&self, req: &mut Request, data: &[u8], index: usize, total: usize) {
        if let Some(f) = &self.on_body {
            f(req, data, index, total);
        }
    }
}

impl std::fmt::Debug for CallbackHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandler")
            .field("uri", &self.uri)
            .field("method", &self.method)
            .field("on_request", &self.on_request.is_some())
            .field("on_upload", &self.on_upload.is_some())
            .field("on_body", &self.on_body.is_some())
            .finish()
    }
}
