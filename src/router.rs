//! Ordered handler chain.
//!
//! Handlers are tried in registration order; the first whose `can_handle`
//! accepts owns the request. No match means `404 Not Found`. Register the
//! specific handlers before the catch-all static mount.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::callback::CallbackHandler;
use crate::fs::FileSystem;
use crate::handler::Handler;
use crate::method::MethodFilter;
use crate::request::Request;
use crate::response::Response;
use crate::static_resource::StaticResourceHandler;
use crate::status::Status;

/// The application router.
///
/// Built once at startup and then frozen: every registration method takes
/// `self` and [`Server::serve`](crate::Server::serve) takes ownership, so
/// the chain cannot change while requests are in flight.
///
/// ```rust
/// use std::sync::Arc;
/// use kestrel::{Method, MemoryFs, Request, Response, Router};
///
/// let assets = Arc::new(MemoryFs::new().with_file("/www/index.htm", b"hi".to_vec()));
/// let app = Router::new()
///     .on(Method::Get, "/api/status", |req: &mut Request| req.send(Response::text("ok")))
///     .serve_static("/", assets, "/www/", "max-age=600");
///
/// let res = app.handle(Request::new(Method::Get, "/api/status"));
/// assert_eq!(res.status_code(), 200);
/// let res = app.handle(Request::new(Method::Get, "/nope.png"));
/// assert_eq!(res.status_code(), 404);
/// ```
pub struct Router {
    handlers: Vec<Box<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Register a request callback for a method + URI prefix pair. Returns
    /// `self` for chaining.
    pub fn on(
        self,
        method: impl Into<MethodFilter>,
        uri: &str,
        f: impl Fn(&mut Request) + Send + Sync + 'static,
    ) -> Self {
        self.handler(CallbackHandler::new().uri(uri).method(method).on_request(f))
    }

    /// Mount `path` of `fs` at `uri`. See [`StaticResourceHandler::new`].
    pub fn serve_static(
        self,
        uri: &str,
        fs: Arc<dyn FileSystem>,
        path: &str,
        cache_control: &str,
    ) -> Self {
        self.handler(StaticResourceHandler::new(fs, uri, path, cache_control))
    }

    /// Register any [`Handler`], e.g. a [`CallbackHandler`] with upload and
    /// body callbacks or a tuned [`StaticResourceHandler`].
    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn len(&self) -> usize { self.handlers.len() }
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    /// The first handler that accepts `req`.
    pub fn find(&self, req: &mut Request) -> Option<&dyn Handler> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(req))
            .map(|h| &**h)
    }

    /// Runs `handler` on `req` and collects its response.
    ///
    /// A handler that returns without sending yields `500`.
    pub fn complete(handler: &dyn Handler, req: &mut Request) -> Response {
        handler.handle_request(req);
        match req.take_response() {
            Some(res) => res,
            None => {
                warn!(method = %req.method(), url = %req.url(), "handler sent no response");
                Response::status(Status::InternalServerError)
            }
        }
    }

    /// Dispatches a bodiless request through the chain.
    pub fn handle(&self, mut req: Request) -> Response {
        match self.find(&mut req) {
            Some(handler) => Self::complete(handler, &mut req),
            None => {
                debug!(method = %req.method(), url = %req.url(), "no handler");
                Response::status(Status::NotFound)
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
