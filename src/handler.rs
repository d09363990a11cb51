//! The handler contract and the callback shapes handlers are built from.
//!
//! # How handlers are stored
//!
//! The router keeps every registered handler, static or callback, in one
//! ordered `Vec`. A `Vec` holds a single concrete type, so handlers live
//! behind a trait object (`Box<dyn Handler>`) and the router walks them in
//! registration order:
//!
//! ```text
//! router.serve_static("/", fs, "/www/", "max-age=600")  ← StaticResourceHandler
//! router.on(Method::Post, "/api", on_api)               ← CallbackHandler
//!        ↓
//! handlers: Vec<Box<dyn Handler>>                       ← registration order
//!        ↓  per request
//! first h where h.can_handle(&mut req)                  ← one vtable call each
//!        ↓
//! h.handle_body(..)* then h.handle_request(&mut req)    ← answer via req.send(..)
//! ```
//!
//! Every call runs synchronously to completion. Nothing here blocks on
//! anything but local storage.

use std::sync::Arc;

use crate::request::Request;

// ── Callback shapes ───────────────────────────────────────────────────────────

/// Called once a handler accepted a request. Must answer through
/// [`Request::send`].
pub type RequestCallback = Arc<dyn Fn(&mut Request) + Send + Sync + 'static>;

/// Called per upload chunk: `(request, filename, index, data, is_final)`.
///
/// `index` is the byte offset of `data` within the uploaded file.
pub type UploadCallback = Arc<dyn Fn(&mut Request, &str, usize, &[u8], bool) + Send + Sync + 'static>;

/// Called per body chunk: `(request, data, index, total)`.
///
/// `index` is the byte offset of `data` within the body, `total` the
/// declared body length.
pub type BodyCallback = Arc<dyn Fn(&mut Request, &[u8], usize, usize) + Send + Sync + 'static>;

// ── Handler ───────────────────────────────────────────────────────────────────

/// A unit of the router's handler chain.
///
/// `can_handle` may annotate the request (interest markers) but must not send
/// a response. `handle_request` must send exactly one. Handlers that never
/// consume request bodies keep the default no-op `handle_upload` and
/// `handle_body`.
pub trait Handler: Send + Sync + 'static {
    fn can_handle(&self, req: &mut Request) -> bool;

    fn handle_request(&self, req: &mut Request);

    fn handle_upload(
        &self,
        _req: &mut Request,
        _filename: &str,
        _index: usize,
        _data: &[u8],
        _is_final: bool,
    ) {
    }

    fn handle_body(&self, _req: &mut Request, _data: &[u8], _index: usize, _total: usize) {}
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn can_handle(&self, req: &mut Request) -> bool {
        (**self).can_handle(req)
    }

    fn handle_request(&self, req: &mut Request) {
        (**self).handle_request(req)
    }

    fn handle_upload(&self, req: &mut Request, filename: &str, index: usize, data: &[u8], is_final: bool) {
        (**self).handle_upload(req, filename, index, data, is_final)
    }

    fn handle_body(&self, req: &mut Request, data: &[u8], index: usize, total: usize) {
        (**self).handle_body(req, data, index, total)
    }
}
