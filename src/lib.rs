//! # kestrel
//!
//! Request-to-handler matching and static-resource resolution for small,
//! storage-constrained HTTP servers.
//!
//! ## The contract
//!
//! A [`Router`] is an ordered list of [`Handler`]s. For each request the first
//! handler whose `can_handle` accepts it answers it. Two handlers ship with
//! the crate:
//!
//! - [`StaticResourceHandler`] — mounts a directory (or a single file) of a
//!   read-only [`FileSystem`] under a URI prefix. Serves `name.gz` siblings to
//!   clients that accept gzip, falls back to an index file for directory
//!   URIs, and keeps a small rolling history so it stats the usually-present
//!   variant first.
//! - [`CallbackHandler`] — binds a URI prefix and a method to request, upload
//!   and body callbacks.
//!
//! Handlers never return errors. Every outcome is a response sent through
//! [`Request::send`]: `404` when no handler or no resource matches, `500` for
//! a handler that could not answer.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kestrel::{DiskFs, Method, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .on(Method::Get, "/api/uptime", uptime)
//!         .serve_static("/", Arc::new(DiskFs::new("./data")), "/www/", "max-age=86400");
//!
//!     Server::bind("0.0.0.0:80").serve(app).await.unwrap();
//! }
//!
//! fn uptime(req: &mut Request) {
//!     req.send(Response::json(br#"{"seconds":42}"#.to_vec()));
//! }
//! ```

mod callback;
mod error;
mod fs;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod static_resource;
mod stats;
mod status;

pub use callback::CallbackHandler;
pub use error::Error;
pub use fs::{DiskFs, FileSystem, MemoryFs};
pub use handler::{BodyCallback, Handler, RequestCallback, UploadCallback};
pub use method::{Method, MethodFilter};
pub use request::{ALL_HEADERS, Request};
pub use response::{Body, ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{CHUNK_SIZE, DEFAULT_MAX_BODY_SIZE, Server};
pub use static_resource::{DEFAULT_INDEX_FILE, Resolution, StaticResourceHandler};
pub use stats::{Variant, VariantStats, count_set_bits};
pub use status::Status;
