//! Handler that maps a URI prefix onto a filesystem prefix.
//!
//! # Resolution
//!
//! For a mount of `/static/` onto `/www` a request for `/static/css/a.css`
//! strips the URI prefix and appends the rest to the path prefix, giving the
//! candidate `/www/css/a.css`. The candidate is probed as a file first, in
//! both variants (`a.css` and `a.css.gz`). If neither exists, or the
//! candidate plainly names a directory (mount point hit exactly, trailing
//! `/`), the index file is appended and probed the same way.
//!
//! ```text
//! /static            → /www/index.htm(.gz)
//! /static/css/       → /www/css/index.htm(.gz)
//! /static/css/a.css  → /www/css/a.css(.gz)  else /www/css/a.css/index.htm(.gz)
//! ```
//!
//! # Variant choice
//!
//! When both variants exist the compressed one is served only if the client
//! accepts gzip and the handler prefers compressed variants. A lone variant
//! is always served. Which variant gets stat'ed first is decided by
//! [`VariantStats`]; the order changes how many stats a lookup costs, never
//! the outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::handler::Handler;
use crate::method::Method;
use crate::request::{self, Request};
use crate::response::{ContentType, Response};
use crate::stats::{Variant, VariantStats};
use crate::status::Status;

/// Index file served for directory URIs unless overridden.
pub const DEFAULT_INDEX_FILE: &str = "index.htm";

/// A resource the handler settled on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resolution {
    /// Logical path of the resource, without any `.gz` suffix.
    pub path: String,
    pub variant: Variant,
}

impl Resolution {
    /// Path of the file that will actually be read.
    pub fn file_path(&self) -> String {
        variant_path(&self.path, self.variant)
    }

    pub fn is_compressed(&self) -> bool {
        self.variant == Variant::Compressed
    }
}

/// Serves files from a [`FileSystem`] under a URI prefix.
///
/// ```rust
/// use std::sync::Arc;
/// use kestrel::{Handler, Method, MemoryFs, Request, StaticResourceHandler};
///
/// let fs = Arc::new(MemoryFs::new().with_file("/www/index.htm", b"<h1>hi</h1>".to_vec()));
/// let site = StaticResourceHandler::new(fs, "/", "/www", "max-age=600");
///
/// let mut req = Request::new(Method::Get, "/");
/// assert!(site.can_handle(&mut req));
/// site.handle_request(&mut req);
/// let res = req.take_response().unwrap();
/// assert_eq!(res.status_code(), 200);
/// assert_eq!(res.header("cache-control"), Some("max-age=600"));
/// ```
pub struct StaticResourceHandler {
    fs: Arc<dyn FileSystem>,
    uri: String,
    path: String,
    cache_control: String,
    is_dir: bool,
    default_file: String,
    prefer_compressed: AtomicBool,
    stats: VariantStats,
}

impl StaticResourceHandler {
    /// Mounts `path` (in `fs`) at `uri`.
    ///
    /// Both prefixes get a leading `/` if they lack one. A trailing `/` on
    /// either marks the mount as a directory, and is then stripped, so `"/"`
    /// becomes the root prefix `""`. An empty `cache_control` sends no
    /// `Cache-Control` header.
    pub fn new(fs: Arc<dyn FileSystem>, uri: &str, path: &str, cache_control: &str) -> Self {
        let mut uri = with_leading_slash(uri);
        let mut path = with_leading_slash(path);

        // A trailing '/' is only a hint; an unmarked mount can still resolve
        // to a directory at lookup time.
        let uri_is_dir = uri.ends_with('/');
        let path_is_dir = path.ends_with('/');
        let is_dir = uri_is_dir || path_is_dir;

        if uri_is_dir {
            uri.pop();
        }
        if path_is_dir {
            path.pop();
        }

        Self {
            fs,
            uri,
            path,
            cache_control: cache_control.to_owned(),
            is_dir,
            default_file: DEFAULT_INDEX_FILE.to_owned(),
            prefer_compressed: AtomicBool::new(true),
            stats: VariantStats::new(),
        }
    }

    /// Index file appended to directory URIs. Empty disables the fallback.
    pub fn default_file(mut self, name: &str) -> Self {
        self.default_file = name.trim_matches('/').to_owned();
        self
    }

    /// Whether gzip-capable clients get the compressed variant when both exist.
    pub fn prefer_compressed(self, prefer: bool) -> Self {
        self.set_prefer_compressed(prefer);
        self
    }

    /// Toggles the probe-order statistics.
    pub fn probe_statistics(self, enabled: bool) -> Self {
        self.stats.set_enabled(enabled);
        self
    }

    pub fn set_prefer_compressed(&self, prefer: bool) {
        self.prefer_compressed.store(prefer, Ordering::Relaxed);
    }

    pub fn prefers_compressed(&self) -> bool {
        self.prefer_compressed.load(Ordering::Relaxed)
    }

    pub fn uri_prefix(&self) -> &str { &self.uri }
    pub fn path_prefix(&self) -> &str { &self.path }
    pub fn cache_control(&self) -> &str { &self.cache_control }
    pub fn is_directory_mode(&self) -> bool { self.is_dir }
    pub fn index_file(&self) -> &str { &self.default_file }
    pub fn stats(&self) -> &VariantStats { &self.stats }

    /// Finds the resource `req` should be answered with, if any.
    ///
    /// Only stats the filesystem; nothing is opened.
    pub fn resolve(&self, req: &Request) -> Option<Resolution> {
        if !request::matches_prefix(req.url(), &self.uri) {
            return None;
        }
        let relative = &req.url()[self.uri.len()..];
        if relative.split('/').any(|segment| segment == "..") {
            debug!(url = %req.url(), "rejecting parent segment");
            return None;
        }

        let want = if req.accepts_gzip() && self.prefers_compressed() {
            Variant::Compressed
        } else {
            Variant::Plain
        };

        let candidate = format!("{}{}", self.path, relative);
        let names_dir = (self.is_dir && relative.is_empty()) || relative.ends_with('/');

        if !names_dir {
            if let Some(found) = self.probe(candidate.clone(), want) {
                return Some(found);
            }
        }
        if self.default_file.is_empty() {
            return None;
        }

        let mut index = candidate;
        if !index.ends_with('/') {
            index.push('/');
        }
        index.push_str(&self.default_file);
        self.probe(index, want)
    }

    /// Stats both variants of `path`, stopping early when the first one
    /// probed is the one `want` would pick anyway.
    fn probe(&self, path: String, want: Variant) -> Option<Resolution> {
        let first = self.stats.likely_present().unwrap_or(want);
        let second = first.other();

        let first_found = self.fs.exists(&variant_path(&path, first));
        let second_found = if first_found && first == want {
            None
        } else {
            Some(self.fs.exists(&variant_path(&path, second)))
        };

        let (compressed, plain) = match first {
            Variant::Compressed => (Some(first_found), second_found),
            Variant::Plain => (second_found, Some(first_found)),
        };
        let compressed = compressed.unwrap_or(false);
        let plain = plain.unwrap_or(false);
        self.stats.record(compressed, plain);

        let variant = match (compressed, plain) {
            (true, true) => want,
            (true, false) => Variant::Compressed,
            (false, true) => Variant::Plain,
            (false, false) => {
                debug!(path = %path, "no variant found");
                return None;
            }
        };
        debug!(path = %path, ?variant, "resolved");
        Some(Resolution { path, variant })
    }
}

impl Handler for StaticResourceHandler {
    /// Read-only: accepts `GET` and `HEAD` under the mount, without
    /// touching storage.
    fn can_handle(&self, req: &mut Request) -> bool {
        matches!(req.method(), Method::Get | Method::Head)
            && request::matches_prefix(req.url(), &self.uri)
    }

    fn handle_request(&self, req: &mut Request) {
        let Some(found) = self.resolve(req) else {
            req.send(Status::NotFound);
            return;
        };

        let mut builder = Response::builder();
        if !self.cache_control.is_empty() {
            builder = builder.header("cache-control", &self.cache_control);
        }
        if found.is_compressed() {
            builder = builder
                .header("content-encoding", "gzip")
                .header("vary", "accept-encoding");
        }
        let content_type = ContentType::for_path(&found.path);

        if req.method() == Method::Head {
            req.send(builder.header("content-type", content_type).no_body());
            return;
        }

        let file = found.file_path();
        match self.fs.open(&file) {
            Ok(reader) => req.send(builder.stream(content_type, reader)),
            Err(e) => {
                warn!(path = %file, "failed to open resolved resource: {e}");
                req.send(Status::InternalServerError);
            }
        }
    }
}

impl std::fmt::Debug for StaticResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticResourceHandler")
            .field("uri", &self.uri)
            .field("path", &self.path)
            .field("is_dir", &self.is_dir)
            .field("default_file", &self.default_file)
            .field("prefer_compressed", &self.prefers_compressed())
            .finish_non_exhaustive()
    }
}

fn with_leading_slash(s: &str) -> String {
    if s.starts_with('/') { s.to_owned() } else { format!("/{s}") }
}

fn variant_path(path: &str, variant: Variant) -> String {
    match variant {
        Variant::Plain => path.to_owned(),
        Variant::Compressed => format!("{path}.gz"),
    }
}
