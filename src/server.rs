//! HTTP transport adapter and graceful shutdown.
//!
//! The server owns sockets and connections; the [`Router`] owns every
//! decision about a request. Per request the adapter:
//! 1. Rejects methods outside [`Method`] with `405`.
//! 2. Percent-decodes the path (`400` if it is not UTF-8 once decoded).
//! 3. Collects the body frames, up to [`Server::max_body_size`] (`413` past it).
//! 4. On tokio's blocking pool, picks the handler, feeds it the body chunks
//!    through `handle_body`, and runs `handle_request`.
//! 5. Streams a reader body back in [`CHUNK_SIZE`] pieces from another
//!    blocking task (files are read here, not in the handler).
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets in-flight
//! connections finish, and returns from [`Server::serve`].

use std::convert::Infallible;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited, StreamBody};
use hyper::body::Frame;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::{Body, Response};
use crate::router::Router;
use crate::status::Status;

type HyperResponse = http::Response<BoxBody<Bytes, io::Error>>;

/// Largest request body accepted unless [`Server::max_body_size`] says otherwise.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Size of each piece a streamed response body is read in.
pub const CHUNK_SIZE: usize = 8 * 1024;

// Chunks buffered between the reading task and the connection.
const CHUNKS_IN_FLIGHT: usize = 4;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    max_body_size: usize,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// ```rust,no_run
    /// use kestrel::Server;
    /// let server = Server::bind("0.0.0.0:80");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr, max_body_size: DEFAULT_MAX_BODY_SIZE }
    }

    /// Caps the request body at `bytes`. Larger bodies are answered with
    /// `413` before any handler sees them.
    ///
    /// ```rust,no_run
    /// use kestrel::Server;
    /// let server = Server::bind("0.0.0.0:80").max_body_size(16 * 1024);
    /// ```
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        serve_until(listener, router, shutdown_signal(), self.max_body_size).await
    }

    /// Like [`serve`](Server::serve) on an already bound listener, stopping
    /// when `shutdown` resolves. The address given to [`bind`](Server::bind)
    /// is not used.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        serve_until(listener, router, shutdown, self.max_body_size).await
    }
}

async fn serve_until(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()>,
    max_body_size: usize,
) -> Result<(), Error> {
    // The router is frozen from here on and shared by every connection task.
    let router = Arc::new(router);

    info!(addr = %listener.local_addr()?, handlers = router.len(), "kestrel listening");

    let mut tasks = tokio::task::JoinSet::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Shutdown first, so a pending SIGTERM stops accepting at once.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        async move { dispatch(router, req, remote_addr, max_body_size).await }
                    });

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet stays small.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("kestrel stopped");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Converts one hyper request, runs it through the handler chain, and
/// converts the answer back. Every failure becomes a status code.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> Result<HyperResponse, Infallible> {
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        debug!(peer = %remote_addr, method = %req.method(), "unsupported method");
        return Ok(into_hyper(Response::status(Status::MethodNotAllowed)));
    };

    let (parts, body) = req.into_parts();

    let Ok(path) = percent_decode_str(parts.uri.path()).decode_utf8() else {
        debug!(peer = %remote_addr, path = parts.uri.path(), "path is not UTF-8 once decoded");
        return Ok(into_hyper(Response::status(Status::BadRequest)));
    };

    let mut request = Request::new(method, path);
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(v) => request = request.with_header(name.as_str(), v),
            Err(_) => debug!(header = %name, "skipping non-ASCII header value"),
        }
    }

    let mut body = Limited::new(body, max_body_size);
    let mut chunks = Vec::new();
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(data) = frame.into_data() {
                    chunks.push(data);
                }
            }
            Err(e) if e.is::<LengthLimitError>() => {
                debug!(peer = %remote_addr, limit = max_body_size, "request body too large");
                return Ok(into_hyper(Response::status(Status::ContentTooLarge)));
            }
            Err(e) => {
                warn!(peer = %remote_addr, "failed reading request body: {e}");
                return Ok(into_hyper(Response::status(Status::BadRequest)));
            }
        }
    }
    let received: usize = chunks.iter().map(Bytes::len).sum();
    let total = parts.headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(received);

    // Handlers stat and open storage synchronously.
    let response = tokio::task::spawn_blocking(move || respond(&router, request, &chunks, total)).await;

    Ok(response.unwrap_or_else(|e| {
        error!(peer = %remote_addr, "handler task failed: {e}");
        into_hyper(Response::status(Status::InternalServerError))
    }))
}

fn respond(router: &Router, mut req: Request, chunks: &[Bytes], total: usize) -> HyperResponse {
    let Some(handler) = router.find(&mut req) else {
        debug!(method = %req.method(), url = %req.url(), "no handler");
        return into_hyper(Response::status(Status::NotFound));
    };

    let mut index = 0;
    for chunk in chunks {
        handler.handle_body(&mut req, chunk, index, total);
        index += chunk.len();
    }

    into_hyper(Router::complete(handler, &mut req))
}

/// Builds the hyper response. A reader body is handed to a blocking task
/// that feeds the connection chunk by chunk.
fn into_hyper(res: Response) -> HyperResponse {
    let Response { body, headers, status } = res;

    let body = match body {
        Body::Empty => full(Bytes::new()),
        Body::Bytes(b) => full(b),
        Body::Reader(reader) => {
            let (tx, rx) = mpsc::channel(CHUNKS_IN_FLIGHT);
            tokio::task::spawn_blocking(move || pump(reader, &tx));
            StreamBody::new(ReceiverStream::new(rx)).boxed()
        }
    };

    let mut builder = http::Response::builder().status(status);
    for (name, value) in &headers {
        builder = builder.header(name, value);
    }
    builder.body(body).unwrap_or_else(|e| {
        error!("invalid response: {e}");
        internal_error()
    })
}

/// Reads `reader` to the end, sending each chunk as a data frame.
///
/// The status line is already on the wire, so a read error can only cut the
/// body short: the error frame makes hyper abort the response.
fn pump(mut reader: Box<dyn Read + Send>, tx: &mpsc::Sender<Result<Frame<Bytes>, io::Error>>) {
    let mut buf = vec![0; CHUNK_SIZE];
    loop {
        let frame = match reader.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => Ok(Frame::data(Bytes::copy_from_slice(&buf[..n]))),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("failed reading response body: {e}");
                Err(e)
            }
        };
        let failed = frame.is_err();
        if tx.blocking_send(frame).is_err() {
            debug!("client went away before the body was sent");
            return;
        }
        if failed {
            return;
        }
    }
}

fn full(bytes: Bytes) -> BoxBody<Bytes, io::Error> {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

fn internal_error() -> HyperResponse {
    let mut res = http::Response::new(full(Bytes::new()));
    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
