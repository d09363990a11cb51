use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use kestrel::{
    CHUNK_SIZE, CallbackHandler, FileSystem, MemoryFs, Method, Request, Response, Router, Server,
    Status,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Running = (SocketAddr, oneshot::Sender<()>, JoinHandle<Result<(), kestrel::Error>>);

async fn start(server: Server, app: Router) -> Running {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_listener(listener, app, async {
        let _ = stopped.await;
    }));
    (addr, stop, handle)
}

/// Sends `raw` and returns whatever arrives before the server closes.
async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    // An aborted response may end in a reset; keep what was read.
    let _ = stream.read_to_end(&mut out).await;
    String::from_utf8_lossy(&out).into_owned()
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n")
}

/// Body of a complete response, with chunked framing removed.
fn body(res: &str) -> String {
    let (head, mut rest) = res.split_once("\r\n\r\n").expect("no header terminator");
    if !head.contains("transfer-encoding: chunked") {
        return rest.to_owned();
    }
    let mut out = String::new();
    loop {
        let (size, tail) = rest.split_once("\r\n").expect("no chunk size");
        let size = usize::from_str_radix(size, 16).expect("bad chunk size");
        if size == 0 {
            return out;
        }
        out.push_str(&tail[..size]);
        rest = &tail[size + 2..];
    }
}

#[tokio::test]
async fn serves_handlers_over_http() {
    let posted = Arc::new(Mutex::new(Vec::new()));
    let fs = Arc::new(
        MemoryFs::new()
            .with_file("/www/index.htm", "<h1>home</h1>")
            .with_file("/www/app.js", "plain")
            .with_file("/www/app.js.gz", "gz"),
    );
    let app = Router::new()
        .on(Method::Get, "/api/ping", |req: &mut Request| req.send(Response::text("pong")))
        .handler(
            CallbackHandler::new()
                .uri("/api/led")
                .method(Method::Post)
                .on_body({
                    let posted = Arc::clone(&posted);
                    move |_req: &mut Request, data: &[u8], index: usize, total: usize| {
                        posted.lock().unwrap().push((data.to_vec(), index, total));
                    }
                })
                .on_request(|req: &mut Request| req.send(Status::NoContent)),
        )
        .serve_static("/", fs, "/www/", "max-age=600");

    let (addr, stop, server) = start(Server::bind("127.0.0.1:0"), app).await;

    let res = roundtrip(addr, &get("/api/ping")).await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert_eq!(body(&res), "pong");

    let res = roundtrip(
        addr,
        "GET /app.js HTTP/1.1\r\nhost: x\r\naccept-encoding: gzip\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.contains("content-encoding: gzip"), "{res}");
    assert!(res.contains("cache-control: max-age=600"), "{res}");
    assert_eq!(body(&res), "gz");

    let res = roundtrip(addr, &get("/")).await;
    assert!(res.contains("content-type: text/html; charset=utf-8"), "{res}");
    assert_eq!(body(&res), "<h1>home</h1>");

    let res = roundtrip(addr, &get("/nope.png")).await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");

    let res = roundtrip(
        addr,
        "POST /api/led HTTP/1.1\r\nhost: x\r\ncontent-length: 2\r\nconnection: close\r\n\r\non",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 204"), "{res}");
    assert_eq!(*posted.lock().unwrap(), [(b"on".to_vec(), 0, 2)]);

    let res = roundtrip(addr, "PROPFIND / HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 405"), "{res}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn paths_are_percent_decoded_before_matching() {
    let fs = Arc::new(
        MemoryFs::new()
            .with_file("/secret.txt", "secret")
            .with_file("/www/my file.txt", "spaced"),
    );
    let app = Router::new().serve_static("/", fs, "/www/", "");
    let (addr, stop, server) = start(Server::bind("127.0.0.1:0"), app).await;

    let res = roundtrip(addr, &get("/my%20file.txt")).await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert_eq!(body(&res), "spaced");

    let res = roundtrip(addr, &get("/%2e%2e/secret.txt")).await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");

    let res = roundtrip(addr, &get("/%ff.txt")).await;
    assert!(res.starts_with("HTTP/1.1 400"), "{res}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversized_bodies_are_refused_before_any_handler() {
    let seen = Arc::new(Mutex::new(0usize));
    let app = Router::new().handler(
        CallbackHandler::new()
            .uri("/upload")
            .on_body({
                let seen = Arc::clone(&seen);
                move |_req: &mut Request, data: &[u8], _index: usize, _total: usize| {
                    *seen.lock().unwrap() += data.len();
                }
            })
            .on_request(|req: &mut Request| req.send(Status::NoContent)),
    );
    let (addr, stop, server) = start(Server::bind("127.0.0.1:0").max_body_size(16), app).await;

    let small = "POST /upload HTTP/1.1\r\nhost: x\r\ncontent-length: 8\r\nconnection: close\r\n\r\n12345678";
    let res = roundtrip(addr, small).await;
    assert!(res.starts_with("HTTP/1.1 204"), "{res}");

    let big = format!(
        "POST /upload HTTP/1.1\r\nhost: x\r\ncontent-length: 32\r\nconnection: close\r\n\r\n{}",
        "x".repeat(32),
    );
    let res = roundtrip(addr, &big).await;
    assert!(res.starts_with("HTTP/1.1 413"), "{res}");
    assert_eq!(*seen.lock().unwrap(), 8);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn large_files_arrive_in_chunks() {
    let contents = "0123456789abcdef".repeat(CHUNK_SIZE / 16 * 2 + 3);
    let fs = Arc::new(MemoryFs::new().with_file("/www/big.txt", contents.clone()));
    let app = Router::new().serve_static("/", fs, "/www/", "");
    let (addr, stop, server) = start(Server::bind("127.0.0.1:0"), app).await;

    let res = roundtrip(addr, &get("/big.txt")).await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.contains("transfer-encoding: chunked"));
    assert_eq!(body(&res), contents);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

struct Failing;

impl Read for Failing {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("medium went away"))
    }
}

/// Opens fine, then fails after the first few bytes.
struct Flaky;

impl FileSystem for Flaky {
    fn exists(&self, path: &str) -> bool {
        path == "/www/log.txt"
    }

    fn open(&self, _path: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Read::chain(io::Cursor::new(b"partial".to_vec()), Failing)))
    }
}

#[tokio::test]
async fn read_failure_mid_body_cuts_the_response_short() {
    let app = Router::new().serve_static("/", Arc::new(Flaky), "/www/", "");
    let (addr, stop, server) = start(Server::bind("127.0.0.1:0"), app).await;

    let res = roundtrip(addr, &get("/log.txt")).await;
    assert!(!res.contains(" 500 "), "{res}");
    assert!(!res.ends_with("0\r\n\r\n"), "{res}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
