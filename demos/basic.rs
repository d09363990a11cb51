//! Minimal kestrel example — a static site with a small JSON API in front.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i --compressed http://localhost:3000/app.js
//!   curl -i http://localhost:3000/api/led
//!   curl -i -X POST http://localhost:3000/api/led -d 'on'

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kestrel::{CallbackHandler, MemoryFs, Method, Request, Response, Router, Server, Status};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let assets = Arc::new(
        MemoryFs::new()
            .with_file("/www/index.htm", &b"<!doctype html><script src=app.js></script>"[..])
            .with_file("/www/app.js", &b"console.log('plain')"[..])
            .with_file("/www/app.js.gz", gzip_stub()),
    );

    let led = Arc::new(AtomicBool::new(false));
    let led_get = Arc::clone(&led);
    let led_set = Arc::clone(&led);

    let app = Router::new()
        .on(Method::Get, "/api/led", move |req: &mut Request| {
            let on = led_get.load(Ordering::Relaxed);
            req.send(Response::json(format!(r#"{{"on":{on}}}"#).into_bytes()));
        })
        // POST /api/led — the body arrives in chunks before the request callback.
        .handler(
            CallbackHandler::new()
                .uri("/api/led")
                .method(Method::Post)
                .on_body(move |_req: &mut Request, data: &[u8], _index: usize, _total: usize| {
                    led_set.store(data.starts_with(b"on"), Ordering::Relaxed);
                })
                .on_request(|req: &mut Request| req.send(Status::NoContent)),
        )
        .serve_static("/", assets, "/www/", "max-age=600");

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// A real device ships files gzipped at build time. This is the gzip encoding
// of `console.log('gz')`, enough to see content-encoding at work.
fn gzip_stub() -> Vec<u8> {
    vec![
        0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x03, 0x4b, 0xce, 0xcf, 0x2b,
        0xce, 0xcf, 0x49, 0xd5, 0xcb, 0xc9, 0x4f, 0xd7, 0x50, 0x4f, 0xaf, 0x52, 0xd7, 0x04,
        0x00, 0xcf, 0x35, 0xc7, 0x11, 0x11, 0x00, 0x00, 0x00,
    ]
}
