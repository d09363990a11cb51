//! HTTP status codes as a typed enum.
//!
//! Use [`Status`] anywhere a status code is accepted: `Response::status()`,
//! `Response::builder().status()`, or `request.send(Status::NotFound)`.
//!
//! ```rust
//! use kestrel::{Method, Request, Status};
//!
//! let mut req = Request::new(Method::Get, "/missing");
//! req.send(Status::NotFound);
//! assert_eq!(req.response().map(|r| r.status_code()), Some(404));
//! ```

/// The status codes this crate produces, plus `NoContent` for handlers.
///
/// Arbitrary codes are still reachable through `Response::status(u16)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200
    NoContent,           // 204

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    NotFound,            // 404
    MethodNotAllowed,    // 405
    ContentTooLarge,     // 413

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                  => 200,
            Status::NoContent           => 204,
            Status::BadRequest          => 400,
            Status::NotFound            => 404,
            Status::MethodNotAllowed    => 405,
            Status::ContentTooLarge     => 413,
            Status::InternalServerError => 500,
        }
    }
}
