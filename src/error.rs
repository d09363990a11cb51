//! Unified error type.

use std::fmt;

/// The error type returned by kestrel's fallible operations.
///
/// Handler-level outcomes (404 for a missing resource, 500 for a handler that
/// never answered) are expressed as [`Response`](crate::Response) values sent
/// through the [`Request`](crate::Request), never as `Error`s. This type only
/// surfaces transport failures: binding the listener or accepting a socket.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl Error {
    /// The underlying I/O failure.
    pub fn io(&self) -> &std::io::Error {
        &self.0
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}
