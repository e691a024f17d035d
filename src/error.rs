use reqwest::StatusCode;
use std::io;

/// Errors produced while probing, fetching and parsing a remote archive.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The trailing 22 bytes do not carry the end of central directory signature.
    #[error("Not a valid ZIP file")]
    NotAZipFile,

    /// The size probe did not return a usable Content-Length.
    #[error("Remote server did not return Content-Length")]
    MissingContentLength,

    /// The size probe was answered with a non-success status.
    #[error("HTTP request failed with status: {0}")]
    HttpStatus(StatusCode),

    /// A range request was answered with something other than 206 Partial Content.
    #[error("Range request answered with status {0}, remote does not support Range requests")]
    RangeNotSupported(StatusCode),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found in archive: {0}")]
    EntryNotFound(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// A read was attempted at a position outside `[0, length)`.
    #[error("Read at position {position} is outside the archive (length {length})")]
    OutOfBounds { position: i64, length: u64 },

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("Encrypted entries are not supported: {0}")]
    Encrypted(String),

    #[error("CRC-32 mismatch for {name}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Stream is read-only")]
    ReadOnly,
}

impl Error {
    /// Whether the failure belongs to the transport class worth another attempt.
    ///
    /// Status-level failures (`RangeNotSupported`, `HttpStatus`) are structural and
    /// never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_request(),
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_connection_errors_are_transient() {
        let err = Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(err.is_transient());

        let err = Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(!err.is_transient());
    }

    #[test]
    fn structural_errors_are_not_transient() {
        assert!(!Error::RangeNotSupported(StatusCode::OK).is_transient());
        assert!(!Error::NotAZipFile.is_transient());
        assert!(!Error::MissingContentLength.is_transient());
        assert!(!Error::Cancelled.is_transient());
    }
}
