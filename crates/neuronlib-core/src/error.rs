//! Error types for neuronlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Device-level, transport-level,
//! protocol-level and request-validation errors are all captured here.

/// The error type for all neuronlib operations.
///
/// The first five variants are the terminal failure kinds a protocol
/// message can reach; the remaining ones cover argument validation and
/// lifecycle problems outside a single bus exchange.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bus device (or interrupt line) is missing or cannot be opened.
    ///
    /// Fatal to node attach; never retried internally.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The atomic bus transfer itself failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The reply did not match the request (opcode, address or checksum).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The message deadline passed before the transfer completed.
    #[error("timeout waiting for reply")]
    Timeout,

    /// The request exceeds a segment or register ceiling and was rejected
    /// before any transfer was attempted.
    #[error("request too large: {0}")]
    RequestTooLarge(String),

    /// An invalid parameter was passed to a node operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The bus worker is not running (never started, or already shut down).
    #[error("not connected")]
    NotConnected,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_device_unavailable() {
        let e = Error::DeviceUnavailable("/dev/spidev0.1".into());
        assert_eq!(e.to_string(), "device unavailable: /dev/spidev0.1");
    }

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("ioctl failed".into());
        assert_eq!(e.to_string(), "transport error: ioctl failed");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("bad checksum".into());
        assert_eq!(e.to_string(), "protocol error: bad checksum");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for reply");
    }

    #[test]
    fn error_display_request_too_large() {
        let e = Error::RequestTooLarge("127 registers".into());
        assert_eq!(e.to_string(), "request too large: 127 registers");
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("node index 3".into());
        assert_eq!(e.to_string(), "invalid parameter: node index 3");
    }

    #[test]
    fn error_display_not_connected() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such device");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("no such device"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
