//! Error types for the WebSocket client.
//!
//! Every failure the client can observe, from URL parsing through the
//! handshake to frame decoding, is reported through [`Error`].

use thiserror::Error;

/// Result type alias for WebSocket client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket client operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The URL has no `://` separator or an unusable host/port.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// The URL scheme is not `ws` (or `wss` without a secure transport).
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The transport could not open a connection to the server.
    #[error("Failed to connect to {host}:{port}: {reason}")]
    TransportConnectFailed {
        /// Host that was dialed.
        host: String,
        /// Port that was dialed.
        port: u16,
        /// Transport-reported reason.
        reason: String,
    },

    /// No handshake line arrived within the time budget.
    #[error("Timed out waiting for handshake response")]
    Timeout,

    /// The server's `Sec-WebSocket-Accept` value does not match the key.
    #[error("Sec-WebSocket-Accept mismatch: expected {expected}, received {received}")]
    HandshakeMismatch {
        /// Value derived from the client key.
        expected: String,
        /// Value the server sent.
        received: String,
    },

    /// The handshake response is not a valid upgrade response.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// A header value contains characters that would break the request.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A handshake response line exceeds the configured maximum.
    #[error("Handshake line too long (max: {max} bytes)")]
    LineTooLong {
        /// Maximum allowed line length.
        max: usize,
    },

    /// The handshake response headers exceed the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The connection is closed or was lost.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A data frame arrived without the FIN bit set.
    #[error("Fragmented messages are not supported")]
    FragmentationUnsupported,

    /// A payload does not fit the 16-bit length encoding.
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge {
        /// Actual payload size.
        size: u64,
        /// Maximum supported size.
        max: usize,
    },

    /// An unknown opcode was read; the byte stream is likely out of sync.
    #[error("Protocol desync: unexpected opcode {0:#x}")]
    ProtocolDesync(u8),

    /// Reserved bits set without a negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether this error belongs to the connection attempt (URL, transport or
    /// handshake) rather than to a single frame.
    #[must_use]
    pub const fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedUrl(_)
                | Error::UnsupportedScheme(_)
                | Error::TransportConnectFailed { .. }
                | Error::Timeout
                | Error::HandshakeMismatch { .. }
                | Error::InvalidHandshake(_)
                | Error::InvalidHeaderValue { .. }
                | Error::LineTooLong { .. }
                | Error::HandshakeTooLarge { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
