//! Configuration and limits for WebSocket client connections.

use std::time::Duration;

use crate::protocol::frame::{MAX_PAYLOAD_LEN, MAX_WIRE_HEADER_LEN};

/// Size limits for a client connection.
///
/// These bound the memory a single connection may use while reading the
/// handshake response or buffering an incoming frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// Never above 65535, the largest length the 16-bit encoding can carry.
    ///
    /// Default: 65535
    pub max_payload_size: usize,

    /// Maximum length of a single handshake response line.
    ///
    /// `None` means lines are only bounded by `max_handshake_size`.
    ///
    /// Default: None
    pub max_header_line: Option<usize>,

    /// Maximum size of the whole handshake response in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_LEN,
            max_header_line: None,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    ///
    /// `max_payload_size` is clamped to 65535.
    #[must_use]
    pub const fn new(
        max_payload_size: usize,
        max_header_line: Option<usize>,
        max_handshake_size: usize,
    ) -> Self {
        let max_payload_size = if max_payload_size > MAX_PAYLOAD_LEN {
            MAX_PAYLOAD_LEN
        } else {
            max_payload_size
        };
        Self {
            max_payload_size,
            max_header_line,
            max_handshake_size,
        }
    }

    /// Create limits suitable for microcontrollers with fixed scratch buffers.
    ///
    /// - Max payload: 1 KB
    /// - Max header line: 100 bytes
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_payload_size: 1024,
            max_header_line: Some(100),
            max_handshake_size: 4096,
        }
    }

    /// Most bytes a connection holds in its read buffer: one accepted frame
    /// with the longest possible header.
    #[must_use]
    pub const fn max_buffered(&self) -> usize {
        self.max_payload_size + MAX_WIRE_HEADER_LEN
    }

    /// Validate that a payload size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`](crate::Error::PayloadTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_payload_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_payload_size as u64 {
            Err(crate::Error::PayloadTooLarge {
                size,
                max: self.max_payload_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a handshake line length is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LineTooLong`](crate::Error::LineTooLong) if `len` exceeds `max_header_line`.
    pub const fn check_header_line(&self, len: usize) -> Result<(), crate::Error> {
        match self.max_header_line {
            Some(max) if len > max => Err(crate::Error::LineTooLong { max }),
            _ => Ok(()),
        }
    }

    /// Validate that the handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Timeout configuration for client connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Time budget for each handshake response line.
    ///
    /// Default: 5 seconds
    pub handshake_line: Duration,

    /// How long a closing connection waits before the transport is closed.
    ///
    /// Default: 25 milliseconds
    pub close_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake_line: Duration::from_secs(5),
            close_grace: Duration::from_millis(25),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(handshake_line: Duration, close_grace: Duration) -> Self {
        Self {
            handshake_line,
            close_grace,
        }
    }
}

/// WebSocket client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Timeout configuration.
    pub timeouts: Timeouts,

    /// Number of `poll()` ticks between automatic reconnect attempts.
    ///
    /// Default: 100
    pub retry_ticks: u32,

    /// Reconnect automatically from `poll()` while disconnected.
    ///
    /// Default: true
    pub auto_reconnect: bool,

    /// Send attempts before a write is reported as failed.
    ///
    /// Default: 20
    pub write_attempts: u32,

    /// Receive calls per `poll()` while filling the read buffer.
    ///
    /// Default: 10
    pub read_attempts: u32,

    /// Bytes requested from the transport per receive call.
    ///
    /// Default: 1 KB (1024)
    pub read_chunk_size: usize,

    /// Value of the `Sec-WebSocket-Protocol` request header.
    ///
    /// Default: `Some("chat")`
    pub subprotocol: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            timeouts: Timeouts::default(),
            retry_ticks: 100,
            auto_reconnect: true,
            write_attempts: 20,
            read_attempts: 10,
            read_chunk_size: 1024,
            subprotocol: Some("chat".to_string()),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for small targets: embedded limits, smaller reads.
    #[must_use]
    pub fn embedded() -> Self {
        Self {
            limits: Limits::embedded(),
            read_chunk_size: 128,
            ..Default::default()
        }
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the number of ticks between reconnect attempts.
    #[must_use]
    pub const fn with_retry_ticks(mut self, ticks: u32) -> Self {
        self.retry_ticks = ticks;
        self
    }

    /// Enable or disable automatic reconnects.
    #[must_use]
    pub const fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the bounded write and read attempt counts.
    #[must_use]
    pub const fn with_attempts(mut self, write_attempts: u32, read_attempts: u32) -> Self {
        self.write_attempts = write_attempts;
        self.read_attempts = read_attempts;
        self
    }

    /// Set the receive chunk size.
    #[must_use]
    pub const fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set or clear the requested subprotocol.
    #[must_use]
    pub fn with_subprotocol(mut self, protocol: Option<impl Into<String>>) -> Self {
        self.subprotocol = protocol.map(Into::into);
        self
    }
}
