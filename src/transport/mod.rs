//! Collaborators the client is generic over: the byte-stream transport, a
//! clock and a source of randomness.
//!
//! Everything platform-specific lives behind these traits so the protocol
//! logic runs unchanged on a desktop socket, a WiFi module or a test double.

use std::io;
use std::time::{Duration, Instant};

mod tcp;

pub use tcp::TcpTransport;

/// A reliable, ordered byte stream to a single server.
///
/// Implementations must not block indefinitely in [`Transport::receive`]:
/// when no data is available they return an error of kind
/// [`io::ErrorKind::WouldBlock`].
pub trait Transport {
    /// Open a connection to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Send some of `buf`, returning how many bytes were accepted.
    ///
    /// `Ok(0)` or `WouldBlock` mean nothing was accepted this time.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Receive into `buf`.
    ///
    /// Returns `Ok(0)` at end of stream and `WouldBlock` when no data is
    /// ready yet.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Close the connection. Closing twice is harmless.
    fn close(&mut self);

    /// Whether the connection is believed to be up.
    fn is_connected(&self) -> bool;

    /// Whether this transport wraps the stream in TLS, making `wss` usable.
    fn is_secure(&self) -> bool {
        false
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        (**self).connect(host, port)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).send(buf)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).receive(buf)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn is_secure(&self) -> bool {
        (**self).is_secure()
    }
}

/// Monotonic time and short sleeps.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Pause the caller for `duration`.
    ///
    /// Only used between receive attempts while waiting for handshake lines.
    fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by `std::time` and `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Source of the bytes used for handshake keys and masking keys.
pub trait RandomSource {
    /// Fill `buf` with random bytes.
    fn fill_bytes(&mut self, buf: &mut [u8]);
}

/// [`RandomSource`] backed by the operating system.
///
/// Falls back to a time-seeded mixer if the OS source fails.
#[derive(Debug, Clone, Default)]
pub struct OsRandom {
    fallback: u32,
}

impl OsRandom {
    /// Create a new OS-backed random source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fallback_word(&mut self) -> u32 {
        if self.fallback == 0 {
            use std::time::{SystemTime, UNIX_EPOCH};
            self.fallback = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u32)
                .unwrap_or(0x1234_5678);
        }
        self.fallback = self.fallback.wrapping_add(0x9E37_79B9);
        let b = self.fallback.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        c.wrapping_mul(0xC2B2_AE35)
    }
}

impl RandomSource for OsRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        if getrandom::getrandom(buf).is_ok() {
            return;
        }
        tracing::warn!("OS random source failed, using time-seeded fallback");
        for chunk in buf.chunks_mut(4) {
            let word = self.fallback_word().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}
