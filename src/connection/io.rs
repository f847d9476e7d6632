//! Bounded read and write loops over a [`Transport`].

use std::io;

use bytes::BytesMut;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Outcome of a [`fill`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    /// Bytes appended to the buffer (possibly zero).
    Read(usize),
    /// The peer closed the stream.
    Eof,
}

/// Send all of `data`, giving up after `attempts` calls that made no progress.
///
/// # Errors
///
/// Returns `Error::ConnectionClosed` when the attempts run out or the
/// transport reports a hard error.
pub(crate) fn write_all<T: Transport + ?Sized>(
    transport: &mut T,
    mut data: &[u8],
    attempts: u32,
) -> Result<()> {
    let mut stalled = 0;
    while !data.is_empty() {
        match transport.send(data) {
            Ok(0) => stalled += 1,
            Ok(n) => {
                data = &data[n..];
                stalled = 0;
            }
            Err(e) if is_transient(&e) => stalled += 1,
            Err(e) => {
                tracing::warn!(error = %e, "transport send failed");
                return Err(Error::ConnectionClosed);
            }
        }
        if stalled >= attempts {
            tracing::warn!(attempts, remaining = data.len(), "giving up on write");
            return Err(Error::ConnectionClosed);
        }
    }
    Ok(())
}

/// Append whatever the transport has ready to `buf`, using at most
/// `attempts` receive calls of `chunk` bytes each and appending no more than
/// `limit` bytes.
///
/// Stops early on the first call that finds nothing ready.
///
/// # Errors
///
/// Returns `Error::Io` for hard transport errors.
pub(crate) fn fill<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut BytesMut,
    chunk: usize,
    attempts: u32,
    limit: usize,
) -> Result<Fill> {
    let mut scratch = vec![0u8; chunk.clamp(1, limit.max(1))];
    let mut total = 0;
    for _ in 0..attempts {
        let want = scratch.len().min(limit - total);
        if want == 0 {
            break;
        }
        match transport.receive(&mut scratch[..want]) {
            Ok(0) => return Ok(Fill::Eof),
            Ok(n) => {
                buf.extend_from_slice(&scratch[..n]);
                total += n;
                if n < want {
                    break;
                }
            }
            Err(e) if is_transient(&e) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Fill::Read(total))
}

pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Accepts at most `per_call` bytes per send, and replays queued reads.
    #[derive(Default)]
    struct Trickle {
        sent: Vec<u8>,
        per_call: usize,
        refuse: bool,
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Transport for Trickle {
        fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
            Ok(())
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.refuse {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(self.per_call);
            self.sent.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.reads.push_front(Ok(data.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }

        fn close(&mut self) {}

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_write_all_in_pieces() {
        let mut t = Trickle {
            per_call: 3,
            ..Default::default()
        };
        write_all(&mut t, b"hello world", 2).unwrap();
        assert_eq!(t.sent, b"hello world");
    }

    #[test]
    fn test_write_all_gives_up() {
        let mut t = Trickle {
            refuse: true,
            ..Default::default()
        };
        assert_eq!(write_all(&mut t, b"x", 20), Err(Error::ConnectionClosed));
    }

    #[test]
    fn test_fill_collects_until_would_block() {
        let mut t = Trickle::default();
        t.reads.push_back(Ok(vec![1, 2, 3, 4]));
        t.reads.push_back(Ok(vec![5, 6]));
        let mut buf = BytesMut::new();

        assert_eq!(fill(&mut t, &mut buf, 4, 10, 64).unwrap(), Fill::Read(6));
        assert_eq!(&buf[..], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(fill(&mut t, &mut buf, 4, 10, 64).unwrap(), Fill::Read(0));
    }

    #[test]
    fn test_fill_respects_attempts() {
        let mut t = Trickle::default();
        for _ in 0..5 {
            t.reads.push_back(Ok(vec![0xaa; 2]));
        }
        let mut buf = BytesMut::new();

        assert_eq!(fill(&mut t, &mut buf, 2, 3, 64).unwrap(), Fill::Read(6));
        assert_eq!(t.reads.len(), 2);
    }

    #[test]
    fn test_fill_stops_at_limit() {
        let mut t = Trickle::default();
        t.reads.push_back(Ok(vec![0xaa; 4]));
        t.reads.push_back(Ok(vec![0xbb; 4]));
        let mut buf = BytesMut::new();

        assert_eq!(fill(&mut t, &mut buf, 4, 10, 6).unwrap(), Fill::Read(6));
        assert_eq!(&buf[..], &[0xaa, 0xaa, 0xaa, 0xaa, 0xbb, 0xbb]);
        assert_eq!(fill(&mut t, &mut buf, 4, 10, 0).unwrap(), Fill::Read(0));
    }

    #[test]
    fn test_fill_eof() {
        let mut t = Trickle::default();
        t.reads.push_back(Ok(Vec::new()));
        let mut buf = BytesMut::new();
        assert_eq!(fill(&mut t, &mut buf, 8, 10, 64).unwrap(), Fill::Eof);
    }
}
