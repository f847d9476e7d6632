//! Opening handshake over a live transport.

use std::time::Duration;

use bytes::{Buf, BytesMut};

use crate::config::Config;
use crate::connection::io::{is_transient, write_all};
use crate::error::{Error, Result};
use crate::protocol::handshake::{HandshakeRequest, HandshakeResponse};
use crate::transport::{Clock, Transport};

/// Pause between receive attempts while a handshake line is incomplete.
const LINE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Send `request` and read the server's response into `buf`.
///
/// Bytes that follow the blank line ending the response stay in `buf`.
///
/// # Errors
///
/// - `Error::ConnectionClosed` if the request cannot be written or the
///   stream ends early
/// - `Error::Timeout` if a response line takes longer than
///   `Timeouts::handshake_line`
/// - `Error::LineTooLong` / `Error::HandshakeTooLarge` per `Limits`
/// - `Error::InvalidHandshake` / `Error::HandshakeMismatch` for a bad response
pub(crate) fn perform<T, C>(
    transport: &mut T,
    clock: &C,
    buf: &mut BytesMut,
    config: &Config,
    request: &HandshakeRequest,
) -> Result<HandshakeResponse>
where
    T: Transport + ?Sized,
    C: Clock + ?Sized,
{
    let mut out = Vec::with_capacity(256);
    request.write(&mut out)?;
    write_all(transport, &out, config.write_attempts)?;
    tracing::debug!(bytes = out.len(), path = %request.path, "upgrade request sent");

    let mut lines = Vec::new();
    let mut total = 0;
    loop {
        let line = read_line(transport, clock, buf, config)?;
        total += line.len() + 2;
        config.limits.check_handshake_size(total)?;
        if line.is_empty() {
            break;
        }
        tracing::trace!(line = %line, "handshake line");
        lines.push(line);
    }

    let response = HandshakeResponse::parse_lines(lines.iter().map(String::as_str))?;
    if let Err(err) = response.verify(&request.key) {
        tracing::warn!(%err, "server accept key does not match");
        return Err(err);
    }
    tracing::debug!(protocol = ?response.protocol, "handshake accepted");
    Ok(response)
}

/// Read one line, without its terminator.
///
/// Lines end with `\n`; a preceding `\r` is stripped.
fn read_line<T, C>(
    transport: &mut T,
    clock: &C,
    buf: &mut BytesMut,
    config: &Config,
) -> Result<String>
where
    T: Transport + ?Sized,
    C: Clock + ?Sized,
{
    let limits = &config.limits;
    let started = clock.now();
    let mut scratch = vec![0u8; config.read_chunk_size.max(1)];

    loop {
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let end = if pos > 0 && buf[pos - 1] == b'\r' { pos - 1 } else { pos };
            limits.check_header_line(end)?;
            let line = std::str::from_utf8(&buf[..end])
                .map_err(|_| Error::InvalidHandshake("Non-UTF-8 header line".into()))?
                .to_string();
            buf.advance(pos + 1);
            return Ok(line);
        }

        // A trailing '\r' may still become part of the terminator.
        let partial = buf.len() - usize::from(buf.last() == Some(&b'\r'));
        limits.check_header_line(partial)?;
        limits.check_handshake_size(buf.len())?;

        if clock.now().duration_since(started) >= config.timeouts.handshake_line {
            return Err(Error::Timeout);
        }

        match transport.receive(&mut scratch) {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(n) => buf.extend_from_slice(&scratch[..n]),
            Err(e) if is_transient(&e) => clock.sleep(LINE_POLL_INTERVAL),
            Err(e) => return Err(e.into()),
        }
    }
}
