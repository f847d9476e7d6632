use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::message::{CloseFrame, Message};
use crate::protocol::handshake::{HandshakeRequest, HandshakeResponse, generate_key};
use crate::protocol::{Frame, FrameHeader, OpCode, ZERO_MASK};
use crate::transport::{OsRandom, RandomSource};
use crate::url::Url;

/// Client-side frame codec over an async byte stream.
///
/// Frames written through the codec are always masked. Frames read from it
/// are checked against the configured limits before their payload is
/// buffered.
pub struct FrameCodec<T, R = OsRandom> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    // Bytes of a rejected oversized frame still to be read and dropped.
    discard: u64,
    config: Config,
    random: R,
}

impl<T> FrameCodec<T> {
    #[must_use]
    pub fn new(io: T, config: Config) -> Self {
        Self::with_random(io, config, OsRandom::new())
    }
}

impl<T, R: RandomSource> FrameCodec<T, R> {
    #[must_use]
    pub fn with_random(io: T, config: Config, random: R) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(config.read_chunk_size),
            write_buf: BytesMut::new(),
            discard: 0,
            config,
            random,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }

    fn generate_mask(&mut self) -> [u8; 4] {
        let mut mask = [0u8; 4];
        self.random.fill_bytes(&mut mask);
        mask
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin, R: RandomSource> FrameCodec<T, R> {
    /// Run the opening handshake for `url` over the stream.
    ///
    /// Bytes after the response headers are kept and read as frames.
    pub async fn handshake(&mut self, url: &Url) -> Result<HandshakeResponse> {
        let key = generate_key(&mut self.random);
        let request = HandshakeRequest::new(url.host_header(), url.path.clone(), key)
            .with_protocol(self.config.subprotocol.clone());

        let mut out = Vec::with_capacity(256);
        request.write(&mut out)?;
        self.io.write_all(&out).await?;
        self.io.flush().await?;

        let end = loop {
            if let Some(pos) = self.read_buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            self.config.limits.check_handshake_size(self.read_buf.len())?;
            if self.io.read_buf(&mut self.read_buf).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
        };
        self.config.limits.check_handshake_size(end)?;

        let head = self.read_buf.split_to(end);
        let response = HandshakeResponse::parse(&head)?;
        response.verify(&request.key)?;
        Ok(response)
    }

    /// Read the next frame.
    ///
    /// Frames longer than `Limits::max_payload_size` are rejected with
    /// `Error::PayloadTooLarge` before their payload is read, and skipped.
    /// Any other decode error drops the offending frame, and a reserved
    /// opcode drops everything buffered, so the next call reads on.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if self.discard > 0 {
                let n = self.discard.min(self.read_buf.len() as u64);
                self.read_buf.advance(n as usize);
                self.discard -= n;
            }

            if self.discard == 0 {
                match FrameHeader::parse(&self.read_buf) {
                    Ok(header) => {
                        if let Err(e) = header.opcode() {
                            self.read_buf.clear();
                            return Err(e);
                        }
                        if let Err(e) = self.config.limits.check_payload_size(header.payload_len) {
                            self.skip_frame(header.frame_len());
                            return Err(e);
                        }

                        // Bounded by the payload limit checked above.
                        let frame_len = header.frame_len() as usize;
                        if self.read_buf.len() >= frame_len {
                            let raw = self.read_buf.split_to(frame_len);
                            let (frame, _) = Frame::parse(&raw)?;
                            return Ok(frame);
                        }
                    }
                    Err(Error::IncompleteFrame { .. }) => {}
                    Err(e) => return Err(e),
                }
            }

            self.read_buf.reserve(self.config.read_chunk_size);
            if self.io.read_buf(&mut self.read_buf).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    fn skip_frame(&mut self, frame_len: u64) {
        let buffered = self.read_buf.len() as u64;
        if buffered >= frame_len {
            self.read_buf.advance(frame_len as usize);
        } else {
            self.discard = frame_len - buffered;
            self.read_buf.clear();
        }
    }

    /// Read the next data message, answering pings on the way.
    ///
    /// Returns `Ok(None)` once the server closes; the close has been echoed.
    pub async fn read_message(&mut self) -> Result<Option<Message>> {
        loop {
            let frame = self.read_frame().await?;
            match frame.opcode {
                OpCode::Ping => self.write_frame(&Frame::pong(Vec::new())).await?,
                OpCode::Pong => {}
                OpCode::Close => {
                    let close = CloseFrame::from_payload(frame.payload());
                    let echo = Frame::close(close.map(|c| c.code.as_u16()), "");
                    self.write_frame(&echo).await?;
                    return Ok(None);
                }
                _ => return Message::from_frame(frame),
            }
        }
    }

    /// Write a frame, masked with a fresh key (all-zero for empty control
    /// frames).
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = if frame.opcode.is_control() && frame.payload().is_empty() {
            ZERO_MASK
        } else {
            self.generate_mask()
        };

        let wire_size = frame.wire_size(true);
        self.write_buf.clear();
        self.write_buf.resize(wire_size, 0);

        let written = frame.write(&mut self.write_buf, Some(mask))?;
        self.io.write_all(&self.write_buf[..written]).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }
}
