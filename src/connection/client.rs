//! The connection controller.

use std::time::Instant;

use bytes::{Buf, BytesMut};

use crate::config::Config;
use crate::connection::handler::Handler;
use crate::connection::io::{Fill, fill, write_all};
use crate::connection::retry::RetryTimer;
use crate::connection::state::ConnectionState;
use crate::connection::handshake;
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::handshake::{HandshakeRequest, generate_key};
use crate::protocol::{Frame, FrameHeader, OpCode, ZERO_MASK};
use crate::transport::{Clock, OsRandom, RandomSource, SystemClock, Transport};
use crate::url::Url;

/// A cooperative WebSocket client.
///
/// `Client` owns its transport and never spawns threads. The caller drives it
/// by invoking [`poll`](Client::poll) periodically; every callback on the
/// [`Handler`] runs inside `connect()` or `poll()`.
///
/// While disconnected, `poll()` counts down `Config::retry_ticks` ticks and
/// then attempts one reconnect, so a client that is only polled still ends up
/// connected.
///
/// # Example
///
/// ```no_run
/// use mcu_ws::{Client, Message, TcpTransport};
///
/// let mut client = Client::new("ws://127.0.0.1:9001/", TcpTransport::new(), ())?;
/// client.connect()?;
/// client.send("hello")?;
/// loop {
///     client.poll()?;
///     # break;
/// }
/// # Ok::<(), mcu_ws::Error>(())
/// ```
pub struct Client<T, H = (), C = SystemClock, R = OsRandom>
where
    T: Transport,
{
    url: Url,
    config: Config,
    transport: T,
    handler: H,
    clock: C,
    random: R,
    state: ConnectionState,
    retry: RetryTimer,
    auto_reconnect: bool,
    read_buf: BytesMut,
    // Bytes of a rejected oversized frame that have not arrived yet.
    discard: u64,
    close_deadline: Option<Instant>,
    protocol: Option<String>,
}

impl<T: Transport, H: Handler> Client<T, H> {
    /// Create a client for `url` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns the URL parser's error, or `Error::UnsupportedScheme` for a
    /// `wss` URL on a transport without TLS.
    pub fn new(url: &str, transport: T, handler: H) -> Result<Self> {
        Self::with_config(url, Config::default(), transport, handler)
    }

    /// Create a client for `url` with a custom configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Client::new`].
    pub fn with_config(url: &str, config: Config, transport: T, handler: H) -> Result<Self> {
        Client::with_parts(
            Url::parse(url)?,
            config,
            transport,
            handler,
            SystemClock,
            OsRandom::new(),
        )
    }
}

impl<T, H, C, R> Client<T, H, C, R>
where
    T: Transport,
    H: Handler,
    C: Clock,
    R: RandomSource,
{
    /// Create a client from its parts.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedScheme` for a `wss` URL on a transport that
    /// does not report [`Transport::is_secure`].
    pub fn with_parts(
        url: Url,
        config: Config,
        transport: T,
        handler: H,
        clock: C,
        random: R,
    ) -> Result<Self> {
        if url.is_secure() && !transport.is_secure() {
            return Err(Error::UnsupportedScheme(url.scheme));
        }

        let capacity = config.read_chunk_size;
        Ok(Self {
            retry: RetryTimer::new(config.retry_ticks),
            auto_reconnect: config.auto_reconnect,
            url,
            config,
            transport,
            handler,
            clock,
            random,
            state: ConnectionState::Disconnected,
            read_buf: BytesMut::with_capacity(capacity),
            discard: 0,
            close_deadline: None,
            protocol: None,
        })
    }

    /// Open the transport and perform the opening handshake.
    ///
    /// Any existing session is dropped first. Calling `connect()` re-enables
    /// automatic reconnects after a [`close`](Client::close).
    ///
    /// # Errors
    ///
    /// - `Error::TransportConnectFailed` if the transport cannot connect
    /// - any handshake error, see [`Error::is_handshake_error`]
    ///
    /// On error the transport is closed, the state is `Disconnected` and the
    /// retry countdown restarts.
    pub fn connect(&mut self) -> Result<()> {
        self.auto_reconnect = self.config.auto_reconnect;
        self.attempt_connect()
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is not open or the write
    ///   fails (the client is then `Disconnected`)
    /// - `Error::PayloadTooLarge` for more than 65535 bytes
    pub fn send(&mut self, text: &str) -> Result<()> {
        self.send_message(Message::text(text))
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// Same as [`Client::send`].
    pub fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send_message(Message::binary(data))
    }

    /// Send a data message. The frame is masked with a fresh random key.
    ///
    /// # Errors
    ///
    /// Same as [`Client::send`].
    pub fn send_message(&mut self, message: Message) -> Result<()> {
        self.ensure_open()?;
        let frame = message.into_frame();
        let mask = self.random_mask();
        self.send_frame(&frame, mask)
    }

    /// Send a zero-length ping.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConnectionClosed` if the connection is not open or the
    /// write fails.
    pub fn send_ping(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.send_frame(&Frame::ping(Vec::new()), ZERO_MASK)
    }

    /// Start the closing handshake without a status code.
    ///
    /// Automatic reconnects stay suspended until the next
    /// [`connect`](Client::connect).
    ///
    /// # Errors
    ///
    /// Returns `Error::ConnectionClosed` if the close frame cannot be written.
    pub fn close(&mut self) -> Result<()> {
        self.start_close(Frame::close(None, ""))
    }

    /// Start the closing handshake with a status code and reason.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the close frame cannot be written
    /// - `Error::PayloadTooLarge` if the reason does not fit a frame
    pub fn close_with(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        self.start_close(CloseFrame::new(code, reason).to_frame())
    }

    /// Drive the connection. Never blocks on the network.
    ///
    /// - While disconnected: advances the retry countdown and, when it
    ///   reaches zero, attempts one reconnect.
    /// - While open: handles at most one frame, reading from the transport
    ///   only when no complete frame is buffered. Frames buffered when the
    ///   stream ends are all handled before the session is dropped.
    /// - While closing: finishes once the peer answers or the grace period
    ///   ends.
    ///
    /// # Errors
    ///
    /// Returns a decode error for a frame that was dropped (the connection
    /// stays as it was), or `Error::Io` when the transport failed (the
    /// connection is then `Disconnected`). A failed reconnect attempt is
    /// logged, not returned.
    pub fn poll(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Disconnected => {
                self.tick_reconnect();
                Ok(())
            }
            ConnectionState::Handshaking => Ok(()),
            ConnectionState::Open | ConnectionState::Closing => self.poll_session(),
        }
    }

    /// Whether the connection is open and the transport still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open && self.transport.is_connected()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ticks left before the next automatic reconnect attempt.
    #[must_use]
    pub fn retry_countdown(&self) -> u32 {
        self.retry.remaining()
    }

    /// Whether `poll()` will reconnect automatically.
    #[must_use]
    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    /// Received bytes not yet decoded into a frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.read_buf.len()
    }

    /// Subprotocol the server selected in the last handshake.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// The event handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The event handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn attempt_connect(&mut self) -> Result<()> {
        if self.state.has_session() {
            tracing::debug!(state = %self.state, "dropping existing session before connecting");
            self.transport.close();
            self.transition(ConnectionState::Disconnected);
        }

        match self.open_session() {
            Ok(()) => {
                tracing::info!(url = %self.url, "connection open");
                self.handler.on_connect();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(url = %self.url, %err, "connection attempt failed");
                self.enter_disconnected();
                Err(err)
            }
        }
    }

    fn open_session(&mut self) -> Result<()> {
        let key = generate_key(&mut self.random);
        tracing::debug!(%key, "generated Sec-WebSocket-Key");

        let host = self.url.host.clone();
        let port = self.url.port_or_default();
        tracing::info!(%host, port, "connecting");
        self.transport
            .connect(&host, port)
            .map_err(|e| Error::TransportConnectFailed {
                host,
                port,
                reason: e.to_string(),
            })?;

        self.transition(ConnectionState::Handshaking);
        self.reset_session();

        let request = HandshakeRequest::new(self.url.host_header(), self.url.path.clone(), key)
            .with_protocol(self.config.subprotocol.clone());
        let response = handshake::perform(
            &mut self.transport,
            &self.clock,
            &mut self.read_buf,
            &self.config,
            &request,
        )?;

        self.protocol = response.protocol;
        self.transition(ConnectionState::Open);
        Ok(())
    }

    fn tick_reconnect(&mut self) {
        if !self.auto_reconnect || !self.retry.tick() {
            return;
        }
        tracing::debug!(url = %self.url, "retry countdown elapsed, reconnecting");
        // Failures are already logged and leave the client disconnected.
        let _ = self.attempt_connect();
        self.retry.reset();
    }

    fn poll_session(&mut self) -> Result<()> {
        if !self.transport.is_connected() {
            return self.end_of_stream();
        }

        // Read only once the buffered frames are used up; with the fill limit
        // this keeps the buffer within `Limits::max_buffered`.
        if !self.frame_buffered() {
            let limit = self
                .config
                .limits
                .max_buffered()
                .saturating_sub(self.read_buf.len());
            match fill(
                &mut self.transport,
                &mut self.read_buf,
                self.config.read_chunk_size,
                self.config.read_attempts,
                limit,
            ) {
                Ok(Fill::Read(_)) => {}
                Ok(Fill::Eof) => return self.end_of_stream(),
                Err(err) => {
                    tracing::warn!(%err, "transport receive failed");
                    self.lose_session();
                    return Err(err);
                }
            }
        }

        let result = self.process_frame();

        if self.state == ConnectionState::Closing && self.close_expired() {
            tracing::debug!("close grace period elapsed");
            self.finish_close();
        }

        result
    }

    /// The stream ended. Frames that arrived before the end are still
    /// dispatched, then the session is dropped unless one of them closed it.
    fn end_of_stream(&mut self) -> Result<()> {
        let mut result = Ok(());
        while self.state.has_session() && self.frame_buffered() {
            if let Err(err) = self.process_frame() {
                tracing::debug!(%err, "dropping buffered frame after end of stream");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        if self.state.has_session() {
            self.lose_session();
        }
        result
    }

    /// Whether `process_frame` would consume input without more bytes.
    fn frame_buffered(&self) -> bool {
        if self.discard > 0 {
            return !self.read_buf.is_empty();
        }
        match FrameHeader::parse(&self.read_buf) {
            Ok(header) => {
                header.opcode().is_err()
                    || self.config.limits.check_payload_size(header.payload_len).is_err()
                    || self.read_buf.len() as u64 >= header.frame_len()
            }
            Err(_) => false,
        }
    }

    /// Decode and dispatch at most one buffered frame.
    fn process_frame(&mut self) -> Result<()> {
        if self.discard > 0 {
            let n = self.discard.min(self.read_buf.len() as u64);
            self.read_buf.advance(n as usize);
            self.discard -= n;
            if self.discard > 0 {
                return Ok(());
            }
        }

        let header = match FrameHeader::parse(&self.read_buf) {
            Ok(header) => header,
            Err(Error::IncompleteFrame { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };

        if let Err(err) = header.opcode() {
            tracing::warn!(
                opcode = header.opcode,
                discarded = self.read_buf.len(),
                "unknown opcode, discarding buffered input"
            );
            self.read_buf.clear();
            return Err(err);
        }

        if let Err(err) = self.config.limits.check_payload_size(header.payload_len) {
            let frame_len = header.frame_len();
            let buffered = self.read_buf.len() as u64;
            tracing::warn!(len = header.payload_len, "dropping oversized frame");
            if buffered >= frame_len {
                self.read_buf.advance(frame_len as usize);
            } else {
                self.discard = frame_len - buffered;
                self.read_buf.clear();
            }
            return Err(err);
        }

        // Bounded by the payload limit checked above.
        let frame_len = header.frame_len() as usize;
        if self.read_buf.len() < frame_len {
            return Ok(());
        }

        let raw = self.read_buf.split_to(frame_len);
        let (frame, _) = Frame::parse(&raw)?;
        self.dispatch(frame)
    }

    fn dispatch(&mut self, frame: Frame) -> Result<()> {
        tracing::debug!(opcode = %frame.opcode, len = frame.payload().len(), "frame received");
        match frame.opcode {
            // Answered with an empty pong whatever the ping carried.
            OpCode::Ping => self.send_frame(&Frame::pong(Vec::new()), ZERO_MASK),
            OpCode::Pong => Ok(()),
            OpCode::Close => {
                let close = CloseFrame::from_payload(frame.payload());
                self.on_peer_close(close)
            }
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                if let Some(message) = Message::from_frame(frame)? {
                    self.handler.on_message(message);
                }
                Ok(())
            }
        }
    }

    fn on_peer_close(&mut self, close: Option<CloseFrame>) -> Result<()> {
        if self.state == ConnectionState::Closing {
            tracing::debug!(?close, "close acknowledged by server");
            self.finish_close();
            self.handler.on_close(close);
            return Ok(());
        }

        tracing::info!(?close, "server closed the connection");
        let echo = Frame::close(close.as_ref().map(|c| c.code.as_u16()), "");
        let mask = self.control_mask(&echo);
        match self.write_frame(&echo, mask) {
            Ok(()) => self.begin_closing(),
            Err(err) => {
                // The peer may already be gone; the session ends either way.
                tracing::debug!(%err, "close echo not delivered");
                self.finish_close();
            }
        }
        self.handler.on_close(close);
        Ok(())
    }

    fn start_close(&mut self, frame: Frame) -> Result<()> {
        self.auto_reconnect = false;
        if self.state != ConnectionState::Open {
            return Ok(());
        }

        tracing::info!(url = %self.url, "closing connection");
        let mask = self.control_mask(&frame);
        self.send_frame(&frame, mask)?;
        self.begin_closing();
        Ok(())
    }

    fn begin_closing(&mut self) {
        self.transition(ConnectionState::Closing);
        self.close_deadline = Some(self.clock.now() + self.config.timeouts.close_grace);
    }

    fn close_expired(&self) -> bool {
        self.close_deadline
            .is_some_and(|deadline| self.clock.now() >= deadline)
    }

    fn finish_close(&mut self) {
        tracing::info!(url = %self.url, "connection closed");
        self.enter_disconnected();
    }

    /// The transport went away underneath an active session.
    fn lose_session(&mut self) {
        let was_open = self.state == ConnectionState::Open;
        if was_open {
            tracing::warn!(url = %self.url, "connection lost");
        }
        self.enter_disconnected();
        if was_open {
            self.handler.on_disconnect();
        }
    }

    fn enter_disconnected(&mut self) {
        self.transport.close();
        self.transition(ConnectionState::Disconnected);
        self.reset_session();
        self.retry.reset();
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state == next || self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        if self.state != next {
            tracing::trace!(from = %self.state, to = %next, "state change");
        }
        self.state = next;
    }

    fn reset_session(&mut self) {
        self.read_buf.clear();
        self.discard = 0;
        self.close_deadline = None;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }

    /// Write a frame; a failed write drops the session.
    fn send_frame(&mut self, frame: &Frame, mask: [u8; 4]) -> Result<()> {
        match self.write_frame(frame, mask) {
            Err(Error::ConnectionClosed) => {
                self.lose_session();
                Err(Error::ConnectionClosed)
            }
            other => other,
        }
    }

    fn write_frame(&mut self, frame: &Frame, mask: [u8; 4]) -> Result<()> {
        let bytes = frame.encode(Some(mask))?;
        write_all(&mut self.transport, &bytes, self.config.write_attempts)?;
        tracing::trace!(opcode = %frame.opcode, bytes = bytes.len(), "frame sent");
        Ok(())
    }

    fn random_mask(&mut self) -> [u8; 4] {
        let mut mask = [0u8; 4];
        self.random.fill_bytes(&mut mask);
        mask
    }

    /// Empty control frames go out with the all-zero key.
    fn control_mask(&mut self, frame: &Frame) -> [u8; 4] {
        if frame.payload().is_empty() {
            ZERO_MASK
        } else {
            self.random_mask()
        }
    }
}

impl<T, H, C, R> std::fmt::Debug for Client<T, H, C, R>
where
    T: Transport,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("retry", &self.retry)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("buffered", &self.read_buf.len())
            .finish_non_exhaustive()
    }
}

impl<T, H, C, R> Drop for Client<T, H, C, R>
where
    T: Transport,
{
    fn drop(&mut self) {
        if self.transport.is_connected() {
            self.transport.close();
        }
    }
}
