//! Test doubles for driving a `Client` without a network.
//!
//! - [`MockTransport`] plays the server: it answers the upgrade request,
//!   replays scripted input and records every byte the client sends.
//! - [`ManualClock`] only moves when told to (or when the client sleeps).
//! - [`SeqRandom`] yields 0, 1, 2, ... so keys and masks are predictable.
//! - [`Recorder`] keeps every handler callback.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use mcu_ws::protocol::compute_accept_key;
use mcu_ws::{
    Client, Clock, CloseFrame, Config, Frame, Handler, Message, RandomSource, Transport, Url,
};

/// How the mock server answers an upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A valid 101 response for the client's key.
    Accept,
    /// A 101 response with an accept value for a different key.
    WrongAccept,
    /// Never answer.
    Silent,
    /// Send these bytes verbatim.
    Raw(Vec<u8>),
}

pub struct MockTransport {
    pub connected: bool,
    pub connect_calls: usize,
    pub close_calls: usize,
    /// Results for upcoming `connect` calls; `Ok` once exhausted.
    pub connect_results: VecDeque<io::Result<()>>,
    pub reply: Reply,
    /// Appended right after the handshake response, in the same chunk.
    pub reply_suffix: Vec<u8>,
    /// Largest number of bytes a single `receive` returns.
    pub max_receive: usize,
    /// Report end of stream once the incoming queue is empty.
    pub eof_when_drained: bool,
    /// Refuse every send with `WouldBlock`.
    pub stall_sends: bool,
    pub secure: bool,
    /// Upgrade requests, one per successful connect.
    pub requests: Vec<String>,
    /// Bytes sent after the upgrade request of the current connection.
    pub sent: Vec<u8>,
    incoming: VecDeque<Vec<u8>>,
    request_buf: Vec<u8>,
    awaiting_request: bool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            connected: false,
            connect_calls: 0,
            close_calls: 0,
            connect_results: VecDeque::new(),
            reply: Reply::Accept,
            reply_suffix: Vec::new(),
            max_receive: usize::MAX,
            eof_when_drained: false,
            stall_sends: false,
            secure: false,
            requests: Vec::new(),
            sent: Vec::new(),
            incoming: VecDeque::new(),
            request_buf: Vec::new(),
            awaiting_request: false,
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            ..Self::default()
        }
    }

    /// Queue bytes for the client to receive.
    pub fn push_incoming(&mut self, data: impl Into<Vec<u8>>) {
        self.incoming.push_back(data.into());
    }

    /// Simulate the server dropping the connection.
    pub fn drop_connection(&mut self) {
        self.connected = false;
    }

    /// Every frame sent since the upgrade request, unmasked.
    pub fn sent_frames(&self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut rest = &self.sent[..];
        while !rest.is_empty() {
            let (frame, used) = Frame::parse(rest).expect("client sent a malformed frame");
            frames.push(frame);
            rest = &rest[used..];
        }
        frames
    }

    /// The `Sec-WebSocket-Key` of the most recent upgrade request.
    pub fn last_key(&self) -> Option<String> {
        let request = self.requests.last()?;
        request
            .lines()
            .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
            .map(str::to_string)
    }

    fn answer(&mut self, request: &str) {
        let key = request
            .lines()
            .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
            .unwrap_or_default();

        let accept = match &self.reply {
            Reply::Accept => compute_accept_key(key),
            Reply::WrongAccept => compute_accept_key("not-the-client-key"),
            Reply::Silent => return,
            Reply::Raw(bytes) => {
                let mut data = bytes.clone();
                data.extend_from_slice(&self.reply_suffix);
                self.incoming.push_back(data);
                return;
            }
        };

        let mut data = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {accept}\r\n\
             Sec-WebSocket-Protocol: chat\r\n\
             \r\n"
        )
        .into_bytes();
        data.extend_from_slice(&self.reply_suffix);
        self.incoming.push_back(data);
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
        self.connect_calls += 1;
        self.connect_results.pop_front().unwrap_or(Ok(()))?;
        self.connected = true;
        self.awaiting_request = true;
        self.request_buf.clear();
        self.sent.clear();
        self.incoming.clear();
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if self.stall_sends {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        if self.awaiting_request {
            self.request_buf.extend_from_slice(buf);
            if let Some(pos) = self.request_buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let rest = self.request_buf.split_off(pos + 4);
                let request = String::from_utf8(std::mem::take(&mut self.request_buf))
                    .expect("request is ASCII");
                self.awaiting_request = false;
                self.sent.extend_from_slice(&rest);
                self.answer(&request);
                self.requests.push(request);
            }
        } else {
            self.sent.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let Some(mut chunk) = self.incoming.pop_front() else {
            if self.eof_when_drained {
                self.connected = false;
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        };

        let n = chunk.len().min(buf.len()).min(self.max_receive);
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            let rest = chunk.split_off(n);
            self.incoming.push_front(rest);
        }
        Ok(n)
    }

    fn close(&mut self) {
        self.close_calls += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_secure(&self) -> bool {
        self.secure
    }
}

/// A clock that advances only through [`ManualClock::advance`] and `sleep`.
///
/// Clones share the same time, so a test can keep a handle after moving one
/// into the client.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Counts up from a seed, one byte at a time.
#[derive(Debug, Clone)]
pub struct SeqRandom(pub u8);

impl RandomSource for SeqRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        for byte in buf {
            *byte = self.0;
            self.0 = self.0.wrapping_add(1);
        }
    }
}

/// Records every callback.
#[derive(Debug, Default)]
pub struct Recorder {
    pub connects: usize,
    pub messages: Vec<Message>,
    pub closes: Vec<Option<CloseFrame>>,
    pub disconnects: usize,
}

impl Handler for Recorder {
    fn on_connect(&mut self) {
        self.connects += 1;
    }

    fn on_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    fn on_close(&mut self, frame: Option<CloseFrame>) {
        self.closes.push(frame);
    }

    fn on_disconnect(&mut self) {
        self.disconnects += 1;
    }
}

pub type TestClient = Client<MockTransport, Recorder, ManualClock, SeqRandom>;

/// Build a client around `transport` with a fresh clock and random sequence.
pub fn client_with(url: &str, config: Config, transport: MockTransport) -> (TestClient, ManualClock) {
    let clock = ManualClock::new();
    let client = Client::with_parts(
        Url::parse(url).expect("valid test URL"),
        config,
        transport,
        Recorder::default(),
        clock.clone(),
        SeqRandom(0),
    )
    .expect("client builds");
    (client, clock)
}

/// A connected client on `ws://example.com/chat` with default settings.
pub fn connected_client() -> (TestClient, ManualClock) {
    let (mut client, clock) = client_with("ws://example.com/chat", Config::default(), MockTransport::new());
    client.connect().expect("handshake succeeds");
    (client, clock)
}

/// Base64 of bytes 0..16, the first key `SeqRandom(0)` produces.
pub const FIRST_KEY: &str = "AAECAwQFBgcICQoLDA0ODw==";
