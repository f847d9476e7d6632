//! # mcu-ws - Minimal WebSocket client for cooperative targets
//!
//! `mcu-ws` is a small RFC 6455 client for devices that drive their network
//! stack from a single loop: a microcontroller animation loop, a game tick or
//! a test harness.
//!
//! ## Features
//!
//! - **Opening handshake** with `Sec-WebSocket-Key` / `Sec-WebSocket-Accept` validation
//! - **Frame codec** for the 7-bit and 16-bit length encodings, with masking
//! - **Automatic control frames**: pings are answered, server closes echoed
//! - **Self-driving reconnects** counted in `poll()` ticks
//! - **Pluggable transport**, clock and random source
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcu_ws::{Client, TcpTransport};
//!
//! let mut client = Client::new("ws://mcu_proto.jetperch.com/ws", TcpTransport::new(), ())?;
//! client.connect()?;
//! client.send("led on")?;
//! loop {
//!     client.poll()?;
//!     # break;
//! }
//! # Ok::<(), mcu_ws::Error>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod transport;
pub mod url;

#[cfg(feature = "async-tokio")]
pub mod codec;

pub use config::{Config, Limits, Timeouts};
pub use connection::{Client, ConnectionState, Handler, RetryTimer};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{
    Frame, HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key,
};
pub use transport::{Clock, OsRandom, RandomSource, SystemClock, TcpTransport, Transport};
pub use url::Url;

#[cfg(feature = "async-tokio")]
pub use codec::FrameCodec;
