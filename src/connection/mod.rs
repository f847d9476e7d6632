//! Connection management: the client controller and its state machine.
//!
//! ## Connection Lifecycle
//!
//! 1. **Disconnected** - initial state; `poll()` counts down to a reconnect
//! 2. **Handshaking** - transport open, upgrade exchange in progress
//! 3. **Open** - frames flow; pings are answered, server closes are echoed
//! 4. **Closing** - close frame sent, waiting for the peer or a short grace period
//!
//! ## Example
//!
//! ```rust,no_run
//! use mcu_ws::{Client, Handler, Message, TcpTransport};
//!
//! struct Printer;
//!
//! impl Handler for Printer {
//!     fn on_message(&mut self, message: Message) {
//!         println!("received: {:?}", message);
//!     }
//! }
//!
//! let mut client = Client::new("ws://example.com/chat", TcpTransport::new(), Printer)?;
//! client.connect()?;
//! client.send("hello")?;
//! for _ in 0..1000 {
//!     client.poll()?;
//! }
//! client.close()?;
//! # Ok::<(), mcu_ws::Error>(())
//! ```

mod client;
mod handler;
pub(crate) mod handshake;
mod io;
mod retry;
mod state;

pub use client::Client;
pub use handler::Handler;
pub use retry::RetryTimer;
pub use state::ConnectionState;
