//! Application callbacks.

use crate::message::{CloseFrame, Message};

/// Receives connection events from [`Client`](crate::Client).
///
/// All methods run on the caller's thread, inside `connect()` or `poll()`.
/// Every method has an empty default, and `()` is a handler that ignores
/// everything.
pub trait Handler {
    /// The handshake completed and the connection is open.
    fn on_connect(&mut self) {}

    /// A text or binary message arrived.
    fn on_message(&mut self, message: Message) {
        let _ = message;
    }

    /// The server sent a close frame, either on its own or in reply to
    /// [`Client::close`](crate::Client::close).
    fn on_close(&mut self, frame: Option<CloseFrame>) {
        let _ = frame;
    }

    /// The transport was lost without a close handshake.
    fn on_disconnect(&mut self) {}
}

impl Handler for () {}

impl<H: Handler + ?Sized> Handler for &mut H {
    fn on_connect(&mut self) {
        (**self).on_connect();
    }

    fn on_message(&mut self, message: Message) {
        (**self).on_message(message);
    }

    fn on_close(&mut self, frame: Option<CloseFrame>) {
        (**self).on_close(frame);
    }

    fn on_disconnect(&mut self) {
        (**self).on_disconnect();
    }
}
