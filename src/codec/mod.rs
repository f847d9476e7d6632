//! Frame codec for async I/O.
//!
//! Speaks the same frames as [`Client`](crate::Client) over a tokio
//! `AsyncRead + AsyncWrite` stream, for hosts that run an async runtime
//! instead of a cooperative poll loop.

#[cfg(feature = "async-tokio")]
mod framed;

#[cfg(feature = "async-tokio")]
pub use framed::FrameCodec;
