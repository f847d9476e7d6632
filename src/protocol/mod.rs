//! WebSocket protocol core (RFC 6455 subset).

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use frame::{Frame, FrameHeader, MAX_PAYLOAD_LEN, ZERO_MASK};
pub use handshake::{
    HandshakeRequest, HandshakeResponse, WS_GUID, compute_accept_key, generate_key,
};
pub use mask::apply_mask;
pub use opcode::OpCode;
