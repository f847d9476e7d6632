//! WebSocket frame parsing and serialization (RFC 6455).
//!
//! Only the 7-bit and 16-bit length encodings are supported, so a frame never
//! carries more than [`MAX_PAYLOAD_LEN`] bytes of payload.

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Largest payload the 16-bit length encoding can carry.
pub const MAX_PAYLOAD_LEN: usize = 65535;

/// Largest header this client can produce: 2 bytes, 16-bit length, mask key.
pub const MAX_HEADER_LEN: usize = 2 + 2 + 4;

/// Longest header the wire format allows: 64-bit length and mask key.
pub const MAX_WIRE_HEADER_LEN: usize = 2 + 8 + 4;

/// Masking key used for payload-less control frames.
pub const ZERO_MASK: [u8; 4] = [0; 4];

/// Decoded frame header.
///
/// Parsed before the payload is available so the caller knows how many bytes
/// to wait for, or how many to skip when the frame cannot be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// The three reserved bits, right-aligned.
    pub rsv: u8,
    /// Raw 4-bit opcode, decoded with [`FrameHeader::opcode`].
    pub opcode: u8,
    /// Masking key, present iff the mask bit was set.
    pub mask: Option<[u8; 4]>,
    /// Payload length as announced on the wire (any tier).
    pub payload_len: u64,
    /// Bytes taken by the header, including extended length and mask key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a frame header from the start of `buf`.
    ///
    /// The 64-bit length tier is parsed so that callers can skip the frame;
    /// use [`Frame::parse`] to reject it.
    ///
    /// # Errors
    ///
    /// Returns `Error::IncompleteFrame` if `buf` ends inside the header.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];

        let fin = (byte0 & 0x80) != 0;
        let rsv = (byte0 >> 4) & 0x07;
        let opcode = byte0 & 0x0F;
        let masked = (byte1 & 0x80) != 0;

        let (payload_len, len_size) = match byte1 & 0x7F {
            126 => {
                if buf.len() < 4 {
                    return Err(Error::IncompleteFrame {
                        needed: 4 - buf.len(),
                    });
                }
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
            }
            127 => {
                if buf.len() < 10 {
                    return Err(Error::IncompleteFrame {
                        needed: 10 - buf.len(),
                    });
                }
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(len), 10)
            }
            len => (u64::from(len), 2),
        };

        let header_len = if masked { len_size + 4 } else { len_size };
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let mask = masked.then(|| {
            [
                buf[len_size],
                buf[len_size + 1],
                buf[len_size + 2],
                buf[len_size + 3],
            ]
        });

        Ok(Self {
            fin,
            rsv,
            opcode,
            mask,
            payload_len,
            header_len,
        })
    }

    /// Decode the raw opcode.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProtocolDesync` for reserved opcodes.
    pub fn opcode(&self) -> Result<OpCode> {
        OpCode::from_u8(self.opcode)
    }

    /// Total length of the frame on the wire, saturating at `u64::MAX`.
    #[must_use]
    pub fn frame_len(&self) -> u64 {
        (self.header_len as u64).saturating_add(self.payload_len)
    }
}

/// A WebSocket frame as defined in RFC 6455.
///
/// ## Frame Structure
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)   |A|     (7)     |        (16, if len==126)      |
/// |N|V|V|V|       |S|             |                               |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode defining the interpretation of payload data.
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given parameters.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame with optional status code and reason.
    ///
    /// The reason is dropped when no code is given.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.to_be_bytes().to_vec();
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse a frame from a buffer.
    ///
    /// Returns the parsed frame and the number of bytes consumed. Masked
    /// payloads are unmasked.
    ///
    /// ## Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `Error::ProtocolDesync` for a reserved opcode
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentationUnsupported` for a data frame without FIN
    /// - `Error::PayloadTooLarge` for the 64-bit length encoding
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        let opcode = header.opcode()?;

        if header.rsv != 0 {
            return Err(Error::ReservedBitsSet);
        }
        if opcode.is_data() && !header.fin {
            return Err(Error::FragmentationUnsupported);
        }
        if header.payload_len > MAX_PAYLOAD_LEN as u64 {
            return Err(Error::PayloadTooLarge {
                size: header.payload_len,
                max: MAX_PAYLOAD_LEN,
            });
        }

        // Bounded by MAX_PAYLOAD_LEN above.
        let total_size = header.header_len + header.payload_len as usize;
        if buf.len() < total_size {
            return Err(Error::IncompleteFrame {
                needed: total_size - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total_size].to_vec();
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }

        Ok((Self::new(header.fin, opcode, payload), total_size))
    }

    /// Write the frame to a buffer.
    ///
    /// Returns the number of bytes written. A mask bit is set whenever a key
    /// is supplied; client frames must always pass one.
    ///
    /// # Errors
    ///
    /// - `Error::PayloadTooLarge` if the payload exceeds 65535 bytes
    /// - `Error::IncompleteFrame` if `buf` is shorter than [`Frame::wire_size`]
    pub fn write(&self, buf: &mut [u8], mask: Option<[u8; 4]>) -> Result<usize> {
        let payload_len = self.payload.len();
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                size: payload_len as u64,
                max: MAX_PAYLOAD_LEN,
            });
        }

        let total_size = self.wire_size(mask.is_some());
        if buf.len() < total_size {
            return Err(Error::IncompleteFrame {
                needed: total_size - buf.len(),
            });
        }

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        buf[0] = byte0;

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        let mut offset = 2;
        if payload_len <= 125 {
            buf[1] = mask_bit | payload_len as u8;
        } else {
            buf[1] = mask_bit | 126;
            buf[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
            offset = 4;
        }

        if let Some(mask_key) = mask {
            buf[offset..offset + 4].copy_from_slice(&mask_key);
            offset += 4;
        }

        buf[offset..offset + payload_len].copy_from_slice(&self.payload);
        if let Some(mask_key) = mask {
            apply_mask(&mut buf[offset..offset + payload_len], mask_key);
        }

        Ok(total_size)
    }

    /// Encode the frame into a freshly allocated buffer.
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` if the payload exceeds 65535 bytes.
    pub fn encode(&self, mask: Option<[u8; 4]>) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.wire_size(mask.is_some())];
        let written = self.write(&mut buf, mask)?;
        buf.truncate(written);
        Ok(buf)
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 { 0 } else { 2 };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}
