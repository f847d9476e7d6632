//! Client side of the WebSocket opening handshake (RFC 6455 Section 4).
//!
//! This module is pure: it builds the upgrade request and validates the
//! server's response. Moving the bytes over a transport happens in
//! [`crate::connection::handshake`].

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::transport::RandomSource;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this client speaks.
pub const WS_VERSION: u8 = 13;

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use mcu_ws::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh `Sec-WebSocket-Key`: 16 random bytes, Base64-encoded.
///
/// The result is always 24 characters long. A key must never be reused
/// across connection attempts.
pub fn generate_key(rng: &mut impl RandomSource) -> String {
    let mut nonce = [0u8; 16];
    rng.fill_bytes(&mut nonce);
    BASE64.encode(nonce)
}

/// Validate that a header value does not contain CR or LF characters.
///
/// # Errors
/// Returns `Error::InvalidHeaderValue` if the value contains `\r` or `\n`.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

/// The HTTP Upgrade request sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request path (e.g., "/chat").
    pub path: String,
    /// The Host header value, including `:port` when it is not the default.
    pub host: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
    /// The Sec-WebSocket-Protocol value, omitted when `None`.
    pub protocol: Option<String>,
}

impl HandshakeRequest {
    /// Create a request for `path` on `host`.
    pub fn new(host: impl Into<String>, path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: host.into(),
            key: key.into(),
            protocol: None,
        }
    }

    /// Set the requested subprotocol.
    #[must_use]
    pub fn with_protocol(mut self, protocol: Option<String>) -> Self {
        self.protocol = protocol;
        self
    }

    /// The accept value the server must answer with.
    #[must_use]
    pub fn expected_accept(&self) -> String {
        compute_accept_key(&self.key)
    }

    /// Write the HTTP request to a buffer.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderValue` if any value contains CR/LF, or
    /// the path contains whitespace.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        validate_header_value("Host", &self.host)?;
        validate_header_value("Sec-WebSocket-Key", &self.key)?;
        if self.path.contains(char::is_whitespace) {
            return Err(Error::InvalidHeaderValue {
                header: "Request-Line".to_string(),
                reason: "path contains whitespace".to_string(),
            });
        }

        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.path).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());

        if let Some(ref proto) = self.protocol {
            validate_header_value("Sec-WebSocket-Protocol", proto)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {proto}\r\n").as_bytes());
        }

        buf.extend_from_slice(format!("Sec-WebSocket-Version: {WS_VERSION}\r\n").as_bytes());
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// The server's answer to a [`HandshakeRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The selected Sec-WebSocket-Protocol (optional).
    pub protocol: Option<String>,
}

impl HandshakeResponse {
    /// Parse a response from its lines, status line first.
    ///
    /// Lines must not carry their CRLF terminator. Parsing stops at the first
    /// empty line. Header names are matched case-insensitively; later
    /// duplicates overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - There is no status line.
    /// - The status is not `HTTP/1.1 101`.
    /// - `Sec-WebSocket-Accept` is missing.
    pub fn parse_lines<'a, I>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut lines = lines.into_iter();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;
        if !status_line.starts_with("HTTP/1.1 101") {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {status_line}"
            )));
        }

        let mut headers: HashMap<String, String> = HashMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let accept = headers
            .remove("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?;

        Ok(Self {
            accept,
            protocol: headers.remove("sec-websocket-protocol"),
        })
    }

    /// Parse a complete response from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] for non-UTF-8 data and for every
    /// failure listed on [`HandshakeResponse::parse_lines`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;
        Self::parse_lines(text.lines())
    }

    /// Check the accept value against the key the client sent.
    ///
    /// # Errors
    ///
    /// Returns `Error::HandshakeMismatch` unless the values are byte-identical.
    pub fn verify(&self, key: &str) -> Result<()> {
        let expected = compute_accept_key(key);
        if self.accept == expected {
            Ok(())
        } else {
            Err(Error::HandshakeMismatch {
                expected,
                received: self.accept.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u8);

    impl RandomSource for Counter {
        fn fill_bytes(&mut self, buf: &mut [u8]) {
            for byte in buf {
                *byte = self.0;
                self.0 = self.0.wrapping_add(1);
            }
        }
    }

    #[test]
    fn test_compute_accept_key_rfc_example() {
        let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_generate_key() {
        let mut rng = Counter(0);
        let key = generate_key(&mut rng);
        assert_eq!(key.len(), 24);
        assert_eq!(BASE64.decode(&key).unwrap(), (0u8..16).collect::<Vec<_>>());

        let next = generate_key(&mut rng);
        assert_ne!(key, next);
    }

    #[test]
    fn test_request_write() {
        let req = HandshakeRequest::new("example.com", "/chat", "dGhlIHNhbXBsZSBub25jZQ==")
            .with_protocol(Some("chat".into()));
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "GET /chat HTTP/1.1\r\n\
             Host: example.com\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Protocol: chat\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_request_without_protocol() {
        let req = HandshakeRequest::new("example.com:8080", "/", "key");
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Host: example.com:8080\r\n"));
        assert!(!text.contains("Sec-WebSocket-Protocol"));
    }

    #[test]
    fn test_request_rejects_crlf() {
        let req = HandshakeRequest::new("example.com", "/", "key")
            .with_protocol(Some("chat\r\nX-Evil: 1".into()));
        let mut buf = Vec::new();
        assert!(matches!(
            req.write(&mut buf),
            Err(Error::InvalidHeaderValue { header, .. }) if header == "Sec-WebSocket-Protocol"
        ));

        let req = HandshakeRequest::new("example.com", "/a b", "key");
        assert!(req.write(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_response_parse_and_verify() {
        let data = b"HTTP/1.1 101 Switching Protocols\r\n\
                     Upgrade: websocket\r\n\
                     Connection: Upgrade\r\n\
                     Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
                     Sec-WebSocket-Protocol: chat\r\n\
                     \r\n";

        let resp = HandshakeResponse::parse(data).unwrap();
        assert_eq!(resp.accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(resp.protocol.as_deref(), Some("chat"));
        assert!(resp.verify("dGhlIHNhbXBsZSBub25jZQ==").is_ok());
    }

    #[test]
    fn test_response_header_case_insensitive() {
        let resp = HandshakeResponse::parse_lines([
            "HTTP/1.1 101 Switching Protocols",
            "sec-websocket-accept:   s3pPLMBiTxaQ9kYGzzhZRbK+xOo=",
            "",
        ])
        .unwrap();
        assert_eq!(resp.accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_response_mismatch() {
        let resp = HandshakeResponse {
            accept: "AAAAAAAAAAAAAAAAAAAAAAAAAAA=".into(),
            protocol: None,
        };
        let err = resp.verify("dGhlIHNhbXBsZSBub25jZQ==").unwrap_err();
        assert_eq!(
            err,
            Error::HandshakeMismatch {
                expected: "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=".into(),
                received: "AAAAAAAAAAAAAAAAAAAAAAAAAAA=".into(),
            }
        );
    }

    #[test]
    fn test_response_wrong_status() {
        let data = b"HTTP/1.1 200 OK\r\nSec-WebSocket-Accept: x\r\n\r\n";
        assert!(matches!(
            HandshakeResponse::parse(data),
            Err(Error::InvalidHandshake(_))
        ));
    }

    #[test]
    fn test_response_missing_accept() {
        let data = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n";
        assert!(matches!(
            HandshakeResponse::parse(data),
            Err(Error::InvalidHandshake(msg)) if msg.contains("Sec-WebSocket-Accept")
        ));
    }

    #[test]
    fn test_response_empty() {
        assert!(matches!(
            HandshakeResponse::parse(b""),
            Err(Error::InvalidHandshake(_))
        ));
    }

    #[test]
    fn test_headers_after_blank_line_ignored() {
        let resp = HandshakeResponse::parse_lines([
            "HTTP/1.1 101 Switching Protocols",
            "",
            "Sec-WebSocket-Accept: late",
        ]);
        assert!(resp.is_err());
    }
}
