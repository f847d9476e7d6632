//! WebSocket URL parsing.
//!
//! Splits `scheme://host[:port]/path[#fragment]` into its parts. The fragment
//! is never sent to the server and is dropped.

use crate::error::{Error, Result};

/// A parsed `ws://` (or `wss://`) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    /// Scheme, exactly `ws` or `wss`.
    pub scheme: String,
    /// Host name or IP address (IPv6 without brackets).
    pub host: String,
    /// Explicit port, if the URL carried one.
    pub port: Option<u16>,
    /// Request path including any query, never empty.
    pub path: String,
}

impl Url {
    /// Parse a WebSocket URL.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedUrl` if there is no `://`, the host is empty or the
    ///   port is not a number in `0..=65535`
    /// - `Error::UnsupportedScheme` if the scheme is neither `ws` nor `wss`
    ///
    /// # Example
    ///
    /// ```
    /// use mcu_ws::Url;
    ///
    /// let url = Url::parse("ws://mcu_proto.jetperch.com/ws").unwrap();
    /// assert_eq!(url.host, "mcu_proto.jetperch.com");
    /// assert_eq!(url.port_or_default(), 80);
    /// assert_eq!(url.path, "/ws");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| Error::MalformedUrl(format!("missing '://' in {input:?}")))?;

        if scheme != "ws" && scheme != "wss" {
            return Err(Error::UnsupportedScheme(scheme.to_string()));
        }

        let rest = match rest.find('#') {
            Some(idx) => &rest[..idx],
            None => rest,
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = split_authority(authority)?;
        if host.is_empty() {
            return Err(Error::MalformedUrl("empty host".into()));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// Whether the URL asks for a TLS transport (`wss`).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.scheme == "wss"
    }

    /// Default port for the scheme: 443 for `wss`, 80 otherwise.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        if self.is_secure() { 443 } else { 80 }
    }

    /// The explicit port, or the scheme default when none was given.
    #[must_use]
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| self.default_port())
    }

    /// Value for the `Host` request header.
    ///
    /// The port is only included when it differs from the scheme default.
    #[must_use]
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.port {
            Some(port) if port != self.default_port() => format!("{host}:{port}"),
            _ => host,
        }
    }
}

impl std::fmt::Display for Url {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            write!(f, "{}", self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.path)
    }
}

impl std::str::FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn split_authority(authority: &str) -> Result<(&str, Option<u16>)> {
    // IPv6 literal: [::1]:8080
    if let Some(inner) = authority.strip_prefix('[') {
        let end = inner
            .find(']')
            .ok_or_else(|| Error::MalformedUrl("unterminated IPv6 literal".into()))?;
        let host = &inner[..end];
        let after = &inner[end + 1..];
        let port = match after.strip_prefix(':') {
            Some(port) => Some(parse_port(port)?),
            None if after.is_empty() => None,
            None => return Err(Error::MalformedUrl(format!("unexpected {after:?} after host"))),
        };
        return Ok((host, port));
    }

    match authority.split_once(':') {
        Some((host, port)) => Ok((host, Some(parse_port(port)?))),
        None => Ok((authority, None)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| Error::MalformedUrl(format!("invalid port {port:?}")))
}
