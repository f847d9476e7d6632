//! Client connection state machine.

/// Lifecycle state of a client connection.
///
/// ```text
/// Disconnected -> Handshaking -> Open -> Closing -> Disconnected
///                      |                              ^
///                      +---------- failure -----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport session. Initial state, re-entered after every cycle.
    #[default]
    Disconnected,
    /// Transport open, upgrade exchange in progress.
    Handshaking,
    /// Handshake accepted, frames flow in both directions.
    Open,
    /// A close frame was sent, waiting for the peer or the grace deadline.
    Closing,
}

impl ConnectionState {
    /// Check if sending data is allowed in this state.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if incoming frames are still processed in this state.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }

    /// Whether a transport session exists in this state.
    #[must_use]
    #[inline]
    pub const fn has_session(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    /// Whether moving from `self` to `next` follows the state machine.
    #[must_use]
    pub const fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Handshaking)
                | (Handshaking, Open)
                | (Handshaking, Disconnected)
                | (Open, Closing)
                | (Open, Disconnected)
                | (Closing, Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Handshaking => write!(f, "Handshaking"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
        }
    }
}
