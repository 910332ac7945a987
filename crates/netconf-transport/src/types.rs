//! Core transport types.

use std::fmt;

use bytes::Bytes;

/// Represents the current state of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// The transport is not connected.
    #[default]
    Disconnected,
    /// The transport is connected and ready to send/receive data.
    Connected,
    /// The transport is in the process of disconnecting.
    Disconnecting,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
        }
    }
}

/// Something the transport observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// SSH authentication banner sent by the server
    Banner(String),
    /// SSH identification line of the server, e.g. `SSH-2.0-OpenSSH_9.6`
    Greeting(String),
    /// Raw bytes from the `netconf` subsystem channel
    Data(Bytes),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(TransportState::default(), TransportState::Disconnected);
        for (state, text) in [
            (TransportState::Disconnected, "disconnected"),
            (TransportState::Connected, "connected"),
            (TransportState::Disconnecting, "disconnecting"),
        ] {
            assert_eq!(state.to_string(), text);
        }
    }
}
