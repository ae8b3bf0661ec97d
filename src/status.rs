//! Session lifecycle states.

/// Connection status reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// Not connected to the thermometer.
    #[default]
    Disconnected,
    /// Connecting or running the handshake.
    Connecting,
    /// Connected and streaming readings.
    Connected,
}

impl Status {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Internal state of a session.
///
/// `Idle -> Connecting -> Handshaking -> Streaming -> Disconnected`, with
/// `Disconnected` reachable from every state but `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Never connected.
    #[default]
    Idle,
    /// Waiting for the transport to connect.
    Connecting,
    /// Connected, running the handshake.
    Handshaking,
    /// Handshake complete, readings flowing.
    Streaming,
    /// Connection ended.
    Disconnected,
}

impl SessionState {
    /// Whether a new connect may start from this state.
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected)
    }

    /// The externally visible status for this state.
    pub fn status(&self) -> Status {
        match self {
            Self::Idle | Self::Disconnected => Status::Disconnected,
            Self::Connecting | Self::Handshaking => Status::Connecting,
            Self::Streaming => Status::Connected,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert!(!Status::Disconnected.is_connected());
        assert!(!Status::Connecting.is_connected());
        assert!(Status::Connected.is_connected());
        assert_eq!(format!("{}", Status::Connected), "Connected");
    }

    #[test]
    fn test_session_state_transitions() {
        assert!(SessionState::Idle.can_connect());
        assert!(SessionState::Disconnected.can_connect());
        assert!(!SessionState::Connecting.can_connect());
        assert!(!SessionState::Handshaking.can_connect());
        assert!(!SessionState::Streaming.can_connect());
    }

    #[test]
    fn test_session_state_status() {
        assert_eq!(SessionState::Idle.status(), Status::Disconnected);
        assert_eq!(SessionState::Handshaking.status(), Status::Connecting);
        assert_eq!(SessionState::Streaming.status(), Status::Connected);
        assert_eq!(SessionState::Disconnected.status(), Status::Disconnected);
    }
}
