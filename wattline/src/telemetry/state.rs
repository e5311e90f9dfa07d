//! Connection state as seen by the display layer.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    DecodeFailure,
    TransportError,
    ConnectionLost,
    OpenFailure,
}

impl ErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorReason::DecodeFailure => "decode failure",
            ErrorReason::TransportError => "transport error",
            ErrorReason::ConnectionLost => "connection lost",
            ErrorReason::OpenFailure => "connection failed",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Errored(ErrorReason),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Human-readable reason, present only for `Errored`.
    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            ConnectionState::Errored(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Errored(r) => write!(f, "error: {r}"),
        }
    }
}
