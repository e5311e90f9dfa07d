//! Error taxonomy for the telemetry client. None of these escape the client;
//! each one is projected onto a published [`ErrorReason`].

use thiserror::Error;

use super::state::ErrorReason;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Could not establish the connection.
    #[error("failed to open transport: {0}")]
    Open(String),

    /// Mid-session failure signalled by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote or local close.
    #[error("transport closed")]
    Closed,

    /// A frame did not parse as a valid reading.
    #[error("decode failure: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TelemetryError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            TelemetryError::Open(_) => ErrorReason::OpenFailure,
            TelemetryError::Transport(_) => ErrorReason::TransportError,
            TelemetryError::Closed => ErrorReason::ConnectionLost,
            TelemetryError::Decode(_) => ErrorReason::DecodeFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_error_projects_onto_its_reason() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let cases = [
            (TelemetryError::Open("refused".into()), ErrorReason::OpenFailure),
            (TelemetryError::Transport("reset".into()), ErrorReason::TransportError),
            (TelemetryError::Closed, ErrorReason::ConnectionLost),
            (TelemetryError::from(decode), ErrorReason::DecodeFailure),
        ];
        for (err, reason) in cases {
            assert_eq!(err.reason(), reason, "{err}");
        }
        assert_eq!(TelemetryError::Closed.reason().to_string(), "connection lost");
    }
}
