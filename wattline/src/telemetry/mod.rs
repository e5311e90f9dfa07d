//! Live telemetry: a single self-healing WebSocket connection to the sensor
//! bridge, decoded into [`Reading`](crate::types::Reading)s.
//!
//! [`machine::Link`] is the I/O-free state machine; [`client::TelemetryClient`]
//! drives it with a real (or test) [`transport::Connector`].

pub mod client;
pub mod codec;
pub mod error;
pub mod machine;
pub mod state;
pub mod transport;

use std::time::Duration;

pub use client::TelemetryClient;
pub use error::TelemetryError;
pub use state::{ConnectionState, ErrorReason};
pub use transport::{Connector, TransportEvent, WsConnector};

/// Where the bridge listens unless a profile or argument says otherwise.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8765/";

/// Fixed delay before an automatic reconnect attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
