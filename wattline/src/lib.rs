//! Library surface for wattline: the live telemetry client, the reading type,
//! connection profiles and chart history helpers. The TUI lives in the binary.

pub mod history;
pub mod profiles;
pub mod telemetry;
pub mod types;
