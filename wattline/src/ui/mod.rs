//! UI module root: exposes drawing functions for individual panels.

pub mod battery;
pub mod header;
pub mod power;
pub mod status;
pub mod util;
