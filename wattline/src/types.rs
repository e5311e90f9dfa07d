//! Types that mirror the sensor bridge's JSON schema.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Firmware-side battery classification attached to some frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerStatus {
    Critical,
    Warning,
    Good,
}

/// Display band for the battery gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryBand {
    Low,
    Medium,
    High,
}

#[derive(Debug, Error, PartialEq)]
pub enum ReadingError {
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("batteryLevel must be within 0..=100, got {0}")]
    BatteryOutOfRange(f64),
}

/// One snapshot of a site's energy state.
///
/// Fields are private so a `Reading` can only exist in a validated form;
/// a newer reading replaces an older one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawReading")]
pub struct Reading {
    id: String,
    current_production: f64,
    current_consumption: f64,
    battery_level: f64,
    donate_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    power_status: Option<PowerStatus>,
}

// Unvalidated wire shape; unknown fields are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReading {
    id: String,
    current_production: f64,
    current_consumption: f64,
    battery_level: f64,
    donate_enabled: bool,
    #[serde(default)]
    power_status: Option<PowerStatus>,
}

impl TryFrom<RawReading> for Reading {
    type Error = ReadingError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        Reading::new(
            raw.id,
            raw.current_production,
            raw.current_consumption,
            raw.battery_level,
            raw.donate_enabled,
        )
        .map(|r| r.with_power_status(raw.power_status))
    }
}

fn watts(field: &'static str, value: f64) -> Result<f64, ReadingError> {
    if !value.is_finite() {
        return Err(ReadingError::NotFinite { field, value });
    }
    if value < 0.0 {
        return Err(ReadingError::Negative { field, value });
    }
    Ok(value)
}

impl Reading {
    pub fn new(
        id: impl Into<String>,
        current_production: f64,
        current_consumption: f64,
        battery_level: f64,
        donate_enabled: bool,
    ) -> Result<Self, ReadingError> {
        let current_production = watts("currentProduction", current_production)?;
        let current_consumption = watts("currentConsumption", current_consumption)?;
        if !battery_level.is_finite() {
            return Err(ReadingError::NotFinite {
                field: "batteryLevel",
                value: battery_level,
            });
        }
        if !(0.0..=100.0).contains(&battery_level) {
            return Err(ReadingError::BatteryOutOfRange(battery_level));
        }
        Ok(Self {
            id: id.into(),
            current_production,
            current_consumption,
            battery_level,
            donate_enabled,
            power_status: None,
        })
    }

    pub fn with_power_status(mut self, status: Option<PowerStatus>) -> Self {
        self.power_status = status;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn current_production(&self) -> f64 {
        self.current_production
    }

    pub fn current_consumption(&self) -> f64 {
        self.current_consumption
    }

    pub fn battery_level(&self) -> f64 {
        self.battery_level
    }

    pub fn donate_enabled(&self) -> bool {
        self.donate_enabled
    }

    pub fn power_status(&self) -> Option<PowerStatus> {
        self.power_status
    }

    /// Production minus consumption; positive means surplus.
    pub fn net_power(&self) -> f64 {
        self.current_production - self.current_consumption
    }

    pub fn battery_band(&self) -> BatteryBand {
        match self.battery_level {
            x if x >= 70.0 => BatteryBand::High,
            x if x >= 40.0 => BatteryBand::Medium,
            _ => BatteryBand::Low,
        }
    }
}
