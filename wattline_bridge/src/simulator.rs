//! Built-in stand-in for the household sensor: a bounded random walk of
//! production and consumption, with the battery charged or drained by the
//! difference.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

const PRODUCTION_RANGE: (f64, f64) = (800.0, 4000.0);
const CONSUMPTION_RANGE: (f64, f64) = (500.0, 5000.0);
const BATTERY_RANGE: (f64, f64) = (60.0, 100.0);

const MAX_PRODUCTION_STEP: f64 = 200.0;
const MAX_CONSUMPTION_STEP: f64 = 300.0;
// Battery percent moved per 500 W of net power per step
const BATTERY_STEP_PER_500W: f64 = 1.0;

const BATTERY_CRITICAL: f64 = 65.0;
const BATTERY_WARNING: f64 = 75.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorFrame {
    pub id: String,
    pub current_production: f64,
    pub current_consumption: f64,
    pub battery_level: f64,
    pub donate_enabled: bool,
    pub power_status: &'static str,
}

pub struct Simulator {
    house_id: String,
    production: f64,
    consumption: f64,
    battery: f64,
    donate_enabled: bool,
    rng: StdRng,
}

impl Simulator {
    pub fn new(house_id: impl Into<String>) -> Self {
        Self::with_rng(house_id, StdRng::from_entropy())
    }

    pub fn seeded(house_id: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(house_id, StdRng::seed_from_u64(seed))
    }

    fn with_rng(house_id: impl Into<String>, rng: StdRng) -> Self {
        Self {
            house_id: house_id.into(),
            // typical daytime starting point
            production: 2000.0,
            consumption: 1500.0,
            battery: 75.0,
            donate_enabled: true,
            rng,
        }
    }

    pub fn step(&mut self) -> SensorFrame {
        self.production = walk(&mut self.rng, self.production, PRODUCTION_RANGE, MAX_PRODUCTION_STEP);
        self.consumption = walk(&mut self.rng, self.consumption, CONSUMPTION_RANGE, MAX_CONSUMPTION_STEP);

        let net = self.production - self.consumption;
        self.battery = (self.battery + net / 500.0 * BATTERY_STEP_PER_500W)
            .clamp(BATTERY_RANGE.0, BATTERY_RANGE.1);

        let battery_level = (self.battery * 10.0).round() / 10.0;
        SensorFrame {
            id: self.house_id.clone(),
            current_production: self.production.round(),
            current_consumption: self.consumption.round(),
            battery_level,
            donate_enabled: self.donate_enabled,
            power_status: power_status(battery_level),
        }
    }
}

fn walk(rng: &mut StdRng, current: f64, (min, max): (f64, f64), max_step: f64) -> f64 {
    (current + rng.gen_range(-max_step..=max_step)).clamp(min, max)
}

pub fn power_status(battery: f64) -> &'static str {
    if battery < BATTERY_CRITICAL {
        "CRITICAL"
    } else if battery < BATTERY_WARNING {
        "WARNING"
    } else {
        "GOOD"
    }
}
