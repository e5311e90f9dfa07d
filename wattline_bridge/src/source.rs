//! Reading sources: newline-delimited JSON from the sensor's serial port (or
//! a captured file), or the built-in simulator.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::serial;
use crate::simulator::Simulator;
use crate::state::AppState;

const REOPEN_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_HOUSE_ID: &str = "HouseA";

#[derive(Debug, Clone, PartialEq)]
pub enum SerialTarget {
    /// Discover the sensor among the available ports on every (re)open.
    Auto,
    Path(PathBuf),
}

impl SerialTarget {
    fn resolve(&self) -> Option<PathBuf> {
        match self {
            SerialTarget::Path(p) => Some(p.clone()),
            SerialTarget::Auto => {
                serial::pick_port(&serial::list_ports()).map(|p| PathBuf::from(&p.name))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Serial(SerialTarget),
    Simulator { house_id: String, interval: Duration },
}

pub fn spawn_source(source: Source, state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        match source {
            Source::Serial(target) => run_serial(target, state).await,
            Source::Simulator { house_id, interval } => {
                run_simulator(house_id, interval, state).await
            }
        }
    })
}

// Counts lines per one-second window for the rate log.
#[derive(Debug)]
pub struct RateMeter {
    count: u64,
    window_start: DateTime<Utc>,
}

impl RateMeter {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Records one line; returns the window's count when a window closes.
    pub fn record(&mut self, now: DateTime<Utc>) -> Option<u64> {
        self.count += 1;
        if now - self.window_start >= TimeDelta::seconds(1) {
            let n = self.count;
            self.count = 0;
            self.window_start = now;
            Some(n)
        } else {
            None
        }
    }
}

async fn run_serial(target: SerialTarget, state: AppState) {
    let mut meter = RateMeter::new(Utc::now());
    loop {
        let Some(path) = target.resolve() else {
            warn!("no serial port looks like the sensor, retrying");
            sleep(REOPEN_DELAY).await;
            continue;
        };

        // A captured file is replayed once; a device is reopened.
        if is_regular_file(&path).await {
            match File::open(&path).await {
                Ok(file) => {
                    info!(path = %path.display(), "replaying sensor lines from file");
                    forward_lines(file, &state, &mut meter).await;
                    info!(path = %path.display(), "end of input file");
                    return;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cannot open input file, retrying"),
            }
        } else {
            match serial::open(&path) {
                Ok(port) => {
                    info!(path = %path.display(), baud = serial::BAUD_RATE, "serial connection established");
                    forward_lines(port, &state, &mut meter).await;
                    warn!(path = %path.display(), "sensor link ended, reopening");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cannot open sensor link, retrying"),
            }
        }
        sleep(REOPEN_DELAY).await;
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, state: &AppState, meter: &mut RateMeter) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                state.publish(&line).await;
                if let Some(n) = meter.record(Utc::now()) {
                    debug!(per_sec = n, latest = %line.trim(), "source rate");
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "error reading sensor link");
                return;
            }
        }
    }
}

async fn run_simulator(house_id: String, period: Duration, state: AppState) {
    info!(house_id, ?period, "simulating sensor");
    let mut sim = Simulator::new(house_id);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match serde_json::to_string(&sim.step()) {
            Ok(line) => {
                state.publish(&line).await;
            }
            Err(e) => warn!(error = %e, "failed to encode simulated frame"),
        }
    }
}
