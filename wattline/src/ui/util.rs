//! Small UI helpers: human-readable power values.

pub fn watts(w: f64) -> String {
    let abs = w.abs();
    if abs < 1000.0 {
        format!("{w:.0}W")
    } else if abs < 1_000_000.0 {
        format!("{:.2}kW", w / 1000.0)
    } else {
        format!("{:.2}MW", w / 1_000_000.0)
    }
}
