//! Battery gauge.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Gauge},
};
use wattline::types::{BatteryBand, PowerStatus, Reading};

pub fn draw_battery(f: &mut ratatui::Frame<'_>, area: Rect, r: Option<&Reading>) {
    let (pct, color, label) = if let Some(rr) = r {
        let color = match rr.battery_band() {
            BatteryBand::High => Color::Green,
            BatteryBand::Medium => Color::Yellow,
            BatteryBand::Low => Color::Red,
        };
        let status = match rr.power_status() {
            Some(PowerStatus::Critical) => " (critical)",
            Some(PowerStatus::Warning) => " (warning)",
            Some(PowerStatus::Good) | None => "",
        };
        (
            rr.battery_level().round() as u16,
            color,
            format!("{:.1}%{status}", rr.battery_level()),
        )
    } else {
        (0, Color::DarkGray, "N/A".into())
    };

    let g = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Battery"))
        .gauge_style(Style::default().fg(color))
        .percent(pct.min(100))
        .label(label);
    f.render_widget(g, area);
}
