//! Connection banner and community contribution indicator.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use wattline::telemetry::ConnectionState;
use wattline::types::Reading;

pub fn draw_banner(f: &mut ratatui::Frame<'_>, area: Rect, state: ConnectionState) {
    let (text, color) = match state {
        ConnectionState::Connected => ("Receiving live sensor data".to_string(), Color::Green),
        ConnectionState::Connecting => ("Connecting to sensor...".to_string(), Color::Yellow),
        ConnectionState::Errored(reason) => (
            format!("Sensor link: {reason}. Retrying automatically; press 'r' to reconnect now"),
            Color::Red,
        ),
    };
    let p = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

pub fn draw_contribution(f: &mut ratatui::Frame<'_>, area: Rect, r: Option<&Reading>) {
    let (text, color) = match r.map(Reading::donate_enabled) {
        Some(true) => ("● Contributing to Community", Color::Green),
        Some(false) => ("● Not Contributing", Color::Red),
        None => ("● Unknown", Color::DarkGray),
    };
    let p = Paragraph::new(Span::styled(text, Style::default().fg(color)))
        .block(Block::default().borders(Borders::ALL).title("Community Contribution"));
    f.render_widget(p, area);
}
