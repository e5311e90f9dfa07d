//! Production / consumption figures and their sparklines.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Paragraph, Sparkline},
};
use std::collections::VecDeque;
use wattline::types::Reading;

use crate::ui::util::watts;

pub fn draw_power_cards(f: &mut ratatui::Frame<'_>, area: Rect, r: Option<&Reading>) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    let (prod, cons, net) = match r {
        Some(rr) => (
            watts(rr.current_production()),
            watts(rr.current_consumption()),
            Some(rr.net_power()),
        ),
        None => ("-".into(), "-".into(), None),
    };
    let net_color = match net {
        Some(n) if n >= 0.0 => Color::Green,
        Some(_) => Color::Red,
        None => Color::DarkGray,
    };
    let net_text = net.map(watts).unwrap_or_else(|| "-".into());

    card(f, cols[0], "Production", prod, Color::Green);
    card(f, cols[1], "Consumption", cons, Color::Blue);
    card(f, cols[2], "Net", net_text, net_color);
}

fn card(f: &mut ratatui::Frame<'_>, area: Rect, title: &str, value: String, color: Color) {
    let p = Paragraph::new(Span::styled(
        value,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
    .centered()
    .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(p, area);
}

pub fn draw_power_spark(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    title: &str,
    hist: &VecDeque<u64>,
    max: u64,
    color: Color,
) {
    let max_points = area.width.saturating_sub(2) as usize;
    let start = hist.len().saturating_sub(max_points);
    let data: Vec<u64> = hist.iter().skip(start).cloned().collect();

    let spark = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .data(&data)
        .max(max.max(1))
        .style(Style::default().fg(color));
    f.render_widget(spark, area);
}
