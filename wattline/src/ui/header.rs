//! Top header with site id and link indicator.

use ratatui::{
    layout::Rect,
    widgets::{Block, Borders},
};
use wattline::telemetry::ConnectionState;
use wattline::types::Reading;

pub fn draw_header(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    url: &str,
    state: ConnectionState,
    r: Option<&Reading>,
) {
    let site = r.map(Reading::id).unwrap_or("-");
    let title = format!("wattline | site: {site} | {url} | {state}  (press 'q' to quit)");
    f.render_widget(Block::default().title(title).borders(Borders::BOTTOM), area);
}
