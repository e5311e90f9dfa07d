//! App state and main loop: input handling, pumping the telemetry client,
//! updating history, and drawing.

use std::{collections::VecDeque, io, time::Duration};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Color,
    Terminal,
};
use tokio::{sync::mpsc, time::sleep};
use tracing::info;

use wattline::history::PowerHistory;
use wattline::telemetry::{ConnectionState, TelemetryClient, WsConnector};
use wattline::types::Reading;

use crate::ui::{
    battery::draw_battery,
    header::draw_header,
    power::{draw_power_cards, draw_power_spark},
    status::{draw_banner, draw_contribution},
};

const TICK: Duration = Duration::from_millis(100);
const HISTORY_CAP: usize = 600;

// What the telemetry observers hand to the display
enum Update {
    Reading(Reading),
    State(ConnectionState),
}

pub struct App {
    client: TelemetryClient<WsConnector>,
    updates: mpsc::UnboundedReceiver<Update>,

    // Latest snapshot as seen by the display
    state: ConnectionState,
    last_reading: Option<Reading>,
    history: PowerHistory,

    // Quit flag
    should_quit: bool,
}

impl App {
    pub fn new(url: &str, reconnect_delay: Duration) -> Self {
        let mut client = TelemetryClient::new(WsConnector, url).with_reconnect_delay(reconnect_delay);
        let (tx, updates) = mpsc::unbounded_channel();
        let tx_state = tx.clone();
        client.on_reading(move |r| {
            let _ = tx.send(Update::Reading(r.clone()));
        });
        client.on_state_change(move |s| {
            let _ = tx_state.send(Update::State(*s));
        });
        Self {
            client,
            updates,
            state: ConnectionState::Connecting,
            last_reading: None,
            history: PowerHistory::new(HISTORY_CAP),
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        info!(url = self.client.url(), "starting telemetry client");
        self.client.start();

        // Main loop
        let res = self.event_loop(&mut terminal).await;

        // Teardown; the client is stopped whatever the loop returned
        self.client.stop();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> anyhow::Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::ZERO)? {
                if let Event::Key(k) = event::read()? {
                    if k.kind != KeyEventKind::Press {
                        continue;
                    }
                    match k.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                            self.should_quit = true;
                        }
                        KeyCode::Char('r') | KeyCode::Char('R') => self.client.reconnect(),
                        _ => {}
                    }
                }
            }
            if self.should_quit {
                break;
            }

            // Process transport events until the next tick
            tokio::select! {
                () = self.client.next_event() => {}
                () = sleep(TICK) => {}
            }
            self.drain_updates();

            // Draw
            terminal.draw(|f| self.draw(f))?;
        }

        Ok(())
    }

    fn drain_updates(&mut self) {
        while let Ok(update) = self.updates.try_recv() {
            match update {
                Update::Reading(r) => {
                    self.history.push(&r);
                    self.last_reading = Some(r);
                }
                Update::State(s) => self.state = s,
            }
        }
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let area = f.area();

        // Root rows: header, banner, power cards, battery, contribution, history
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // header
                Constraint::Length(3), // connection banner
                Constraint::Length(3), // production / consumption / net
                Constraint::Length(3), // battery
                Constraint::Length(3), // contribution
                Constraint::Min(5),    // sparklines
            ])
            .split(area);

        let reading = self.last_reading.as_ref();
        draw_header(f, rows[0], self.client.url(), self.state, reading);
        draw_banner(f, rows[1], self.state);
        draw_power_cards(f, rows[2], reading);
        draw_battery(f, rows[3], reading);
        draw_contribution(f, rows[4], reading);

        let spark_lr = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[5]);
        let peak = self.history.peak;
        draw_power_spark(
            f,
            spark_lr[0],
            &self.spark_title("Production", &self.history.production),
            &self.history.production,
            peak,
            Color::Green,
        );
        draw_power_spark(
            f,
            spark_lr[1],
            &self.spark_title("Consumption", &self.history.consumption),
            &self.history.consumption,
            peak,
            Color::Blue,
        );
    }

    fn spark_title(&self, label: &str, series: &VecDeque<u64>) -> String {
        if self.history.is_empty() {
            return format!("{label} (W) waiting for data");
        }
        format!(
            "{label} (W) now: {} | peak: {} | {} samples",
            series.back().copied().unwrap_or(0),
            self.history.peak,
            self.history.len()
        )
    }
}
