//! wattline_bridge: forwards newline-delimited sensor readings to every
//! connected WebSocket subscriber.

mod serial;
mod simulator;
mod source;
mod state;
mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::source::{spawn_source, SerialTarget, Source, DEFAULT_HOUSE_ID};
use crate::state::AppState;
use crate::ws::ws_handler;

const DEFAULT_PORT: u16 = 8765;
const DEFAULT_INTERVAL_MS: u64 = 2000;
const USAGE: &str = "[--port PORT|-p PORT] [--serial PATH|auto|-s PATH|auto] [--list-ports] [--interval-ms MS] [--house-id ID]";

#[derive(Debug, PartialEq)]
struct BridgeArgs {
    port: u16,
    source: Source,
}

#[derive(Debug, PartialEq)]
enum Cli {
    Help,
    ListPorts,
    Run(BridgeArgs),
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Cli, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "wattline_bridge".into());
    let mut port = DEFAULT_PORT;
    let mut serial: Option<SerialTarget> = None;
    let mut interval_ms = DEFAULT_INTERVAL_MS;
    let mut house_id = DEFAULT_HOUSE_ID.to_string();

    while let Some(a) = it.next() {
        let (flag, inline) = match a.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (a.clone(), None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| it.next())
                .ok_or_else(|| format!("{flag} expects a value. Usage: {prog} {USAGE}"))
        };
        match flag.as_str() {
            "-h" | "--help" => {
                eprintln!("Usage: {prog} {USAGE}");
                return Ok(Cli::Help);
            }
            "--list-ports" => return Ok(Cli::ListPorts),
            "--port" | "-p" => {
                let v = value()?;
                port = v.parse().map_err(|_| format!("invalid port '{v}'"))?;
            }
            "--serial" | "-s" => {
                serial = Some(match value()?.as_str() {
                    "auto" => SerialTarget::Auto,
                    path => SerialTarget::Path(PathBuf::from(path)),
                });
            }
            "--interval-ms" => {
                let v = value()?;
                interval_ms = match v.parse::<u64>() {
                    Ok(ms) if ms > 0 => ms,
                    _ => return Err(format!("invalid interval '{v}'")),
                };
            }
            "--house-id" => house_id = value()?,
            _ => return Err(format!("Unexpected argument '{a}'. Usage: {prog} {USAGE}")),
        }
    }

    let source = match serial {
        Some(target) => Source::Serial(target),
        None => Source::Simulator {
            house_id,
            interval: Duration::from_millis(interval_ms),
        },
    };
    Ok(Cli::Run(BridgeArgs { port, source }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args(std::env::args()) {
        Ok(Cli::Run(a)) => a,
        Ok(Cli::Help) => return Ok(()),
        Ok(Cli::ListPorts) => {
            println!("{}", serial::format_ports(&serial::list_ports()));
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    if matches!(args.source, Source::Serial(_)) {
        info!("{}", serial::format_ports(&serial::list_ports()));
    }

    let token = std::env::var("WATTLINE_BRIDGE_TOKEN")
        .ok()
        .filter(|t| !t.is_empty());
    let state = AppState::new(token);
    let source = spawn_source(args.source.clone(), state.clone());

    let app = Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, source = ?args.source, "bridge running at ws://{addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    source.abort();
    Ok(())
}
