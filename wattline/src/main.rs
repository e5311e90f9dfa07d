//! Entry point for the wattline TUI. Parses args, resolves the connection
//! profile and runs the App.

mod app;
mod ui;

use anyhow::Context;
use app::App;
use std::env;
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wattline::profiles::{
    config_dir, load_profiles, save_profiles, ProfileEntry, ProfileRequest, ResolveProfile,
};
use wattline::telemetry::{DEFAULT_URL, RECONNECT_DELAY};

const USAGE: &str = "[--profile NAME|-P NAME] [--save] [--demo] [--dry-run] [--reconnect-delay SECS] [ws://HOST:PORT/]";
const DEMO_PORT: u16 = 8766;

#[derive(Debug, Default, PartialEq)]
struct ParsedArgs {
    url: Option<String>,
    profile: Option<String>,
    reconnect_delay_secs: Option<u64>,
    save: bool,
    demo: bool,
    dry_run: bool,
}

#[derive(Debug, PartialEq)]
enum Cli {
    Help(String),
    Run(ParsedArgs),
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Cli, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "wattline".into());
    let mut parsed = ParsedArgs::default();

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Cli::Help(format!("Usage: {prog} {USAGE}"))),
            "--profile" | "-P" => {
                parsed.profile = it.next();
            }
            "--reconnect-delay" => {
                parsed.reconnect_delay_secs = Some(parse_secs(it.next())?);
            }
            "--save" => parsed.save = true,
            "--demo" => parsed.demo = true,
            "--dry-run" => parsed.dry_run = true,
            _ if arg.starts_with("--profile=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    if !v.is_empty() {
                        parsed.profile = Some(v.to_string());
                    }
                }
            }
            _ if arg.starts_with("--reconnect-delay=") => {
                let v = arg.split_once('=').map(|(_, v)| v.to_string());
                parsed.reconnect_delay_secs = Some(parse_secs(v)?);
            }
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown flag '{arg}'. Usage: {prog} {USAGE}"));
            }
            _ => {
                if parsed.url.is_none() {
                    parsed.url = Some(validate_url(&arg)?);
                } else {
                    return Err(format!("Unexpected argument. Usage: {prog} {USAGE}"));
                }
            }
        }
    }
    Ok(Cli::Run(parsed))
}

fn parse_secs(v: Option<String>) -> Result<u64, String> {
    match v.as_deref().map(str::parse::<u64>) {
        Some(Ok(secs)) if secs > 0 => Ok(secs),
        _ => Err("--reconnect-delay expects a positive number of seconds".into()),
    }
}

fn validate_url(raw: &str) -> Result<String, String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("Invalid URL '{raw}': {e}"))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(raw.to_string()),
        other => Err(format!("Unsupported scheme '{other}', expected ws:// or wss://")),
    }
}

fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // The terminal belongs to the TUI; logs go to a file next to the profiles.
    let dir = config_dir();
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(&dir, "wattline.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(Cli::Run(v)) => v,
        Ok(Cli::Help(msg)) => {
            eprintln!("{msg}");
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    let _log_guard = init_logging();

    let delay_override = parsed.reconnect_delay_secs;

    // Demo mode short-circuit (ignore other args except conflicting ones)
    if parsed.demo || matches!(parsed.profile.as_deref(), Some("demo")) {
        return run_demo_mode(delay_override, parsed.dry_run).await;
    }

    let profiles_file = load_profiles();
    let req = ProfileRequest {
        profile_name: parsed.profile.clone(),
        url: parsed.url.clone(),
        reconnect_delay_secs: delay_override,
    };
    let resolved = req.resolve(&profiles_file);

    // Determine final connection parameters (and maybe mutated profiles to persist)
    let mut profiles_mut = profiles_file.clone();
    let entry: ProfileEntry = match resolved {
        ResolveProfile::Direct(entry) => {
            // Possibly save if profile specified and --save or new entry
            if let Some(name) = parsed.profile.as_ref() {
                let overwrite = match profiles_mut.profiles.get(name) {
                    // New profile: auto-save immediately
                    None => true,
                    Some(existing) if *existing != entry => {
                        parsed.save
                            || prompt_yes_no(&format!("Overwrite existing profile '{name}'? [y/N]: "))
                    }
                    Some(_) => false,
                };
                if overwrite {
                    profiles_mut.profiles.insert(name.clone(), entry.clone());
                    save_profiles(&profiles_mut).context("saving profiles")?;
                }
            }
            entry
        }
        ResolveProfile::Loaded(entry) => entry,
        ResolveProfile::PromptSelect(mut names) => {
            // Always add demo option to list
            if !names.iter().any(|n| n == "demo") {
                names.push("demo".into());
            }
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            let line = prompt_string("Enter number (or blank to abort): ")?;
            let Some(name) = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|idx| idx.checked_sub(1))
                .and_then(|idx| names.get(idx))
            else {
                return Ok(());
            };
            if name == "demo" {
                return run_demo_mode(delay_override, parsed.dry_run).await;
            }
            match profiles_mut.profiles.get(name) {
                Some(entry) => entry.clone(),
                None => return Ok(()),
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let url = prompt_string(&format!("Enter URL (blank for {DEFAULT_URL}): "))?;
            let url = match url.trim() {
                "" => DEFAULT_URL.to_string(),
                u => validate_url(u).map_err(anyhow::Error::msg)?,
            };
            let entry = ProfileEntry {
                url,
                reconnect_delay_secs: delay_override,
            };
            profiles_mut.profiles.insert(name, entry.clone());
            save_profiles(&profiles_mut).context("saving profiles")?;
            entry
        }
        ResolveProfile::None => ProfileEntry {
            url: DEFAULT_URL.to_string(),
            reconnect_delay_secs: delay_override,
        },
    };

    let delay = entry
        .reconnect_delay_secs
        .map(Duration::from_secs)
        .unwrap_or(RECONNECT_DELAY);
    if parsed.dry_run {
        eprintln!("would connect to {} (reconnect delay {:?})", entry.url, delay);
        return Ok(());
    }

    let mut app = App::new(&entry.url, delay);
    app.run().await
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_ok() {
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

// --- Demo Mode ---

async fn run_demo_mode(delay_secs: Option<u64>, dry_run: bool) -> anyhow::Result<()> {
    let url = format!("ws://127.0.0.1:{DEMO_PORT}/ws");
    let delay = delay_secs.map(Duration::from_secs).unwrap_or(RECONNECT_DELAY);
    if dry_run {
        eprintln!("would start demo bridge and connect to {url} (reconnect delay {delay:?})");
        return Ok(());
    }
    let child = spawn_demo_bridge(DEMO_PORT)?;
    // Give the bridge a brief moment to bind
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut app = App::new(&url, delay);
    let res = app.run().await;
    // Kills the bridge
    drop(child);
    res
}

struct DemoGuard(std::process::Child);

impl Drop for DemoGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_demo_bridge(port: u16) -> anyhow::Result<DemoGuard> {
    let candidate = find_bridge_executable();
    let child = std::process::Command::new(&candidate)
        .arg("--port")
        .arg(port.to_string())
        .arg("--interval-ms")
        .arg("1000")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("spawning {}", candidate.display()))?;
    Ok(DemoGuard(child))
}

fn find_bridge_executable() -> std::path::PathBuf {
    #[cfg(windows)]
    let name = "wattline_bridge.exe";
    #[cfg(not(windows))]
    let name = "wattline_bridge";
    if let Some(parent) = std::env::current_exe().ok().as_deref().and_then(|p| p.parent()) {
        let candidate = parent.join(name);
        if candidate.exists() {
            return candidate;
        }
    }
    // Fallback to relying on PATH
    std::path::PathBuf::from(name)
}
