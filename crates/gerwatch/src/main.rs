mod state;
mod theme;
mod ui;
mod watcher;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SERVER: &str = "review.openstack.org";
const DEFAULT_PORT: u16 = 29418;
const DEFAULT_CONNECT_ATTEMPTS: i32 = 5;
const DEFAULT_LOG_FILE: &str = "gerwatch.log";
const TICK_MS: u64 = 500;

#[derive(Clone, Debug)]
pub struct Config {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub keyfile: Option<PathBuf>,
    pub connect_attempts: i32,
    pub log_file: PathBuf,
}

#[derive(Parser, Debug)]
#[command(name = "gerwatch", about = "Live terminal dashboard for a Gerrit event stream")]
struct Args {
    /// Gerrit server hostname.
    #[arg(long, default_value = "")]
    server: String,
    /// Gerrit SSH event-stream port.
    #[arg(long, default_value_t = 0)]
    port: u16,
    /// SSH username; defaults to the local account.
    #[arg(long, default_value = "")]
    username: String,
    /// SSH private key; defaults to ~/.ssh/id_rsa or ~/.ssh/id_dsa.
    #[arg(long, default_value = "")]
    keyfile: String,
    /// Connect attempts per reconnection round before the watcher gives up.
    #[arg(long, default_value_t = DEFAULT_CONNECT_ATTEMPTS)]
    attempts: i32,
    #[arg(long, default_value = "")]
    log_file: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    init_logging(&config);
    info!(
        event = "start",
        server = %config.server,
        port = config.port,
        username = %config.username
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let watcher_config = config.clone();
    tokio::spawn(async move {
        watcher::run(watcher_config, event_tx).await;
    });

    let mut app = state::App::new(event_rx);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut state::App,
) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
    let mut events = EventStream::new();

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;
        tokio::select! {
            _ = ticker.tick() => {
                app.on_tick();
            }
            maybe_event = events.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_event {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat)
                        && should_quit(key.code)
                    {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn should_quit(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc)
}

fn load_config() -> Config {
    let args = Args::parse();
    Config {
        server: resolve_server(&args.server),
        port: resolve_port(args.port),
        username: resolve_username(&args.username),
        keyfile: resolve_keyfile(&args.keyfile),
        connect_attempts: args.attempts,
        log_file: resolve_log_file(&args.log_file),
    }
}

fn resolve_server(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.to_string();
    }
    if let Ok(value) = std::env::var("GERWATCH_SERVER") {
        if !value.trim().is_empty() {
            return value;
        }
    }
    DEFAULT_SERVER.to_string()
}

fn resolve_port(flag: u16) -> u16 {
    if flag != 0 {
        return flag;
    }
    if let Ok(value) = std::env::var("GERWATCH_PORT") {
        if let Ok(port) = value.trim().parse() {
            return port;
        }
    }
    DEFAULT_PORT
}

fn resolve_username(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.to_string();
    }
    for key in ["GERWATCH_USERNAME", "USER", "LOGNAME"] {
        if let Ok(value) = std::env::var(key) {
            if !value.trim().is_empty() {
                return value;
            }
        }
    }
    String::new()
}

fn resolve_keyfile(flag: &str) -> Option<PathBuf> {
    if !flag.trim().is_empty() {
        return Some(PathBuf::from(flag));
    }
    if let Ok(value) = std::env::var("GERWATCH_KEYFILE") {
        if !value.trim().is_empty() {
            return Some(PathBuf::from(value));
        }
    }
    let home = std::env::var("HOME").ok()?;
    default_key_path(&PathBuf::from(home).join(".ssh"))
}

fn default_key_path(ssh_dir: &std::path::Path) -> Option<PathBuf> {
    for name in ["id_rsa", "id_dsa"] {
        let path = ssh_dir.join(name);
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

fn resolve_log_file(flag: &str) -> PathBuf {
    if !flag.trim().is_empty() {
        return PathBuf::from(flag);
    }
    if let Ok(value) = std::env::var("GERWATCH_LOG_FILE") {
        if !value.trim().is_empty() {
            return PathBuf::from(value);
        }
    }
    PathBuf::from(DEFAULT_LOG_FILE)
}

/// Routes tracing output to a file; the alternate screen owns stdout, so
/// writing there would tear the UI.
fn init_logging(config: &Config) {
    let level = std::env::var("GERWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("log_file_error: {err}");
            return;
        }
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_keys_cover_both_cases_and_escape() {
        assert!(should_quit(KeyCode::Char('q')));
        assert!(should_quit(KeyCode::Char('Q')));
        assert!(should_quit(KeyCode::Esc));
        assert!(!should_quit(KeyCode::Char('x')));
        assert!(!should_quit(KeyCode::Enter));
    }

    #[test]
    fn default_key_path_prefers_rsa_then_dsa() {
        let dir = std::env::temp_dir().join(format!("gerwatch-keys-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(default_key_path(&dir), None);

        std::fs::write(dir.join("id_dsa"), b"dsa").unwrap();
        assert_eq!(default_key_path(&dir), Some(dir.join("id_dsa")));

        std::fs::write(dir.join("id_rsa"), b"rsa").unwrap();
        assert_eq!(default_key_path(&dir), Some(dir.join("id_rsa")));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
