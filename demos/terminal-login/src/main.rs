//! Terminal login: a Tenure session in a shell.
//!
//! Talks to a REST session server (`POST/PATCH/DELETE {base}/sessions`),
//! keeps the session id in a JSON file so it survives restarts, and shows
//! the inactivity warning inline. Every line typed counts as activity.
//!
//! ```text
//! cargo run -p terminal-login -- [config.json]
//! TENURE_BASE_URL=http://localhost:2345/api cargo run -p terminal-login
//! RUST_LOG=tenure=debug cargo run -p terminal-login
//! ```
//!
//! Commands: `login <id> <pw>`, `logout`, `status`, `quit`. While a
//! warning is open, answer `continue` or `logout`.

use std::error::Error;
use std::path::PathBuf;

use tenure::prelude::*;
use tenure::PromptResponder;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_BASE_URL: &str = "http://localhost:2345";
const BASE_URL_ENV: &str = "TENURE_BASE_URL";
const TOKEN_FILE: &str = "tenure-terminal-login.json";

/// Form widgets whose errors are shown next to the field.
const WIDGETS: [&str; 2] = ["loginId", "pw"];

// ---------------------------------------------------------------------------
// Presenter
// ---------------------------------------------------------------------------

struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn app_entered_logged_in(&self, session: &SessionInfo) {
        println!(
            "Logged in (session {}, {}s left). Type `logout` or `status`.",
            session.session_id, session.max_age_seconds
        );
    }

    fn app_entered_logged_out(&self) {
        println!("Logged out. Type `login <id> <pw>`.");
    }

    fn errors_occurred(&self, errors: &ErrorList) {
        for line in error_lines(errors) {
            println!("{line}");
        }
    }
}

/// Field errors first, labelled by field, then everything else.
fn error_lines(errors: &ErrorList) -> Vec<String> {
    let mut lines: Vec<String> = WIDGETS
        .iter()
        .flat_map(|widget| {
            errors
                .for_widget(widget)
                .map(move |e| format!("  {widget}: {}", e.message))
        })
        .collect();
    lines.extend(
        errors
            .generic(&WIDGETS)
            .map(|e| format!("  error: {}", e.message)),
    );
    lines
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Input {
    Login { login_id: String, password: String },
    Logout,
    Status,
    Quit,
    Answer(PromptChoice),
    Unknown(String),
}

impl Input {
    /// Parses a line. While a warning is open, `continue` and `logout`
    /// answer it. Blank lines parse to `None`.
    fn parse(line: &str, warning_open: bool) -> Option<Self> {
        let mut words = line.split_whitespace();
        let first = words.next()?;
        if warning_open {
            if let Ok(choice) = first.parse::<PromptChoice>() {
                return Some(Self::Answer(choice));
            }
        }
        Some(match (first, words.next(), words.next()) {
            ("login", Some(id), Some(pw)) => Self::Login {
                login_id: id.to_string(),
                password: pw.to_string(),
            },
            ("logout", None, None) => Self::Logout,
            ("status", None, None) => Self::Status,
            ("quit" | "exit", None, None) => Self::Quit,
            _ => Self::Unknown(line.trim().to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Reads the config file if one is given, then applies the environment
/// override.
fn load_config(
    path: Option<PathBuf>,
    base_url_override: Option<String>,
) -> Result<SessionConfig, Box<dyn Error>> {
    let mut config: SessionConfig = match path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => SessionConfig::default(),
    };
    if let Some(url) = base_url_override {
        config.base_url = url;
    }
    if config.base_url.is_empty() {
        config.base_url = DEFAULT_BASE_URL.to_string();
    }
    Ok(config)
}

fn print_status(snapshot: &ControllerSnapshot) {
    println!("state: {}", snapshot.state);
    if let Some(info) = &snapshot.session_info {
        println!("session: {} ({}s)", info.session_id, info.max_age_seconds);
    }
    if let Some(at) = snapshot.last_check_time {
        println!("last renewed: {at}");
    }
    if let Some(at) = snapshot.last_activity {
        println!("last activity: {at}");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config(
        std::env::args_os().nth(1).map(PathBuf::from),
        std::env::var(BASE_URL_ENV).ok(),
    )?;
    tracing::info!(base_url = %config.base_url, "starting terminal login");

    let backend = HttpSessionBackend::new(&config.base_url)?;
    let store = FileTokenStore::new(std::env::temp_dir().join(TOKEN_FILE));
    let (prompt, mut warnings) = ChannelWarningPrompt::new(1);
    let (activity, source) = ChannelActivitySource::new();

    let handle = SessionControllerBuilder::new(config)
        .activity_source(source)
        .spawn(backend, store, TerminalPresenter, prompt);
    handle.attach().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut open_warning: Option<PromptResponder> = None;

    loop {
        tokio::select! {
            Some(mut request) = warnings.recv() => {
                println!("{} Type `continue` or `logout`.", request.message());
                open_warning = Some(request.responder().clone());
                tokio::spawn(async move {
                    while let Some(left) = request.next_tick().await {
                        if left > 0 && left % 10 == 0 {
                            println!("{}", request.message());
                        }
                    }
                });
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                activity.emit(ActivityKind::KeyDown);

                let warning_open = open_warning
                    .as_ref()
                    .is_some_and(PromptResponder::is_open);
                let Some(input) = Input::parse(&line, warning_open) else {
                    continue;
                };
                match input {
                    Input::Answer(choice) => {
                        if let Some(responder) = open_warning.take() {
                            responder.respond(choice);
                        }
                    }
                    Input::Login { login_id, password } => {
                        handle.login(Credentials::new(login_id, password)).await?;
                    }
                    Input::Logout => {
                        handle.logout().await?;
                    }
                    Input::Status => print_status(&handle.snapshot().await?),
                    Input::Quit => break,
                    Input::Unknown(text) => {
                        println!(
                            "unknown command {text:?}: try login, logout, status, quit"
                        );
                    }
                }
            }
        }
    }

    handle.dispose().await?;
    Ok(())
}
