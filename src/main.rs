use anyhow::Result;
use clap::{Arg, Command};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io,
    path::PathBuf,
    time::{Duration, Instant},
};

mod app;
mod auth;
mod config;
mod contacts;
mod storage;
mod store;
mod ui;

use app::{App, AppOptions};
use config::Config;
use storage::FileStore;

const CHATTERM_LOGO: &str = r#"
        _           _   _
    ___| |__   __ _| |_| |_ ___ _ __ _ __ ___
   / __| '_ \ / _` | __| __/ _ \ '__| '_ ` _ \
  | (__| | | | (_| | |_| ||  __/ |  | | | | | |
   \___|_| |_|\__,_|\__|\__\___|_|  |_| |_| |_|
"#;

fn show_startup_logo() {
    // Clear screen
    print!("\x1B[2J\x1B[1;1H");

    let colors = [
        "\x1B[38;5;22m",
        "\x1B[38;5;28m",
        "\x1B[38;5;34m",
        "\x1B[38;5;40m",
        "\x1B[38;5;46m",
        "\x1B[38;5;83m",
    ];

    for (i, line) in CHATTERM_LOGO.lines().enumerate() {
        if i < colors.len() && !line.trim().is_empty() {
            println!("{}{}\x1B[0m", colors[i], line);
        } else {
            println!("{}", line);
        }
    }

    println!("\n\x1B[38;5;34m=== Chatterm v0.1.0 - Terminal Chat Demo ===\x1B[0m");
    println!("\x1B[38;5;40mLocal-only messaging with simulated replies\x1B[0m");
    println!("\x1B[38;5;46mPress any key to continue...\x1B[0m\n");

    // Wait for keypress
    let _ = std::io::Read::read(&mut std::io::stdin(), &mut [0u8; 1]);
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("chatterm")
        .version("0.1.0")
        .author("Chatterm Team")
        .about("Two-pane terminal chat demo backed by local JSON storage")
        .arg(
            Arg::new("email")
                .long("email")
                .value_name("EMAIL")
                .help("Sign in with this email, skipping the login screen (needs --password)"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .help("Password for --email"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory for the persisted JSON state"),
        )
        .arg(
            Arg::new("fresh")
                .long("fresh")
                .action(clap::ArgAction::SetTrue)
                .help("Clear all persisted state (accounts, session, messages) before starting"),
        )
        .arg(
            Arg::new("no-logo")
                .long("no-logo")
                .action(clap::ArgAction::SetTrue)
                .help("Skip startup logo"),
        )
        .get_matches();

    let config = Config::load()?;

    if !matches.get_flag("no-logo") && !config.no_logo {
        show_startup_logo();
    }

    let data_dir = matches
        .get_one::<String>("data-dir")
        .map(PathBuf::from)
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(FileStore::default_dir);

    let opts = AppOptions {
        data_dir,
        fresh: matches.get_flag("fresh"),
        email: matches.get_one::<String>("email").cloned(),
        password: matches.get_one::<String>("password").cloned(),
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(opts)?;
    let res = run_app(&mut terminal, &mut app, config.tick_ms()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    tick_ms: u64,
) -> Result<()> {
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(tick_ms);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout_duration = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout_duration)? {
            let event = event::read()?;
            app.handle_input(event).await?;
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick().await?;
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
