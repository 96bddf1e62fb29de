mod api;
mod app;
mod columns;
mod config;
mod error;
mod models;
mod parser;
mod stage;
mod store;
mod ui;
mod worktime;

use crate::api::ApiClient;
use crate::app::App;
use crate::config::Config;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use env_logger::{Builder, Env, Target};
use mockable::DefaultClock;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{self, OpenOptions};
use std::io;

// The terminal owns stdout, so log records go to a file.
fn init_logging(config: &Config) -> io::Result<()> {
    if let Some(dir) = config.log_file.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;
    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::load()?;
    init_logging(&config)?;
    log::info!("starting against {}", config.url);

    let api = ApiClient::new(&config);
    let mut app = App::new(api, DefaultClock);
    app.load_all().await;

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("terminal loop failed: {}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
