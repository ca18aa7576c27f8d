use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing_subscriber::EnvFilter;

use kaizen_pulse::app::{write_snapshot, App};
use kaizen_pulse::config::{Overrides, Settings};
use kaizen_pulse::controller::{DashboardView, ErrorKind};
use kaizen_pulse::{events, ui, Controller, SocketChannelFactory};

#[derive(Parser, Debug)]
#[command(name = "kaizen-pulse")]
#[command(about = "Live metrics console for the KaizenPro continuous-improvement dashboard")]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the KaizenPro API (e.g. http://localhost:3001/api/v1/kaizenpro)
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token; when absent the session file is read
    #[arg(long)]
    token: Option<String>,

    /// File holding the token written by the login flow
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// Log filter (e.g. "info", "kaizen_pulse=debug")
    #[arg(long)]
    log: Option<String>,

    /// Write logs to this file (the TUI owns the terminal)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Wait for the first snapshot, write it to this JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Seconds to wait for data in export mode
    #[arg(long, default_value = "15", requires = "export")]
    wait: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = Overrides {
        api_url: args.api_url.clone(),
        token: args.token.clone(),
        session_file: args.session_file.clone(),
        log: args.log.clone(),
    };
    let settings = Settings::load(args.config.as_deref(), &overrides)?;

    init_logging(&settings.log, args.log_file.as_deref(), args.export.is_some())?;

    // The channel and controller spawn onto this runtime from the UI thread.
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let controller = Controller::mount(
        settings.endpoint(),
        settings.credential_source(),
        Arc::new(SocketChannelFactory::default()),
    );

    if let Some(export_path) = args.export {
        return rt.block_on(export_to_file(
            controller,
            &export_path,
            Duration::from_secs(args.wait),
        ));
    }

    run_tui(controller)
}

/// Install the tracing subscriber.
///
/// Logs go to `log_file` when given, to stderr in export mode, and nowhere
/// otherwise so they cannot corrupt the TUI.
fn init_logging(default_filter: &str, log_file: Option<&Path>, export: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .with_context(|| format!("Invalid log filter '{}'", default_filter))?;

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if export {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

/// Run the TUI until the user quits.
fn run_tui(controller: Controller) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let mut app = App::new(controller);
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse),
                _ => {}
            }
        }

        app.refresh();
    }

    Ok(())
}

/// True once waiting longer cannot produce a snapshot.
fn gave_up(view: &DashboardView) -> bool {
    view.has_error()
        && matches!(
            view.last_error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Configuration) | Some(ErrorKind::RetriesExhausted)
        )
}

/// Wait for the first snapshot and write it to a JSON file.
async fn export_to_file(controller: Controller, path: &Path, wait: Duration) -> Result<()> {
    let mut rx = controller.subscribe();
    let waited = tokio::time::timeout(
        wait,
        rx.wait_for(|v| v.last_snapshot.is_some() || gave_up(v)),
    )
    .await
    .map(|r| r.map(|_| ()));

    let view = controller.view();
    controller.unmount();

    if waited.is_err() {
        bail!(
            "No dashboard data within {}s (state: {})",
            wait.as_secs(),
            view.connection_state
        );
    }

    let Some(snapshot) = view.last_snapshot else {
        let reason = view
            .last_error
            .map(|e| e.message)
            .unwrap_or_else(|| "connection closed".to_string());
        bail!("No dashboard data: {}", reason);
    };

    write_snapshot(&snapshot, path)?;
    println!("Exported dashboard snapshot to: {}", path.display());
    Ok(())
}
