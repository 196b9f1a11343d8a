use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use reflex::{
    app::{App, Control},
    app_dirs::AppDirs,
    clock::{Clock, MonotonicClock},
    config::{Config, ConfigStore, FileConfigStore},
    engine::Engine,
    logging::init_logging,
    result::SessionKind,
    runtime::{CrosstermEventSource, EventSource, FixedTicker, Runner, Ticker},
    store::{ResultStore, SqliteStore},
    timer::{ThreadTimer, Timer},
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

const TICK_RATE_MS: u64 = 100;

/// terminal visual reaction time test
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal reaction time test. A red block appears after a random 1-4 second delay; respond with the response key or a mouse click as fast as you can. Full test results are saved to a local SQLite database."
)]
pub struct Cli {
    /// make warmup the default session for this run
    #[clap(long)]
    warmup: bool,

    /// user id results are saved under (remembered in the config file)
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// condition tag attached to saved results, e.g. "morning"
    #[clap(short = 'c', long)]
    condition: Option<String>,

    /// free-text notes attached to saved results
    #[clap(short = 'n', long)]
    notes: Option<String>,

    /// key that counts as a response (remembered in the config file)
    #[clap(short = 'k', long)]
    key: Option<char>,

    /// results database path (defaults to the state directory)
    #[clap(long)]
    db: Option<PathBuf>,

    /// run without saving anything
    #[clap(long)]
    no_save: bool,

    /// increase log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Fold command line overrides into the stored config. Returns whether
    /// anything worth persisting changed.
    fn apply_to(&self, cfg: &mut Config) -> bool {
        let mut changed = false;
        if let Some(user) = self.user.as_deref().map(str::trim) {
            if !user.is_empty() && user != cfg.user_id {
                cfg.user_id = user.to_string();
                changed = true;
            }
        }
        if let Some(key) = self.key {
            if key != cfg.response_key {
                cfg.response_key = key;
                changed = true;
            }
        }
        if self.warmup {
            cfg.default_kind = SessionKind::Warmup;
        }
        changed
    }

    fn open_store(&self) -> Option<Box<dyn ResultStore>> {
        if self.no_save {
            return None;
        }
        let opened = match &self.db {
            Some(path) => SqliteStore::open(path),
            None => SqliteStore::open_default(),
        };
        match opened {
            Ok(store) => Some(Box::new(store)),
            Err(e) => {
                warn!(error = %e, "results database unavailable, saving disabled");
                None
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        if let Err(e) = init_logging(cli.verbose, &path) {
            eprintln!("warning: could not open log file {}: {e}", path.display());
        }
    }

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    if cli.apply_to(&mut config) {
        if let Err(e) = config_store.save(&config) {
            warn!(error = %e, "could not save config");
        }
    }

    // input is stamped on the reader thread with the engine's own clock
    let clock = MonotonicClock::new();
    let runner = Runner::new(
        CrosstermEventSource::new(clock),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let timer = ThreadTimer::new(runner.event_source().sender());
    let engine = Engine::new(clock, timer).with_timings(config.timings);

    let mut app = App::new(engine, config).with_tags(cli.condition.clone(), cli.notes.clone());
    if let Some(store) = cli.open_store() {
        app = app.with_store(store);
    }
    info!(
        user = %app.config.user_id,
        saving = app.saving_enabled(),
        "starting reflex"
    );

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B, C, T, E, K>(
    terminal: &mut Terminal<B>,
    app: &mut App<C, T>,
    runner: &Runner<E, K>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    C: Clock,
    T: Timer,
    E: EventSource,
    K: Ticker,
{
    loop {
        terminal.draw(|f| f.render_widget(&app.view(), f.area()))?;

        if app.handle_event(runner.step()) == Control::Quit {
            break;
        }
    }

    app.abandon();
    Ok(())
}
