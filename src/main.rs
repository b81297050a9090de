use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use keyrun::{
    app::{export_results, Action, App},
    app_dirs::AppDirs,
    catalog::{Locale, TextCatalog},
    config::{ConfigStore, FileConfigStore, Settings},
    logging::init_tracing,
    results::{ExportFormat, ResultStore},
    runtime::{CrosstermEventSource, Runner},
    storage::{KeyValueStore, MemoryStore, SqliteStore},
    submit::NoopSubmitter,
    trainer::Trainer,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
    rc::Rc,
    time::SystemTime,
};
use tracing::{error, info};

/// typing practice in the terminal with live speed and accuracy
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Typing practice in the terminal: live speed and accuracy, drills built from your most-missed characters, and a history of every session."
)]
pub struct Cli {
    /// language of the practice texts
    #[clap(short = 'l', long, value_enum)]
    language: Option<Locale>,

    /// text category: all, difficult, or a catalog category
    #[clap(short = 'c', long)]
    category: Option<String>,

    /// session length in seconds, 0 for untimed
    #[clap(short = 'd', long)]
    duration: Option<u32>,

    /// endpoint receiving every finished result as JSON
    #[clap(long)]
    server_url: Option<String>,

    /// keep results local for this run
    #[clap(long)]
    offline: bool,

    /// practice texts JSON file used instead of the built-in set
    #[clap(long)]
    catalog: Option<PathBuf>,

    /// directory holding the store, settings and log
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// write all results into DIR and exit
    #[clap(long, value_name = "DIR")]
    export: Option<PathBuf>,

    /// format used by --export and ctrl+e
    #[clap(long, value_enum, default_value_t = ExportFormat::Json)]
    format: ExportFormat,

    /// tracing filter, overridden by KEYRUN_LOG
    #[clap(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    /// Fold command line overrides into the persisted settings; returns
    /// whether anything changed
    fn apply_to(&self, settings: &mut Settings) -> bool {
        let before = settings.clone();

        if let Some(language) = self.language {
            settings.language = language;
        }
        if let Some(category) = &self.category {
            settings.category = category.clone();
        }
        if let Some(duration) = self.duration {
            settings.test_duration = duration;
        }
        if let Some(url) = &self.server_url {
            settings.server_url = Some(url.clone());
        }

        *settings != before
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.data_dir {
            Some(dir) => FileConfigStore::with_path(dir.join("config.json")),
            None => FileConfigStore::new(),
        }
    }

    fn log_path(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.join("keyrun.log"),
            None => AppDirs::log_path().unwrap_or_else(|| PathBuf::from("keyrun.log")),
        }
    }

    fn store_path(&self) -> Option<PathBuf> {
        match &self.data_dir {
            Some(dir) => Some(AppDirs::store_path_in(dir)),
            None => AppDirs::store_path(),
        }
    }

    fn catalog(&self) -> TextCatalog {
        match &self.catalog {
            Some(path) => TextCatalog::from_path(path),
            None => TextCatalog::embedded(),
        }
    }
}

/// Open the persistent store, keeping results in memory for this run when
/// the database is unavailable
fn open_store(path: Option<&Path>) -> Rc<dyn KeyValueStore> {
    let Some(path) = path else {
        return Rc::new(MemoryStore::new());
    };
    match SqliteStore::open(path) {
        Ok(store) => Rc::new(store),
        Err(e) => {
            error!(path = %path.display(), error = %e, "falling back to in-memory store");
            Rc::new(MemoryStore::new())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_path(), &cli.log_level) {
        eprintln!("warning: logging disabled: {e}");
    }

    let store = open_store(cli.store_path().as_deref());

    if let Some(dir) = &cli.export {
        let results = ResultStore::load(store);
        match export_results(&results, dir, cli.format) {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, e.to_string()).exit();
            }
        }
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = cli.config_store();
    let mut settings = config_store.load();
    if cli.apply_to(&mut settings) {
        if let Err(e) = config_store.save(&settings) {
            error!(error = %e, "failed to save settings");
        }
    }
    info!(language = %settings.language, category = %settings.category, "starting");

    let trainer = if cli.offline {
        Trainer::with_parts(
            settings,
            cli.catalog(),
            store,
            Box::new(NoopSubmitter),
            StdRng::from_entropy(),
        )
    } else {
        Trainer::new(settings, cli.catalog(), store)
    };
    let export_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut app = App::new(trainer, Box::new(config_store), export_dir);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    app.trainer.drain_submissions();
    outcome
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new());

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        let event = runner.step();
        if app.handle_event(event, SystemTime::now()) == Action::Quit {
            break;
        }
    }

    Ok(())
}
