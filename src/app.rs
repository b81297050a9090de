use crate::config::ConfigStore;
use crate::error::Result;
use crate::results::{export_file_name, ExportFormat, ResultStore};
use crate::runtime::AppEvent;
use crate::trainer::Trainer;
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{error, info};

/// Durations offered when cycling with ctrl+d
pub const DURATION_CHOICES: [u32; 5] = [0, 15, 30, 60, 120];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Terminal front end state: the typed buffer plus the trainer behind it
pub struct App {
    pub trainer: Trainer,
    pub buffer: String,
    pub state: AppState,
    /// one-line message shown under the text (errors, export paths)
    pub status: Option<String>,
    config_store: Box<dyn ConfigStore>,
    export_dir: PathBuf,
}

impl App {
    pub fn new(trainer: Trainer, config_store: Box<dyn ConfigStore>, export_dir: PathBuf) -> Self {
        let mut app = Self {
            trainer,
            buffer: String::new(),
            state: AppState::Typing,
            status: None,
            config_store,
            export_dir,
        };
        app.load_new_text();
        app
    }

    pub fn handle_event(&mut self, event: AppEvent, now: SystemTime) -> Action {
        // timers advance on every event; ticks alone stop arriving while
        // keys come in faster than the refresh interval
        let expired = self.poll_timers(now);

        match event {
            AppEvent::Key(key) => {
                let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
                let edits = matches!(key.code, KeyCode::Char(_) | KeyCode::Backspace) && !ctrl;
                // the keystroke that raced the countdown is dropped, not
                // read as a results screen command
                if expired && edits {
                    return Action::Continue;
                }
                return self.handle_key(key, now);
            }
            AppEvent::Paste(text) => {
                if self.state == AppState::Typing {
                    self.buffer.push_str(&text);
                    self.apply_buffer(now);
                }
            }
            AppEvent::Tick | AppEvent::Resize => {}
        }
        Action::Continue
    }

    /// Returns true when this poll ended a running session
    fn poll_timers(&mut self, now: SystemTime) -> bool {
        let was_running = self.trainer.engine().is_running();
        self.trainer.tick(now);

        let completed = self.trainer.engine().is_completed();
        if completed {
            self.state = AppState::Results;
        }
        was_running && completed
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: SystemTime) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => return Action::Quit,
            KeyCode::Char('c') if ctrl => return Action::Quit,
            KeyCode::Right => self.load_new_text(),
            KeyCode::Left => self.restart(),
            KeyCode::Tab => {
                self.trainer.stop(now);
                if self.trainer.engine().is_completed() {
                    self.state = AppState::Results;
                }
            }
            KeyCode::Char('t') if ctrl => {
                self.trainer.toggle_theme();
                self.persist_settings();
            }
            KeyCode::Char('l') if ctrl => {
                let language = self.trainer.settings().language.toggled();
                let changed = self.trainer.set_language(language);
                self.after_text_change(changed);
                self.persist_settings();
            }
            KeyCode::Char('k') if ctrl => {
                let next = self.next_category();
                let changed = self.trainer.set_category(next);
                self.after_text_change(changed);
                self.persist_settings();
            }
            KeyCode::Char('d') if ctrl => {
                let current = self.trainer.settings().test_duration;
                let next = DURATION_CHOICES
                    .iter()
                    .copied()
                    .skip_while(|&d| d != current)
                    .nth(1)
                    .unwrap_or(DURATION_CHOICES[0]);
                self.trainer.set_duration(next);
                self.clear_buffer();
                self.persist_settings();
            }
            KeyCode::Char('e') if ctrl => self.export(ExportFormat::Json),
            KeyCode::Char(c) if !ctrl => match self.state {
                AppState::Typing => {
                    self.buffer.push(c);
                    self.apply_buffer(now);
                }
                AppState::Results => match c {
                    'r' => self.restart(),
                    'n' => self.load_new_text(),
                    _ => {}
                },
            },
            KeyCode::Backspace if self.state == AppState::Typing => {
                self.buffer.pop();
                self.apply_buffer(now);
            }
            _ => {}
        }
        Action::Continue
    }

    fn apply_buffer(&mut self, now: SystemTime) {
        if self.trainer.engine().is_completed() {
            return;
        }
        self.trainer.on_input(&self.buffer, now);

        // mirror the engine's truncation so backspace edits what is shown
        let accepted = self.trainer.engine().typed().len();
        if self.buffer.chars().count() > accepted {
            self.buffer = self.buffer.chars().take(accepted).collect();
        }

        if self.trainer.engine().is_completed() {
            self.state = AppState::Results;
        }
    }

    fn load_new_text(&mut self) {
        let changed = self.trainer.new_text();
        self.after_text_change(changed);
    }

    fn restart(&mut self) {
        self.trainer.reset();
        self.clear_buffer();
    }

    fn after_text_change(&mut self, changed: Result<()>) {
        self.clear_buffer();
        self.status = match changed {
            Ok(()) => None,
            Err(e) => Some(e.to_string()),
        };
    }

    fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.state = AppState::Typing;
    }

    fn next_category(&self) -> String {
        let settings = self.trainer.settings();
        let mut choices = vec!["all".to_string()];
        choices.extend(
            self.trainer
                .catalog()
                .categories(settings.language)
                .into_iter()
                .map(str::to_string),
        );
        choices.push("difficult".to_string());

        choices
            .iter()
            .skip_while(|c| **c != settings.category)
            .nth(1)
            .unwrap_or(&choices[0])
            .clone()
    }

    fn persist_settings(&mut self) {
        if let Err(e) = self.config_store.save(self.trainer.settings()) {
            error!(error = %e, "failed to save settings");
        }
    }

    pub fn export(&mut self, format: ExportFormat) {
        self.status = Some(match export_results(self.trainer.results(), &self.export_dir, format) {
            Ok(path) => format!("exported to {}", path.display()),
            Err(e) => e.to_string(),
        });
    }
}

/// Write the full result log to `dir` under today's export name
pub fn export_results(results: &ResultStore, dir: &Path, format: ExportFormat) -> Result<PathBuf> {
    let data = results.export(format)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(Local::now().date_naive(), format));
    std::fs::write(&path, data)?;
    info!(path = %path.display(), "exported results");
    Ok(path)
}
