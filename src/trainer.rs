use crate::catalog::{Locale, TargetText, TextCatalog};
use crate::config::Settings;
use crate::error::Result;
use crate::goals::{Goal, TierTable};
use crate::mistakes::MistakeLedger;
use crate::results::{ChartSeries, ResultStore};
use crate::session::{CompletedSession, MistakeEntry, SessionEngine};
use crate::storage::KeyValueStore;
use crate::submit::{HttpSubmitter, NoopSubmitter, ResultSubmitter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::rc::Rc;
use std::thread::JoinHandle;
use std::time::SystemTime;
use tracing::{info, warn};

/// Wires the session engine to the catalog, the result log, the mistake
/// ledger and remote submission
pub struct Trainer {
    settings: Settings,
    catalog: TextCatalog,
    ledger: MistakeLedger,
    results: ResultStore,
    submitter: Box<dyn ResultSubmitter>,
    engine: SessionEngine,
    target: Option<TargetText>,
    last_session: Option<CompletedSession>,
    pending_submissions: Vec<JoinHandle<()>>,
    rng: StdRng,
}

impl Trainer {
    /// Submits to `settings.server_url` when one is set. The terminal has no
    /// connectivity signal to consult, so the submitter starts online; a
    /// failed post is only logged. Use `with_parts` and `NoopSubmitter` for
    /// runs that must stay local.
    pub fn new(settings: Settings, catalog: TextCatalog, store: Rc<dyn KeyValueStore>) -> Self {
        let submitter: Box<dyn ResultSubmitter> = match &settings.server_url {
            Some(url) => Box::new(HttpSubmitter::new(url.clone(), true)),
            None => Box::new(NoopSubmitter),
        };
        Self::with_parts(settings, catalog, store, submitter, StdRng::from_entropy())
    }

    pub fn with_parts(
        settings: Settings,
        catalog: TextCatalog,
        store: Rc<dyn KeyValueStore>,
        submitter: Box<dyn ResultSubmitter>,
        rng: StdRng,
    ) -> Self {
        Self {
            engine: SessionEngine::new(settings.session_config()),
            ledger: MistakeLedger::load(store.clone()),
            results: ResultStore::load(store),
            settings,
            catalog,
            submitter,
            target: None,
            last_session: None,
            pending_submissions: Vec::new(),
            rng,
        }
    }

    /// Pick a fresh text for the current language and category and start over
    pub fn new_text(&mut self) -> Result<()> {
        let picked = self.catalog.pick(
            self.settings.language,
            &self.settings.category_filter(),
            &self.ledger,
            &mut self.rng,
        );

        match picked {
            Ok(target) => {
                self.target = Some(target);
                self.reset();
                Ok(())
            }
            Err(e) => {
                self.target = None;
                self.engine.start(String::new());
                Err(e)
            }
        }
    }

    /// Restart the current text
    pub fn reset(&mut self) {
        self.engine.configure(self.settings.session_config());
        let content = self
            .target
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_default();
        self.engine.start(content);
        self.last_session = None;
    }

    pub fn on_input(&mut self, typed: &str, now: SystemTime) -> Option<&CompletedSession> {
        let done = self.engine.on_input(typed, now);
        self.finish(done)
    }

    pub fn tick(&mut self, now: SystemTime) -> Option<&CompletedSession> {
        let done = self.engine.tick(now);
        self.finish(done)
    }

    /// End the running session early
    pub fn stop(&mut self, now: SystemTime) -> Option<&CompletedSession> {
        let done = self.engine.complete(now);
        self.finish(done)
    }

    fn finish(&mut self, done: Option<CompletedSession>) -> Option<&CompletedSession> {
        let session = done?;

        // local persistence first; it is authoritative
        self.results.append(session.record.clone());
        self.ledger.record(&session.mistakes);

        if let Some(handle) = self.submitter.dispatch(&session.record) {
            self.pending_submissions.retain(|h| !h.is_finished());
            self.pending_submissions.push(handle);
        }

        self.last_session = Some(session);
        self.last_session.as_ref()
    }

    /// Wait for in-flight submissions, e.g. before exiting
    pub fn drain_submissions(&mut self) {
        for handle in self.pending_submissions.drain(..) {
            if handle.join().is_err() {
                warn!("result submission thread panicked");
            }
        }
    }

    pub fn goal(&self) -> Goal {
        let language = self.settings.language;
        self.results
            .next_goal(language, &TierTable::for_locale(language))
    }

    pub fn chart(&self) -> ChartSeries {
        self.results.chart_series(self.settings.language)
    }

    pub fn set_language(&mut self, language: Locale) -> Result<()> {
        info!(%language, "switching language");
        self.settings.language = language;
        self.new_text()
    }

    pub fn set_category(&mut self, category: impl Into<String>) -> Result<()> {
        self.settings.category = category.into();
        self.new_text()
    }

    /// Changing the duration restarts the current text
    pub fn set_duration(&mut self, secs: u32) {
        self.settings.test_duration = secs;
        self.reset();
    }

    pub fn toggle_theme(&mut self) {
        self.settings.dark_theme = !self.settings.dark_theme;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn target(&self) -> Option<&TargetText> {
        self.target.as_ref()
    }

    pub fn last_session(&self) -> Option<&CompletedSession> {
        self.last_session.as_ref()
    }

    /// Mistakes report of the last finished session, empty before one exists
    pub fn last_report(&self) -> Vec<MistakeEntry> {
        self.last_session
            .as_ref()
            .map(CompletedSession::report)
            .unwrap_or_default()
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn ledger(&self) -> &MistakeLedger {
        &self.ledger
    }

    pub fn catalog(&self) -> &TextCatalog {
        &self.catalog
    }
}
