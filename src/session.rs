use crate::catalog::Locale;
use crate::mistakes::{diff_mistakes, MistakeMap};
use crate::results::ResultRecord;
use crate::timers::SessionTimers;
use crate::util::{mean, std_dev, time_diff_ms};
use chrono::{DateTime, Local};
use itertools::Itertools;
use std::time::SystemTime;
use tracing::{debug, info};

/// Characters of target text shown either side of a mistake in reports
pub const CONTEXT_RADIUS: usize = 10;
/// Contexts collected per mistyped character
pub const MAX_CONTEXTS: usize = 3;
/// Characters listed in a mistakes report
pub const REPORT_SIZE: usize = 5;

/// Inputs to a session that the engine does not derive itself
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// seconds, 0 for untimed
    pub duration_secs: u32,
    pub language: Locale,
    pub category: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            language: Locale::Ru,
            category: "all".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Completed,
}

/// Classification of a single target position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharState {
    Pending,
    Correct,
    Incorrect,
    /// next character to type
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveMetrics {
    /// chars per minute; None until some time has elapsed
    pub speed: Option<u32>,
    pub accuracy: u32,
    pub progress: u32,
    /// 0-100, higher for shorter average inter-key intervals
    pub rhythm: f64,
    pub seconds_left: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MistakeEntry {
    pub character: char,
    pub count: u32,
    pub contexts: Vec<String>,
}

/// Everything a finished session hands to its collaborators
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    pub record: ResultRecord,
    pub mistakes: MistakeMap,
    pub target: String,
    pub typed: String,
    /// spread of inter-key intervals in ms
    pub rhythm_std_dev: f64,
}

impl CompletedSession {
    /// The most-missed characters of this session with where they occurred
    pub fn report(&self) -> Vec<MistakeEntry> {
        let target: Vec<char> = self.target.chars().collect();
        let typed: Vec<char> = self.typed.chars().collect();

        self.mistakes
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1))
            .take(REPORT_SIZE)
            .map(|(&character, &count)| MistakeEntry {
                character,
                count,
                contexts: mistake_contexts(&target, &typed, character),
            })
            .collect()
    }
}

/// Windows of the target around positions where `c` was expected but not typed
pub fn mistake_contexts(target: &[char], typed: &[char], c: char) -> Vec<String> {
    typed
        .iter()
        .zip(target.iter())
        .enumerate()
        .filter(|&(_, (&typed, &expected))| expected == c && typed != c)
        .take(MAX_CONTEXTS)
        .map(|(i, _)| {
            let start = i.saturating_sub(CONTEXT_RADIUS);
            let end = (i + CONTEXT_RADIUS + 1).min(target.len());
            target[start..end].iter().collect()
        })
        .collect()
}

/// Drives one practice attempt from first keystroke to completion.
///
/// The engine never reads the clock: every operation receives `now`.
#[derive(Debug)]
pub struct SessionEngine {
    config: SessionConfig,
    target: Vec<char>,
    typed: Vec<char>,
    phase: Phase,
    started_at: Option<SystemTime>,
    ended_at: Option<SystemTime>,
    last_key_at: Option<SystemTime>,
    key_intervals: Vec<u64>,
    correct_count: usize,
    char_states: Vec<CharState>,
    metrics: LiveMetrics,
    timers: SessionTimers,
}

impl SessionEngine {
    pub fn new(config: SessionConfig) -> Self {
        let mut engine = Self {
            config,
            target: Vec::new(),
            typed: Vec::new(),
            phase: Phase::Idle,
            started_at: None,
            ended_at: None,
            last_key_at: None,
            key_intervals: Vec::new(),
            correct_count: 0,
            char_states: Vec::new(),
            metrics: LiveMetrics::default(),
            timers: SessionTimers::default(),
        };
        engine.start(String::new());
        engine
    }

    /// Replace the configuration used from the next `start` on
    pub fn configure(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// Reset all session state for `target` and cancel any running timers
    pub fn start(&mut self, target: impl Into<String>) {
        self.timers.cancel_all();
        self.target = target.into().chars().collect();
        self.typed.clear();
        self.phase = Phase::Idle;
        self.started_at = None;
        self.ended_at = None;
        self.last_key_at = None;
        self.key_intervals.clear();
        self.correct_count = 0;
        self.metrics = LiveMetrics {
            seconds_left: (self.config.duration_secs > 0).then_some(self.config.duration_secs),
            ..LiveMetrics::default()
        };
        self.classify();
    }

    /// Handle a change of the typed buffer. Returns the finished session when
    /// this input completes it.
    pub fn on_input(&mut self, typed: &str, now: SystemTime) -> Option<CompletedSession> {
        if self.phase == Phase::Completed || self.target.is_empty() {
            return None;
        }

        // a countdown that ran out between ticks ends the session before
        // this input is accepted
        if self.phase == Phase::Running {
            let fired = self.timers.poll(now);
            self.metrics.seconds_left = self.timers.seconds_left();
            if fired.expired {
                debug!("countdown expired before input");
                return self.complete(now);
            }
        }

        let mut typed: Vec<char> = typed.chars().collect();
        if typed.len() > self.target.len() {
            debug!(
                typed_len = typed.len(),
                target_len = self.target.len(),
                "dropping input beyond end of text"
            );
            typed.truncate(self.target.len());
        }

        if let Some(last) = self.last_key_at {
            self.key_intervals.push(time_diff_ms(last, now));
            self.update_rhythm();
        }
        self.last_key_at = Some(now);

        if self.phase == Phase::Idle && !typed.is_empty() {
            self.phase = Phase::Running;
            self.started_at = Some(now);
            self.timers.arm(now, self.config.duration_secs);
            debug!(target_len = self.target.len(), "session started");
        }

        self.typed = typed;
        self.classify();
        self.refresh_metrics(now);

        if self.typed.len() == self.target.len() {
            return self.complete(now);
        }
        None
    }

    /// Periodic refresh while running; expires timed sessions
    pub fn tick(&mut self, now: SystemTime) -> Option<CompletedSession> {
        if self.phase != Phase::Running {
            return None;
        }

        let fired = self.timers.poll(now);
        self.metrics.seconds_left = self.timers.seconds_left();
        if fired.refresh {
            self.refresh_metrics(now);
        }
        if fired.expired {
            debug!("countdown expired");
            return self.complete(now);
        }
        None
    }

    /// Finalize the session. Only the first call on a running session has an
    /// effect; it returns nothing when no characters were typed.
    pub fn complete(&mut self, now: SystemTime) -> Option<CompletedSession> {
        if self.phase != Phase::Running {
            return None;
        }

        self.phase = Phase::Completed;
        self.ended_at = Some(now);
        self.timers.cancel_all();
        self.refresh_metrics(now);

        if self.typed.is_empty() {
            debug!("session ended with nothing typed");
            return None;
        }

        let mistakes = diff_mistakes(&self.target, &self.typed);
        let intervals: Vec<f64> = self.key_intervals.iter().map(|&ms| ms as f64).collect();

        let record = ResultRecord {
            date: DateTime::<Local>::from(now),
            speed: self.metrics.speed.unwrap_or(0),
            accuracy: self.metrics.accuracy,
            text_length: self.target.len(),
            category: self.config.category.clone(),
            language: self.config.language,
            duration: self.config.duration_secs,
            mistakes: mistakes.len(),
        };
        info!(
            speed = record.speed,
            accuracy = record.accuracy,
            mistakes = record.mistakes,
            "session completed"
        );

        Some(CompletedSession {
            record,
            mistakes,
            target: self.target.iter().collect(),
            typed: self.typed.iter().collect(),
            rhythm_std_dev: std_dev(&intervals).unwrap_or(0.0),
        })
    }

    fn classify(&mut self) {
        let typed_len = self.typed.len();
        self.char_states = self
            .target
            .iter()
            .enumerate()
            .map(|(i, &expected)| match self.typed.get(i) {
                Some(&c) if c == expected => CharState::Correct,
                Some(_) => CharState::Incorrect,
                None if i == typed_len => CharState::Current,
                None => CharState::Pending,
            })
            .collect();
        self.correct_count = self
            .char_states
            .iter()
            .filter(|&&s| s == CharState::Correct)
            .count();
    }

    fn refresh_metrics(&mut self, now: SystemTime) {
        let typed_len = self.typed.len() as f64;

        if let Some(started) = self.started_at {
            let elapsed_minutes = time_diff_ms(started, now) as f64 / 60_000.0;
            if elapsed_minutes > 0.0 {
                self.metrics.speed = Some((typed_len / elapsed_minutes).round() as u32);
            }
        }

        self.metrics.accuracy = if self.typed.is_empty() {
            0
        } else {
            let accuracy = 100.0 * self.correct_count as f64 / typed_len;
            if accuracy.is_nan() {
                0
            } else {
                accuracy.round() as u32
            }
        };

        self.metrics.progress = if self.target.is_empty() {
            0
        } else {
            (100.0 * typed_len / self.target.len() as f64).round() as u32
        };
    }

    fn update_rhythm(&mut self) {
        let intervals: Vec<f64> = self.key_intervals.iter().map(|&ms| ms as f64).collect();
        if let Some(avg) = mean(&intervals) {
            self.metrics.rhythm = (100.0 - avg / 20.0).clamp(0.0, 100.0);
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn target(&self) -> &[char] {
        &self.target
    }

    pub fn typed(&self) -> &[char] {
        &self.typed
    }

    pub fn char_states(&self) -> &[CharState] {
        &self.char_states
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn key_intervals(&self) -> &[u64] {
        &self.key_intervals
    }

    pub fn metrics(&self) -> LiveMetrics {
        self.metrics
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<SystemTime> {
        self.ended_at
    }

    pub fn timers_armed(&self) -> bool {
        self.timers.is_armed()
    }
}
