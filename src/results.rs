use crate::catalog::Locale;
use crate::error::{Error, Result};
use crate::goals::{Goal, TierTable};
use crate::storage::{self, KeyValueStore, RESULTS_KEY};
use chrono::{DateTime, Local, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info};

/// Outcome of one finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub date: DateTime<Local>,
    /// characters per minute
    pub speed: u32,
    /// percent, 0-100
    pub accuracy: u32,
    pub text_length: usize,
    pub category: String,
    pub language: Locale,
    /// configured test duration in seconds, 0 when untimed
    pub duration: u32,
    /// number of distinct characters mistyped
    pub mistakes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// Points for the progress chart; x is the 1-based attempt number
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartSeries {
    pub speeds: Vec<(f64, f64)>,
    pub accuracies: Vec<(f64, f64)>,
    pub y_max: f64,
}

impl ChartSeries {
    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty()
    }
}

/// Append-only log of session results
#[derive(Default)]
pub struct ResultStore {
    records: Vec<ResultRecord>,
    store: Option<Rc<dyn KeyValueStore>>,
}

impl ResultStore {
    pub fn load(store: Rc<dyn KeyValueStore>) -> Self {
        let records: Vec<ResultRecord> = storage::load_or_default(store.as_ref(), RESULTS_KEY);
        debug!(records = records.len(), "loaded result log");
        Self {
            records,
            store: Some(store),
        }
    }

    pub fn append(&mut self, record: ResultRecord) {
        info!(
            speed = record.speed,
            accuracy = record.accuracy,
            language = %record.language,
            "recorded result"
        );
        self.records.push(record);
        if let Some(store) = &self.store {
            storage::save(store.as_ref(), RESULTS_KEY, &self.records);
        }
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for one language, in insertion order
    pub fn all_for(&self, language: Locale) -> Vec<&ResultRecord> {
        self.records
            .iter()
            .filter(|r| r.language == language)
            .collect()
    }

    /// Rounded mean speed for a language, 0 when there are no records
    pub fn average_speed(&self, language: Locale) -> u32 {
        let speeds: Vec<f64> = self
            .all_for(language)
            .iter()
            .map(|r| r.speed as f64)
            .collect();

        crate::util::mean(&speeds).map_or(0, |avg| avg.round() as u32)
    }

    pub fn next_goal(&self, language: Locale, table: &TierTable) -> Goal {
        table.next_goal(self.average_speed(language))
    }

    pub fn chart_series(&self, language: Locale) -> ChartSeries {
        let records = self.all_for(language);
        if records.is_empty() {
            return ChartSeries::default();
        }

        let speeds: Vec<(f64, f64)> = records
            .iter()
            .enumerate()
            .map(|(i, r)| ((i + 1) as f64, r.speed as f64))
            .collect();
        let accuracies = records
            .iter()
            .enumerate()
            .map(|(i, r)| ((i + 1) as f64, r.accuracy as f64))
            .collect();

        let max_speed = speeds.iter().map(|&(_, s)| s).fold(0.0, f64::max);
        let y_max = f64::max(100.0, (max_speed / 50.0).ceil() * 50.0);

        ChartSeries {
            speeds,
            accuracies,
            y_max,
        }
    }

    pub fn export_json(&self) -> Result<String> {
        if self.records.is_empty() {
            return Err(Error::NothingToExport);
        }
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    pub fn export_csv(&self) -> Result<String> {
        if self.records.is_empty() {
            return Err(Error::NothingToExport);
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in &self.records {
            writer.serialize(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => self.export_json(),
            ExportFormat::Csv => self.export_csv(),
        }
    }
}

impl fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStore")
            .field("records", &self.records.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

/// Download name for an export taken on `date`
pub fn export_file_name(date: NaiveDate, format: ExportFormat) -> String {
    format!("typing-results-{}.{format}", date.format("%Y-%m-%d"))
}
