use crate::app_dirs::AppDirs;
use crate::catalog::{CategoryFilter, Locale};
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// User-facing settings, persisted whenever they change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Not used by the terminal front end, which cannot change the font.
    /// Kept so settings files written by other front ends load and save
    /// unchanged.
    pub font_size: u16,
    /// See `font_size`
    pub line_height: f32,
    pub language: Locale,
    pub category: String,
    /// seconds, 0 for untimed
    pub test_duration: u32,
    pub dark_theme: bool,
    pub server_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_size: 16,
            line_height: 1.6,
            language: Locale::Ru,
            category: "all".to_string(),
            test_duration: 60,
            dark_theme: false,
            server_url: None,
        }
    }
}

impl Settings {
    pub fn category_filter(&self) -> CategoryFilter {
        CategoryFilter::from(self.category.as_str())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            duration_secs: self.test_duration,
            language: self.language,
            category: self.category.clone(),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("keyrun_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Settings {
        let Ok(bytes) = fs::read(&self.path) else {
            return Settings::default();
        };
        serde_json::from_slice::<Settings>(&bytes).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        })
    }

    fn save(&self, settings: &Settings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_settings() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let settings = Settings::default();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{{{").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Settings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"language": "en", "test_duration": 0}"#).unwrap();

        let settings = FileConfigStore::with_path(&path).load();
        assert_eq!(settings.language, Locale::En);
        assert_eq!(settings.test_duration, 0);
        assert_eq!(settings.font_size, 16);
        assert_eq!(settings.category, "all");
    }

    #[test]
    fn display_fields_survive_a_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"font_size": 20, "line_height": 2.0}"#).unwrap();

        let store = FileConfigStore::with_path(&path);
        let mut settings = store.load();
        settings.dark_theme = true;
        store.save(&settings).unwrap();

        let reloaded = store.load();
        assert_eq!(reloaded.font_size, 20);
        assert_eq!(reloaded.line_height, 2.0);
        assert!(reloaded.dark_theme);
    }

    #[test]
    fn settings_map_to_session_config() {
        let settings = Settings {
            language: Locale::En,
            category: "difficult".into(),
            test_duration: 30,
            ..Settings::default()
        };
        assert_eq!(settings.category_filter(), CategoryFilter::Difficult);
        let config = settings.session_config();
        assert_eq!(config.duration_secs, 30);
        assert_eq!(config.language, Locale::En);
    }
}
