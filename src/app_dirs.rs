use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "keyrun";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// State directory under $HOME/.local/state/keyrun, falling back to the
    /// platform data dir when HOME is not set
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(APP_NAME),
            )
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn store_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("store.db"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("keyrun.log"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|pd| pd.config_dir().join("config.json"))
    }

    /// Store location inside an explicit data directory (`--data-dir`)
    pub fn store_path_in(dir: &Path) -> PathBuf {
        dir.join("store.db")
    }
}
