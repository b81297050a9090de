// Library surface shared by the binary and the integration tests.
// Terminal setup stays in main.rs.
pub mod app;
pub mod app_dirs;
pub mod catalog;
pub mod config;
pub mod error;
pub mod goals;
pub mod logging;
pub mod mistakes;
pub mod results;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod submit;
pub mod timers;
pub mod trainer;
pub mod ui;
pub mod util;

pub use error::{Error, Result};
