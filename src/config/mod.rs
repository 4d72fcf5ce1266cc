//! Configuration module
//!
//! Controller settings and their JSON persistence.

pub mod settings;
pub mod store;

pub use settings::{Settings, SETTINGS_VERSION};
pub use store::{load, save, try_load, ConfigError, DEFAULT_SETTINGS_FILE};
