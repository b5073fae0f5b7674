//! Parsing and validation of `strand.toml` simulation settings.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`StrandConfig`]. It does not depend on the simulator; callers map the
//! relevant fields onto the simulator's own configuration.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
