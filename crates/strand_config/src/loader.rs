//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::StrandConfig;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "strand.toml";

/// Loads and validates `<dir>/strand.toml`.
pub fn load_config(dir: &Path) -> Result<StrandConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<StrandConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<StrandConfig, ConfigError> {
    let config: StrandConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &StrandConfig) -> Result<(), ConfigError> {
    if config.sim.max_settle_pops == 0 {
        return Err(invalid("sim.max_settle_pops", "must be positive"));
    }
    if config.waveform.period == 0 {
        return Err(invalid("waveform.period", "must be positive"));
    }
    if config.waveform.timescale.trim().is_empty() {
        return Err(invalid("waveform.timescale", "must not be empty"));
    }
    Ok(())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
