use std::{env, fs};

use super::{ConfigError, MatchConfig};

pub const MATCH_CONFIG_PATH_ENV: &str = "BB_MATCH_CONFIG_PATH";

/// Load a config from the JSON file named by `var`. Unset or blank means defaults.
pub fn from_env_var(var: &str) -> Result<MatchConfig, ConfigError> {
    let Ok(path) = env::var(var) else {
        return Ok(MatchConfig::default());
    };

    let path = path.trim();
    if path.is_empty() {
        return Ok(MatchConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_string(), source })?;

    let config = MatchConfig::from_json(&content)?;
    config.validate()?;

    tracing::info!(path, max_moves = config.max_moves, "loaded match config");
    Ok(config)
}
