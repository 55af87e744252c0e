//! Environment variable overrides.
//!
//! Overrides win over values from the config file and are applied before defaults.
//! Empty variables are ignored.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::schema::{KadendeConfig, LoggingConfig, PluginsConfig};

pub const PLUGIN_PATH_VAR: &str = "KADENDE_PLUGIN_PATH";
pub const RELEASE_HOST_VAR: &str = "KADENDE_RELEASE_HOST";
pub const LOG_DIR_VAR: &str = "KADENDE_LOG_DIR";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: KadendeConfig) -> KadendeConfig {
    apply_env_overrides_with(config, &process_env())
}

/// The process environment. Entries that are not valid UTF-8 are skipped.
fn process_env() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Apply overrides from a provided map (useful for testing).
pub fn apply_env_overrides_with(
    mut config: KadendeConfig,
    env: &HashMap<String, String>,
) -> KadendeConfig {
    let lookup = |name: &str| env.get(name).filter(|v| !v.is_empty()).cloned();

    if let Some(path) = lookup(PLUGIN_PATH_VAR) {
        let plugins = config.plugins.get_or_insert_with(PluginsConfig::default);
        plugins.install_root = Some(PathBuf::from(path));
    }
    if let Some(host) = lookup(RELEASE_HOST_VAR) {
        let plugins = config.plugins.get_or_insert_with(PluginsConfig::default);
        plugins.release_host = Some(host);
    }
    if let Some(dir) = lookup(LOG_DIR_VAR) {
        let logging = config.logging.get_or_insert_with(LoggingConfig::default);
        logging.directory = Some(PathBuf::from(dir));
    }

    config
}
