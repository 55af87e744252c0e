//! Config defaults: fills every unset field with its built-in value.

use std::path::PathBuf;

use crate::schema::{KadendeConfig, LoggingConfig, PluginsConfig};

/// Release host used when neither the config file nor the environment sets one.
pub const DEFAULT_RELEASE_HOST: &str = "https://github.com";

/// Organisation that owns the plugin release repositories.
pub const DEFAULT_RELEASE_ORG: &str = "kadende-plugins";

pub const DEFAULT_REPO_PREFIX: &str = "kadende";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `plugins/` next to the running executable.
pub fn default_install_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("plugins")))
        .unwrap_or_else(|| PathBuf::from("plugins"))
}

/// Apply all defaults to a loaded config.
pub fn apply_all_defaults(config: KadendeConfig) -> KadendeConfig {
    let config = apply_plugin_defaults(config);
    apply_logging_defaults(config)
}

fn apply_plugin_defaults(mut config: KadendeConfig) -> KadendeConfig {
    let plugins = config.plugins.get_or_insert_with(PluginsConfig::default);
    if plugins.install_root.is_none() {
        plugins.install_root = Some(default_install_root());
    }
    if plugins.release_host.is_none() {
        plugins.release_host = Some(DEFAULT_RELEASE_HOST.to_string());
    }
    if plugins.release_org.is_none() {
        plugins.release_org = Some(DEFAULT_RELEASE_ORG.to_string());
    }
    if plugins.repo_prefix.is_none() {
        plugins.repo_prefix = Some(DEFAULT_REPO_PREFIX.to_string());
    }
    config
}

fn apply_logging_defaults(mut config: KadendeConfig) -> KadendeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}
