//! Validated settings handed to the plugin manager.

use std::path::PathBuf;
use std::time::Duration;

use kadende_core::{PluginError, PluginResult};
use url::Url;

use crate::defaults::{
    default_install_root, DEFAULT_LOG_LEVEL, DEFAULT_RELEASE_HOST, DEFAULT_RELEASE_ORG,
    DEFAULT_REPO_PREFIX,
};
use crate::schema::KadendeConfig;
use crate::validation::{parse_release_host, validate};

/// Everything the resolver and fetcher need, with the release host already parsed.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub install_root: PathBuf,
    pub release_host: Url,
    pub release_org: String,
    pub repo_prefix: String,
    pub transfer_timeout: Option<Duration>,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl ManagerSettings {
    /// Settings rooted at `install_root` with every other value at its default.
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            release_host: Url::parse(DEFAULT_RELEASE_HOST).expect("default release host is a valid url"),
            release_org: DEFAULT_RELEASE_ORG.to_string(),
            repo_prefix: DEFAULT_REPO_PREFIX.to_string(),
            transfer_timeout: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_dir: None,
        }
    }

    /// Replace the release host. An invalid host is a fatal configuration error.
    pub fn with_release_host(mut self, host: &str) -> PluginResult<Self> {
        self.release_host = parse_release_host(host).map_err(PluginError::ConfigurationInvalid)?;
        Ok(self)
    }

    /// Build settings from a prepared config. Any validation error is reported as
    /// [`PluginError::ConfigurationInvalid`].
    pub fn from_config(config: &KadendeConfig) -> PluginResult<Self> {
        let report = validate(config);
        if !report.is_valid() {
            return Err(PluginError::ConfigurationInvalid(report.summary()));
        }

        let plugins = config.plugins.clone().unwrap_or_default();
        let logging = config.logging.clone().unwrap_or_default();

        let host = plugins.release_host.as_deref().unwrap_or(DEFAULT_RELEASE_HOST);
        let release_host = parse_release_host(host).map_err(PluginError::ConfigurationInvalid)?;

        Ok(Self {
            install_root: plugins.install_root.unwrap_or_else(default_install_root),
            release_host,
            release_org: plugins
                .release_org
                .unwrap_or_else(|| DEFAULT_RELEASE_ORG.to_string()),
            repo_prefix: plugins
                .repo_prefix
                .unwrap_or_else(|| DEFAULT_REPO_PREFIX.to_string()),
            transfer_timeout: plugins.transfer_timeout_secs.map(Duration::from_secs),
            log_level: logging
                .level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_dir: logging.directory,
        })
    }
}
