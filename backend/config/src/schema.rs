//! Kadende configuration schema, typed for serde YAML deserialization.
//!
//! Every field is optional on disk; defaults and environment overrides fill the
//! gaps before the config is turned into [`ManagerSettings`](crate::ManagerSettings).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration file (`config.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KadendeConfig {
    /// Plugin installation settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<PluginsConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginsConfig {
    /// Root of the `<type>/<name>_<version>.<ext>` artifact tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_root: Option<PathBuf>,
    /// Base URL plugin releases are downloaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_org: Option<String>,
    /// Repository names are `<repoPrefix>-<type>-<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for the rolling NDJSON log. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let raw = r#"
plugins:
  installRoot: /opt/kadende/plugins
  releaseHost: https://releases.example.com
  transferTimeoutSecs: 30
logging:
  level: debug
"#;
        let cfg: KadendeConfig = serde_yaml::from_str(raw).unwrap();
        let plugins = cfg.plugins.unwrap();
        assert_eq!(plugins.install_root.unwrap(), PathBuf::from("/opt/kadende/plugins"));
        assert_eq!(plugins.release_host.unwrap(), "https://releases.example.com");
        assert_eq!(plugins.transfer_timeout_secs, Some(30));
        assert!(plugins.release_org.is_none());
        assert_eq!(cfg.logging.unwrap().level.unwrap(), "debug");
    }

    #[test]
    fn empty_document_is_default() {
        let cfg: KadendeConfig = serde_yaml::from_str("{}").unwrap();
        assert!(cfg.plugins.is_none());
        assert!(cfg.logging.is_none());
    }
}
