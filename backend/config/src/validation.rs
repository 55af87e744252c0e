//! Config validation: collects every problem in one pass.

use crate::schema::KadendeConfig;
use thiserror::Error;
use url::Url;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All error messages joined into one line.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Emits every warning and error through `tracing`.
    pub fn log(&self) {
        for warning in &self.warnings {
            tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
        }
        for error in &self.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &KadendeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_plugins(config, &mut report);
    validate_logging(config, &mut report);
    report
}

/// Parse a release host, requiring an absolute URL with a host component.
pub fn parse_release_host(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("'{raw}' is not a valid url: {e}"))?;
    if url.cannot_be_a_base() || !url.has_host() {
        return Err(format!("'{raw}' is not an absolute url with a host"));
    }
    Ok(url)
}

fn validate_plugins(config: &KadendeConfig, report: &mut ValidationReport) {
    let Some(plugins) = &config.plugins else { return };

    if let Some(host) = &plugins.release_host {
        if let Err(message) = parse_release_host(host) {
            report.error("plugins.releaseHost", message);
        }
    }

    if let Some(root) = &plugins.install_root {
        if root.as_os_str().is_empty() {
            report.error("plugins.installRoot", "Install root cannot be empty");
        } else if root.is_relative() {
            report.warn(
                "plugins.installRoot",
                format!(
                    "Install root {} is relative to the working directory",
                    root.display()
                ),
            );
        }
    }

    for (path, value) in [
        ("plugins.releaseOrg", &plugins.release_org),
        ("plugins.repoPrefix", &plugins.repo_prefix),
    ] {
        if let Some(value) = value {
            if value.trim().is_empty() || value.contains('/') {
                report.error(path, "Must be a non-empty single path segment");
            }
        }
    }

    if plugins.transfer_timeout_secs == Some(0) {
        report.error("plugins.transferTimeoutSecs", "Timeout must be > 0");
    }
}

fn validate_logging(config: &KadendeConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        let known = ["trace", "debug", "info", "warn", "error"];
        if !known.contains(&level.to_lowercase().as_str()) {
            report.warn(
                "logging.level",
                format!("'{level}' is not a plain level; passing it to the filter as-is"),
            );
        }
    }
}
