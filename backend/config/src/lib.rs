//! `kadende-config`: plugin manager configuration.
//!
//! Provides:
//! - Typed config schema (install root, release host, logging)
//! - YAML loading from `~/.kadende/config.yaml`
//! - `KADENDE_*` environment overrides
//! - Default value application
//! - Validation into [`ManagerSettings`]

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod settings;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, apply_env_overrides_with};
pub use io::{config_dir, config_file_path, load_config};
pub use schema::KadendeConfig;
pub use settings::ManagerSettings;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Result;
use std::path::Path;

/// Load, apply env overrides, and apply defaults to a config file.
///
/// The result is not validated; [`ManagerSettings::from_config`] rejects it if
/// [`validate`] reports errors.
pub async fn load_and_prepare(path: &Path) -> Result<KadendeConfig> {
    let config = load_config(path).await?;
    let config = apply_env_overrides(config);
    Ok(apply_all_defaults(config))
}
