use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

/// Version used when a request does not pin one.
pub const LATEST_VERSION: &str = "latest";

/// Extension of shared libraries on the current platform, without the dot.
#[cfg(target_os = "macos")]
pub const LIBRARY_EXTENSION: &str = "dylib";

#[cfg(target_os = "windows")]
pub const LIBRARY_EXTENSION: &str = "dll";

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const LIBRARY_EXTENSION: &str = "so";

/// The closed set of plugin categories the manager knows how to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Provider,
    Flavour,
}

impl PluginType {
    pub const ALL: [PluginType; 2] = [PluginType::Provider, PluginType::Flavour];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginType::Provider => "provider",
            PluginType::Flavour => "flavour",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginType {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PluginError::InvalidPluginType(s.to_string()))
    }
}
