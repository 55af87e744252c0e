use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by the transfer collaborator while copying an artifact.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("bad response code: {status} ({url})")]
    BadResponse { status: u16, url: String },

    #[error("http request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("no such file: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("unsupported source scheme: {0}")]
    UnsupportedScheme(String),

    #[error("source url has no filename hint: {0}")]
    MissingFilename(String),

    #[error("i/o error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    /// True when the source does not exist (HTTP 404 or a missing local file).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransferError::BadResponse { status: 404, .. } | TransferError::MissingSource(_)
        )
    }
}

/// Top-level error type for resolving, fetching, and loading plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin type: {0}")]
    InvalidPluginType(String),

    #[error("missing plugin name")]
    MissingPluginName,

    #[error("invalid plugin {field} '{value}': must be a single path component")]
    InvalidComponent { field: &'static str, value: String },

    #[error("invalid source url {url}: {reason}")]
    InvalidSourceUrl { url: String, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("plugin already exists: {}", .0.display())]
    PluginAlreadyExists(PathBuf),

    #[error("plugin is not installed: {}", .0.display())]
    PluginNotInstalled(PathBuf),

    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    #[error("failed to load plugin library {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("symbol `{symbol}` not found in {}", path.display())]
    SymbolNotFound { path: PathBuf, symbol: String },

    #[error("plugin {} does not implement the plugin interface: {reason}", path.display())]
    IncompatibleInterface { path: PathBuf, reason: String },

    #[error("plugin operation `{operation}` failed with code {code}")]
    InvocationFailed { operation: &'static str, code: i32 },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PluginError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PluginError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Configuration errors mean a broken deployment, not a bad request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PluginError::ConfigurationInvalid(_))
    }
}

pub type PluginResult<T> = Result<T, PluginError>;
