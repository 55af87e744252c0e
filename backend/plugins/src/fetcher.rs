//! Fetcher: copies an artifact from its source URL into the install directory.
//!
//! The transfer itself is a collaborator behind the [`Transfer`] trait. The
//! built-in [`SchemeTransfer`] handles `http`, `https`, and `file` sources and
//! always writes to a hidden temporary file first, renaming it into place only
//! once every byte has arrived.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kadende_core::{PluginError, PluginResult, TransferError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::resolver::{ResolvedPlugin, filename_hint, without_filename_hint};

/// Retrieves the artifact at `source` into `destination`.
///
/// Implementations create `destination` if needed, name the file after the
/// `filename` query hint, and return the written path.
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn fetch(&self, source: &Url, destination: &Path) -> Result<PathBuf, TransferError>;
}

/// The file name the transfer must write, taken from the `filename` hint.
pub fn target_file_name(source: &Url) -> Result<String, TransferError> {
    let hint = filename_hint(source)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| TransferError::MissingFilename(source.to_string()))?;

    // Must be one plain path component.
    let single = Path::new(&hint).file_name().and_then(|n| n.to_str()) == Some(hint.as_str());
    if !single || hint == ".." {
        return Err(TransferError::MissingFilename(source.to_string()));
    }
    Ok(hint)
}

async fn prepare_destination(destination: &Path) -> Result<(), TransferError> {
    tokio::fs::create_dir_all(destination)
        .await
        .map_err(|source| TransferError::Io {
            path: destination.to_path_buf(),
            source,
        })
}

fn partial_path(destination: &Path, file_name: &str) -> PathBuf {
    destination.join(format!(".{file_name}.{}.part", std::process::id()))
}

/// Moves a finished download into place. The partial file is removed if that fails.
async fn commit(partial: &Path, target: &Path) -> Result<(), TransferError> {
    if let Err(source) = tokio::fs::rename(partial, target).await {
        discard(partial).await;
        return Err(TransferError::Io {
            path: target.to_path_buf(),
            source,
        });
    }
    Ok(())
}

async fn discard(partial: &Path) {
    if let Err(err) = tokio::fs::remove_file(partial).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %partial.display(), error = %err, "Failed to remove partial download");
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransferError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("kadende/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| TransferError::Client(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: &Url, partial: &Path) -> Result<(), TransferError> {
        let http_error = |err: reqwest::Error| TransferError::Http {
            url: url.to_string(),
            message: err.to_string(),
        };

        let mut resp = self.client.get(url.clone()).send().await.map_err(http_error)?;
        if !resp.status().is_success() {
            return Err(TransferError::BadResponse {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        let io_error = |source: std::io::Error| TransferError::Io {
            path: partial.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(partial).await.map_err(io_error)?;
        let mut written = 0usize;
        while let Some(chunk) = resp.chunk().await.map_err(http_error)? {
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len();
        }
        file.flush().await.map_err(io_error)?;
        debug!(bytes = written, "Downloaded artifact");
        Ok(())
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(&self, source: &Url, destination: &Path) -> Result<PathBuf, TransferError> {
        let file_name = target_file_name(source)?;
        prepare_destination(destination).await?;

        let target = destination.join(&file_name);
        let partial = partial_path(destination, &file_name);
        let upstream = without_filename_hint(source);

        if let Err(err) = self.download(&upstream, &partial).await {
            discard(&partial).await;
            return Err(err);
        }
        commit(&partial, &target).await?;
        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// Local files
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FileTransfer;

#[async_trait]
impl Transfer for FileTransfer {
    async fn fetch(&self, source: &Url, destination: &Path) -> Result<PathBuf, TransferError> {
        let file_name = target_file_name(source)?;
        let from = without_filename_hint(source)
            .to_file_path()
            .map_err(|()| TransferError::UnsupportedScheme(source.to_string()))?;

        match tokio::fs::try_exists(&from).await {
            Ok(true) => {}
            Ok(false) => return Err(TransferError::MissingSource(from)),
            Err(source) => return Err(TransferError::Io { path: from, source }),
        }
        prepare_destination(destination).await?;

        let target = destination.join(&file_name);
        let partial = partial_path(destination, &file_name);
        if let Err(source) = tokio::fs::copy(&from, &partial).await {
            discard(&partial).await;
            return Err(TransferError::Io { path: from, source });
        }
        commit(&partial, &target).await?;
        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// Scheme dispatch
// ---------------------------------------------------------------------------

/// Routes each source to the transfer registered for its scheme.
pub struct SchemeTransfer {
    http: HttpTransfer,
    file: FileTransfer,
}

impl SchemeTransfer {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransferError> {
        Ok(Self {
            http: HttpTransfer::new(timeout)?,
            file: FileTransfer,
        })
    }
}

#[async_trait]
impl Transfer for SchemeTransfer {
    async fn fetch(&self, source: &Url, destination: &Path) -> Result<PathBuf, TransferError> {
        match source.scheme() {
            "http" | "https" => self.http.fetch(source, destination).await,
            "file" => self.file.fetch(source, destination).await,
            other => Err(TransferError::UnsupportedScheme(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

pub struct Fetcher {
    transfer: Arc<dyn Transfer>,
}

impl Fetcher {
    pub fn new(transfer: Arc<dyn Transfer>) -> Self {
        Self { transfer }
    }

    /// Fetches into the plugin's install directory. Transfer errors come back
    /// unchanged inside [`PluginError::TransferFailed`].
    pub async fn fetch(&self, plugin: &ResolvedPlugin) -> PluginResult<PathBuf> {
        info!(plugin = %plugin.key(), "Fetching plugin artifact");
        let written = self
            .transfer
            .fetch(&plugin.source_url, plugin.install_dir())
            .await
            .map_err(PluginError::TransferFailed)?;

        if written != plugin.file_path {
            warn!(
                expected = %plugin.file_path.display(),
                written = %written.display(),
                "Transfer wrote the artifact under an unexpected name"
            );
        }
        Ok(written)
    }
}
