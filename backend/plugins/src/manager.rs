//! Plugin Manager
//!
//! Composes resolver, fetcher, and loader into a single install pipeline:
//! resolve, refuse duplicates, fetch, load (rolling back on failure).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use kadende_config::ManagerSettings;
use kadende_core::{PluginError, PluginResult, PluginType};
use logging::{EventLogger, InstallEvent};
use tracing::info;

use crate::fetcher::{Fetcher, SchemeTransfer, Transfer};
use crate::loader::{
    LibraryOpener, NativeOpener, PluginCapability, PluginHandle, PluginLoader, RollbackPolicy,
};
use crate::resolver::{PluginRequest, ResolvedPlugin, Resolver};
use crate::store::{ArtifactStore, InstalledArtifact};

pub struct PluginManager {
    resolver: Resolver,
    fetcher: Fetcher,
    loader: PluginLoader,
    store: ArtifactStore,
    install_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl PluginManager {
    /// Manager with the built-in scheme transfer and the native library loader.
    pub fn new(settings: ManagerSettings) -> PluginResult<Self> {
        let transfer = SchemeTransfer::new(settings.transfer_timeout)?;
        Ok(Self::with_parts(
            settings,
            Arc::new(transfer),
            Arc::new(NativeOpener),
        ))
    }

    pub fn with_parts(
        settings: ManagerSettings,
        transfer: Arc<dyn Transfer>,
        opener: Arc<dyn LibraryOpener>,
    ) -> Self {
        let store = ArtifactStore::new(&settings.install_root);
        Self {
            resolver: Resolver::new(settings, store.clone()),
            fetcher: Fetcher::new(transfer),
            loader: PluginLoader::new(opener, store.clone()),
            store,
            install_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.loader = self.loader.with_rollback_policy(policy);
        self
    }

    pub fn settings(&self) -> &ManagerSettings {
        self.resolver.settings()
    }

    /// Resolution only. Nothing is downloaded or loaded.
    pub async fn resolve(&self, request: &PluginRequest) -> PluginResult<ResolvedPlugin> {
        let plugin = self.resolver.resolve(request).await?;
        EventLogger::log_event(
            &plugin.key(),
            InstallEvent::Resolved {
                source_url: plugin.source_url.to_string(),
                file_path: plugin.file_path.display().to_string(),
                already_installed: plugin.already_installed,
            },
        );
        Ok(plugin)
    }

    /// Downloads and loads a plugin. An artifact already on disk is never
    /// downloaded again; the request fails with [`PluginError::PluginAlreadyExists`].
    pub async fn install(&self, request: &PluginRequest) -> PluginResult<PluginHandle> {
        let plugin = self.resolve(request).await?;
        let result = self.install_resolved(&plugin).await;
        if let Err(err) = &result {
            EventLogger::log_event(
                &plugin.key(),
                InstallEvent::Failed {
                    error_msg: err.to_string(),
                },
            );
        }
        result
    }

    async fn install_resolved(&self, plugin: &ResolvedPlugin) -> PluginResult<PluginHandle> {
        if plugin.already_installed {
            return Err(PluginError::PluginAlreadyExists(plugin.file_path.clone()));
        }

        let lock = self.install_lock(&plugin.file_path);
        let result = {
            let _guard = lock.lock().await;
            self.fetch_and_load(plugin).await
        };
        self.release_install_lock(&plugin.file_path, lock);
        result
    }

    async fn fetch_and_load(&self, plugin: &ResolvedPlugin) -> PluginResult<PluginHandle> {
        // Another install of the same path may have finished while we waited.
        if self.store.exists(&plugin.file_path).await? {
            return Err(PluginError::PluginAlreadyExists(plugin.file_path.clone()));
        }

        let written = self.fetcher.fetch(plugin).await?;
        EventLogger::log_event(
            &plugin.key(),
            InstallEvent::Fetched {
                file_path: written.display().to_string(),
            },
        );

        let handle = self.loader.load_fetched(plugin).await?;
        EventLogger::log_event(
            &plugin.key(),
            InstallEvent::Loaded {
                file_path: handle.path().display().to_string(),
                greeting: handle.greet(),
            },
        );
        info!(plugin = %plugin.key(), "Plugin installed");
        Ok(handle)
    }

    /// Loads an artifact that is already installed. Nothing is fetched or deleted.
    pub async fn load_installed(&self, request: &PluginRequest) -> PluginResult<PluginHandle> {
        let plugin = self.resolver.resolve(request).await?;
        if !plugin.already_installed {
            return Err(PluginError::PluginNotInstalled(plugin.file_path));
        }
        self.loader.load(&plugin.file_path).await
    }

    pub async fn uninstall(&self, request: &PluginRequest) -> PluginResult<PathBuf> {
        let plugin = self.resolver.resolve(request).await?;
        if !plugin.already_installed {
            return Err(PluginError::PluginNotInstalled(plugin.file_path));
        }

        let lock = self.install_lock(&plugin.file_path);
        let result = {
            let _guard = lock.lock().await;
            self.store.delete(&plugin.file_path).await
        };
        self.release_install_lock(&plugin.file_path, lock);
        result?;

        info!(plugin = %plugin.key(), "Plugin removed");
        Ok(plugin.file_path)
    }

    /// Installed artifacts for `plugin_type`, or for every type when `None`.
    pub async fn list_installed(
        &self,
        plugin_type: Option<PluginType>,
    ) -> PluginResult<Vec<InstalledArtifact>> {
        let types = match plugin_type {
            Some(plugin_type) => vec![plugin_type],
            None => PluginType::ALL.to_vec(),
        };

        let mut installed = Vec::new();
        for plugin_type in types {
            installed.extend(self.store.list(plugin_type).await?);
        }
        Ok(installed)
    }

    fn install_lock(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .install_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Drops the map entry once the caller holds the last outside reference.
    fn release_install_lock(&self, path: &Path, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .install_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one held here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
    }

    #[cfg(test)]
    fn pending_install_locks(&self) -> usize {
        self.install_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
