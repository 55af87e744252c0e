//! Plugin Loader
//!
//! Maps a plugin artifact into the process, resolves its `Plugin` symbol, and
//! checks it against the capability interface before handing out a handle.
//! Freshly fetched artifacts that fail are rolled back (deleted) so a broken
//! download never looks installed.

use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kadende_core::{PLUGIN_SYMBOL, PluginDeclaration, PluginError, PluginResult};
use logging::{EventLogger, InstallEvent};
use tracing::{debug, info, warn};

use crate::resolver::ResolvedPlugin;
use crate::store::ArtifactStore;

/// Why a symbol could not be turned into a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The library does not export the symbol.
    Missing(String),
    /// The symbol exists but does not look like a plugin declaration.
    Malformed(String),
}

/// A library mapped by the host loader. Dropping it unmaps the library.
pub trait OpenedLibrary: Send + Sync {
    fn declaration(&self, symbol: &str) -> Result<PluginDeclaration, LookupError>;
}

/// The host dynamic loader.
pub trait LibraryOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn OpenedLibrary>, String>;
}

/// Operations every loaded plugin exposes.
pub trait PluginCapability: Send + Sync {
    fn greet(&self) -> String;
    fn destroy(&self, payload: &[u8]) -> PluginResult<()>;
}

// ---------------------------------------------------------------------------
// libloading
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct NativeOpener;

struct NativeLibrary {
    library: libloading::Library,
}

impl LibraryOpener for NativeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn OpenedLibrary>, String> {
        // SAFETY: loading a library runs its initialisers. Artifacts come from the
        // configured release host or a source the caller named explicitly.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| e.to_string())?;
        Ok(Box::new(NativeLibrary { library }))
    }
}

impl OpenedLibrary for NativeLibrary {
    fn declaration(&self, symbol: &str) -> Result<PluginDeclaration, LookupError> {
        // SAFETY: the symbol is only used as an address; `PluginDeclaration::read`
        // checks the magic word before reading the rest, and the library outlives
        // this call.
        unsafe {
            let address: libloading::Symbol<*const PluginDeclaration> = self
                .library
                .get(symbol.as_bytes())
                .map_err(|e| LookupError::Missing(e.to_string()))?;
            PluginDeclaration::read(*address).map_err(LookupError::Malformed)
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A verified, loaded plugin. Keeps its library mapped for as long as it lives.
pub struct PluginHandle {
    path: PathBuf,
    declaration: PluginDeclaration,
    // Dropped last: the declaration's function pointers point into it.
    _library: Box<dyn OpenedLibrary>,
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PluginHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PluginCapability for PluginHandle {
    fn greet(&self) -> String {
        let Some(greet) = self.declaration.greet else {
            return String::new();
        };
        // SAFETY: checked at load time; the library is still mapped.
        let ptr = unsafe { greet() };
        if ptr.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn destroy(&self, payload: &[u8]) -> PluginResult<()> {
        let Some(destroy) = self.declaration.destroy else {
            return Err(PluginError::IncompatibleInterface {
                path: self.path.clone(),
                reason: "missing `destroy` operation".to_string(),
            });
        };
        // SAFETY: the pointer and length describe `payload` for the whole call.
        let code = unsafe { destroy(payload.as_ptr(), payload.len()) };
        if code == 0 {
            Ok(())
        } else {
            Err(PluginError::InvocationFailed {
                operation: "destroy",
                code,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Which post-fetch failures delete the downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Only a library that cannot be opened is deleted.
    OpenFailure,
    /// Open, symbol, and interface failures are all deleted.
    #[default]
    AnyFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Open,
    Symbol,
    Interface,
}

impl RollbackPolicy {
    fn covers(self, stage: Stage) -> bool {
        match self {
            RollbackPolicy::OpenFailure => stage == Stage::Open,
            RollbackPolicy::AnyFailure => true,
        }
    }
}

struct LoadFailure {
    stage: Stage,
    error: PluginError,
}

pub struct PluginLoader {
    opener: Arc<dyn LibraryOpener>,
    store: ArtifactStore,
    policy: RollbackPolicy,
}

impl PluginLoader {
    pub fn new(opener: Arc<dyn LibraryOpener>, store: ArtifactStore) -> Self {
        Self {
            opener,
            store,
            policy: RollbackPolicy::default(),
        }
    }

    pub fn with_rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn rollback_policy(&self) -> RollbackPolicy {
        self.policy
    }

    /// Loads an artifact that was already on disk. Failures leave it in place.
    pub async fn load(&self, path: &Path) -> PluginResult<PluginHandle> {
        self.open_checked(path).await.map_err(|failure| failure.error)
    }

    /// Loads a just-fetched artifact, deleting it on failure per the rollback policy.
    /// A failed deletion is logged; the load error is what gets reported.
    pub async fn load_fetched(&self, plugin: &ResolvedPlugin) -> PluginResult<PluginHandle> {
        let failure = match self.open_checked(&plugin.file_path).await {
            Ok(handle) => return Ok(handle),
            Err(failure) => failure,
        };

        if self.policy.covers(failure.stage) {
            match self.store.delete(&plugin.file_path).await {
                Ok(()) => {
                    EventLogger::log_event(
                        &plugin.key(),
                        InstallEvent::RolledBack {
                            file_path: plugin.file_path.display().to_string(),
                            reason: failure.error.to_string(),
                        },
                    );
                }
                Err(err) => {
                    warn!(plugin = %plugin.key(), error = %err, "Rollback failed; artifact left on disk");
                }
            }
        } else {
            debug!(plugin = %plugin.key(), stage = ?failure.stage, "Keeping artifact after load failure");
        }

        Err(failure.error)
    }

    async fn open_checked(&self, path: &Path) -> Result<PluginHandle, LoadFailure> {
        let opener = Arc::clone(&self.opener);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || open_checked(opener.as_ref(), owned))
            .await
            .unwrap_or_else(|err| {
                Err(LoadFailure {
                    stage: Stage::Open,
                    error: PluginError::LoadFailed {
                        path: path.to_path_buf(),
                        reason: err.to_string(),
                    },
                })
            })
    }
}

fn open_checked(opener: &dyn LibraryOpener, path: PathBuf) -> Result<PluginHandle, LoadFailure> {
    let library = opener.open(&path).map_err(|reason| LoadFailure {
        stage: Stage::Open,
        error: PluginError::LoadFailed {
            path: path.clone(),
            reason,
        },
    })?;

    let declaration = library
        .declaration(PLUGIN_SYMBOL)
        .and_then(|declaration| {
            declaration
                .check()
                .map(|()| declaration)
                .map_err(LookupError::Malformed)
        })
        .map_err(|err| match err {
            LookupError::Missing(_) => LoadFailure {
                stage: Stage::Symbol,
                error: PluginError::SymbolNotFound {
                    path: path.clone(),
                    symbol: PLUGIN_SYMBOL.to_string(),
                },
            },
            LookupError::Malformed(reason) => LoadFailure {
                stage: Stage::Interface,
                error: PluginError::IncompatibleInterface {
                    path: path.clone(),
                    reason,
                },
            },
        })?;

    info!(path = %path.display(), "Loaded plugin library");
    Ok(PluginHandle {
        path,
        declaration,
        _library: library,
    })
}
