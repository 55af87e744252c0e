//! In-process doubles for the transfer and the host loader.

use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kadende_core::{PluginDeclaration, TransferError};
use url::Url;

use crate::fetcher::{Transfer, target_file_name};
use crate::loader::{LibraryOpener, LookupError, OpenedLibrary};

fn greet() -> &'static CStr {
    c"fake plugin"
}

fn destroy(payload: &[u8]) -> Result<(), String> {
    if payload == b"fail" {
        Err("refused".into())
    } else {
        Ok(())
    }
}

kadende_core::declare_plugin!(greet: greet, destroy: destroy);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    Valid,
    OpenFails,
    MissingSymbol,
    WrongShape,
    MissingDestroy,
}

/// Opens any existing file and serves a declaration according to its behavior.
pub struct FakeOpener {
    behavior: FakeBehavior,
    opens: AtomicUsize,
}

impl FakeOpener {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

struct FakeLibrary(FakeBehavior);

impl LibraryOpener for FakeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn OpenedLibrary>, String> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(format!("{}: cannot open shared object file", path.display()));
        }
        if self.behavior == FakeBehavior::OpenFails {
            return Err("invalid ELF header".to_string());
        }
        Ok(Box::new(FakeLibrary(self.behavior)))
    }
}

impl OpenedLibrary for FakeLibrary {
    fn declaration(&self, symbol: &str) -> Result<PluginDeclaration, LookupError> {
        match self.0 {
            FakeBehavior::MissingSymbol => Err(LookupError::Missing(format!("undefined symbol: {symbol}"))),
            FakeBehavior::WrongShape => {
                static NOT_A_PLUGIN: [u32; 8] = [7; 8];
                unsafe { PluginDeclaration::read(NOT_A_PLUGIN.as_ptr().cast()) }
                    .map_err(LookupError::Malformed)
            }
            FakeBehavior::MissingDestroy => Ok(PluginDeclaration {
                destroy: None,
                ..Plugin
            }),
            FakeBehavior::Valid | FakeBehavior::OpenFails => Ok(Plugin),
        }
    }
}

/// Writes fixed bytes under the hinted filename, or fails, counting calls.
pub struct FakeTransfer {
    fail: bool,
    calls: AtomicUsize,
    last_source: std::sync::Mutex<Option<Url>>,
}

impl FakeTransfer {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
            last_source: std::sync::Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_source(&self) -> Option<Url> {
        self.last_source.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn fetch(&self, source: &Url, destination: &Path) -> Result<PathBuf, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_source.lock().unwrap() = Some(source.clone());
        if self.fail {
            return Err(TransferError::BadResponse {
                status: 404,
                url: source.to_string(),
            });
        }
        let file_name = target_file_name(source)?;
        let path = destination.join(file_name);
        let io_error = |source: std::io::Error| TransferError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(destination).await.map_err(io_error)?;
        tokio::fs::write(&path, b"\x7fELF fake").await.map_err(io_error)?;
        Ok(path)
    }
}
