//! `kadende-plugins`: resolves, downloads, and loads Kadende plugin libraries.
//!
//! [`PluginManager::install`] is the entry point; the pieces it composes are
//! public so callers can resolve without installing or swap the transfer.

pub mod fetcher;
pub mod loader;
pub mod manager;
pub mod resolver;
pub mod store;

#[cfg(test)]
mod testing;

pub use fetcher::{FileTransfer, Fetcher, HttpTransfer, SchemeTransfer, Transfer};
pub use loader::{
    LibraryOpener, LookupError, NativeOpener, OpenedLibrary, PluginCapability, PluginHandle,
    PluginLoader, RollbackPolicy,
};
pub use manager::PluginManager;
pub use resolver::{PluginRequest, ResolvedPlugin, Resolver};
pub use store::{ArtifactStore, InstalledArtifact};
