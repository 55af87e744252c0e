//! `kadende-core`: types shared by the plugin manager and plugin libraries.

pub mod abi;
pub mod error;
pub mod types;

pub use abi::{PluginDeclaration, ABI_VERSION, PLUGIN_MAGIC, PLUGIN_SYMBOL};
pub use error::{PluginError, PluginResult, TransferError};
pub use types::{PluginType, LATEST_VERSION, LIBRARY_EXTENSION};
