//! CLI Remove Command

use anyhow::Result;
use kadende_plugins::{PluginManager, PluginRequest};

use crate::terminal_output::note_success;

pub async fn run(manager: &PluginManager, request: PluginRequest) -> Result<()> {
    let removed = manager.uninstall(&request).await?;
    note_success(&format!("Removed {}", removed.display()));
    Ok(())
}
