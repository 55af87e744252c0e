//! CLI Install Command

use anyhow::Result;
use kadende_plugins::{PluginCapability, PluginManager, PluginRequest};

use crate::terminal_output::{note_info, note_success};

pub async fn run(manager: &PluginManager, request: PluginRequest) -> Result<()> {
    let handle = manager.install(&request).await?;
    note_success(&format!("Installed {}", handle.path().display()));

    let greeting = handle.greet();
    if !greeting.is_empty() {
        note_info(&format!("Plugin says: {greeting}"));
    }
    Ok(())
}
