//! CLI Resolve Command
//!
//! Dry run: prints the resolved plugin as JSON without downloading anything.

use anyhow::Result;
use kadende_plugins::{PluginManager, PluginRequest};

pub async fn run(manager: &PluginManager, request: PluginRequest) -> Result<()> {
    let resolved = manager.resolve(&request).await?;
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}
