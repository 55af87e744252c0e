//! CLI List Command
//!
//! Lists installed plugin artifacts as a table, or as JSON with `--json`.

use anyhow::Result;
use kadende_core::PluginType;
use kadende_plugins::{InstalledArtifact, PluginManager};

use crate::terminal_output::{note_info, render_table, Column};

pub async fn run(manager: &PluginManager, plugin_type: Option<PluginType>, json: bool) -> Result<()> {
    let installed = manager.list_installed(plugin_type).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&installed)?);
        return Ok(());
    }

    if installed.is_empty() {
        note_info(&format!(
            "No plugins installed under {}",
            manager.settings().install_root.display()
        ));
        return Ok(());
    }

    print!("{}", table(&installed));
    Ok(())
}

fn table(installed: &[InstalledArtifact]) -> String {
    let columns = [
        Column::left("Type"),
        Column::left("Name"),
        Column::left("Version"),
        Column::left("Path").max_width(60),
    ];
    let rows: Vec<Vec<String>> = installed
        .iter()
        .map(|artifact| {
            vec![
                artifact.plugin_type.to_string(),
                artifact.name.clone(),
                artifact.version.clone(),
                artifact.path.display().to_string(),
            ]
        })
        .collect();
    render_table(&columns, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn table_lists_every_artifact() {
        let installed = vec![
            InstalledArtifact {
                plugin_type: PluginType::Provider,
                name: "file".into(),
                version: "0.0.1".into(),
                path: PathBuf::from("/plugins/provider/file_0.0.1.so"),
            },
            InstalledArtifact {
                plugin_type: PluginType::Flavour,
                name: "docker".into(),
                version: "latest".into(),
                path: PathBuf::from("/plugins/flavour/docker_latest.so"),
            },
        ];

        let rendered = table(&installed);

        assert!(rendered.contains("provider"));
        assert!(rendered.contains("docker"));
        assert!(rendered.contains("0.0.1"));
        assert_eq!(rendered.lines().count(), 4);
    }
}
