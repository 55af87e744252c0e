//! Artifact store: the `<root>/<type>/<name>_<version>.<ext>` tree on disk.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use kadende_core::{LIBRARY_EXTENSION, PluginError, PluginResult, PluginType};
use serde::Serialize;
use tracing::debug;

/// An artifact found on disk by [`ArtifactStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledArtifact {
    pub plugin_type: PluginType,
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn type_dir(&self, plugin_type: PluginType) -> PathBuf {
        self.root.join(plugin_type.as_str())
    }

    pub fn artifact_path(&self, plugin_type: PluginType, file_name: &str) -> PathBuf {
        self.type_dir(plugin_type).join(file_name)
    }

    /// Only "not found" maps to `false`; other I/O errors are reported.
    pub async fn exists(&self, path: &Path) -> PluginResult<bool> {
        match tokio::fs::metadata(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(PluginError::filesystem(path, err)),
        }
    }

    /// Removes an artifact. A file that is already gone counts as deleted.
    pub async fn delete(&self, path: &Path) -> PluginResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted artifact");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PluginError::filesystem(path, err)),
        }
    }

    /// Artifacts installed for one plugin type, sorted by name then version.
    pub async fn list(&self, plugin_type: PluginType) -> PluginResult<Vec<InstalledArtifact>> {
        let dir = self.type_dir(plugin_type);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(PluginError::filesystem(&dir, err)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| PluginError::filesystem(&dir, err))?
        {
            let path = entry.path();
            let Some((name, version)) = parse_artifact_name(&path) else {
                continue;
            };
            found.push(InstalledArtifact {
                plugin_type,
                name,
                version,
                path,
            });
        }

        found.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        Ok(found)
    }
}

/// Splits `<name>_<version>.<ext>` on the last underscore. Hidden files
/// (in-flight downloads) and other extensions are skipped.
fn parse_artifact_name(path: &Path) -> Option<(String, String)> {
    if path.extension().and_then(|e| e.to_str()) != Some(LIBRARY_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    let (name, version) = stem.rsplit_once('_')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name.to_string(), version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[tokio::test]
    async fn exists_is_false_for_missing_file() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path());
        let path = store.artifact_path(PluginType::Provider, "file_latest.so");
        assert!(!store.exists(&path).await.unwrap());

        touch(&path);
        assert!(store.exists(&path).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exists_propagates_other_errors() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("plain-file");
        std::fs::write(&file, b"").unwrap();
        let store = ArtifactStore::new(root.path());

        // A path "through" a regular file fails with ENOTDIR, not ENOENT.
        let err = store.exists(&file.join("child")).await.unwrap_err();
        assert!(matches!(err, PluginError::Filesystem { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path());
        let path = store.artifact_path(PluginType::Flavour, "file_0.0.1.so");
        touch(&path);

        store.delete(&path).await.unwrap();
        assert!(!path.exists());
        store.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn lists_installed_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path());
        for file in [
            format!("zeta_1.0.{LIBRARY_EXTENSION}"),
            format!("my_plugin_latest.{LIBRARY_EXTENSION}"),
            format!(".file_0.0.1.{LIBRARY_EXTENSION}.123.part"),
            "notes.txt".to_string(),
        ] {
            touch(&store.artifact_path(PluginType::Provider, &file));
        }

        let listed = store.list(PluginType::Provider).await.unwrap();

        let names: Vec<_> = listed
            .iter()
            .map(|a| (a.name.as_str(), a.version.as_str()))
            .collect();
        assert_eq!(names, vec![("my_plugin", "latest"), ("zeta", "1.0")]);
        assert!(store.list(PluginType::Flavour).await.unwrap().is_empty());
    }
}
