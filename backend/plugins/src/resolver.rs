//! Locator resolver: turns a partially specified plugin request into a canonical
//! source URL and the deterministic on-disk path of its artifact.
//!
//! Resolution order matters. The type is validated before anything else, the name
//! must be known before a release URL can be synthesized, the version is defaulted
//! before it is baked into the filename, and the existence check runs last, once
//! the path is final.

use std::path::{Path, PathBuf};

use kadende_config::ManagerSettings;
use kadende_core::{LATEST_VERSION, LIBRARY_EXTENSION, PluginError, PluginResult, PluginType};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::store::ArtifactStore;

/// Query parameter the fetcher reads to name the downloaded file. Reserved for the manager.
pub const FILENAME_PARAM: &str = "filename";

/// Optional caller hint naming the plugin when it cannot be read from the URL path.
pub const PLUGIN_NAME_PARAM: &str = "pluginName";

/// A raw install request. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRequest {
    #[serde(rename = "type")]
    pub plugin_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PluginRequest {
    pub fn new(plugin_type: impl Into<String>) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A fully resolved request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlugin {
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub name: String,
    pub version: String,
    pub source_url: Url,
    pub file_path: PathBuf,
    pub already_installed: bool,
}

impl ResolvedPlugin {
    /// `<name>_<version>.<ext>`
    pub fn file_name(&self) -> String {
        artifact_file_name(&self.name, &self.version)
    }

    /// Directory the artifact lives in (and the fetcher writes to).
    pub fn install_dir(&self) -> &Path {
        self.file_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// `<type>/<name>_<version>`, used as the key in logs.
    pub fn key(&self) -> String {
        format!("{}/{}_{}", self.plugin_type, self.name, self.version)
    }
}

pub struct Resolver {
    settings: ManagerSettings,
    store: ArtifactStore,
}

impl Resolver {
    pub fn new(settings: ManagerSettings, store: ArtifactStore) -> Self {
        Self { settings, store }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub async fn resolve(&self, request: &PluginRequest) -> PluginResult<ResolvedPlugin> {
        let plugin_type: PluginType = request.plugin_type.parse()?;

        let explicit_url = non_empty(&request.url).map(parse_source_url).transpose()?;

        let name = match (non_empty(&request.name), &explicit_url) {
            (Some(name), _) => name.to_string(),
            (None, Some(url)) => derive_name(url).ok_or(PluginError::MissingPluginName)?,
            (None, None) => return Err(PluginError::MissingPluginName),
        };
        check_component("name", &name)?;

        let version = non_empty(&request.version)
            .unwrap_or(LATEST_VERSION)
            .to_string();
        check_component("version", &version)?;

        let file_name = artifact_file_name(&name, &version);
        let source = match explicit_url {
            Some(url) => url,
            None => release_url(&self.settings, plugin_type, &name, &version)?,
        };
        let source_url = with_filename_hint(source, &file_name);

        let file_path = self.store.artifact_path(plugin_type, &file_name);
        let already_installed = self.store.exists(&file_path).await?;

        Ok(ResolvedPlugin {
            plugin_type,
            name,
            version,
            source_url,
            file_path,
            already_installed,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn check_component(field: &'static str, value: &str) -> PluginResult<()> {
    let invalid = value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.chars().any(char::is_control);
    if invalid {
        return Err(PluginError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Canonical artifact filename for a name and version.
pub fn artifact_file_name(name: &str, version: &str) -> String {
    format!("{name}_{version}.{LIBRARY_EXTENSION}")
}

/// Removes the first occurrence of the platform library suffix.
pub fn strip_library_suffix(name: &str) -> String {
    name.replacen(&format!(".{LIBRARY_EXTENSION}"), "", 1)
}

/// Parses an explicit source. Absolute filesystem paths are accepted as `file://` URLs.
pub fn parse_source_url(raw: &str) -> PluginResult<Url> {
    match Url::parse(raw) {
        Ok(url) if !url.cannot_be_a_base() => Ok(url),
        Ok(_) => Err(PluginError::InvalidSourceUrl {
            url: raw.to_string(),
            reason: "not a hierarchical url".to_string(),
        }),
        Err(err) => {
            let path = Path::new(raw);
            if path.is_absolute() {
                return Url::from_file_path(path).map_err(|()| PluginError::InvalidSourceUrl {
                    url: raw.to_string(),
                    reason: "not a valid file path".to_string(),
                });
            }
            Err(PluginError::InvalidSourceUrl {
                url: raw.to_string(),
                reason: err.to_string(),
            })
        }
    }
}

/// Name from the `pluginName` hint, else from the decoded last path segment.
/// Suffix stripped.
pub fn derive_name(url: &Url) -> Option<String> {
    let hinted = url
        .query_pairs()
        .find(|(key, value)| key == PLUGIN_NAME_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned());

    let raw = match hinted {
        Some(name) => name,
        None => {
            let segment = url.path_segments()?.next_back().unwrap_or_default();
            percent_decode_str(segment).decode_utf8_lossy().into_owned()
        }
    };

    let name = strip_library_suffix(&raw);
    (!name.is_empty()).then_some(name)
}

/// `<host>/<org>/<prefix>-<type>-<name>/releases/download/<version>/plugin.<ext>`
pub fn release_url(
    settings: &ManagerSettings,
    plugin_type: PluginType,
    name: &str,
    version: &str,
) -> PluginResult<Url> {
    let raw = format!(
        "{}/{}/{}-{}-{}/releases/download/{}/plugin.{}",
        settings.release_host.as_str().trim_end_matches('/'),
        settings.release_org,
        settings.repo_prefix,
        plugin_type,
        name,
        version,
        LIBRARY_EXTENSION,
    );
    Url::parse(&raw).map_err(|err| PluginError::InvalidSourceUrl {
        url: raw.clone(),
        reason: err.to_string(),
    })
}

/// Drops every `filename` parameter and appends exactly one with `file_name`.
/// Other parameters keep their order.
pub fn with_filename_hint(mut url: Url, file_name: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != FILENAME_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    url.query_pairs_mut()
        .extend_pairs(kept)
        .append_pair(FILENAME_PARAM, file_name);
    url
}

/// Value of the `filename` hint, if present.
pub fn filename_hint(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == FILENAME_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// The URL without its `filename` hint, as sent to the upstream source.
pub fn without_filename_hint(url: &Url) -> Url {
    let mut stripped = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != FILENAME_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    stripped.set_query(None);
    if !kept.is_empty() {
        stripped.query_pairs_mut().extend_pairs(kept);
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(root: &Path) -> Resolver {
        Resolver::new(ManagerSettings::new(root), ArtifactStore::new(root))
    }

    fn ext(file: &str) -> String {
        format!("{file}.{LIBRARY_EXTENSION}")
    }

    #[tokio::test]
    async fn resolves_named_release() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider")
            .with_name("file")
            .with_version("0.0.1");

        let resolved = resolver(root.path()).resolve(&request).await.unwrap();

        assert_eq!(
            resolved.file_path,
            root.path().join("provider").join(ext("file_0.0.1"))
        );
        assert!(!resolved.already_installed);
        assert_eq!(
            resolved.source_url.as_str(),
            format!(
                "https://github.com/kadende-plugins/kadende-provider-file/releases/download/0.0.1/plugin.{LIBRARY_EXTENSION}?filename=file_0.0.1.{LIBRARY_EXTENSION}"
            )
        );
    }

    #[tokio::test]
    async fn resolution_is_deterministic() {
        let root = tempfile::tempdir().unwrap();
        let resolver = resolver(root.path());
        let request = PluginRequest::new("flavour").with_name("file").with_version("0.0.0");

        let first = resolver.resolve(&request).await.unwrap();
        let second = resolver.resolve(&request).await.unwrap();

        assert_eq!(first, second);
        assert!(first.file_path.ends_with(format!("flavour/{}", ext("file_0.0.0"))));
    }

    #[tokio::test]
    async fn empty_version_defaults_to_latest() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider").with_name("file").with_version("");

        let resolved = resolver(root.path()).resolve(&request).await.unwrap();

        assert_eq!(resolved.version, "latest");
        assert!(resolved.file_path.ends_with(ext("file_latest")));
        assert!(resolved.source_url.path().contains("/download/latest/"));
    }

    #[tokio::test]
    async fn name_from_plugin_name_hint() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider").with_url(format!(
            "https://github.com/mwaaas/kadende-provider-file/releases/download/0.0.1/plugin.so?pluginName=my-custom-plugin.{LIBRARY_EXTENSION}"
        ));

        let resolved = resolver(root.path()).resolve(&request).await.unwrap();

        assert_eq!(resolved.name, "my-custom-plugin");
        assert!(resolved.file_path.ends_with(format!("provider/{}", ext("my-custom-plugin_latest"))));
    }

    #[tokio::test]
    async fn name_from_last_path_segment() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider").with_url(format!(
            "https://example.com/releases/file-provider-sample_v1.26.0.{LIBRARY_EXTENSION}"
        ));

        let resolved = resolver(root.path()).resolve(&request).await.unwrap();

        assert_eq!(resolved.name, "file-provider-sample_v1.26.0");
    }

    #[tokio::test]
    async fn explicit_name_wins_over_url() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider")
            .with_name("file")
            .with_url("https://example.com/other.so?pluginName=ignored");

        let resolved = resolver(root.path()).resolve(&request).await.unwrap();

        assert_eq!(resolved.name, "file");
    }

    #[tokio::test]
    async fn caller_filename_is_overwritten() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider")
            .with_name("file")
            .with_url("https://example.com/plugin.so?filename=../../evil.so&arch=x86_64&filename=again.so");

        let resolved = resolver(root.path()).resolve(&request).await.unwrap();

        let hints: Vec<_> = resolved
            .source_url
            .query_pairs()
            .filter(|(k, _)| k == FILENAME_PARAM)
            .collect();
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].1, ext("file_latest"));
        assert_eq!(
            resolved.source_url.query_pairs().next().unwrap().0,
            "arch",
        );
    }

    #[tokio::test]
    async fn invalid_type_fails_before_name_work() {
        let root = tempfile::tempdir().unwrap();
        // Neither a name nor a URL: would be MissingPluginName if type were checked later.
        let err = resolver(root.path())
            .resolve(&PluginRequest::new("abcdefga"))
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::InvalidPluginType(_)));
    }

    #[tokio::test]
    async fn missing_name_without_url_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = resolver(root.path())
            .resolve(&PluginRequest::new("provider"))
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::MissingPluginName));
    }

    #[tokio::test]
    async fn url_ending_in_slash_has_no_name() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider").with_url("https://example.com/plugins/");

        let err = resolver(root.path()).resolve(&request).await.unwrap_err();

        assert!(matches!(err, PluginError::MissingPluginName));
    }

    #[tokio::test]
    async fn traversal_in_name_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider").with_url("https://example.com/x.so?pluginName=..");

        let err = resolver(root.path()).resolve(&request).await.unwrap_err();

        assert!(matches!(err, PluginError::InvalidComponent { field: "name", .. }));
    }

    #[tokio::test]
    async fn detects_existing_artifact() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("provider");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ext("file_0.0.1")), b"lib").unwrap();

        let request = PluginRequest::new("provider").with_name("file").with_version("0.0.1");
        let resolved = resolver(root.path()).resolve(&request).await.unwrap();

        assert!(resolved.already_installed);
    }

    #[test]
    fn absolute_path_becomes_file_url() {
        let url = parse_source_url("/path/does/not/exist").unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(derive_name(&url).unwrap(), "exist");
    }

    #[tokio::test]
    async fn name_from_path_is_percent_decoded() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider")
            .with_url(format!("https://example.com/dl/my%20plugin.{LIBRARY_EXTENSION}"));

        let resolved = resolver(root.path()).resolve(&request).await.unwrap();

        assert_eq!(resolved.name, "my plugin");
        assert!(resolved.file_path.ends_with(format!("provider/{}", ext("my plugin_latest"))));
    }

    #[tokio::test]
    async fn encoded_separator_in_path_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let request = PluginRequest::new("provider").with_url("https://example.com/dl/..%2Fevil.so");

        let err = resolver(root.path()).resolve(&request).await.unwrap_err();

        assert!(matches!(err, PluginError::InvalidComponent { field: "name", .. }));
    }

    #[test]
    fn relative_path_is_invalid() {
        assert!(matches!(
            parse_source_url("plugins/file.so"),
            Err(PluginError::InvalidSourceUrl { .. })
        ));
    }

    #[test]
    fn strips_only_first_suffix() {
        let doubled = format!("a.{LIBRARY_EXTENSION}.{LIBRARY_EXTENSION}");
        assert_eq!(strip_library_suffix(&doubled), ext("a"));
    }

    #[test]
    fn release_url_respects_host_path() {
        let settings = ManagerSettings::new("/tmp")
            .with_release_host("https://mirror.example.com/gh/")
            .unwrap();
        let url = release_url(&settings, PluginType::Flavour, "file", "1.0.0").unwrap();
        assert!(url.as_str().starts_with(
            "https://mirror.example.com/gh/kadende-plugins/kadende-flavour-file/releases/download/1.0.0/"
        ));
    }

    #[test]
    fn filename_hint_round_trip() {
        let url = with_filename_hint(Url::parse("https://example.com/p.so?a=1").unwrap(), "f_1.so");
        assert_eq!(filename_hint(&url).as_deref(), Some("f_1.so"));
        assert_eq!(without_filename_hint(&url).as_str(), "https://example.com/p.so?a=1");
        let bare = with_filename_hint(Url::parse("https://example.com/p.so").unwrap(), "f_1.so");
        assert_eq!(without_filename_hint(&bare).as_str(), "https://example.com/p.so");
    }
}
