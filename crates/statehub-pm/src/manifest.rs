//! Module manifest parsing (manifest.json)
//!
//! Every installed module carries a `manifest.json` next to its `dist/`
//! payload. `name`, `version` and `author` are required and must be
//! non-empty; everything else is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest file name inside a module directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Entry point reported when a manifest does not declare one
pub const DEFAULT_ENTRY_POINT: &str = "dist/index.js";

/// Errors that can occur while reading a manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest.json at the expected path
    #[error("Invalid module: missing manifest.json at {0}")]
    Missing(PathBuf),

    /// File is not a JSON manifest object
    #[error("Corrupted manifest.json at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Required fields absent or empty
    #[error("Invalid manifest: missing required fields ({})", .missing.join(", "))]
    Invalid { missing: Vec<&'static str> },

    /// IO error
    #[error("Failed to read manifest: {0}")]
    IoError(#[from] std::io::Error),
}

/// Module manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    /// Module identity, optionally `@namespace/module`
    pub name: String,

    /// Free-form version string
    pub version: String,

    /// Module author
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Script loaded by the server (defaults to `dist/index.js`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,

    /// Source repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Names of modules this one expects; informational only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// Wire shape before required-field validation
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    name: Option<String>,
    version: Option<String>,
    author: Option<String>,
    description: Option<String>,
    license: Option<String>,
    entry_point: Option<String>,
    repo: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

impl ModuleManifest {
    /// Create a manifest with the required fields
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            author: author.into(),
            description: None,
            license: None,
            entry_point: None,
            repo: None,
            dependencies: Vec::new(),
        }
    }

    /// Read and validate a manifest file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        if !path.is_file() {
            return Err(ManifestError::Missing(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let raw: RawManifest =
            serde_json::from_str(&content).map_err(|source| ManifestError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_raw(raw)
    }

    /// Parse and validate manifest JSON
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest =
            serde_json::from_str(content).map_err(|source| ManifestError::Corrupt {
                path: PathBuf::from(MANIFEST_FILE),
                source,
            })?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawManifest) -> Result<Self, ManifestError> {
        let mut missing = Vec::new();
        let name = required(raw.name, "name", &mut missing);
        let version = required(raw.version, "version", &mut missing);
        let author = required(raw.author, "author", &mut missing);

        if !missing.is_empty() {
            return Err(ManifestError::Invalid { missing });
        }

        Ok(Self {
            name,
            version,
            author,
            description: raw.description,
            license: raw.license,
            entry_point: raw.entry_point,
            repo: raw.repo,
            dependencies: raw.dependencies,
        })
    }

    /// Declared entry point, or the default
    pub fn entry_point_or_default(&self) -> &str {
        self.entry_point.as_deref().unwrap_or(DEFAULT_ENTRY_POINT)
    }

    /// `@namespace` part of a namespaced name
    pub fn namespace(&self) -> Option<&str> {
        namespace_of(&self.name)
    }
}

fn required(value: Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            missing.push(field);
            String::new()
        }
    }
}

/// `@namespace` part of `@namespace/module`
pub fn namespace_of(name: &str) -> Option<&str> {
    if !name.starts_with('@') {
        return None;
    }
    name.split_once('/').map(|(ns, _)| ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_manifest() {
        let json = r#"{
            "name": "@statehub/pingpong",
            "version": "1.2.0",
            "author": "alice",
            "description": "Replies to pings",
            "license": "MIT",
            "entryPoint": "dist/main.js",
            "repo": "https://github.com/statehub/pingpong",
            "dependencies": ["@statehub/core"]
        }"#;

        let manifest = ModuleManifest::parse(json).unwrap();
        assert_eq!(manifest.name, "@statehub/pingpong");
        assert_eq!(manifest.entry_point_or_default(), "dist/main.js");
        assert_eq!(manifest.namespace(), Some("@statehub"));
        assert_eq!(manifest.dependencies, vec!["@statehub/core"]);
    }

    #[test]
    fn test_minimal_manifest_defaults() {
        let manifest =
            ModuleManifest::parse(r#"{"name": "plain", "version": "0.1", "author": "bob"}"#)
                .unwrap();
        assert_eq!(manifest.entry_point_or_default(), DEFAULT_ENTRY_POINT);
        assert_eq!(manifest.namespace(), None);
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_missing_author() {
        let result = ModuleManifest::parse(r#"{"name": "plain", "version": "0.1"}"#);
        match result {
            Err(ManifestError::Invalid { missing }) => assert_eq!(missing, vec!["author"]),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_fields_are_missing() {
        let result = ModuleManifest::parse(r#"{"name": "", "version": " ", "author": "x"}"#);
        match result {
            Err(ManifestError::Invalid { missing }) => {
                assert_eq!(missing, vec!["name", "version"])
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt() {
        assert!(matches!(
            ModuleManifest::parse("{ nope"),
            Err(ManifestError::Corrupt { .. })
        ));
        assert!(matches!(
            ModuleManifest::parse("[1, 2]"),
            Err(ManifestError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_from_file_missing() {
        let temp = TempDir::new().unwrap();
        let result = ModuleManifest::from_file(&temp.path().join(MANIFEST_FILE));
        assert!(matches!(result, Err(ManifestError::Missing(_))));
    }

    #[test]
    fn test_serialize_round_trip_shape() {
        let mut manifest = ModuleManifest::new("plain", "1.0.0", "carol");
        manifest.entry_point = Some("dist/app.js".to_string());

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["entryPoint"], "dist/app.js");
        assert!(json.get("license").is_none());
    }

    #[test]
    fn test_namespace_of() {
        assert_eq!(namespace_of("@ns/mod"), Some("@ns"));
        assert_eq!(namespace_of("@ns"), None);
        assert_eq!(namespace_of("plain"), None);
    }
}
