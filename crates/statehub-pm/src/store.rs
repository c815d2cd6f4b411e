//! Installed module layout
//!
//! Modules live under the modules root, addressed by name:
//! ```text
//! modules/
//! ├── plain/
//! │   ├── manifest.json
//! │   └── dist/
//! └── @namespace/
//!     └── module/
//!         ├── manifest.json
//!         └── dist/
//! ```
//! A `@`-prefixed directory without its own manifest is a namespace, never a
//! module.

use crate::manifest::{ManifestError, ModuleManifest, MANIFEST_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Payload directory inside a module
pub const DIST_DIR: &str = "dist";

/// Namespace sigil
pub const NAMESPACE_SIGIL: char = '@';

/// Errors that can occur while inspecting installed modules
#[derive(Debug, Error)]
pub enum StoreError {
    /// Manifest missing, corrupt or incomplete
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Directory structure is not a module
    #[error("Invalid module at {path}: {reason}")]
    InvalidModule { path: PathBuf, reason: String },

    /// Name cannot address a module directory
    #[error("Invalid module name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// On-disk store of installed modules
#[derive(Debug, Clone)]
pub struct ModuleStore {
    root: PathBuf,
}

impl ModuleStore {
    /// Create a store over `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Modules root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `name`; flat and namespaced names join the same way
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether `name` addresses an installed module directory
    ///
    /// A manifest-bearing directory always counts. Without a manifest, a
    /// bare `@name` directory is a namespace and does not.
    pub fn is_installed(&self, name: &str) -> bool {
        let path = self.path(name);
        if has_manifest(&path) {
            return true;
        }
        path.is_dir() && !is_namespace_name(name)
    }

    /// Read and validate the manifest of an installed module
    pub fn read_manifest(&self, name: &str) -> Result<ModuleManifest, StoreError> {
        Ok(ModuleManifest::from_file(
            &self.path(name).join(MANIFEST_FILE),
        )?)
    }

    /// Require a manifest file and a `dist/` directory under `path`
    pub fn validate_layout(path: &Path) -> Result<(), StoreError> {
        if !path.join(MANIFEST_FILE).is_file() {
            return Err(StoreError::InvalidModule {
                path: path.to_path_buf(),
                reason: "missing manifest.json".to_string(),
            });
        }

        if !path.join(DIST_DIR).is_dir() {
            return Err(StoreError::InvalidModule {
                path: path.to_path_buf(),
                reason: "missing dist/ directory".to_string(),
            });
        }

        Ok(())
    }

    /// Layout check followed by manifest validation
    pub fn validate_module(path: &Path) -> Result<ModuleManifest, StoreError> {
        Self::validate_layout(path)?;
        Ok(ModuleManifest::from_file(&path.join(MANIFEST_FILE))?)
    }

    /// Names of all installed modules, sorted
    ///
    /// Looks one level into `@namespace` directories and no deeper.
    pub fn enumerate_installed(&self) -> Result<Vec<String>, StoreError> {
        let mut modules = Vec::new();

        for (dir_name, dir_path) in subdirectories(&self.root)? {
            if has_manifest(&dir_path) {
                modules.push(dir_name);
            } else if dir_name.starts_with(NAMESPACE_SIGIL) {
                for (child_name, child_path) in subdirectories(&dir_path)? {
                    if has_manifest(&child_path) {
                        modules.push(format!("{}/{}", dir_name, child_name));
                    }
                }
            }
        }

        modules.sort();
        Ok(modules)
    }

    /// Remove an empty namespace directory left behind by `name`
    pub fn prune_namespace(&self, name: &str) -> Result<(), StoreError> {
        let Some((namespace, _)) = name.split_once('/') else {
            return Ok(());
        };

        let ns_path = self.root.join(namespace);
        if ns_path.is_dir() && fs::read_dir(&ns_path)?.next().is_none() {
            fs::remove_dir(&ns_path)?;
        }

        Ok(())
    }
}

/// Check that `name` is `module` or `@namespace/module`
///
/// Rejects anything that could address a path outside the modules root.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('\\') || name.contains('\0') {
        return Err(invalid("name contains an illegal character"));
    }

    let segments: Vec<&str> = name.split('/').collect();
    let namespaced = segments.len() == 2 && name.starts_with(NAMESPACE_SIGIL);
    if segments.len() != 1 && !namespaced {
        return Err(invalid(
            "only @namespace/module names may contain a single '/'",
        ));
    }

    for (i, segment) in segments.iter().enumerate() {
        let bare = if i == 0 && namespaced {
            &segment[1..]
        } else {
            segment
        };
        if bare.is_empty() || bare == "." || bare == ".." {
            return Err(invalid("empty or relative path segment"));
        }
    }

    if namespaced && segments[1].starts_with(NAMESPACE_SIGIL) {
        return Err(invalid("module segment cannot start with '@'"));
    }

    Ok(())
}

fn is_namespace_name(name: &str) -> bool {
    name.starts_with(NAMESPACE_SIGIL) && !name.contains('/')
}

fn has_manifest(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file()
}

/// Immediate subdirectories of `dir` as (name, path); empty if `dir` is absent
fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            dirs.push((name.to_string(), entry.path()));
        }
    }

    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_module(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(dir.join(DIST_DIR)).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            format!(r#"{{"name": "{}", "version": "1.0.0", "author": "a"}}"#, name),
        )
        .unwrap();
    }

    #[test]
    fn test_path_addressing() {
        let store = ModuleStore::new(PathBuf::from("/m"));
        assert_eq!(store.path("plain"), PathBuf::from("/m/plain"));
        assert_eq!(store.path("@ns/mod"), PathBuf::from("/m/@ns/mod"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("plain").is_ok());
        assert!(validate_name("@ns/mod").is_ok());
        assert!(validate_name("@statehub.pingpong").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("@ns/a/b").is_err());
        assert!(validate_name("@/mod").is_err());
        assert!(validate_name("@ns/").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("@ns/..").is_err());
        assert!(validate_name("@../mod").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name("@ns/@inner").is_err());
    }

    #[test]
    fn test_validate_layout() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("m");
        fs::create_dir_all(&dir).unwrap();

        assert!(matches!(
            ModuleStore::validate_layout(&dir),
            Err(StoreError::InvalidModule { .. })
        ));

        fs::write(dir.join(MANIFEST_FILE), "{}").unwrap();
        assert!(matches!(
            ModuleStore::validate_layout(&dir),
            Err(StoreError::InvalidModule { .. })
        ));

        fs::create_dir(dir.join(DIST_DIR)).unwrap();
        assert!(ModuleStore::validate_layout(&dir).is_ok());

        // Layout is fine, manifest content is not
        assert!(matches!(
            ModuleStore::validate_module(&dir),
            Err(StoreError::Manifest(ManifestError::Invalid { .. }))
        ));
    }

    #[test]
    fn test_read_manifest_errors() {
        let temp = TempDir::new().unwrap();
        let store = ModuleStore::new(temp.path().to_path_buf());

        assert!(matches!(
            store.read_manifest("absent"),
            Err(StoreError::Manifest(ManifestError::Missing(_)))
        ));

        fs::create_dir_all(store.path("broken")).unwrap();
        fs::write(store.path("broken").join(MANIFEST_FILE), "nope").unwrap();
        assert!(matches!(
            store.read_manifest("broken"),
            Err(StoreError::Manifest(ManifestError::Corrupt { .. }))
        ));
    }

    #[test]
    fn test_enumerate_installed() {
        let temp = TempDir::new().unwrap();
        let store = ModuleStore::new(temp.path().to_path_buf());

        write_module(temp.path(), "@ns/a");
        write_module(temp.path(), "@ns/b");
        write_module(temp.path(), "plain");
        // Not traversed: nested namespace, stray directories and files
        write_module(temp.path(), "@ns/@deeper/c");
        fs::create_dir_all(temp.path().join("empty")).unwrap();
        fs::write(temp.path().join("stray.txt"), "x").unwrap();

        assert_eq!(
            store.enumerate_installed().unwrap(),
            vec!["@ns/a", "@ns/b", "plain"]
        );
    }

    #[test]
    fn test_manifest_bearing_sigil_directory_is_module() {
        let temp = TempDir::new().unwrap();
        let store = ModuleStore::new(temp.path().to_path_buf());
        write_module(temp.path(), "@odd");

        assert_eq!(store.enumerate_installed().unwrap(), vec!["@odd"]);
    }

    #[test]
    fn test_namespace_is_not_installed() {
        let temp = TempDir::new().unwrap();
        let store = ModuleStore::new(temp.path().to_path_buf());
        write_module(temp.path(), "@ns/a");
        write_module(temp.path(), "@flat");
        fs::create_dir_all(temp.path().join("broken")).unwrap();

        assert!(store.is_installed("@ns/a"));
        assert!(!store.is_installed("@ns"));
        assert!(store.is_installed("@flat"));
        assert!(store.is_installed("broken"));
        assert!(!store.is_installed("absent"));
    }

    #[test]
    fn test_enumerate_missing_root() {
        let temp = TempDir::new().unwrap();
        let store = ModuleStore::new(temp.path().join("nothing"));
        assert!(store.enumerate_installed().unwrap().is_empty());
    }

    #[test]
    fn test_prune_namespace() {
        let temp = TempDir::new().unwrap();
        let store = ModuleStore::new(temp.path().to_path_buf());

        fs::create_dir_all(store.path("@ns")).unwrap();
        store.prune_namespace("@ns/a").unwrap();
        assert!(!store.path("@ns").exists());

        write_module(temp.path(), "@keep/b");
        store.prune_namespace("@keep/a").unwrap();
        assert!(store.path("@keep").exists());
    }
}
