//! Module lifecycle: install, update, uninstall, update-all
//!
//! The canonical module directory is never touched until a replacement has
//! been downloaded. Install removes whatever it created when a later step
//! fails. Update copies the installed module to a backup first and restores
//! it on any failure, so a module ends either fully at the new version or
//! fully at the old one.
//!
//! Operations run one at a time; there is no cross-process locking.

use crate::archive::{extract_zip, ArchiveError};
use crate::cache::{CacheError, RepositoryCache, SourceRepository};
use crate::config::{ConfigError, PmConfig};
use crate::fetch::{CatalogFetcher, FetchError, FetchedFile, HttpTransport, Transport};
use crate::manifest::ModuleManifest;
use crate::report::BatchReport;
use crate::resolver::{ModuleResolver, ResolvedModule};
use crate::settings::SettingsStore;
use crate::source::RepositorySource;
use crate::store::{validate_name, ModuleStore, StoreError};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors surfaced by lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No cached source publishes the module
    #[error("Module '{0}' not found in any repository")]
    ModuleNotFound(String),

    /// Target directory already exists
    #[error("Module '{0}' is already installed")]
    AlreadyInstalled(String),

    /// Target directory does not exist
    #[error("Module '{0}' is not installed")]
    NotInstalled(String),

    /// Configuration error
    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    /// Fetch error
    #[error(transparent)]
    FetchError(#[from] FetchError),

    /// Cache error
    #[error(transparent)]
    CacheError(#[from] CacheError),

    /// Manifest or layout error
    #[error(transparent)]
    StoreError(#[from] StoreError),

    /// Archive error
    #[error(transparent)]
    ArchiveError(#[from] ArchiveError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// Install failed and removing the partial install failed too
    #[error("Failed to install {module}: {cause}; cleanup also failed: {cleanup}")]
    CleanupFailed {
        module: String,
        cause: Box<LifecycleError>,
        cleanup: io::Error,
    },

    /// Update failed and restoring the previous version failed too
    #[error("Failed to update {module}: {cause}; restoring the previous version also failed: {rollback} (backup kept at {backup:?})")]
    RollbackFailed {
        module: String,
        cause: Box<LifecycleError>,
        rollback: io::Error,
        backup: PathBuf,
    },
}

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Module name
    pub name: String,
    /// Installed manifest
    pub manifest: ModuleManifest,
    /// Source the module was resolved from
    pub source: String,
    /// Install directory
    pub path: PathBuf,
    /// SHA-256 of the downloaded archive
    pub checksum: String,
}

/// Result of a successful update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Module name
    pub name: String,
    /// Version before the update, if the old manifest was readable
    pub from: Option<String>,
    /// Version after the update
    pub to: String,
    /// SHA-256 of the downloaded archive
    pub checksum: String,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.name,
            self.from.as_deref().unwrap_or("unknown"),
            self.to
        )
    }
}

/// An enumerated module and its manifest, which may be unreadable
#[derive(Debug)]
pub struct InstalledModule {
    /// Module name
    pub name: String,
    /// Module directory
    pub path: PathBuf,
    /// Parsed manifest or the reason it could not be read
    pub manifest: Result<ModuleManifest, StoreError>,
}

/// Coordinates the repository cache, the fetcher and the module store
pub struct ModuleManager<T = HttpTransport> {
    config: PmConfig,
    cache: RepositoryCache,
    store: ModuleStore,
    fetcher: CatalogFetcher<T>,
}

impl ModuleManager<HttpTransport> {
    /// Validate `config` and build a manager using the real HTTPS client
    pub fn from_config(config: PmConfig) -> Result<Self, LifecycleError> {
        config.validate()?;
        let fetcher = CatalogFetcher::http(&config.http)?;
        Ok(Self::with_fetcher(config, fetcher))
    }
}

impl<T: Transport> ModuleManager<T> {
    /// Build a manager over any fetcher
    pub fn with_fetcher(config: PmConfig, fetcher: CatalogFetcher<T>) -> Self {
        Self {
            cache: RepositoryCache::new(config.cache_dir()),
            store: ModuleStore::new(config.modules_dir()),
            config,
            fetcher,
        }
    }

    pub fn config(&self) -> &PmConfig {
        &self.config
    }

    pub fn cache(&self) -> &RepositoryCache {
        &self.cache
    }

    pub fn store(&self) -> &ModuleStore {
        &self.store
    }

    pub fn fetcher(&self) -> &CatalogFetcher<T> {
        &self.fetcher
    }

    /// Settings store under the state root
    pub fn settings(&self) -> SettingsStore {
        SettingsStore::new(self.config.settings_file())
    }

    // ── Sources ──────────────────────────────────────────────────────

    /// Fetch and cache the well-known catalog unless it is already cached
    ///
    /// Returns `true` when the catalog was added.
    pub fn ensure_default_source(&self) -> Result<bool, LifecycleError> {
        let url = self.config.default_source_url.clone();
        if self.cache.contains(&url)? {
            return Ok(false);
        }

        tracing::info!(url = %url, "Adding official repository");
        let mut source: RepositorySource = self.fetcher.fetch_json(&url)?;
        source.list_url = url;
        self.cache.add(&source)?;

        Ok(true)
    }

    /// Fetch the catalog at `url` and cache it
    ///
    /// `name` and `url` are checked against cached sources before any fetch.
    /// The catalog's own `listName` is kept; `name` fills in when it is empty.
    pub fn add_source(&self, name: &str, url: &str) -> Result<RepositorySource, LifecycleError> {
        if self.cache.contains(name)? || self.cache.contains(url)? {
            return Err(CacheError::DuplicateSource {
                name: name.to_string(),
                url: url.to_string(),
            }
            .into());
        }

        let mut source: RepositorySource = self.fetcher.fetch_json(url)?;
        if source.list_name.is_empty() {
            source.list_name = name.to_string();
        }
        source.list_url = url.to_string();

        let seq = self.cache.add(&source)?;
        tracing::info!(source = %source.list_name, seq, "Repository added");

        Ok(source)
    }

    /// Remove a cached source by name or URL
    pub fn remove_source(&self, name_or_url: &str) -> Result<RepositorySource, LifecycleError> {
        let removed = self.cache.remove(name_or_url)?;
        tracing::info!(source = %removed.list_name, "Repository removed");
        Ok(removed)
    }

    /// Cached sources in cache order
    pub fn list_sources(&self) -> Result<Vec<RepositorySource>, LifecycleError> {
        Ok(self.cache.list()?)
    }

    /// Re-fetch all cached sources, best effort
    pub fn refresh_sources(&self) -> Result<BatchReport<(), CacheError>, LifecycleError> {
        let report = self.cache.refresh_all(&self.fetcher)?;
        tracing::info!(
            refreshed = report.succeeded(),
            failed = report.failed(),
            "Repository cache refreshed"
        );
        Ok(report)
    }

    /// Locate `name` in the cache; `ModuleNotFound` when absent everywhere
    pub fn resolve(&self, name: &str) -> Result<ResolvedModule, LifecycleError> {
        ModuleResolver::new(&self.cache)
            .resolve(name)?
            .ok_or_else(|| LifecycleError::ModuleNotFound(name.to_string()))
    }

    // ── Modules ──────────────────────────────────────────────────────

    /// Install `name` from the first source publishing it
    pub fn install(&self, name: &str) -> Result<InstallOutcome, LifecycleError> {
        validate_name(name)?;

        self.ensure_default_source()?;
        self.refresh_sources()?;

        let resolved = self.resolve(name)?;
        let target = self.store.path(name);
        if target.exists() {
            return Err(LifecycleError::AlreadyInstalled(name.to_string()));
        }

        tracing::info!(module = name, source = %resolved.source.list_name, "Installing");

        match self.download_into(name, &resolved.url, &target) {
            Ok((manifest, fetched)) => {
                if manifest.name != name {
                    tracing::warn!(module = name, declared = %manifest.name, "Manifest name differs from requested name");
                }
                tracing::info!(module = name, version = %manifest.version, "Installed");
                Ok(InstallOutcome {
                    name: name.to_string(),
                    manifest,
                    source: resolved.source.list_name,
                    path: target,
                    checksum: fetched.checksum,
                })
            }
            Err(cause) => Err(self.discard_partial(name, &target, cause)),
        }
    }

    /// Delete an installed module; unconditional and not undoable
    pub fn uninstall(&self, name: &str) -> Result<(), LifecycleError> {
        validate_name(name)?;

        if !self.store.is_installed(name) {
            return Err(LifecycleError::NotInstalled(name.to_string()));
        }
        let target = self.store.path(name);

        fs::remove_dir_all(&target)?;
        self.store.prune_namespace(name)?;
        tracing::info!(module = name, "Uninstalled");

        Ok(())
    }

    /// Replace an installed module with the currently published archive
    pub fn update(&self, name: &str) -> Result<UpdateOutcome, LifecycleError> {
        self.update_module(name, true)
    }

    /// Update every installed module; failures are recorded, not fatal
    ///
    /// Sources are refreshed once up front and modules are processed one
    /// after another.
    pub fn update_all(&self) -> Result<BatchReport<UpdateOutcome, LifecycleError>, LifecycleError> {
        let modules = self.store.enumerate_installed()?;
        let mut report = BatchReport::new();
        if modules.is_empty() {
            return Ok(report);
        }

        tracing::info!(count = modules.len(), "Updating installed modules");
        self.refresh_sources()?;

        for name in modules {
            let result = self.update_module(&name, false);
            if let Err(e) = &result {
                tracing::warn!(module = %name, error = %e, "Failed to update");
            }
            report.push(name, result);
        }

        Ok(report)
    }

    /// Every installed module with its manifest
    pub fn list_installed(&self) -> Result<Vec<InstalledModule>, LifecycleError> {
        Ok(self
            .store
            .enumerate_installed()?
            .into_iter()
            .map(|name| InstalledModule {
                path: self.store.path(&name),
                manifest: self.store.read_manifest(&name),
                name,
            })
            .collect())
    }

    fn update_module(&self, name: &str, refresh: bool) -> Result<UpdateOutcome, LifecycleError> {
        validate_name(name)?;

        if !self.store.is_installed(name) {
            return Err(LifecycleError::NotInstalled(name.to_string()));
        }
        let target = self.store.path(name);

        let from = match self.store.read_manifest(name) {
            Ok(manifest) => Some(manifest.version),
            Err(e) => {
                tracing::warn!(module = name, error = %e, "Current manifest unreadable");
                None
            }
        };

        if refresh {
            self.refresh_sources()?;
        }
        let resolved = self.resolve(name)?;

        let backup = self.staging_path(name, "_backup", "");
        if let Err(e) = copy_dir_all(&target, &backup) {
            if let Err(cleanup) = remove_if_exists(&backup) {
                tracing::warn!(backup = %backup.display(), error = %cleanup, "Failed to remove partial backup");
            }
            return Err(e.into());
        }
        tracing::debug!(module = name, backup = %backup.display(), "Backed up");

        // Point of no return: the canonical directory is replaced from here on
        let replaced = fs::remove_dir_all(&target)
            .map_err(LifecycleError::from)
            .and_then(|_| self.download_into(name, &resolved.url, &target));

        match replaced {
            Ok((manifest, fetched)) => {
                if let Err(e) = fs::remove_dir_all(&backup) {
                    tracing::warn!(backup = %backup.display(), error = %e, "Failed to remove backup");
                }

                let outcome = UpdateOutcome {
                    name: name.to_string(),
                    from,
                    to: manifest.version,
                    checksum: fetched.checksum,
                };
                tracing::info!(module = name, "Updated {}", outcome);
                Ok(outcome)
            }
            Err(cause) => match restore_backup(&backup, &target) {
                Ok(()) => {
                    tracing::warn!(module = name, error = %cause, "Update failed, previous version restored");
                    Err(cause)
                }
                Err(rollback) => Err(LifecycleError::RollbackFailed {
                    module: name.to_string(),
                    cause: Box::new(cause),
                    rollback,
                    backup,
                }),
            },
        }
    }

    /// Download `url`, extract it into `target`, and validate the result
    ///
    /// The staged archive is removed on every path. Whatever was extracted
    /// into `target` is left for the caller to clean up.
    fn download_into(
        &self,
        name: &str,
        url: &str,
        target: &Path,
    ) -> Result<(ModuleManifest, FetchedFile), LifecycleError> {
        let archive = self.staging_path(name, "", ".zip");
        let fetched = self.fetcher.fetch_file(url, &archive)?;
        tracing::debug!(module = name, size = fetched.size, checksum = %fetched.checksum, "Downloaded archive");

        let extracted = extract_zip(&archive, target);
        if let Err(e) = fs::remove_file(&archive) {
            tracing::warn!(archive = %archive.display(), error = %e, "Failed to remove staged archive");
        }
        extracted?;

        let manifest = ModuleStore::validate_module(target)?;
        Ok((manifest, fetched))
    }

    /// Remove a partial install and hand back the error to report
    fn discard_partial(&self, name: &str, target: &Path, cause: LifecycleError) -> LifecycleError {
        let cleanup = remove_if_exists(target).and_then(|_| {
            self.store
                .prune_namespace(name)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        });

        match cleanup {
            Ok(()) => cause,
            Err(cleanup) => LifecycleError::CleanupFailed {
                module: name.to_string(),
                cause: Box::new(cause),
                cleanup,
            },
        }
    }

    /// Unique path under the staging directory, keyed by module and time
    fn staging_path(&self, name: &str, label: &str, extension: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let key = name.replace(['@', '/'], "_");

        self.config
            .temp_dir
            .join(format!(
                "{}{}_{}_{}{}",
                key,
                label,
                std::process::id(),
                stamp,
                extension
            ))
    }
}

/// Put `backup` back at `target`, replacing anything there
fn restore_backup(backup: &Path, target: &Path) -> io::Result<()> {
    remove_if_exists(target)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    // Rename when staging shares a filesystem with the modules root
    if fs::rename(backup, target).is_ok() {
        return Ok(());
    }

    copy_dir_all(backup, target)?;
    fs::remove_dir_all(backup)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Recursively copy the directory `src` to `dst`
fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let dest_path = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}
