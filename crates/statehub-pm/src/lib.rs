//! Statehub Package Manager Library
//!
//! This crate manages Statehub server modules, including:
//! - Repository source caching (`cache/source.<N>.json`)
//! - Module name resolution across cached sources
//! - Module manifest parsing (manifest.json)
//! - Atomic install, update and uninstall of module archives
//! - User settings (settings.json)

pub mod archive;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod manifest;
pub mod report;
pub mod resolver;
pub mod settings;
pub mod source;
pub mod store;

pub use archive::{extract_zip, ArchiveError};
pub use cache::{CacheEntry, CacheError, RepositoryCache, SourceRepository};
pub use config::{ConfigError, HttpConfig, PmConfig, DEFAULT_SOURCE_URL};
pub use fetch::{CatalogFetcher, FetchError, FetchedFile, HttpTransport, Transport};
pub use lifecycle::{
    InstallOutcome, InstalledModule, LifecycleError, ModuleManager, UpdateOutcome,
};
pub use manifest::{ManifestError, ModuleManifest, DEFAULT_ENTRY_POINT, MANIFEST_FILE};
pub use report::{BatchReport, ItemResult};
pub use resolver::{resolve_in, ModuleResolver, ResolvedModule};
pub use settings::{Settings, SettingsError, SettingsStore};
pub use source::RepositorySource;
pub use store::{validate_name, ModuleStore, StoreError};
