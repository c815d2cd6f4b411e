//! Repository source cache
//!
//! Catalogs are persisted one per file as `cache/source.<N>.json`, where `N`
//! is a non-negative sequence number. Cache order is ascending `N`; gaps are
//! allowed and never compacted. Nothing is held in memory between calls:
//! every query rescans the directory.

use crate::fetch::{CatalogFetcher, FetchError, Transport};
use crate::report::BatchReport;
use crate::source::RepositorySource;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FILE_PREFIX: &str = "source.";
const FILE_SUFFIX: &str = ".json";

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// A source with the same name or URL is already cached
    #[error("Repository already exists: {name} ({url})")]
    DuplicateSource { name: String, url: String },

    /// No cached source matches the given name or URL
    #[error("Repository '{0}' not found")]
    SourceNotFound(String),

    /// Fetched document is not a usable catalog
    #[error("Invalid repository format: {0}")]
    InvalidSource(String),

    /// The highest sequence number is already taken
    #[error("No sequence number left after {0}")]
    SequenceExhausted(u64),

    /// Fetch error
    #[error(transparent)]
    FetchError(#[from] FetchError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A cached source together with its backing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Sequence number from the file name
    pub seq: u64,
    /// Backing file
    pub path: PathBuf,
    /// Parsed document
    pub source: RepositorySource,
}

/// Ordered storage of repository sources
///
/// Business code talks to this interface; only the implementation knows
/// about sequence-numbered files.
pub trait SourceRepository {
    /// All readable sources with their sequence numbers, in cache order
    fn entries(&self) -> Result<Vec<CacheEntry>, CacheError>;

    /// Persist a new source under the next sequence number
    fn add(&self, source: &RepositorySource) -> Result<u64, CacheError>;

    /// Delete the first source matching by name or URL
    fn remove(&self, name_or_url: &str) -> Result<RepositorySource, CacheError>;

    /// Overwrite the source stored under `seq`
    fn overwrite(&self, seq: u64, source: &RepositorySource) -> Result<(), CacheError>;

    /// All readable sources, in cache order
    fn list(&self) -> Result<Vec<RepositorySource>, CacheError> {
        Ok(self.entries()?.into_iter().map(|e| e.source).collect())
    }

    /// Whether a source with this name or URL is cached
    fn contains(&self, name_or_url: &str) -> Result<bool, CacheError> {
        Ok(self.entries()?.iter().any(|e| e.source.matches(name_or_url)))
    }

    /// Re-fetch every source from its `listUrl` and overwrite it in place
    ///
    /// Best effort: one failing source is recorded and the rest continue.
    fn refresh_all<T: Transport>(
        &self,
        fetcher: &CatalogFetcher<T>,
    ) -> Result<BatchReport<(), CacheError>, CacheError>
    where
        Self: Sized,
    {
        let mut report = BatchReport::new();

        for entry in self.entries()? {
            let name = entry.source.list_name.clone();
            let result = refresh_entry(self, fetcher, &entry);
            if let Err(e) = &result {
                tracing::warn!(source = %name, error = %e, "Failed to refresh repository");
            }
            report.push(name, result);
        }

        Ok(report)
    }
}

fn refresh_entry<R: SourceRepository, T: Transport>(
    repo: &R,
    fetcher: &CatalogFetcher<T>,
    entry: &CacheEntry,
) -> Result<(), CacheError> {
    let mut updated: RepositorySource = fetcher.fetch_json(&entry.source.list_url)?;
    // Identity stays with the URL the source was fetched from
    updated.list_url = entry.source.list_url.clone();
    if updated.list_name.is_empty() {
        updated.list_name = entry.source.list_name.clone();
    }
    repo.overwrite(entry.seq, &updated)?;
    tracing::debug!(source = %updated.list_name, seq = entry.seq, "Refreshed repository");
    Ok(())
}

/// File-backed repository cache
#[derive(Debug, Clone)]
pub struct RepositoryCache {
    /// Directory holding `source.<N>.json`
    root: PathBuf,
}

impl RepositoryCache {
    /// Create a cache over `root`; the directory is created on first write
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Path of the file for sequence number `seq`
    pub fn source_path(&self, seq: u64) -> PathBuf {
        self.root.join(format!("{}{}{}", FILE_PREFIX, seq, FILE_SUFFIX))
    }

    /// Next free sequence number: current on-disk maximum + 1, or 0
    ///
    /// Unparsable files still occupy their number.
    pub fn next_sequence(&self) -> Result<u64, CacheError> {
        match self.sequence_files()?.into_iter().map(|(seq, _)| seq).max() {
            None => Ok(0),
            Some(max) => max
                .checked_add(1)
                .ok_or(CacheError::SequenceExhausted(max)),
        }
    }

    /// Cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every `source.<N>.json` file, sorted by `N`
    fn sequence_files(&self) -> Result<Vec<(u64, PathBuf)>, CacheError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(seq) = file_name.to_str().and_then(parse_sequence) else {
                continue;
            };
            if entry.file_type()?.is_file() {
                files.push((seq, entry.path()));
            }
        }

        files.sort_by_key(|(seq, _)| *seq);
        Ok(files)
    }

    fn write_source(&self, path: &Path, source: &RepositorySource) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root)?;

        let json = serde_json::to_string_pretty(source)?;
        let tmp_path = path.with_extension("json.tmp");
        let mut tmp_file = fs::File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        Ok(())
    }
}

impl SourceRepository for RepositoryCache {
    fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();

        for (seq, path) in self.sequence_files()? {
            let parsed = fs::read_to_string(&path)
                .map_err(CacheError::from)
                .and_then(|s| serde_json::from_str(&s).map_err(CacheError::from));

            match parsed {
                Ok(source) => entries.push(CacheEntry { seq, path, source }),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to parse cached source, skipping");
                }
            }
        }

        Ok(entries)
    }

    fn add(&self, source: &RepositorySource) -> Result<u64, CacheError> {
        if source.list_name.is_empty() {
            return Err(CacheError::InvalidSource("missing listName".to_string()));
        }

        let duplicate = self.entries()?.into_iter().any(|e| {
            e.source.list_name == source.list_name
                || (!source.list_url.is_empty() && e.source.list_url == source.list_url)
        });
        if duplicate {
            return Err(CacheError::DuplicateSource {
                name: source.list_name.clone(),
                url: source.list_url.clone(),
            });
        }

        let seq = self.next_sequence()?;
        self.write_source(&self.source_path(seq), source)?;
        tracing::debug!(source = %source.list_name, seq, "Cached repository");

        Ok(seq)
    }

    fn remove(&self, name_or_url: &str) -> Result<RepositorySource, CacheError> {
        let entry = self
            .entries()?
            .into_iter()
            .find(|e| e.source.matches(name_or_url))
            .ok_or_else(|| CacheError::SourceNotFound(name_or_url.to_string()))?;

        fs::remove_file(&entry.path)?;
        tracing::debug!(source = %entry.source.list_name, seq = entry.seq, "Removed repository");

        Ok(entry.source)
    }

    fn overwrite(&self, seq: u64, source: &RepositorySource) -> Result<(), CacheError> {
        self.write_source(&self.source_path(seq), source)
    }
}

/// Parse `source.<N>.json` into `N`
///
/// Only canonical decimal is accepted: no sign, no leading zeros. Otherwise
/// two file names could map to one sequence number.
fn parse_sequence(file_name: &str) -> Option<u64> {
    let digits = file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?;

    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return None;
    }

    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(name: &str) -> RepositorySource {
        RepositorySource::new(name, format!("https://example.com/{}.json", name))
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("source.0.json"), Some(0));
        assert_eq!(parse_sequence("source.17.json"), Some(17));
        assert_eq!(parse_sequence("source.json"), None);
        assert_eq!(parse_sequence("source.x.json"), None);
        assert_eq!(parse_sequence("source.-1.json"), None);
        assert_eq!(parse_sequence("other.1.json"), None);
        assert_eq!(parse_sequence("source.1.json.tmp"), None);
        assert_eq!(parse_sequence("source.01.json"), None);
        assert_eq!(parse_sequence("source.+1.json"), None);
        assert_eq!(parse_sequence("source.00.json"), None);
        assert_eq!(parse_sequence("source.10.json"), Some(10));
    }

    #[test]
    fn test_non_canonical_name_not_cached() {
        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(temp.path().to_path_buf());
        fs::write(
            temp.path().join("source.01.json"),
            serde_json::to_string(&source("a")).unwrap(),
        )
        .unwrap();

        assert!(cache.list().unwrap().is_empty());
        assert_eq!(cache.next_sequence().unwrap(), 0);
    }

    #[test]
    fn test_sequence_exhausted() {
        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(temp.path().to_path_buf());
        cache.add(&source("a")).unwrap();
        let before = fs::read(cache.source_path(0)).unwrap();
        fs::write(
            cache.source_path(u64::MAX),
            serde_json::to_string(&source("last")).unwrap(),
        )
        .unwrap();

        let result = cache.add(&source("b"));

        assert!(matches!(result, Err(CacheError::SequenceExhausted(n)) if n == u64::MAX));
        assert_eq!(fs::read(cache.source_path(0)).unwrap(), before);
    }

    #[test]
    fn test_empty_cache() {
        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(temp.path().join("cache"));
        assert!(cache.list().unwrap().is_empty());
        assert_eq!(cache.next_sequence().unwrap(), 0);
    }

    #[test]
    fn test_add_allocates_sequence() {
        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(temp.path().to_path_buf());

        assert_eq!(cache.add(&source("a")).unwrap(), 0);
        assert_eq!(cache.add(&source("b")).unwrap(), 1);
        assert!(cache.source_path(1).exists());
    }

    #[test]
    fn test_corrupt_file_skipped_but_keeps_number() {
        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(temp.path().to_path_buf());

        cache.add(&source("a")).unwrap();
        fs::write(cache.source_path(5), "not json").unwrap();

        assert_eq!(cache.list().unwrap().len(), 1);
        assert_eq!(cache.next_sequence().unwrap(), 6);
    }

    #[test]
    fn test_overwrite_in_place() {
        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(temp.path().to_path_buf());

        let seq = cache.add(&source("a")).unwrap();
        let updated = source("a").with_module("m", "https://example.com/m.zip");
        cache.overwrite(seq, &updated).unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].seq, seq);
        assert_eq!(entries[0].source, updated);
    }
}
