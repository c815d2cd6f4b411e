//! Module name resolution
//!
//! Looks a module name up across cached sources in cache order. The first
//! source publishing the name wins; later sources publishing the same name
//! are shadowed silently.

use crate::cache::{CacheError, SourceRepository};
use crate::source::RepositorySource;

/// A module located in a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Module name as requested
    pub name: String,
    /// Archive download URL
    pub url: String,
    /// Source that published it
    pub source: RepositorySource,
}

/// Find `module` in `sources`, first match wins
pub fn resolve_in(sources: &[RepositorySource], module: &str) -> Option<ResolvedModule> {
    sources.iter().find_map(|source| {
        source.module_url(module).map(|url| ResolvedModule {
            name: module.to_string(),
            url: url.to_string(),
            source: source.clone(),
        })
    })
}

/// Resolves module names against a source repository
pub struct ModuleResolver<'a, R> {
    sources: &'a R,
}

impl<'a, R: SourceRepository> ModuleResolver<'a, R> {
    /// Create a resolver over `sources`
    pub fn new(sources: &'a R) -> Self {
        Self { sources }
    }

    /// Resolve `module`; `Ok(None)` when no source publishes it
    pub fn resolve(&self, module: &str) -> Result<Option<ResolvedModule>, CacheError> {
        let sources = self.sources.list()?;
        Ok(resolve_in(&sources, module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_source_wins() {
        let sources = vec![
            RepositorySource::new("first", "https://a.example/list.json")
                .with_module("@ns/mod", "https://a.example/mod.zip"),
            RepositorySource::new("second", "https://b.example/list.json")
                .with_module("@ns/mod", "https://b.example/mod.zip"),
        ];

        let resolved = resolve_in(&sources, "@ns/mod").unwrap();
        assert_eq!(resolved.url, "https://a.example/mod.zip");
        assert_eq!(resolved.source.list_name, "first");
    }

    #[test]
    fn test_falls_through_to_later_source() {
        let sources = vec![
            RepositorySource::new("first", "https://a.example/list.json"),
            RepositorySource::new("second", "https://b.example/list.json")
                .with_module("plain", "https://b.example/plain.zip"),
        ];

        let resolved = resolve_in(&sources, "plain").unwrap();
        assert_eq!(resolved.source.list_name, "second");
    }

    #[test]
    fn test_not_found() {
        let sources = vec![RepositorySource::new("first", "https://a.example/list.json")];
        assert!(resolve_in(&sources, "missing").is_none());
        assert!(resolve_in(&[], "missing").is_none());
    }
}
