//! Repository source documents
//!
//! A source is a catalog mapping module names to archive URLs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cached catalog document
///
/// JSON shape:
/// ```json
/// {
///   "listName": "official",
///   "listDescription": "Official modules",
///   "listUrl": "https://example.com/sources.0.json",
///   "repositories": { "@statehub/pingpong": "https://example.com/pingpong.zip" },
///   "maintainers": { "alice": "alice@example.com" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySource {
    /// Catalog identifier, unique among cached sources
    #[serde(default)]
    pub list_name: String,

    /// Free text
    #[serde(default)]
    pub list_description: String,

    /// Canonical URL this catalog is fetched from; the identity key
    #[serde(default)]
    pub list_url: String,

    /// Module name -> download URL
    pub repositories: BTreeMap<String, String>,

    /// Maintainer name -> contact address
    #[serde(default)]
    pub maintainers: BTreeMap<String, String>,
}

impl RepositorySource {
    /// Create an empty source
    pub fn new(list_name: impl Into<String>, list_url: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            list_description: String::new(),
            list_url: list_url.into(),
            repositories: BTreeMap::new(),
            maintainers: BTreeMap::new(),
        }
    }

    /// Add a module entry
    pub fn with_module(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.repositories.insert(name.into(), url.into());
        self
    }

    /// Add a maintainer entry
    pub fn with_maintainer(mut self, name: impl Into<String>, contact: impl Into<String>) -> Self {
        self.maintainers.insert(name.into(), contact.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.list_description = description.into();
        self
    }

    /// Download URL for `module`, if this source publishes it
    pub fn module_url(&self, module: &str) -> Option<&str> {
        self.repositories.get(module).map(String::as_str)
    }

    /// Whether `name_or_url` identifies this source
    pub fn matches(&self, name_or_url: &str) -> bool {
        self.list_name == name_or_url || self.list_url == name_or_url
    }

    /// Number of published modules
    pub fn module_count(&self) -> usize {
        self.repositories.len()
    }
}
