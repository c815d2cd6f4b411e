//! Shared fixtures: an in-memory transport and module archive builders

#![allow(dead_code)]

use statehub_pm::{
    CatalogFetcher, FetchError, ModuleManager, PmConfig, RepositorySource, Transport,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;
use url::Url;
use zip::write::SimpleFileOptions;

pub const OFFICIAL_URL: &str = "https://example.com/official.json";

/// Serves bodies from a shared map; clones see the same state
#[derive(Clone, Default)]
pub struct MemoryTransport {
    bodies: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    calls: Rc<RefCell<Vec<String>>>,
    count: Rc<Cell<usize>>,
    hooks: Rc<RefCell<HashMap<String, Box<dyn Fn()>>>>,
}

impl MemoryTransport {
    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.bodies.borrow_mut().insert(url.to_string(), body.into());
    }

    pub fn serve_source(&self, url: &str, source: &RepositorySource) {
        self.serve(url, serde_json::to_vec(source).unwrap());
    }

    /// Run `hook` each time `url` is requested, before answering
    pub fn on_request(&self, url: &str, hook: impl Fn() + 'static) {
        self.hooks
            .borrow_mut()
            .insert(url.to_string(), Box::new(hook));
    }

    pub fn body(&self, url: &str) -> Option<Vec<u8>> {
        self.bodies.borrow().get(url).cloned()
    }

    pub fn calls(&self) -> usize {
        self.count.get()
    }

    pub fn requested(&self, url: &str) -> bool {
        self.calls.borrow().iter().any(|u| u == url)
    }
}

impl Transport for MemoryTransport {
    fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.count.set(self.count.get() + 1);
        self.calls.borrow_mut().push(url.to_string());
        if let Some(hook) = self.hooks.borrow().get(url.as_str()) {
            hook();
        }
        self.bodies
            .borrow()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// A manager over a temporary state root
pub struct Fixture {
    pub temp: TempDir,
    pub transport: MemoryTransport,
    pub manager: ModuleManager<MemoryTransport>,
}

impl Fixture {
    /// Empty state root; the official catalog is served but not cached
    pub fn new(official: &RepositorySource) -> Self {
        let temp = TempDir::new().unwrap();
        let config = PmConfig::with_home(temp.path().join("home"))
            .with_temp_dir(temp.path().join("staging"))
            .with_default_source(OFFICIAL_URL);

        let transport = MemoryTransport::default();
        transport.serve_source(OFFICIAL_URL, official);

        let manager = ModuleManager::with_fetcher(config, CatalogFetcher::new(transport.clone()));

        Self {
            temp,
            transport,
            manager,
        }
    }

    pub fn staging(&self) -> PathBuf {
        self.temp.path().join("staging")
    }

    /// Staging directory is absent or empty
    pub fn staging_is_clean(&self) -> bool {
        match std::fs::read_dir(self.staging()) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

pub fn official() -> RepositorySource {
    RepositorySource::new("official", OFFICIAL_URL)
}

/// Zip holding `manifest.json` and `dist/index.js`
pub fn module_zip(manifest: &str, script: &str) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    zip.start_file("manifest.json", options).unwrap();
    zip.write_all(manifest.as_bytes()).unwrap();
    zip.add_directory("dist/", options).unwrap();
    zip.start_file("dist/index.js", options).unwrap();
    zip.write_all(script.as_bytes()).unwrap();

    zip.finish().unwrap().into_inner()
}

/// Well-formed module archive
pub fn valid_module(name: &str, version: &str) -> Vec<u8> {
    module_zip(
        &format!(
            r#"{{"name": "{}", "version": "{}", "author": "tester", "description": "test module"}}"#,
            name, version
        ),
        &format!("// {} {}", name, version),
    )
}

/// Archive URL used for `name` at `version`
pub fn archive_url(name: &str, version: &str) -> String {
    format!(
        "https://example.com/archives/{}-{}.zip",
        name.replace(['@', '/'], "_"),
        version
    )
}
