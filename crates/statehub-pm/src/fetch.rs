//! Catalog and archive fetching
//!
//! Downloads catalog documents and module archives over HTTPS. The scheme
//! check happens before the transport is touched, so a rejected URL never
//! causes network I/O.

use crate::config::HttpConfig;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL is unparsable or not HTTPS
    #[error("Invalid URL - only HTTPS URLs are allowed: {0}")]
    InvalidUrl(String),

    /// Non-success HTTP status
    #[error("Failed to fetch {url}: HTTP {status}")]
    Status { status: u16, url: String },

    /// Connection, TLS or protocol failure
    #[error("Failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    ClientInit(#[source] reqwest::Error),

    /// Body is not the expected JSON document
    #[error("Invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Body could not be read to the end
    #[error("Failed to read response from {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Content too large
    #[error("Content too large from {url}: {size} bytes (max: {max})")]
    ContentTooLarge { url: String, size: u64, max: u64 },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A GET capability returning the complete response body
///
/// Implementations only ever see URLs that already passed [`validate_url`].
pub trait Transport {
    /// Fetch the full body of `url`
    fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTPS transport backed by reqwest
pub struct HttpTransport {
    client: Client,
    max_size: u64,
}

impl HttpTransport {
    /// Create a transport from HTTP settings
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(FetchError::ClientInit)?;

        Ok(Self {
            client,
            max_size: config.max_content_size,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_size {
                return Err(FetchError::ContentTooLarge {
                    url: url.to_string(),
                    size: len,
                    max: self.max_size,
                });
            }
        }

        read_limited(response, self.max_size, url)
    }
}

/// Read a body with a size limit; a body that exceeds it is never returned
fn read_limited<R: Read>(reader: R, max_size: u64, url: &Url) -> Result<Vec<u8>, FetchError> {
    let mut content = Vec::new();
    reader
        .take(max_size + 1)
        .read_to_end(&mut content)
        .map_err(|source| FetchError::Read {
            url: url.to_string(),
            source,
        })?;

    if content.len() as u64 > max_size {
        return Err(FetchError::ContentTooLarge {
            url: url.to_string(),
            size: content.len() as u64,
            max: max_size,
        });
    }

    Ok(content)
}

/// Result of downloading a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// Number of bytes written
    pub size: u64,
    /// SHA-256 checksum (hex-encoded)
    pub checksum: String,
}

/// Fetches JSON documents and files over HTTPS
pub struct CatalogFetcher<T = HttpTransport> {
    transport: T,
}

impl CatalogFetcher<HttpTransport> {
    /// Create a fetcher using the real HTTPS client
    pub fn http(config: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self::new(HttpTransport::new(config)?))
    }
}

impl<T: Transport> CatalogFetcher<T> {
    /// Create a fetcher over any transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Fetch and deserialize a JSON document
    pub fn fetch_json<D: DeserializeOwned>(&self, url: &str) -> Result<D, FetchError> {
        let parsed = validate_url(url)?;
        let body = self.transport.get(&parsed)?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Json {
            url: url.to_string(),
            source,
        })
    }

    /// Download `url` to `dest`
    ///
    /// The whole body is held before anything is written; it lands in a
    /// sibling `.part` file first and is renamed into place, so `dest` is
    /// either absent or complete.
    pub fn fetch_file(&self, url: &str, dest: &Path) -> Result<FetchedFile, FetchError> {
        let parsed = validate_url(url)?;
        let body = self.transport.get(&parsed)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut part_name = dest.as_os_str().to_owned();
        part_name.push(".part");
        let part_path = Path::new(&part_name);

        let written = write_and_rename(&body, part_path, dest);
        if written.is_err() {
            let _ = fs::remove_file(part_path);
        }
        written?;

        Ok(FetchedFile {
            size: body.len() as u64,
            checksum: compute_checksum(&body),
        })
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn write_and_rename(body: &[u8], part_path: &Path, dest: &Path) -> Result<(), FetchError> {
    let mut file = fs::File::create(part_path)?;
    file.write_all(body)?;
    file.sync_all()?;
    fs::rename(part_path, dest)?;
    Ok(())
}

/// Parse `url` and require the `https` scheme
pub fn validate_url(url: &str) -> Result<Url, FetchError> {
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "https" => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

/// Compute SHA-256 checksum of bytes
pub fn compute_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
