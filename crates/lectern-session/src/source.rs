//! Where document bytes come from.
//!
//! The registry never touches the filesystem or network directly; it asks a
//! [`DocumentSource`] for the asset at a catalog location and parses the
//! result itself.

use crate::error::SourceError;
use async_trait::async_trait;
use lectern::v1::Document;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Fetches raw document assets by catalog location.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the bytes stored at `location`.
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError>;
}

/// Reads assets from a directory tree.
///
/// Catalog locations are rooted paths such as `/scriptures/bible/kjv.json`;
/// the leading slash is resolved against `root`.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(location.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(SourceError::Location(location.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.resolve(location)?;
        Ok(tokio::fs::read(&path).await?)
    }
}

/// Fetches assets over HTTP relative to a base URL.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base: url::Url,
}

#[cfg(feature = "http")]
impl HttpSource {
    /// Create a source rooted at `base`. A trailing slash is added when
    /// missing so that locations resolve beneath it.
    pub fn new(mut base: url::Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base(&self) -> &url::Url {
        &self.base
    }

    fn resolve(&self, location: &str) -> Result<url::Url, SourceError> {
        self.base
            .join(location.trim_start_matches('/'))
            .map_err(|_| SourceError::Location(location.to_string()))
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        let url = self.resolve(location)?;
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// In-memory assets, for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    assets: HashMap<String, Vec<u8>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes at `location`.
    pub fn with_bytes(mut self, location: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(location.into(), bytes.into());
        self
    }

    /// Store a serialized document at `location`.
    pub fn with_document(
        self,
        location: impl Into<String>,
        document: &Document,
    ) -> Result<Self, serde_json::Error> {
        let json = document.to_json()?;
        Ok(self.with_bytes(location, json))
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        self.assets
            .get(location)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(location.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_source_reads_rooted_location() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("scriptures/bible")).unwrap();
        fs::write(temp.path().join("scriptures/bible/kjv.json"), b"{}").unwrap();

        let source = FileSource::new(temp.path());
        let bytes = source.fetch("/scriptures/bible/kjv.json").await.unwrap();
        assert_eq!(bytes, b"{}");
        assert_eq!(source.root(), temp.path());
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let temp = TempDir::new().unwrap();
        let source = FileSource::new(temp.path());
        let err = source.fetch("/missing.json").await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[tokio::test]
    async fn test_file_source_rejects_escape() {
        let temp = TempDir::new().unwrap();
        let source = FileSource::new(temp.path());
        let err = source.fetch("/../etc/passwd").await.unwrap_err();
        assert!(matches!(err, SourceError::Location(_)));
    }

    #[tokio::test]
    async fn test_static_source() {
        let doc = Document::new("kjv", "King James Version", "Christian Canon");
        let source = StaticSource::new()
            .with_document("kjv.json", &doc)
            .unwrap()
            .with_bytes("raw.json", "[]");

        let bytes = source.fetch("kjv.json").await.unwrap();
        assert_eq!(Document::from_slice(&bytes).unwrap(), doc);
        assert_eq!(source.fetch("raw.json").await.unwrap(), b"[]");
        assert!(matches!(
            source.fetch("nope.json").await,
            Err(SourceError::NotFound(_))
        ));
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_source_resolution() {
        let source = HttpSource::new(url::Url::parse("https://example.com/app").unwrap());
        assert_eq!(source.base().as_str(), "https://example.com/app/");
        let resolved = source.resolve("/scriptures/bible/kjv.json").unwrap();
        assert_eq!(
            resolved.as_str(),
            "https://example.com/app/scriptures/bible/kjv.json"
        );
    }
}
