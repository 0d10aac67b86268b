use anyhow::{Context, Result};
use lectern::v1::Document;
use lectern_session::{Catalog, DocumentRegistry, DocumentSource, FileSource, HttpSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Where documents and the catalog come from, taken from the global flags.
#[derive(Debug, Clone)]
pub struct Sources {
    pub root: PathBuf,
    pub base_url: Option<Url>,
    pub catalog: Option<PathBuf>,
}

impl Sources {
    pub fn catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::from_path(path)
                .with_context(|| format!("Failed to read catalog {:?}", path)),
            None => Ok(Catalog::builtin()),
        }
    }

    /// Build a registry over the HTTP source when `--base-url` is given,
    /// otherwise over files beneath `--root`.
    pub fn registry(&self) -> Result<Arc<DocumentRegistry>> {
        let catalog = self.catalog()?;
        let source: Arc<dyn DocumentSource> = match &self.base_url {
            Some(base) => {
                debug!(base = %base, "fetching documents over HTTP");
                Arc::new(HttpSource::new(base.clone()))
            }
            None => {
                debug!(root = ?self.root, "reading documents from disk");
                Arc::new(FileSource::new(&self.root))
            }
        };
        Ok(Arc::new(DocumentRegistry::new(catalog, source)))
    }
}

pub async fn load(registry: &DocumentRegistry, id: &str) -> Result<Arc<Document>> {
    registry
        .load(id)
        .await
        .with_context(|| format!("Failed to load document {:?}", id))
}

/// Resolve a section by id, name or index, failing with the document name.
pub fn section_index(document: &Document, key: &str) -> Result<usize> {
    document
        .find_section(key)
        .map(|(index, _)| index)
        .ok_or_else(|| anyhow::anyhow!("{} has no section {:?}", document.name, key))
}
