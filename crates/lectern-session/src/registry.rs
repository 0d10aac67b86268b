//! Lazy, deduplicating document cache.
//!
//! Each identifier moves through `NotRequested -> InFlight -> Loaded`, or
//! back to `NotRequested` when a load fails. Concurrent loads of the same
//! identifier share one fetch: the first caller becomes the leader and
//! performs it, everyone else waits on a `watch` channel for the leader's
//! result. Loaded documents are never evicted.

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::LoadError;
use crate::source::DocumentSource;
use lectern::v1::Document;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

type Outcome = Option<Result<Arc<Document>, LoadError>>;

/// Where a document stands in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotRequested,
    InFlight,
    Loaded,
}

/// A load in progress. Waiters subscribe to `tx`; the leader publishes once.
struct InFlightLoad {
    tx: watch::Sender<Outcome>,
}

enum Role {
    Leader(Arc<InFlightLoad>),
    Waiter(watch::Receiver<Outcome>),
}

/// Owner of every loaded document for the lifetime of a session.
///
/// The registry is shared via `Arc` between the session and anything else
/// that renders documents.
///
/// # Concurrency
///
/// - `loaded`: `RwLock` for the read-heavy cache
/// - `inflight`: `Mutex` over pending loads, never held across an await.
///   Publishing a result (insert into `loaded`, remove from `inflight`)
///   happens under this lock, so a new caller always sees one or the other.
pub struct DocumentRegistry {
    catalog: Catalog,
    source: Arc<dyn DocumentSource>,
    loaded: RwLock<HashMap<String, Arc<Document>>>,
    inflight: Mutex<HashMap<String, Arc<InFlightLoad>>>,
}

impl std::fmt::Debug for DocumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRegistry")
            .field("catalog", &self.catalog.len())
            .field("loaded", &self.loaded_ids())
            .finish_non_exhaustive()
    }
}

impl DocumentRegistry {
    pub fn new(catalog: Catalog, source: Arc<dyn DocumentSource>) -> Self {
        Self {
            catalog,
            source,
            loaded: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Peek at a loaded document without triggering a load.
    pub fn get(&self, id: &str) -> Option<Arc<Document>> {
        self.loaded.read().get(id).cloned()
    }

    pub fn state(&self, id: &str) -> LoadState {
        if self.loaded.read().contains_key(id) {
            LoadState::Loaded
        } else if self.inflight.lock().contains_key(id) {
            LoadState::InFlight
        } else {
            LoadState::NotRequested
        }
    }

    /// Identifiers of every loaded document, sorted.
    pub fn loaded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.loaded.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Load a document, or return it from cache.
    ///
    /// Concurrent calls for one identifier collapse into a single fetch and
    /// all receive the same `Arc`. A failure is delivered to every caller
    /// waiting on that fetch and leaves nothing behind, so the next call
    /// retries.
    ///
    /// # Errors
    ///
    /// [`LoadError::UnknownDocument`] if the catalog has no such id, otherwise
    /// whatever the fetch, parse or validation step reported.
    pub async fn load(&self, id: &str) -> Result<Arc<Document>, LoadError> {
        if let Some(document) = self.get(id) {
            debug!(id, "document cache hit");
            return Ok(document);
        }

        let entry = self
            .catalog
            .get(id)
            .ok_or_else(|| LoadError::UnknownDocument(id.to_string()))?;

        let role = {
            let mut inflight = self.inflight.lock();
            // A leader may have published between the fast path and here.
            if let Some(document) = self.get(id) {
                return Ok(document);
            }
            match inflight.get(id) {
                Some(pending) => Role::Waiter(pending.tx.subscribe()),
                None => {
                    let (tx, _) = watch::channel(None);
                    let pending = Arc::new(InFlightLoad { tx });
                    inflight.insert(id.to_string(), pending.clone());
                    Role::Leader(pending)
                }
            }
        };

        match role {
            Role::Waiter(rx) => {
                debug!(id, "joining in-flight load");
                wait_for(rx, id).await
            }
            Role::Leader(pending) => {
                let guard = LoadGuard {
                    registry: self,
                    id: id.to_string(),
                    pending,
                    completed: false,
                };
                let result = self.fetch_document(id, entry).await;
                guard.complete(result)
            }
        }
    }

    async fn fetch_document(
        &self,
        id: &str,
        entry: &CatalogEntry,
    ) -> Result<Arc<Document>, LoadError> {
        debug!(id, location = %entry.location, "fetching document");
        let bytes = self
            .source
            .fetch(&entry.location)
            .await
            .map_err(|e| LoadError::Fetch {
                id: id.to_string(),
                message: e.to_string(),
            })?;

        let mut document = Document::from_slice(&bytes).map_err(|e| LoadError::Parse {
            id: id.to_string(),
            message: e.to_string(),
        })?;
        document.validate().map_err(|source| LoadError::Invalid {
            id: id.to_string(),
            source,
        })?;

        if document.category.is_empty() {
            document.category = entry.category.clone();
        }
        // Tabs and tokens name documents by the key they were loaded under.
        if document.id != id {
            warn!(id, found = %document.id, "document id differs from its catalog key; using the key");
            document.id = id.to_string();
        }

        info!(
            id,
            sections = document.sections.len(),
            units = document.unit_count(),
            "loaded document"
        );
        Ok(Arc::new(document))
    }
}

async fn wait_for(mut rx: watch::Receiver<Outcome>, id: &str) -> Result<Arc<Document>, LoadError> {
    loop {
        let current = (*rx.borrow_and_update()).clone();
        if let Some(result) = current {
            return result;
        }
        if rx.changed().await.is_err() {
            return Err(LoadError::Abandoned(id.to_string()));
        }
    }
}

/// Publishes the leader's result, or an `Abandoned` error if the leader's
/// future is dropped before it finishes, so waiters are never wedged.
struct LoadGuard<'a> {
    registry: &'a DocumentRegistry,
    id: String,
    pending: Arc<InFlightLoad>,
    completed: bool,
}

impl LoadGuard<'_> {
    fn complete(
        mut self,
        result: Result<Arc<Document>, LoadError>,
    ) -> Result<Arc<Document>, LoadError> {
        self.completed = true;
        self.publish(result.clone());
        if let Err(e) = &result {
            warn!(id = %self.id, error = %e, "document load failed");
        }
        result
    }

    fn publish(&self, result: Result<Arc<Document>, LoadError>) {
        let mut inflight = self.registry.inflight.lock();
        if let Ok(document) = &result {
            self.registry
                .loaded
                .write()
                .insert(self.id.clone(), document.clone());
        }
        if inflight
            .get(&self.id)
            .is_some_and(|p| Arc::ptr_eq(p, &self.pending))
        {
            inflight.remove(&self.id);
        }
        self.pending.tx.send_replace(Some(result));
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        warn!(id = %self.id, "document load abandoned");
        self.publish(Err(LoadError::Abandoned(self.id.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::StaticSource;
    use async_trait::async_trait;
    use lectern::v1::{Section, Subsection};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn nkjv() -> Document {
        Document::new("nkjv", "New King James Version", "").with_section(
            Section::new("genesis", "Genesis")
                .with_subsection(Subsection::new(1).with_unit(1, "In the beginning")),
        )
    }

    fn catalog() -> Catalog {
        Catalog::new().with_entry("nkjv", "nkjv.json", "New King James Version", "Christian Canon")
    }

    /// Source that counts fetches, can be held open, and can be told to fail.
    struct GatedSource {
        fetches: AtomicUsize,
        fail: AtomicBool,
        gated: AtomicBool,
        started: Notify,
        release: Notify,
        body: Vec<u8>,
    }

    impl GatedSource {
        fn new(gated: bool) -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                gated: AtomicBool::new(gated),
                started: Notify::new(),
                release: Notify::new(),
                body: nkjv().to_json().unwrap().into_bytes(),
            })
        }
    }

    #[async_trait]
    impl DocumentSource for GatedSource {
        async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            if self.gated.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(SourceError::NotFound(location.to_string()));
            }
            Ok(self.body.clone())
        }
    }

    #[tokio::test]
    async fn test_load_then_cache_hit() {
        let source = GatedSource::new(false);
        let registry = DocumentRegistry::new(catalog(), source.clone());

        assert_eq!(registry.state("nkjv"), LoadState::NotRequested);
        assert!(registry.get("nkjv").is_none());

        let first = registry.load("nkjv").await.unwrap();
        let second = registry.load("nkjv").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(registry.state("nkjv"), LoadState::Loaded);
        assert_eq!(registry.loaded_ids(), vec!["nkjv".to_string()]);
    }

    #[tokio::test]
    async fn test_category_filled_from_catalog() {
        let source = GatedSource::new(false);
        let registry = DocumentRegistry::new(catalog(), source);
        let doc = registry.load("nkjv").await.unwrap();
        assert_eq!(doc.category, "Christian Canon");
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let source = GatedSource::new(true);
        let registry = Arc::new(DocumentRegistry::new(catalog(), source.clone()));

        let r1 = registry.clone();
        let h1 = tokio::spawn(async move { r1.load("nkjv").await });

        // Wait for the leader to enter the fetch
        source.started.notified().await;
        assert_eq!(registry.state("nkjv"), LoadState::InFlight);

        let r2 = registry.clone();
        let h2 = tokio::spawn(async move { r2.load("nkjv").await });

        // Give the second caller time to subscribe
        tokio::time::sleep(Duration::from_millis(20)).await;
        source.release.notify_one();

        let (a, b) = tokio::join!(h1, h2);
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.state("nkjv"), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_failure_reaches_waiters_and_is_retried() {
        let source = GatedSource::new(true);
        source.fail.store(true, Ordering::SeqCst);
        let registry = Arc::new(DocumentRegistry::new(catalog(), source.clone()));

        let r1 = registry.clone();
        let h1 = tokio::spawn(async move { r1.load("nkjv").await });
        source.started.notified().await;

        let r2 = registry.clone();
        let h2 = tokio::spawn(async move { r2.load("nkjv").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        source.release.notify_one();

        let (a, b) = tokio::join!(h1, h2);
        let a = a.unwrap().unwrap_err();
        let b = b.unwrap().unwrap_err();
        assert!(matches!(a, LoadError::Fetch { .. }));
        assert_eq!(a, b);
        assert_eq!(registry.state("nkjv"), LoadState::NotRequested);

        // Next call retries and succeeds
        source.fail.store(false, Ordering::SeqCst);
        source.gated.store(false, Ordering::SeqCst);
        let doc = registry.load("nkjv").await.unwrap();
        assert_eq!(doc.id, "nkjv");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_leader_releases_waiters() {
        let source = GatedSource::new(true);
        let registry = Arc::new(DocumentRegistry::new(catalog(), source.clone()));

        let r1 = registry.clone();
        let leader = tokio::spawn(async move { r1.load("nkjv").await });
        source.started.notified().await;

        let r2 = registry.clone();
        let waiter = tokio::spawn(async move { r2.load("nkjv").await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader.abort();
        let _ = leader.await;

        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err, LoadError::Abandoned("nkjv".into()));
        assert_eq!(registry.state("nkjv"), LoadState::NotRequested);
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let source = GatedSource::new(false);
        let registry = DocumentRegistry::new(catalog(), source.clone());
        let err = registry.load("vulgate").await.unwrap_err();
        assert_eq!(err, LoadError::UnknownDocument("vulgate".into()));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_publishes_nothing() {
        let source = StaticSource::new().with_bytes("nkjv.json", "{not json");
        let registry = DocumentRegistry::new(catalog(), Arc::new(source));
        let err = registry.load("nkjv").await.unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(registry.get("nkjv").is_none());
        assert_eq!(registry.state("nkjv"), LoadState::NotRequested);
    }

    #[tokio::test]
    async fn test_invalid_document_rejected() {
        let broken = Document::new("nkjv", "New King James Version", "").with_section(
            Section::new("genesis", "Genesis").with_subsection(Subsection::new(2)),
        );
        let source = StaticSource::new()
            .with_document("nkjv.json", &broken)
            .unwrap();
        let registry = DocumentRegistry::new(catalog(), Arc::new(source));
        let err = registry.load("nkjv").await.unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
        assert!(registry.get("nkjv").is_none());
    }

    #[tokio::test]
    async fn test_catalog_key_overrides_asset_id() {
        let dc = Document::new("dc", "Doctrine & Covenants", "").with_section(
            Section::new("section-1", "Section 1")
                .with_subsection(Subsection::new(1).with_unit(1, "Hearken, O ye people")),
        );
        let source = StaticSource::new().with_document("dc.json", &dc).unwrap();
        let catalog = Catalog::new().with_entry(
            "d&c",
            "dc.json",
            "Doctrine & Covenants",
            "Latter-day Saints Canon",
        );
        let registry = DocumentRegistry::new(catalog, Arc::new(source));

        let doc = registry.load("d&c").await.unwrap();
        assert_eq!(doc.id, "d&c");
        assert!(Arc::ptr_eq(&doc, &registry.get("d&c").unwrap()));
        assert!(registry.get("dc").is_none());
    }
}
