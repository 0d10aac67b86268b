use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Where a document lives and how to present it before it is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    /// Source-relative path of the JSON asset.
    pub location: String,
    pub name: String,
    pub category: String,
}

/// The static mapping from document identifier to asset location.
///
/// Order is significant: it is the order documents are offered in.
/// Serialized as a plain JSON array of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

const CHRISTIAN: &str = "Christian Canon";
const LATTER_DAY: &str = "Latter-day Saints Canon";

const BUILTIN: [(&str, &str, &str, &str); 10] = [
    ("nkjv", "/scriptures/bible/nkjv.json", "New King James Version", CHRISTIAN),
    ("kjv", "/scriptures/bible/kjv.json", "King James Version", CHRISTIAN),
    ("niv", "/scriptures/bible/niv.json", "New International Version", CHRISTIAN),
    ("esv", "/scriptures/bible/esv.json", "English Standard Version", CHRISTIAN),
    ("lsb", "/scriptures/bible/lsb.json", "Legacy Standard Bible", CHRISTIAN),
    ("nasb", "/scriptures/bible/nasb.json", "New American Standard Bible", CHRISTIAN),
    (
        "nrsvce",
        "/scriptures/bible/nrsvce.json",
        "New Revised Standard Version Catholic Edition",
        CHRISTIAN,
    ),
    ("bom", "/scriptures/book-of-mormon.json", "Book of Mormon", LATTER_DAY),
    ("d&c", "/scriptures/doctrine-and-covenants.json", "Doctrine & Covenants", LATTER_DAY),
    ("pogp", "/scriptures/pearl-of-great-price.json", "Pearl of Great Price", LATTER_DAY),
];

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The documents the reader ships with.
    pub fn builtin() -> Self {
        BUILTIN
            .iter()
            .fold(Self::new(), |catalog, (id, location, name, category)| {
                catalog.with_entry(*id, *location, *name, *category)
            })
    }

    /// Add an entry, replacing any existing entry with the same id in place.
    pub fn with_entry(
        mut self,
        id: impl Into<String>,
        location: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let entry = CatalogEntry {
            id: id.into(),
            location: location.into(),
            name: name.into(),
            category: category.into(),
        };
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Parse a catalog from a JSON array of entries.
    ///
    /// Duplicate ids are rejected rather than silently shadowed.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        let mut seen = HashSet::new();
        for entry in &catalog.entries {
            if entry.id.is_empty() {
                return Err(SessionError::InvalidCatalog("entry with empty id".into()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(SessionError::InvalidCatalog(format!(
                    "duplicate id {}",
                    entry.id
                )));
            }
        }
        Ok(catalog)
    }

    /// Read a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries grouped by category, in first-seen order.
    pub fn by_category(&self) -> Vec<(&str, Vec<&CatalogEntry>)> {
        let mut groups: Vec<(&str, Vec<&CatalogEntry>)> = Vec::new();
        for entry in &self.entries {
            match groups.iter_mut().find(|(c, _)| *c == entry.category) {
                Some((_, members)) => members.push(entry),
                None => groups.push((entry.category.as_str(), vec![entry])),
            }
        }
        groups
    }
}
