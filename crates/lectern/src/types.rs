use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A loaded scripture document: one translation or work.
///
/// Documents are produced by an offline conversion step and are read-only
/// once parsed. The JSON field names are those of the published assets
/// (`books`, `chapters`, `verses`, `num`); the Rust side uses the neutral
/// section / subsection / unit vocabulary.
///
/// # JSON shape
///
/// ```json
/// {
///   "id": "nkjv",
///   "name": "New King James Version",
///   "category": "Christian Canon",
///   "books": [
///     {
///       "id": "genesis",
///       "name": "Genesis",
///       "chapters": [
///         { "num": 1, "verses": [ { "num": 1, "text": "In the beginning …" } ] }
///       ]
///     }
///   ]
/// }
/// ```
///
/// `category` is optional in the assets; the registry fills it in from the
/// catalog when it is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(rename = "books")]
    pub sections: Vec<Section>,
}

/// A top-level division of a document (a book).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Opaque stable key, derived externally from the name.
    pub id: String,
    pub name: String,
    #[serde(rename = "chapters")]
    pub subsections: Vec<Subsection>,
}

/// A numbered division of a section (a chapter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    #[serde(rename = "num")]
    pub number: u32,
    #[serde(rename = "verses")]
    pub units: Vec<Unit>,
}

/// The smallest addressable piece of text (a verse).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "num")]
    pub number: u32,
    pub text: String,
}

/// Structural problems found by [`Document::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("document has an empty id")]
    MissingId,

    #[error("document {0} has no sections")]
    NoSections(String),

    #[error("section {section} lists subsection {number} at position {position}")]
    SubsectionOutOfSequence {
        section: String,
        position: usize,
        number: u32,
    },

    #[error("section {section}, subsection {subsection} has a unit numbered 0")]
    ZeroUnitNumber { section: String, subsection: u32 },
}

// ============================================================================
// Convenience methods
// ============================================================================

impl Document {
    /// Create an empty document
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            sections: Vec::new(),
        }
    }

    /// Append a section
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Parse a document from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a document from raw JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Section at `index` in document order.
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Resolve a section index and subsection number to the pair they name.
    ///
    /// Returns `None` when either half is out of range.
    pub fn position(&self, section_index: usize, number: u32) -> Option<(&Section, &Subsection)> {
        let section = self.section(section_index)?;
        let subsection = section.subsection(number)?;
        Some((section, subsection))
    }

    /// Find a section by id, by name (case-insensitive), or by numeric index.
    pub fn find_section(&self, key: &str) -> Option<(usize, &Section)> {
        let key = key.trim();
        if let Some(found) = self
            .sections
            .iter()
            .enumerate()
            .find(|(_, s)| s.id == key || s.name.eq_ignore_ascii_case(key))
        {
            return Some(found);
        }
        let index: usize = key.parse().ok()?;
        self.section(index).map(|s| (index, s))
    }

    /// Check the structural invariants the session codec relies on.
    ///
    /// Subsections are addressed positionally (`number - 1`), so every
    /// subsection number must equal its position plus one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        if self.sections.is_empty() {
            return Err(ValidationError::NoSections(self.id.clone()));
        }
        for section in &self.sections {
            for (position, subsection) in section.subsections.iter().enumerate() {
                if subsection.number as usize != position + 1 {
                    return Err(ValidationError::SubsectionOutOfSequence {
                        section: section.name.clone(),
                        position,
                        number: subsection.number,
                    });
                }
                if subsection.units.iter().any(|u| u.number == 0) {
                    return Err(ValidationError::ZeroUnitNumber {
                        section: section.name.clone(),
                        subsection: subsection.number,
                    });
                }
            }
        }
        Ok(())
    }

    /// Total number of units across every section.
    pub fn unit_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.subsections)
            .map(|c| c.units.len())
            .sum()
    }
}

impl Section {
    /// Create a section with no subsections
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            subsections: Vec::new(),
        }
    }

    /// Append a subsection
    pub fn with_subsection(mut self, subsection: Subsection) -> Self {
        self.subsections.push(subsection);
        self
    }

    /// Subsection by its 1-based number.
    pub fn subsection(&self, number: u32) -> Option<&Subsection> {
        let position = (number as usize).checked_sub(1)?;
        self.subsections.get(position)
    }
}

impl Subsection {
    /// Create an empty subsection
    pub fn new(number: u32) -> Self {
        Self {
            number,
            units: Vec::new(),
        }
    }

    /// Append a unit
    pub fn with_unit(mut self, number: u32, text: impl Into<String>) -> Self {
        self.units.push(Unit {
            number,
            text: text.into(),
        });
        self
    }
}
