//! Filtering and lookup helpers over loaded documents.
//!
//! Matching is a plain case-insensitive substring test on a trimmed query,
//! the same rule the reader's sidebar and verse filter apply.

use crate::types::{Document, Section, Subsection, Unit};

/// A unit matched by [`search_document`], with its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitHit<'a> {
    pub section_index: usize,
    pub section: &'a Section,
    pub subsection: &'a Subsection,
    pub unit: &'a Unit,
}

/// Trim and lower-case a user query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

fn matches(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(needle)
}

/// Sections whose name contains `query`, with their indices.
///
/// An empty query matches every section.
///
/// # Examples
///
/// ```
/// use lectern::v1::{Document, Section, query};
///
/// let doc = Document::new("kjv", "King James Version", "Christian Canon")
///     .with_section(Section::new("genesis", "Genesis"))
///     .with_section(Section::new("exodus", "Exodus"))
///     .with_section(Section::new("1john", "1 John"));
///
/// let hits = query::filter_sections(&doc, "  JOHN ");
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].0, 2);
///
/// assert_eq!(query::filter_sections(&doc, "").len(), 3);
/// ```
pub fn filter_sections<'a>(document: &'a Document, query: &str) -> Vec<(usize, &'a Section)> {
    let needle = normalize_query(query);
    document
        .sections
        .iter()
        .enumerate()
        .filter(|(_, s)| matches(&s.name, &needle))
        .collect()
}

/// Units in `subsection` whose text contains `query`.
///
/// An empty query matches every unit.
pub fn filter_units<'a>(subsection: &'a Subsection, query: &str) -> Vec<&'a Unit> {
    let needle = normalize_query(query);
    subsection
        .units
        .iter()
        .filter(|u| matches(&u.text, &needle))
        .collect()
}

/// Every unit in the document whose text contains `query`, in document order.
///
/// Unlike the per-subsection filter, an empty query yields nothing.
///
/// # Examples
///
/// ```
/// use lectern::v1::{Document, Section, Subsection, query};
///
/// let doc = Document::new("kjv", "King James Version", "Christian Canon").with_section(
///     Section::new("john", "John").with_subsection(
///         Subsection::new(1)
///             .with_unit(1, "In the beginning was the Word")
///             .with_unit(2, "The same was in the beginning with God."),
///     ),
/// );
///
/// let hits = query::search_document(&doc, "beginning");
/// assert_eq!(hits.len(), 2);
/// assert_eq!(hits[1].unit.number, 2);
/// assert!(query::search_document(&doc, "   ").is_empty());
/// ```
pub fn search_document<'a>(document: &'a Document, query: &str) -> Vec<UnitHit<'a>> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for (section_index, section) in document.sections.iter().enumerate() {
        for subsection in &section.subsections {
            for unit in &subsection.units {
                if matches(&unit.text, &needle) {
                    hits.push(UnitHit {
                        section_index,
                        section,
                        subsection,
                        unit,
                    });
                }
            }
        }
    }
    hits
}

/// Short label for a reading position, e.g. `"NKJV Genesis 3"`.
pub fn tab_label(document_id: &str, section: &Section, subsection: u32) -> String {
    format!(
        "{} {} {}",
        document_id.to_uppercase(),
        section.name,
        subsection
    )
}

/// Shareable link to a single unit: `{base}/{section id}/{subsection}/{unit}`.
pub fn permalink(base: &str, section: &Section, subsection: u32, unit: u32) -> String {
    format!(
        "{}/{}/{}/{}",
        base.trim_end_matches('/'),
        section.id,
        subsection,
        unit
    )
}
