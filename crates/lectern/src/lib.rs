//! Document model for the Lectern scripture reader.
//!
//! A [`Document`](v1::Document) is an immutable tree of sections, numbered
//! subsections and numbered units of text, parsed from the JSON assets the
//! reader ships. This crate owns the model, its load-time validation and the
//! simple filters the reader offers. Session state and loading live in
//! `lectern-session`.

mod query;
mod types;

pub mod v1 {
    //! Versioned public API for Lectern documents.
    //!
    //! # Documents
    //!
    //! - [`Document`] - one translation or work
    //! - [`Section`] - a book, addressed by its index in the document
    //! - [`Subsection`] - a chapter, addressed by its 1-based number
    //! - [`Unit`] - a verse
    //! - [`ValidationError`] - structural problems found at load time
    //!
    //! # Example - build and address a document
    //!
    //! ```
    //! use lectern::v1::*;
    //!
    //! let doc = Document::new("kjv", "King James Version", "Christian Canon").with_section(
    //!     Section::new("genesis", "Genesis")
    //!         .with_subsection(Subsection::new(1).with_unit(1, "In the beginning"))
    //!         .with_subsection(Subsection::new(2).with_unit(1, "Thus the heavens")),
    //! );
    //!
    //! doc.validate().unwrap();
    //! let (section, chapter) = doc.position(0, 2).unwrap();
    //! assert_eq!(section.name, "Genesis");
    //! assert_eq!(chapter.units[0].text, "Thus the heavens");
    //! ```

    /// Case-insensitive filters, labels and links.
    pub mod query {
        pub use crate::query::{
            UnitHit, filter_sections, filter_units, normalize_query, permalink, search_document,
            tab_label,
        };
    }
    pub use crate::types::{Document, Section, Subsection, Unit, ValidationError};
}
