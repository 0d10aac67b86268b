//! Reading sessions for Lectern.
//!
//! A session is a set of open tabs, each pointing at a subsection of a
//! document, persisted into a single query parameter of the page address so
//! that a copied link reopens the same tabs. Documents are loaded lazily
//! through a shared [`DocumentRegistry`].
//!
//! # Example
//!
//! ```rust
//! use lectern::v1::{Document, Section, Subsection};
//! use lectern_session::{
//!     Catalog, DocumentRegistry, MemoryAddress, Session, SessionConfig, StaticSource,
//! };
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let kjv = Document::new("kjv", "King James Version", "Christian Canon").with_section(
//!     Section::new("genesis", "Genesis")
//!         .with_subsection(Subsection::new(1).with_unit(1, "In the beginning")),
//! );
//! let source = StaticSource::new().with_document("kjv.json", &kjv)?;
//! let catalog = Catalog::new().with_entry("kjv", "kjv.json", "King James Version", "Christian Canon");
//! let registry = Arc::new(DocumentRegistry::new(catalog, Arc::new(source)));
//!
//! let address = MemoryAddress::new("https://reader.example/".parse()?);
//! let mut session = Session::new(registry, address, SessionConfig::default());
//! session.restore().await?;
//! session.open("kjv", 0, 1, true).await?;
//!
//! assert!(session.address().url().query().unwrap().starts_with("state="));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod catalog;
pub mod codec;
pub mod error;
pub mod registry;
pub mod session;
pub mod source;
pub mod tabs;

pub use catalog::{Catalog, CatalogEntry};
pub use codec::{Snapshot, TabRef};
pub use error::{CodecError, LoadError, Result, SessionError, SourceError};
pub use registry::{DocumentRegistry, LoadState};
pub use session::{AddressBar, MemoryAddress, Phase, Session, SessionConfig};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::{DocumentSource, FileSource, StaticSource};
pub use tabs::{Tab, TabId, TabSet};
