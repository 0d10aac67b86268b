//! Session token encoding.
//!
//! A session is stored in a single query parameter as
//! `percentEncode(base64(json))`, where the JSON is positional to keep links
//! short:
//!
//! ```json
//! [1, [["nkjv", 0, 2, 120], ["kjv", 1, 0]]]
//! ```
//!
//! The outer pair is `(active index, tab refs)`. Each ref is
//! `(document id, section index, subsection number - 1, scroll offset)`,
//! with the scroll offset left off when it is zero.

use crate::error::CodecError;
use crate::registry::DocumentRegistry;
use crate::tabs::{Tab, TabSet};
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::{debug, warn};
use url::Url;

/// Query parameter that carries the session.
pub const DEFAULT_PARAM: &str = "state";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Compact reference to one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRef {
    pub document_id: String,
    pub section_index: usize,
    /// 1-based subsection number. Stored zero-based on the wire.
    pub subsection: u32,
    pub scroll_offset: u64,
}

impl From<&Tab> for TabRef {
    fn from(tab: &Tab) -> Self {
        Self {
            document_id: tab.document_id().to_string(),
            section_index: tab.section_index(),
            subsection: tab.subsection_number(),
            scroll_offset: tab.scroll_offset(),
        }
    }
}

impl Serialize for TabRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.scroll_offset == 0 { 3 } else { 4 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.document_id)?;
        seq.serialize_element(&self.section_index)?;
        seq.serialize_element(&self.subsection.saturating_sub(1))?;
        if self.scroll_offset != 0 {
            seq.serialize_element(&self.scroll_offset)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for TabRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TabRefVisitor;

        impl<'de> Visitor<'de> for TabRefVisitor {
            type Value = TabRef;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("[document id, section index, subsection index, scroll offset?]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TabRef, A::Error> {
                let document_id: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let section_index: usize = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let subsection_index: u32 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                let scroll_offset: u64 = seq.next_element()?.unwrap_or(0);
                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(5, &self));
                }
                let subsection = subsection_index
                    .checked_add(1)
                    .ok_or_else(|| de::Error::custom("subsection index out of range"))?;
                Ok(TabRef {
                    document_id,
                    section_index,
                    subsection,
                    scroll_offset,
                })
            }
        }

        deserializer.deserialize_seq(TabRefVisitor)
    }
}

/// Decoded session: the active index and the tab refs in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub active: usize,
    pub tabs: Vec<TabRef>,
}

impl Snapshot {
    /// Capture a tab set. Returns `None` for an empty set, which is never
    /// encoded.
    pub fn of(tabs: &TabSet) -> Option<Self> {
        let active = tabs.active()?;
        Some(Self {
            active,
            tabs: tabs.iter().map(TabRef::from).collect(),
        })
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.active, &self.tabs).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older links can carry -1 after the first tab was closed.
        let (active, tabs) = <(i64, Vec<TabRef>)>::deserialize(deserializer)?;
        Ok(Self {
            active: usize::try_from(active.max(0)).unwrap_or(usize::MAX),
            tabs,
        })
    }
}

/// Encode a snapshot into a token.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, CodecError> {
    let json = serde_json::to_string(snapshot)?;
    let base64 = STANDARD.encode(json.as_bytes());
    Ok(utf8_percent_encode(&base64, COMPONENT).to_string())
}

/// Encode a tab set, or `None` when it is empty.
pub fn encode(tabs: &TabSet) -> Result<Option<String>, CodecError> {
    Snapshot::of(tabs).map(|s| encode_snapshot(&s)).transpose()
}

/// Decode a token produced by [`encode`].
///
/// Either base64 alphabet is accepted, with or without padding, and the
/// percent-encoding layer may already have been stripped.
pub fn decode_token(token: &str) -> Result<Snapshot, CodecError> {
    let decoded = percent_decode_str(token.trim()).decode_utf8()?;
    let base64 = decoded.trim();
    let bytes = if base64.contains(['-', '_']) {
        URL_SAFE_LENIENT.decode(base64)?
    } else {
        STANDARD_LENIENT.decode(base64)?
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read the session token from an address, if present.
pub fn read_token(url: &Url, param: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == param)
        .map(|(_, v)| v.into_owned())
}

/// Write `token` into `url` in place of any existing session parameter.
///
/// The parameter keeps its position if it was already present and is
/// removed entirely when `token` is `None`. Other parameters are preserved.
/// The fragment is always cleared.
pub fn install(url: &mut Url, param: &str, token: Option<&str>) {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut placed = false;
    for (k, v) in url.query_pairs() {
        if k != param {
            pairs.push((k.into_owned(), v.into_owned()));
        } else if !placed {
            placed = true;
            if let Some(token) = token {
                pairs.push((param.to_string(), token.to_string()));
            }
        }
    }
    if let (false, Some(token)) = (placed, token) {
        pairs.push((param.to_string(), token.to_string()));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.set_fragment(None);
}

/// Rebuild a tab set from a snapshot, loading documents as needed.
///
/// Refs are resolved one at a time in token order so the resulting order
/// matches the encoded order. A ref whose document cannot be loaded, or
/// whose position does not exist in the loaded document, is dropped; the
/// active index is clamped into what remains.
pub async fn restore(registry: &DocumentRegistry, snapshot: &Snapshot) -> TabSet {
    let mut tabs = TabSet::new();
    for tab_ref in &snapshot.tabs {
        let document = match registry.load(&tab_ref.document_id).await {
            Ok(document) => document,
            Err(e) => {
                warn!(document = %tab_ref.document_id, error = %e, "dropping tab: document unavailable");
                continue;
            }
        };
        match tabs.add_tab(
            document,
            tab_ref.section_index,
            tab_ref.subsection,
            false,
        ) {
            Ok(id) => {
                tabs.set_scroll(id, tab_ref.scroll_offset);
            }
            Err(e) => {
                warn!(document = %tab_ref.document_id, error = %e, "dropping tab: position out of range");
            }
        }
    }
    tabs.restore_active(snapshot.active);
    debug!(
        requested = snapshot.tabs.len(),
        restored = tabs.len(),
        "restored tabs from snapshot"
    );
    tabs
}
