//! A reading session bound to an address.
//!
//! The session starts in [`Phase::Restoring`], decodes whatever token the
//! address carries, and only then moves to [`Phase::Ready`]. From that point
//! every change to the tab set is written back to the address in place.

use crate::codec::{self, DEFAULT_PARAM};
use crate::error::Result;
use crate::registry::DocumentRegistry;
use crate::tabs::{Tab, TabId, TabSet};
use lectern::v1::Document;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Restoring,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Query parameter holding the token.
    pub param: String,
    /// Minimum spacing between address writes caused by scrolling.
    pub scroll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            param: DEFAULT_PARAM.to_string(),
            scroll_interval: Duration::from_millis(250),
        }
    }
}

impl SessionConfig {
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    pub fn with_scroll_interval(mut self, interval: Duration) -> Self {
        self.scroll_interval = interval;
        self
    }
}

/// The page address a session lives in.
///
/// `replace` must not create a history entry.
pub trait AddressBar {
    fn current(&self) -> Url;
    fn replace(&mut self, url: Url);
}

/// An address held in memory, counting how often it was replaced.
#[derive(Debug, Clone)]
pub struct MemoryAddress {
    url: Url,
    replacements: usize,
}

impl MemoryAddress {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            replacements: 0,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }
}

impl AddressBar for MemoryAddress {
    fn current(&self) -> Url {
        self.url.clone()
    }

    fn replace(&mut self, url: Url) {
        self.url = url;
        self.replacements += 1;
    }
}

/// Tab set, registry and address wired together.
#[derive(Debug)]
pub struct Session<A> {
    registry: Arc<DocumentRegistry>,
    address: A,
    config: SessionConfig,
    tabs: TabSet,
    phase: Phase,
    last_scroll_write: Option<Instant>,
    scroll_dirty: bool,
}

impl<A: AddressBar> Session<A> {
    pub fn new(registry: Arc<DocumentRegistry>, address: A, config: SessionConfig) -> Self {
        Self {
            registry,
            address,
            config,
            tabs: TabSet::new(),
            phase: Phase::Restoring,
            last_scroll_write: None,
            scroll_dirty: false,
        }
    }

    /// Rebuild the tab set from the address and enter [`Phase::Ready`].
    ///
    /// A missing or malformed token yields an empty session. The address is
    /// written exactly once on the way out, whatever was restored. Calling
    /// this again once ready re-reads the address and replaces the tab set.
    ///
    /// If the returned future is dropped before it finishes, the previous tab
    /// set and address are left as they were and the session is still Ready.
    pub async fn restore(&mut self) -> Result<&TabSet> {
        let restoring = Restoring::enter(&mut self.phase);
        let url = self.address.current();
        let snapshot = match codec::read_token(&url, &self.config.param) {
            None => None,
            Some(token) => match codec::decode_token(&token) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(error = %e, "discarding malformed session token");
                    None
                }
            },
        };

        self.tabs = match snapshot {
            Some(snapshot) => codec::restore(&self.registry, &snapshot).await,
            None => TabSet::new(),
        };
        restoring.finish();
        info!(tabs = self.tabs.len(), active = ?self.tabs.active(), "session restored");

        self.write_address()?;
        Ok(&self.tabs)
    }

    /// Open a loaded document at a position. See [`TabSet::add_tab`].
    pub fn add_tab(
        &mut self,
        document: Arc<Document>,
        section_index: usize,
        subsection: u32,
        focus: bool,
    ) -> Result<TabId> {
        let id = self
            .tabs
            .add_tab(document, section_index, subsection, focus)?;
        self.commit()?;
        Ok(id)
    }

    /// Load a document through the registry, then open it.
    pub async fn open(
        &mut self,
        document_id: &str,
        section_index: usize,
        subsection: u32,
        focus: bool,
    ) -> Result<TabId> {
        let document = self.registry.load(document_id).await?;
        self.add_tab(document, section_index, subsection, focus)
    }

    pub fn remove_tab(&mut self, id: TabId) -> Result<Option<Tab>> {
        let removed = self.tabs.remove_tab(id);
        if removed.is_some() {
            self.commit()?;
        }
        Ok(removed)
    }

    pub fn select(&mut self, index: usize) -> Result<()> {
        self.tabs.select(index)?;
        self.commit()
    }

    pub fn select_tab(&mut self, id: TabId) -> Result<()> {
        self.tabs.select_tab(id)?;
        self.commit()
    }

    /// Record a scroll offset.
    ///
    /// The offset is kept exactly, but the address is rewritten at most once
    /// per `scroll_interval`. A skipped write stays pending until the next
    /// scroll or mutation, [`flush`](Self::flush), or the deadline reported
    /// by [`pending_flush`](Self::pending_flush). Returns `false` if the tab
    /// is not open.
    pub fn set_scroll(&mut self, id: TabId, offset: u64) -> Result<bool> {
        if !self.tabs.set_scroll(id, offset) {
            return Ok(false);
        }
        if self.phase != Phase::Ready {
            return Ok(true);
        }

        let due = self
            .last_scroll_write
            .is_none_or(|at| at.elapsed() >= self.config.scroll_interval);
        if due {
            self.write_address()?;
            self.last_scroll_write = Some(Instant::now());
        } else {
            self.scroll_dirty = true;
        }
        Ok(true)
    }

    /// Write any scroll state held back by the throttle.
    pub fn flush(&mut self) -> Result<()> {
        if self.scroll_dirty && self.phase == Phase::Ready {
            self.write_address()?;
            self.last_scroll_write = Some(Instant::now());
        }
        Ok(())
    }

    /// When held-back scroll state falls due, or `None` if nothing is held.
    pub fn pending_flush(&self) -> Option<Instant> {
        if !self.scroll_dirty || self.phase != Phase::Ready {
            return None;
        }
        let interval = self.config.scroll_interval;
        Some(self.last_scroll_write.map_or_else(Instant::now, |at| at + interval))
    }

    /// Flush if the pending deadline has passed at `now`. For hosts that
    /// drive the session from their own tick. Returns whether it wrote.
    pub fn poll_flush(&mut self, now: Instant) -> Result<bool> {
        match self.pending_flush() {
            Some(deadline) if deadline <= now => {
                self.flush()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Wait for the pending deadline, then write the held-back scroll state.
    /// Returns at once when nothing is pending.
    pub async fn settle(&mut self) -> Result<()> {
        if let Some(deadline) = self.pending_flush() {
            debug!("waiting to write held-back scroll offset");
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            self.flush()?;
        }
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tabs(&self) -> &TabSet {
        &self.tabs
    }

    pub fn registry(&self) -> &Arc<DocumentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn address(&self) -> &A {
        &self.address
    }

    pub fn into_address(self) -> A {
        self.address
    }

    /// The token for the current tab set, `None` when no tabs are open.
    pub fn token(&self) -> Result<Option<String>> {
        Ok(codec::encode(&self.tabs)?)
    }

    /// Identifiers of documents some open tab still refers to.
    pub fn referenced_documents(&self) -> Vec<&str> {
        self.tabs.document_ids()
    }

    fn commit(&mut self) -> Result<()> {
        match self.phase {
            Phase::Restoring => Ok(()),
            Phase::Ready => self.write_address(),
        }
    }

    fn write_address(&mut self) -> Result<()> {
        let token = codec::encode(&self.tabs)?;
        let mut url = self.address.current();
        codec::install(&mut url, &self.config.param, token.as_deref());
        debug!(url = %url, "replacing address");
        self.address.replace(url);
        self.scroll_dirty = false;
        Ok(())
    }
}

/// Holds a session in [`Phase::Restoring`]. Dropping it without
/// [`finish`](Restoring::finish), as when a restore is cancelled, still puts
/// the session back in [`Phase::Ready`] so mutations keep writing.
struct Restoring<'a> {
    phase: &'a mut Phase,
    finished: bool,
}

impl<'a> Restoring<'a> {
    fn enter(phase: &'a mut Phase) -> Self {
        *phase = Phase::Restoring;
        Self {
            phase,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Restoring<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("session restore abandoned; keeping previous tabs");
        }
        *self.phase = Phase::Ready;
    }
}
