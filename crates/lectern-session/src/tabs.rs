use crate::error::{Result, SessionError};
use lectern::v1::{Document, Section, Subsection, query};
use std::fmt;
use std::sync::Arc;

/// Stable identity of a tab within one [`TabSet`].
///
/// Ids are never reused, so an id held across a removal cannot silently
/// address a different tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// One open reading position.
#[derive(Debug, Clone)]
pub struct Tab {
    id: TabId,
    document: Arc<Document>,
    section_index: usize,
    subsection: u32,
    scroll_offset: u64,
}

impl Tab {
    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn document_id(&self) -> &str {
        &self.document.id
    }

    /// Position of the section in the document's section list.
    pub fn section_index(&self) -> usize {
        self.section_index
    }

    /// 1-based subsection number.
    pub fn subsection_number(&self) -> u32 {
        self.subsection
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn section(&self) -> &Section {
        // Checked on insertion; documents are immutable.
        &self.document.sections[self.section_index]
    }

    pub fn subsection(&self) -> &Subsection {
        &self.section().subsections[self.subsection as usize - 1]
    }

    /// Display label such as `"NKJV Genesis 3"`.
    pub fn label(&self) -> String {
        query::tab_label(self.document_id(), self.section(), self.subsection)
    }

    fn is_at(&self, document_id: &str, section_index: usize, subsection: u32) -> bool {
        self.document.id == document_id
            && self.section_index == section_index
            && self.subsection == subsection
    }
}

/// Ordered open tabs plus the active selection.
///
/// `active` is `Some` exactly when the set is non-empty.
#[derive(Debug, Clone, Default)]
pub struct TabSet {
    tabs: Vec<Tab>,
    active: Option<usize>,
    next_id: u64,
}

impl TabSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a reading position, or focus it if it is already open.
    ///
    /// A position already present is selected and its id returned; nothing
    /// is inserted. Otherwise a new tab is appended with a zero scroll offset
    /// and selected when `focus` is set (or when it is the only tab).
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidReference`] if `section_index` or `subsection`
    /// does not exist in `document`.
    pub fn add_tab(
        &mut self,
        document: Arc<Document>,
        section_index: usize,
        subsection: u32,
        focus: bool,
    ) -> Result<TabId> {
        if document.position(section_index, subsection).is_none() {
            return Err(SessionError::InvalidReference(format!(
                "{} has no section {} subsection {}",
                document.id, section_index, subsection
            )));
        }

        if let Some(position) = self
            .tabs
            .iter()
            .position(|t| t.is_at(&document.id, section_index, subsection))
        {
            self.active = Some(position);
            return Ok(self.tabs[position].id);
        }

        let id = TabId(self.next_id);
        self.next_id += 1;
        self.tabs.push(Tab {
            id,
            document,
            section_index,
            subsection,
            scroll_offset: 0,
        });
        if focus || self.active.is_none() {
            self.active = Some(self.tabs.len() - 1);
        }
        Ok(id)
    }

    /// Close a tab by identity.
    ///
    /// Closing a tab at or before the selection moves the selection back by
    /// one (never below zero). Returns `None` if no such tab is open.
    pub fn remove_tab(&mut self, id: TabId) -> Option<Tab> {
        let position = self.position(id)?;
        let tab = self.tabs.remove(position);
        self.active = match self.active {
            _ if self.tabs.is_empty() => None,
            Some(active) if position <= active => Some(active.saturating_sub(1)),
            other => other,
        };
        Some(tab)
    }

    /// Record a new scroll offset for one tab. Returns `false` if the tab is
    /// not open.
    pub fn set_scroll(&mut self, id: TabId, offset: u64) -> bool {
        match self.tabs.iter_mut().find(|t| t.id == id) {
            Some(tab) => {
                tab.scroll_offset = offset;
                true
            }
            None => false,
        }
    }

    /// Select the tab at `index`.
    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.tabs.len() {
            return Err(SessionError::InvalidReference(format!(
                "no tab at index {} ({} open)",
                index,
                self.tabs.len()
            )));
        }
        self.active = Some(index);
        Ok(())
    }

    /// Select a tab by identity.
    pub fn select_tab(&mut self, id: TabId) -> Result<()> {
        let position = self
            .position(id)
            .ok_or_else(|| SessionError::InvalidReference(format!("{} is not open", id)))?;
        self.active = Some(position);
        Ok(())
    }

    /// Set the selection from an untrusted index, clamping into bounds.
    pub(crate) fn restore_active(&mut self, index: usize) {
        self.active = match self.tabs.len() {
            0 => None,
            len => Some(index.min(len - 1)),
        };
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Tab at `index` in display order.
    pub fn at(&self, index: usize) -> Option<&Tab> {
        self.tabs.get(index)
    }

    pub fn position(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active.and_then(|i| self.tabs.get(i))
    }

    /// Distinct ids of the documents referenced by open tabs, in tab order.
    pub fn document_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for tab in &self.tabs {
            if !ids.contains(&tab.document_id()) {
                ids.push(tab.document_id());
            }
        }
        ids
    }

    /// Tabs that reference the given document.
    pub fn tabs_for<'a>(&'a self, document_id: &'a str) -> impl Iterator<Item = &'a Tab> + 'a {
        self.tabs.iter().filter(move |t| t.document_id() == document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Arc<Document> {
        let chapters = |n: u32| {
            (1..=n).fold(Section::new("genesis", "Genesis"), |s, i| {
                s.with_subsection(Subsection::new(i).with_unit(1, format!("verse {}", i)))
            })
        };
        Arc::new(
            Document::new(id, id.to_uppercase(), "Christian Canon")
                .with_section(chapters(4))
                .with_section(Section::new("exodus", "Exodus").with_subsection(Subsection::new(1))),
        )
    }

    fn three_tabs() -> (TabSet, Vec<TabId>) {
        let nkjv = doc("nkjv");
        let mut tabs = TabSet::new();
        let ids = (1..=3)
            .map(|n| tabs.add_tab(nkjv.clone(), 0, n, true).unwrap())
            .collect();
        (tabs, ids)
    }

    #[test]
    fn test_empty_set_has_no_selection() {
        let tabs = TabSet::new();
        assert!(tabs.is_empty());
        assert_eq!(tabs.active(), None);
        assert!(tabs.active_tab().is_none());
    }

    #[test]
    fn test_first_tab_is_selected_without_focus() {
        let mut tabs = TabSet::new();
        tabs.add_tab(doc("kjv"), 0, 1, false).unwrap();
        assert_eq!(tabs.active(), Some(0));

        tabs.add_tab(doc("kjv"), 0, 2, false).unwrap();
        assert_eq!(tabs.active(), Some(0));

        tabs.add_tab(doc("kjv"), 0, 3, true).unwrap();
        assert_eq!(tabs.active(), Some(2));
    }

    #[test]
    fn test_add_existing_focuses_instead_of_duplicating() {
        let nkjv = doc("nkjv");
        let mut tabs = TabSet::new();
        let first = tabs.add_tab(nkjv.clone(), 0, 3, true).unwrap();
        tabs.add_tab(nkjv.clone(), 1, 1, true).unwrap();
        assert_eq!(tabs.active(), Some(1));

        let again = tabs.add_tab(nkjv.clone(), 0, 3, true).unwrap();
        assert_eq!(again, first);
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs.active(), Some(0));
    }

    #[test]
    fn test_same_position_in_other_document_is_distinct() {
        let mut tabs = TabSet::new();
        tabs.add_tab(doc("nkjv"), 0, 1, true).unwrap();
        tabs.add_tab(doc("kjv"), 0, 1, true).unwrap();
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs.document_ids(), vec!["nkjv", "kjv"]);
    }

    #[test]
    fn test_add_out_of_range_is_rejected() {
        let mut tabs = TabSet::new();
        let err = tabs.add_tab(doc("nkjv"), 0, 9, true).unwrap_err();
        assert!(matches!(err, SessionError::InvalidReference(_)));
        assert!(tabs.add_tab(doc("nkjv"), 7, 1, true).is_err());
        assert!(tabs.add_tab(doc("nkjv"), 0, 0, true).is_err());
        assert!(tabs.is_empty());
    }

    #[test]
    fn test_remove_before_active_shifts_selection() {
        let (mut tabs, ids) = three_tabs();
        assert_eq!(tabs.active(), Some(2));
        tabs.remove_tab(ids[0]).unwrap();
        assert_eq!(tabs.active(), Some(1));
        assert_eq!(tabs.active_tab().unwrap().id(), ids[2]);
    }

    #[test]
    fn test_remove_active_selects_previous() {
        let (mut tabs, ids) = three_tabs();
        tabs.select(1).unwrap();
        tabs.remove_tab(ids[1]).unwrap();
        assert_eq!(tabs.active(), Some(0));
        assert_eq!(tabs.active_tab().unwrap().id(), ids[0]);
    }

    #[test]
    fn test_remove_first_when_active_clamps_to_zero() {
        let (mut tabs, ids) = three_tabs();
        tabs.select(0).unwrap();
        tabs.remove_tab(ids[0]).unwrap();
        assert_eq!(tabs.active(), Some(0));
        assert_eq!(tabs.active_tab().unwrap().id(), ids[1]);
    }

    #[test]
    fn test_remove_after_active_keeps_selection() {
        let (mut tabs, ids) = three_tabs();
        tabs.select(0).unwrap();
        tabs.remove_tab(ids[2]).unwrap();
        assert_eq!(tabs.active(), Some(0));
    }

    #[test]
    fn test_remove_last_tab_clears_selection() {
        let mut tabs = TabSet::new();
        let id = tabs.add_tab(doc("kjv"), 0, 1, true).unwrap();
        let removed = tabs.remove_tab(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(tabs.is_empty());
        assert_eq!(tabs.active(), None);
        assert!(tabs.remove_tab(id).is_none());
    }

    #[test]
    fn test_scroll_is_keyed_by_identity() {
        let (mut tabs, ids) = three_tabs();
        assert!(tabs.set_scroll(ids[2], 300));
        tabs.remove_tab(ids[0]).unwrap();
        assert!(tabs.set_scroll(ids[1], 40));
        assert!(!tabs.set_scroll(ids[0], 999));

        assert_eq!(tabs.get(ids[1]).unwrap().scroll_offset(), 40);
        assert_eq!(tabs.get(ids[2]).unwrap().scroll_offset(), 300);
        assert_eq!(tabs.active(), Some(1));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut tabs = TabSet::new();
        let a = tabs.add_tab(doc("kjv"), 0, 1, true).unwrap();
        tabs.remove_tab(a).unwrap();
        let b = tabs.add_tab(doc("kjv"), 0, 1, true).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_select_and_lookup() {
        let (mut tabs, ids) = three_tabs();
        assert!(tabs.select(3).is_err());
        tabs.select_tab(ids[1]).unwrap();
        assert_eq!(tabs.active(), Some(1));
        assert_eq!(tabs.at(1).unwrap().subsection_number(), 2);
        assert_eq!(tabs.position(ids[2]), Some(2));
        assert_eq!(tabs.tabs_for("nkjv").count(), 3);
        assert_eq!(tabs.tabs_for("kjv").count(), 0);
    }

    #[test]
    fn test_tab_accessors() {
        let mut tabs = TabSet::new();
        let id = tabs.add_tab(doc("nkjv"), 0, 3, true).unwrap();
        let tab = tabs.get(id).unwrap();
        assert_eq!(tab.section().name, "Genesis");
        assert_eq!(tab.subsection().units[0].text, "verse 3");
        assert_eq!(tab.label(), "NKJV Genesis 3");
        assert_eq!(tab.id().to_string(), "tab-0");
    }

    #[test]
    fn test_restore_active_clamps() {
        let (mut tabs, _) = three_tabs();
        tabs.restore_active(10);
        assert_eq!(tabs.active(), Some(2));

        let mut empty = TabSet::new();
        empty.restore_active(1);
        assert_eq!(empty.active(), None);
    }
}
