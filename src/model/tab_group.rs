use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::sys::runtime::WindowId;

new_key_type! { pub struct TabGroupId; }

/// Resolved tab-strip parameters for one group (the scoped config store
/// supplies the values at creation time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabstripLayout {
    pub url: String,
    pub height: f64,
}

/// Outcome of removing a tab, consumed by the desktop model to decide
/// activation changes and teardown.
#[derive(Debug, PartialEq)]
pub(crate) struct RemovedTab {
    pub was_active: bool,
    pub next_active: Option<WindowId>,
}

/// A set of windows sharing one tab-strip window. All tab bodies share
/// identical bounds; only the active tab is shown. Groups with fewer than
/// two tabs are torn down by the model.
#[derive(Debug)]
pub struct TabGroup {
    seq: u64,
    tab_strip: WindowId,
    tabs: Vec<WindowId>,
    active_tab: Option<WindowId>,
    layout: TabstripLayout,
}

impl TabGroup {
    pub(crate) fn new(seq: u64, tab_strip: WindowId, layout: TabstripLayout) -> Self {
        Self { seq, tab_strip, tabs: Vec::new(), active_tab: None, layout }
    }

    /// Monotonically assigned display id, the handle clients address the
    /// group by.
    pub fn seq(&self) -> u64 { self.seq }

    pub fn tab_strip(&self) -> &WindowId { &self.tab_strip }

    pub fn tabs(&self) -> &[WindowId] { &self.tabs }

    pub fn len(&self) -> usize { self.tabs.len() }

    pub fn is_empty(&self) -> bool { self.tabs.is_empty() }

    pub fn contains(&self, id: &WindowId) -> bool { self.tabs.iter().any(|t| t == id) }

    pub fn active_tab(&self) -> Option<&WindowId> { self.active_tab.as_ref() }

    pub fn layout(&self) -> &TabstripLayout { &self.layout }

    /// Insert at `index` (clamped), appending by default. The first tab
    /// becomes active. Returns false when already present.
    pub(crate) fn insert_tab(&mut self, id: WindowId, index: Option<usize>) -> bool {
        if self.contains(&id) {
            return false;
        }
        let index = index.unwrap_or(self.tabs.len()).min(self.tabs.len());
        self.tabs.insert(index, id.clone());
        if self.active_tab.is_none() {
            self.active_tab = Some(id);
        }
        true
    }

    /// Remove a tab. Removing the active tab promotes the next tab in
    /// order, or the previous one when the removed tab was last.
    pub(crate) fn remove_tab(&mut self, id: &WindowId) -> Option<RemovedTab> {
        let index = self.tabs.iter().position(|t| t == id)?;
        self.tabs.remove(index);
        let was_active = self.active_tab.as_ref() == Some(id);
        if was_active {
            self.active_tab = if self.tabs.is_empty() {
                None
            } else if index < self.tabs.len() {
                Some(self.tabs[index].clone())
            } else {
                Some(self.tabs[self.tabs.len() - 1].clone())
            };
        }
        Some(RemovedTab { was_active, next_active: if was_active { self.active_tab.clone() } else { None } })
    }

    /// Returns true when the active tab actually changed.
    pub(crate) fn set_active(&mut self, id: &WindowId) -> bool {
        if !self.contains(id) || self.active_tab.as_ref() == Some(id) {
            return false;
        }
        self.active_tab = Some(id.clone());
        true
    }
}
