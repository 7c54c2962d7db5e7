use slotmap::SlotMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::common::collections::{HashMap, HashSet};
use crate::model::snap_group::{SnapGroup, SnapGroupId};
use crate::model::tab_group::{TabGroup, TabGroupId, TabstripLayout};
use crate::model::window::ManagedWindow;
use crate::sys::geometry::{Orientation, Point, Rect};
use crate::sys::runtime::{WindowHandle, WindowId, WindowState};

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("window {0} is already registered")]
    DuplicateWindow(WindowId),
    #[error("unknown window {0}")]
    UnknownWindow(WindowId),
    #[error("unknown snap group")]
    UnknownSnapGroup,
    #[error("unknown tab group")]
    UnknownTabGroup,
    #[error("window {0} is already tabbed elsewhere")]
    AlreadyTabbed(WindowId),
    #[error("window {0} is not a tab")]
    NotTabbed(WindowId),
}

/// Membership changes the engine fans out as client events and runtime
/// commands. Groups never call back into anything; mutations return the
/// events they produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    JoinedSnapGroup { window: WindowId, group: SnapGroupId },
    LeftSnapGroup { window: WindowId, group: SnapGroupId },
    JoinedTabGroup { window: WindowId, group: TabGroupId },
    LeftTabGroup { window: WindowId, group: TabGroupId },
    TabActivated { window: WindowId, group: TabGroupId },
    SnapGroupRemoved(SnapGroupId),
    TabGroupRemoved { group: TabGroupId, strip: WindowId },
}

/// Outcome of a tab removal, consumed by the engine to drive show/hide and
/// teardown of the strip window.
#[derive(Debug)]
pub struct TabRemoval {
    pub group: TabGroupId,
    pub events: Vec<ModelEvent>,
    /// Set when the active tab changed as a result of the removal.
    pub new_active: Option<WindowId>,
    /// Set when the group fell below two tabs and was destroyed. Carries the
    /// strip window (to close) and the surviving tab, if any (to restore).
    pub collapsed: Option<(WindowId, Option<WindowId>)>,
}

/// Registry of all managed windows, snap groups, and tab groups.
///
/// Ownership is arena-style: groups and windows cross-reference each other
/// by id only, and every membership mutation goes through this type so the
/// referential invariants hold on every return: each window belongs to
/// exactly one live snap group, orphaned groups are collected on the same
/// turn as the removal that produced them.
pub struct DesktopModel {
    windows: HashMap<WindowId, ManagedWindow>,
    snap_groups: SlotMap<SnapGroupId, SnapGroup>,
    tab_groups: SlotMap<TabGroupId, TabGroup>,
    /// Every window that ever hosted a tab strip. Never pruned: event
    /// consumers still need to tell service UI windows from application
    /// windows while a strip's teardown events drain.
    strips: HashSet<WindowId>,
    group_seq: u64,
}

impl Default for DesktopModel {
    fn default() -> Self { Self::new() }
}

impl DesktopModel {
    pub fn new() -> Self {
        Self {
            windows: HashMap::default(),
            snap_groups: SlotMap::with_key(),
            tab_groups: SlotMap::with_key(),
            strips: HashSet::default(),
            group_seq: 0,
        }
    }

    // Windows

    pub fn window(&self, id: &WindowId) -> Option<&ManagedWindow> { self.windows.get(id) }

    pub fn window_mut(&mut self, id: &WindowId) -> Option<&mut ManagedWindow> {
        self.windows.get_mut(id)
    }

    pub fn contains_window(&self, id: &WindowId) -> bool { self.windows.contains_key(id) }

    pub fn windows(&self) -> impl Iterator<Item = &ManagedWindow> { self.windows.values() }

    pub fn window_ids(&self) -> Vec<WindowId> { self.windows.keys().cloned().collect() }

    pub fn window_count(&self) -> usize { self.windows.len() }

    /// Register a new window in a fresh singleton snap group.
    pub fn create_window(
        &mut self,
        id: WindowId,
        state: WindowState,
        handle: WindowHandle,
    ) -> Result<SnapGroupId, ModelError> {
        if self.windows.contains_key(&id) {
            return Err(ModelError::DuplicateWindow(id));
        }
        let group = self.new_snap_group();
        self.snap_groups[group].push_window(id.clone());
        self.snap_groups[group].set_root(Some(id.clone()));
        debug!(window = %id, ?group, "window registered");
        self.windows.insert(id.clone(), ManagedWindow::new(id, state, handle, group));
        Ok(group)
    }

    /// Tear a window down: out of its tab group first, then out of its snap
    /// group, then out of the registry.
    pub fn remove_window(&mut self, id: &WindowId) -> Result<Vec<ModelEvent>, ModelError> {
        if !self.windows.contains_key(id) {
            return Err(ModelError::UnknownWindow(id.clone()));
        }
        let mut events = Vec::new();
        if self.windows[id].tab_group().is_some() {
            let removal = self.remove_tab(id)?;
            events.extend(removal.events);
        }
        let group = self.windows[id].snap_group();
        events.extend(self.remove_from_snap_group(id, group));
        self.windows.remove(id);
        debug!(window = %id, "window removed");
        Ok(events)
    }

    // Snap groups

    fn new_snap_group(&mut self) -> SnapGroupId {
        self.group_seq += 1;
        self.snap_groups.insert(SnapGroup::new(self.group_seq))
    }

    pub fn snap_group(&self, id: SnapGroupId) -> Option<&SnapGroup> { self.snap_groups.get(id) }

    pub fn snap_groups(&self) -> impl Iterator<Item = (SnapGroupId, &SnapGroup)> {
        self.snap_groups.iter()
    }

    pub fn snap_group_ids(&self) -> Vec<SnapGroupId> { self.snap_groups.keys().collect() }

    pub fn snap_group_of(&self, id: &WindowId) -> Option<SnapGroupId> {
        self.windows.get(id).map(|w| w.snap_group())
    }

    /// Move a window into `dst`, detaching it from its previous group.
    ///
    /// Join/leave notifications follow the client's notion of "grouped":
    /// the incoming window is notified when the destination reaches two or
    /// more members, and the member it joins is notified on the one-to-two
    /// transition; a window leaving is notified only when it leaves a group
    /// that still has members.
    pub fn attach_window(
        &mut self,
        id: &WindowId,
        dst: SnapGroupId,
    ) -> Result<Vec<ModelEvent>, ModelError> {
        if !self.snap_groups.contains_key(dst) {
            return Err(ModelError::UnknownSnapGroup);
        }
        let src = match self.windows.get(id) {
            Some(window) => window.snap_group(),
            None => return Err(ModelError::UnknownWindow(id.clone())),
        };
        if src == dst {
            return Ok(Vec::new());
        }

        let mut events = self.remove_from_snap_group(id, src);

        let group = &mut self.snap_groups[dst];
        group.push_window(id.clone());
        let post_add = group.len();
        let window = self.windows.get_mut(id).expect("window checked above");
        window.set_snap_group(dst);
        window.set_prev_snap_group(Some(src));
        self.refresh_root(dst);
        trace!(window = %id, ?src, ?dst, size = post_add, "window attached");

        if post_add == 2 {
            // The resident member only now becomes "grouped".
            let other = self.snap_groups[dst]
                .windows()
                .iter()
                .find(|w| *w != id)
                .cloned()
                .expect("two-member group has another member");
            events.push(ModelEvent::JoinedSnapGroup { window: other, group: dst });
        }
        if post_add >= 2 {
            events.push(ModelEvent::JoinedSnapGroup { window: id.clone(), group: dst });
        }
        Ok(events)
    }

    /// Move a window out into a fresh singleton group. No-op when it is
    /// already alone.
    pub fn detach_to_singleton(
        &mut self,
        id: &WindowId,
    ) -> Result<(SnapGroupId, Vec<ModelEvent>), ModelError> {
        let src = match self.windows.get(id) {
            Some(window) => window.snap_group(),
            None => return Err(ModelError::UnknownWindow(id.clone())),
        };
        if self.snap_groups.get(src).map_or(0, |g| g.len()) <= 1 {
            return Ok((src, Vec::new()));
        }
        let dst = self.new_snap_group();
        let events = self.attach_window(id, dst)?;
        Ok((dst, events))
    }

    /// Merge every window of `src` into `dst`, in the source's order.
    pub fn merge_groups(
        &mut self,
        src: SnapGroupId,
        dst: SnapGroupId,
    ) -> Result<Vec<ModelEvent>, ModelError> {
        if src == dst {
            return Ok(Vec::new());
        }
        let members: Vec<WindowId> = match self.snap_groups.get(src) {
            Some(group) => group.windows().to_vec(),
            None => return Err(ModelError::UnknownSnapGroup),
        };
        let mut events = Vec::new();
        for id in members {
            events.extend(self.attach_window(&id, dst)?);
        }
        Ok(events)
    }

    /// Remove `id` from `group`, destroying the group when it empties.
    /// Does not touch the window's own group pointer; callers re-point it.
    fn remove_from_snap_group(&mut self, id: &WindowId, group: SnapGroupId) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        let Some(snap_group) = self.snap_groups.get_mut(group) else {
            return events;
        };
        if !snap_group.remove_window(id) {
            return events;
        }
        if snap_group.is_empty() {
            self.snap_groups.remove(group);
            events.push(ModelEvent::SnapGroupRemoved(group));
        } else {
            // The client API treats a solo window as ungrouped, so nothing
            // is sent when a group collapses to one.
            events.push(ModelEvent::LeftSnapGroup { window: id.clone(), group });
            self.refresh_root(group);
        }
        events
    }

    /// Recompute the group's root: the first window, or its tab strip when
    /// that window is a tab of a multi-tab group.
    fn refresh_root(&mut self, group: SnapGroupId) {
        let Some(snap_group) = self.snap_groups.get(group) else { return };
        let root = snap_group.windows().first().map(|first| {
            let strip = self
                .windows
                .get(first)
                .and_then(|w| w.tab_group())
                .and_then(|tid| self.tab_groups.get(tid))
                .filter(|t| t.len() >= 2)
                .map(|t| t.tab_strip().clone());
            strip.unwrap_or_else(|| first.clone())
        });
        self.snap_groups[group].set_root(root);
    }

    pub fn mark_group_stale(&mut self, group: SnapGroupId) {
        if let Some(snap_group) = self.snap_groups.get_mut(group) {
            snap_group.mark_stale();
        }
    }

    /// Aggregate bounding box, recomputed lazily. With two or more members
    /// only visible normal-state windows count; a sole member contributes
    /// its own rect regardless.
    pub fn snap_group_bounds(&mut self, group: SnapGroupId) -> Rect {
        let Some(snap_group) = self.snap_groups.get(group) else {
            return Rect::default();
        };
        let root_center = snap_group
            .root_window()
            .and_then(|root| self.windows.get(root))
            .map(|w| w.rect().center)
            .unwrap_or_default();
        if !snap_group.is_stale() {
            return Rect::new(root_center + snap_group.cached_origin(), snap_group.cached_half_size());
        }

        let bbox = if snap_group.len() == 1 {
            snap_group
                .windows()
                .first()
                .and_then(|id| self.windows.get(id))
                .map(|w| w.rect())
                .unwrap_or_default()
        } else {
            let mut bbox = Rect::default();
            for id in snap_group.windows() {
                let Some(window) = self.windows.get(id) else { continue };
                if !window.visible_normal() {
                    continue;
                }
                bbox = bbox.union(&window.rect());
            }
            bbox
        };

        let (origin, half_size) = if bbox.is_zero() {
            (Point::zero(), Point::zero())
        } else {
            (bbox.center - root_center, bbox.half_size)
        };
        self.snap_groups[group].set_cached_bounds(origin, half_size);
        Rect::new(root_center + origin, half_size)
    }

    // Tab groups

    pub fn tab_group(&self, id: TabGroupId) -> Option<&TabGroup> { self.tab_groups.get(id) }

    pub fn tab_groups(&self) -> impl Iterator<Item = (TabGroupId, &TabGroup)> {
        self.tab_groups.iter()
    }

    pub fn tab_group_ids(&self) -> Vec<TabGroupId> { self.tab_groups.keys().collect() }

    pub fn tab_group_of(&self, id: &WindowId) -> Option<TabGroupId> {
        self.windows.get(id).and_then(|w| w.tab_group())
    }

    /// True while `id` is (or was, until removal) a tab-strip window.
    pub fn is_tab_strip(&self, id: &WindowId) -> bool { self.strips.contains(id) }

    pub fn tab_group_by_seq(&self, seq: u64) -> Option<TabGroupId> {
        self.tab_groups.iter().find(|(_, group)| group.seq() == seq).map(|(id, _)| id)
    }

    /// The tab group whose strip window is `id`, if any.
    pub fn tab_group_with_strip(&self, id: &WindowId) -> Option<TabGroupId> {
        self.tab_groups.iter().find(|(_, group)| group.tab_strip() == id).map(|(tid, _)| tid)
    }

    /// Register a tab group around an already-managed strip window. The
    /// strip must have known state before the group exists; callers queue
    /// add-tab requests until then.
    pub fn create_tab_group(
        &mut self,
        strip: &WindowId,
        layout: TabstripLayout,
    ) -> Result<TabGroupId, ModelError> {
        if !self.windows.contains_key(strip) {
            return Err(ModelError::UnknownWindow(strip.clone()));
        }
        self.group_seq += 1;
        let id = self.tab_groups.insert(TabGroup::new(self.group_seq, strip.clone(), layout));
        self.strips.insert(strip.clone());
        debug!(strip = %strip, ?id, "tab group created");
        Ok(id)
    }

    /// Add a window as a tab. Idempotent for a window already in this
    /// group; a window tabbed elsewhere is refused. The tab joins the
    /// strip's snap group so the whole tab set stays one snap unit.
    pub fn add_tab(
        &mut self,
        group: TabGroupId,
        id: &WindowId,
        index: Option<usize>,
    ) -> Result<Vec<ModelEvent>, ModelError> {
        if !self.windows.contains_key(id) {
            return Err(ModelError::UnknownWindow(id.clone()));
        }
        let strip = match self.tab_groups.get(group) {
            Some(tab_group) => tab_group.tab_strip().clone(),
            None => return Err(ModelError::UnknownTabGroup),
        };
        match self.windows[id].tab_group() {
            Some(existing) if existing == group => return Ok(Vec::new()),
            Some(_) => return Err(ModelError::AlreadyTabbed(id.clone())),
            None => {}
        }

        let mut events = Vec::new();
        let strip_group =
            self.windows.get(&strip).map(|w| w.snap_group()).ok_or(ModelError::UnknownSnapGroup)?;
        if self.windows[id].snap_group() != strip_group {
            events.extend(self.attach_window(id, strip_group)?);
        }
        self.tab_groups[group].insert_tab(id.clone(), index);
        self.windows.get_mut(id).expect("window checked above").set_tab_group(Some(group));
        events.push(ModelEvent::JoinedTabGroup { window: id.clone(), group });
        // Tab membership can change the snap group's root (strip
        // substitution).
        self.refresh_root(strip_group);
        Ok(events)
    }

    /// Remove a window from its tab group, reporting activation fallout and
    /// collapse. The model tears the group down below two tabs; runtime
    /// effects (restoring bounds, closing the strip) are the caller's.
    pub fn remove_tab(&mut self, id: &WindowId) -> Result<TabRemoval, ModelError> {
        let group = match self.windows.get(id) {
            Some(window) => window.tab_group().ok_or_else(|| ModelError::NotTabbed(id.clone()))?,
            None => return Err(ModelError::UnknownWindow(id.clone())),
        };
        let mut events = Vec::new();
        let removed = self.tab_groups[group].remove_tab(id).expect("tab pointer was set");
        self.windows.get_mut(id).expect("window checked above").set_tab_group(None);
        events.push(ModelEvent::LeftTabGroup { window: id.clone(), group });

        let survives = self.tab_groups[group].len() >= 2;
        let mut new_active = None;
        if survives && removed.was_active {
            if let Some(ref next) = removed.next_active {
                events.push(ModelEvent::TabActivated { window: next.clone(), group });
                new_active = Some(next.clone());
            }
        }

        let mut collapsed = None;
        if !survives {
            let (strip, survivor) = self.destroy_tab_group_inner(group, &mut events);
            collapsed = Some((strip, survivor));
        }

        if let Some(window) = self.windows.get(id) {
            self.refresh_root(window.snap_group());
        }
        Ok(TabRemoval { group, events, new_active, collapsed })
    }

    /// Switch the shown tab. Idempotent.
    pub fn set_active_tab(
        &mut self,
        group: TabGroupId,
        id: &WindowId,
    ) -> Result<Vec<ModelEvent>, ModelError> {
        let tab_group = self.tab_groups.get_mut(group).ok_or(ModelError::UnknownTabGroup)?;
        if !tab_group.contains(id) {
            return Err(ModelError::UnknownWindow(id.clone()));
        }
        if !tab_group.set_active(id) {
            return Ok(Vec::new());
        }
        Ok(vec![ModelEvent::TabActivated { window: id.clone(), group }])
    }

    /// Destroy a tab group outright, detaching any remaining tabs.
    pub fn destroy_tab_group(
        &mut self,
        group: TabGroupId,
    ) -> Result<Vec<ModelEvent>, ModelError> {
        if !self.tab_groups.contains_key(group) {
            return Err(ModelError::UnknownTabGroup);
        }
        let mut events = Vec::new();
        self.destroy_tab_group_inner(group, &mut events);
        Ok(events)
    }

    fn destroy_tab_group_inner(
        &mut self,
        group: TabGroupId,
        events: &mut Vec<ModelEvent>,
    ) -> (WindowId, Option<WindowId>) {
        let tab_group = self.tab_groups.remove(group).expect("checked by callers");
        let strip = tab_group.tab_strip().clone();
        let mut survivor = None;
        for tab in tab_group.tabs() {
            if let Some(window) = self.windows.get_mut(tab) {
                window.set_tab_group(None);
                events.push(ModelEvent::LeftTabGroup { window: tab.clone(), group });
                survivor = Some(tab.clone());
            }
        }
        events.push(ModelEvent::TabGroupRemoved { group, strip: strip.clone() });
        debug!(?group, strip = %strip, "tab group destroyed");
        (strip, survivor)
    }

    // Connectivity

    /// After a member leaves, a snap group can fall apart into subsets that
    /// no longer touch. Detect components over the edge-adjacency graph and
    /// move every component after the first into its own group.
    pub fn split_disconnected(
        &mut self,
        group: SnapGroupId,
        epsilon: f64,
    ) -> Result<Vec<ModelEvent>, ModelError> {
        let members: Vec<WindowId> = match self.snap_groups.get(group) {
            Some(snap_group) => snap_group.windows().to_vec(),
            None => return Err(ModelError::UnknownSnapGroup),
        };
        if members.len() < 2 {
            return Ok(Vec::new());
        }
        let rects: Vec<Rect> =
            members.iter().map(|id| self.windows.get(id).map(|w| w.rect()).unwrap_or_default()).collect();

        let adjacent = |a: &Rect, b: &Rect| -> bool {
            let h_ov = a.overlap_along(b, Orientation::Horizontal);
            let v_ov = a.overlap_along(b, Orientation::Vertical);
            if h_ov > 0.0 && v_ov > 0.0 {
                // Overlapping interiors (stacked tab bodies) always connect.
                return true;
            }
            // Otherwise the edges must touch along one axis while the
            // projections overlap on the other.
            (h_ov >= -epsilon && v_ov > 0.0) || (v_ov >= -epsilon && h_ov > 0.0)
        };

        let mut component = vec![usize::MAX; members.len()];
        let mut count = 0;
        for start in 0..members.len() {
            if component[start] != usize::MAX {
                continue;
            }
            let label = count;
            count += 1;
            let mut stack = vec![start];
            component[start] = label;
            while let Some(current) = stack.pop() {
                for next in 0..members.len() {
                    if component[next] == usize::MAX && adjacent(&rects[current], &rects[next]) {
                        component[next] = label;
                        stack.push(next);
                    }
                }
            }
        }
        if count <= 1 {
            return Ok(Vec::new());
        }

        debug!(?group, components = count, "snap group split into components");
        let mut events = Vec::new();
        for label in 1..count {
            let dst = self.new_snap_group();
            for (index, id) in members.iter().enumerate() {
                if component[index] == label {
                    events.extend(self.attach_window(id, dst)?);
                }
            }
        }
        Ok(events)
    }
}
