use crate::model::{DesktopModel, Entity, TabGroupId};
use crate::sys::geometry::Point;
use crate::sys::runtime::WindowId;

/// Window stacking index, most recently focused first. Fed by focus and
/// activation events; used to break ties when a drag point hits more than
/// one tab-strip region.
#[derive(Debug, Default)]
pub struct ZOrder {
    order: Vec<WindowId>,
}

impl ZOrder {
    pub fn new() -> Self { Self::default() }

    /// Move (or insert) a window to the top of the stack.
    pub fn touch(&mut self, id: &WindowId) {
        if let Some(index) = self.order.iter().position(|w| w == id) {
            self.order.remove(index);
        }
        self.order.insert(0, id.clone());
    }

    pub fn remove(&mut self, id: &WindowId) {
        if let Some(index) = self.order.iter().position(|w| w == id) {
            self.order.remove(index);
        }
    }

    /// Stack position, 0 = topmost. Unknown windows sort below all known.
    pub fn position(&self, id: &WindowId) -> usize {
        self.order.iter().position(|w| w == id).unwrap_or(usize::MAX)
    }
}

/// Find the tab group whose strip-or-active-body region contains `point`.
///
/// Only groups with a visible active tab participate. When several regions
/// hit, the topmost wins; dropping a tab onto its own group is a no-op, so
/// that case resolves to none.
pub fn resolve_tab(
    model: &DesktopModel,
    zorder: &ZOrder,
    dragging: &WindowId,
    point: Point,
) -> Option<TabGroupId> {
    let mut best: Option<(usize, TabGroupId)> = None;
    for (tid, group) in model.tab_groups() {
        if group.len() < 2 {
            continue;
        }
        let Some(active) = group.active_tab() else { continue };
        if !model.window(active).map_or(false, |w| w.visible_normal()) {
            continue;
        }
        if !model.entity_contains(&Entity::TabGroup(tid), point) {
            continue;
        }
        let rank = group
            .tabs()
            .iter()
            .chain(std::iter::once(group.tab_strip()))
            .map(|w| zorder.position(w))
            .min()
            .unwrap_or(usize::MAX);
        if best.map_or(true, |(best_rank, _)| rank < best_rank) {
            best = Some((rank, tid));
        }
    }
    let (_, hit) = best?;
    if model.tab_group(hit).map_or(false, |group| group.contains(dragging)) {
        return None;
    }
    Some(hit)
}
