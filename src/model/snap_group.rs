use slotmap::new_key_type;

use crate::sys::geometry::Point;
use crate::sys::runtime::WindowId;

new_key_type! { pub struct SnapGroupId; }

/// A set of windows currently snapped edge-to-edge and moved as a unit.
///
/// Membership is mediated by [`crate::model::DesktopModel`]; this type only
/// owns the ordered window list and the cached aggregate bounding box. The
/// cache is root-relative: `origin` is the offset from the root window's
/// center to the bounding-box center, so a pure translation of the whole
/// group never invalidates it.
#[derive(Debug)]
pub struct SnapGroup {
    seq: u64,
    windows: Vec<WindowId>,
    root_window: Option<WindowId>,
    origin: Point,
    half_size: Point,
    stale: bool,
    prev_group: Option<SnapGroupId>,
}

impl SnapGroup {
    pub(crate) fn new(seq: u64) -> Self {
        Self {
            seq,
            windows: Vec::new(),
            root_window: None,
            origin: Point::zero(),
            half_size: Point::zero(),
            stale: true,
            prev_group: None,
        }
    }

    /// Monotonically assigned display id, stable across arena reuse.
    pub fn seq(&self) -> u64 { self.seq }

    pub fn windows(&self) -> &[WindowId] { &self.windows }

    pub fn len(&self) -> usize { self.windows.len() }

    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    pub fn contains(&self, id: &WindowId) -> bool { self.windows.iter().any(|w| w == id) }

    /// A group of one exists in the model but reports "not grouped" to
    /// clients.
    pub fn is_grouped(&self) -> bool { self.windows.len() >= 2 }

    pub fn root_window(&self) -> Option<&WindowId> { self.root_window.as_ref() }

    pub fn prev_group(&self) -> Option<SnapGroupId> { self.prev_group }

    pub(crate) fn set_prev_group(&mut self, group: Option<SnapGroupId>) {
        self.prev_group = group;
    }

    pub(crate) fn push_window(&mut self, id: WindowId) {
        self.windows.push(id);
        self.stale = true;
    }

    pub(crate) fn remove_window(&mut self, id: &WindowId) -> bool {
        let Some(index) = self.windows.iter().position(|w| w == id) else {
            return false;
        };
        self.windows.remove(index);
        self.stale = true;
        true
    }

    /// Root changes invalidate the cache: `origin` is expressed relative to
    /// the root's center.
    pub(crate) fn set_root(&mut self, root: Option<WindowId>) {
        if self.root_window != root {
            self.root_window = root;
            self.stale = true;
        }
    }

    pub fn is_stale(&self) -> bool { self.stale }

    pub(crate) fn mark_stale(&mut self) { self.stale = true; }

    pub(crate) fn set_cached_bounds(&mut self, origin: Point, half_size: Point) {
        self.origin = origin;
        self.half_size = half_size;
        self.stale = false;
    }

    pub fn cached_origin(&self) -> Point { self.origin }

    pub fn cached_half_size(&self) -> Point { self.half_size }
}
