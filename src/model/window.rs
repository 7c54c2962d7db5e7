use std::ops::BitOr;

use crate::model::snap_group::SnapGroupId;
use crate::model::tab_group::TabGroupId;
use crate::sys::geometry::Rect;
use crate::sys::runtime::{WindowHandle, WindowId, WindowMode, WindowState};

/// Bitmask over the two transform kinds a bounds change can carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransformType(u8);

impl TransformType {
    pub const NONE: TransformType = TransformType(0);
    pub const MOVE: TransformType = TransformType(0b01);
    pub const RESIZE: TransformType = TransformType(0b10);

    pub fn contains(self, other: TransformType) -> bool { self.0 & other.0 == other.0 }

    pub fn is_empty(self) -> bool { self.0 == 0 }

    /// Compare two cached rects: center delta is a move, half-size delta a
    /// resize; a corner drag is both.
    pub fn classify(old: &Rect, new: &Rect) -> TransformType {
        let mut kind = TransformType::NONE;
        if old.center != new.center {
            kind = kind | TransformType::MOVE;
        }
        if old.half_size != new.half_size {
            kind = kind | TransformType::RESIZE;
        }
        kind
    }
}

impl BitOr for TransformType {
    type Output = TransformType;
    fn bitor(self, rhs: TransformType) -> TransformType { TransformType(self.0 | rhs.0) }
}

/// The engine's model of one OS window: cached runtime state plus the
/// membership pointers the desktop model keeps consistent.
#[derive(Debug)]
pub struct ManagedWindow {
    id: WindowId,
    handle: WindowHandle,
    state: WindowState,
    snap_group: SnapGroupId,
    tab_group: Option<TabGroupId>,
    prev_snap_group: Option<SnapGroupId>,
    /// Bounds to restore when this window leaves a tab group.
    saved_bounds: Option<Rect>,
    enabled: bool,
}

impl ManagedWindow {
    pub(crate) fn new(
        id: WindowId,
        state: WindowState,
        handle: WindowHandle,
        snap_group: SnapGroupId,
    ) -> Self {
        Self {
            id,
            handle,
            state,
            snap_group,
            tab_group: None,
            prev_snap_group: None,
            saved_bounds: None,
            enabled: true,
        }
    }

    pub fn id(&self) -> &WindowId { &self.id }

    pub fn handle(&self) -> &WindowHandle { &self.handle }

    pub fn state(&self) -> &WindowState { &self.state }

    pub fn rect(&self) -> Rect { self.state.rect }

    pub fn is_ready(&self) -> bool { self.handle.is_ready() }

    pub fn enabled(&self) -> bool { self.enabled }

    pub(crate) fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }

    /// Counted into group bounds and snap candidacy.
    pub fn visible_normal(&self) -> bool {
        !self.state.hidden && self.state.mode == WindowMode::Normal
    }

    pub fn snap_group(&self) -> SnapGroupId { self.snap_group }

    pub(crate) fn set_snap_group(&mut self, group: SnapGroupId) { self.snap_group = group; }

    pub fn tab_group(&self) -> Option<TabGroupId> { self.tab_group }

    pub(crate) fn set_tab_group(&mut self, group: Option<TabGroupId>) { self.tab_group = group; }

    pub fn prev_snap_group(&self) -> Option<SnapGroupId> { self.prev_snap_group }

    pub(crate) fn set_prev_snap_group(&mut self, group: Option<SnapGroupId>) {
        self.prev_snap_group = group;
    }

    pub fn saved_bounds(&self) -> Option<Rect> { self.saved_bounds }

    pub(crate) fn set_saved_bounds(&mut self, bounds: Option<Rect>) {
        self.saved_bounds = bounds;
    }

    /// Refresh the cached rect, reporting what kind of transform this was.
    pub(crate) fn set_rect(&mut self, rect: Rect) -> TransformType {
        let kind = TransformType::classify(&self.state.rect, &rect);
        self.state.rect = rect;
        kind
    }

    /// The following mutators return true when the value actually changed,
    /// which is the engine's cue to re-validate group membership.
    pub(crate) fn set_mode(&mut self, mode: WindowMode) -> bool {
        let changed = self.state.mode != mode;
        self.state.mode = mode;
        changed
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) -> bool {
        let changed = self.state.hidden != hidden;
        self.state.hidden = hidden;
        changed
    }

    pub(crate) fn set_frame(&mut self, frame: bool) -> bool {
        let changed = self.state.frame != frame;
        self.state.frame = frame;
        changed
    }
}
