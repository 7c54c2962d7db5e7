use crate::layout_engine::snap_resolver::SnapTarget;
use crate::model::{SnapGroupId, TabGroupId};
use crate::sys::runtime::WindowId;

/// Per-drag state machine:
/// `Idle -> Dragging -> PreviewValid | PreviewInvalid -> commit/cancel -> Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging,
    PreviewValid,
    PreviewInvalid,
}

/// Tracks the window being dragged, its moving group, and the current
/// resolver output. Transitions are driven by transforms and commits; a
/// newer transform's resolution simply replaces the previous one.
#[derive(Default)]
pub struct DragManager {
    phase: DragPhase,
    window: Option<WindowId>,
    group: Option<SnapGroupId>,
    snap_target: Option<SnapTarget>,
    tab_target: Option<TabGroupId>,
}

impl DragManager {
    pub fn new() -> Self { Self::default() }

    pub fn phase(&self) -> DragPhase { self.phase }

    pub fn is_active(&self) -> bool { self.phase != DragPhase::Idle }

    pub fn window(&self) -> Option<&WindowId> { self.window.as_ref() }

    pub fn group(&self) -> Option<SnapGroupId> { self.group }

    pub fn snap_target(&self) -> Option<&SnapTarget> { self.snap_target.as_ref() }

    pub fn tab_target(&self) -> Option<TabGroupId> { self.tab_target }

    pub fn begin(&mut self, window: WindowId, group: SnapGroupId) {
        if self.phase == DragPhase::Idle {
            self.phase = DragPhase::Dragging;
            self.window = Some(window);
            self.group = Some(group);
        }
    }

    /// A drag can hop groups mid-flight when the engine re-groups the
    /// window (membership re-validation); keep the moving group current.
    pub fn update_group(&mut self, group: SnapGroupId) {
        if self.is_active() {
            self.group = Some(group);
        }
    }

    /// Store this frame's resolver output and derive the preview phase. A
    /// tab target always previews as valid; an invalid snap target still
    /// previews, just flagged, so the marker can render red.
    pub fn set_targets(
        &mut self,
        snap: Option<SnapTarget>,
        tab: Option<TabGroupId>,
    ) -> DragPhase {
        debug_assert!(self.is_active());
        self.phase = if tab.is_some() {
            DragPhase::PreviewValid
        } else {
            match snap {
                Some(ref target) if target.valid => DragPhase::PreviewValid,
                Some(_) => DragPhase::PreviewInvalid,
                None => DragPhase::Dragging,
            }
        };
        self.snap_target = snap;
        self.tab_target = tab;
        self.phase
    }

    /// Commit/cancel: hand the targets to the caller and return to idle.
    pub fn take(&mut self) -> (Option<WindowId>, Option<SnapTarget>, Option<TabGroupId>) {
        let window = self.window.take();
        let snap = self.snap_target.take();
        let tab = self.tab_target.take();
        self.reset();
        (window, snap, tab)
    }

    pub fn reset(&mut self) {
        self.phase = DragPhase::Idle;
        self.window = None;
        self.group = None;
        self.snap_target = None;
        self.tab_target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::geometry::{Direction, Point};

    fn target(valid: bool) -> SnapTarget {
        SnapTarget {
            group: SnapGroupId::default(),
            active_window: WindowId::new("app", "a"),
            offset: Point::new(-2.0, 0.0),
            half_size: None,
            direction: Direction::Left,
            valid,
        }
    }

    #[test]
    fn test_phase_transitions() {
        let mut drag = DragManager::new();
        assert_eq!(drag.phase(), DragPhase::Idle);

        drag.begin(WindowId::new("app", "b"), SnapGroupId::default());
        assert_eq!(drag.phase(), DragPhase::Dragging);

        assert_eq!(drag.set_targets(Some(target(true)), None), DragPhase::PreviewValid);
        assert_eq!(drag.set_targets(Some(target(false)), None), DragPhase::PreviewInvalid);
        assert_eq!(drag.set_targets(None, None), DragPhase::Dragging);

        let (window, snap, tab) = drag.take();
        assert_eq!(window, Some(WindowId::new("app", "b")));
        assert!(snap.is_none());
        assert!(tab.is_none());
        assert_eq!(drag.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_tab_target_wins_preview_phase() {
        let mut drag = DragManager::new();
        drag.begin(WindowId::new("app", "b"), SnapGroupId::default());
        let phase = drag.set_targets(Some(target(false)), Some(TabGroupId::default()));
        assert_eq!(phase, DragPhase::PreviewValid);
    }

    #[test]
    fn test_begin_is_idempotent_during_drag() {
        let mut drag = DragManager::new();
        drag.begin(WindowId::new("app", "b"), SnapGroupId::default());
        drag.set_targets(Some(target(true)), None);
        drag.begin(WindowId::new("app", "c"), SnapGroupId::default());
        assert_eq!(drag.window(), Some(&WindowId::new("app", "b")));
        assert_eq!(drag.phase(), DragPhase::PreviewValid);
    }
}
