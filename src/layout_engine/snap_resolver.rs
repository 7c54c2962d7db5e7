//! Finds the best validated edge-to-edge alignment for a moving snap group.
//!
//! Candidates are scanned every drag frame, so the scan works on cached
//! group bounding boxes and per-entity rects only; no runtime calls happen
//! here.

use tracing::trace;

use crate::common::config::Settings;
use crate::config::{ConfigStore, Scope};
use crate::model::{DesktopModel, Entity, SnapGroupId};
use crate::sys::geometry::{Direction, Orientation, Point, Rect};
use crate::sys::runtime::{WindowId, WindowMode};

/// A proposed commit action for the current drag frame. Invalid targets are
/// still returned so the preview can render them as refused; only valid
/// ones commit.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapTarget {
    pub group: SnapGroupId,
    /// The window in the target group the alignment anchors to (a tab
    /// group's active tab when the entity is a tab set).
    pub active_window: WindowId,
    /// Translation that closes the gap; applied to every window of the
    /// moving group on commit.
    pub offset: Point,
    /// When set, the moving window resizes to this half-size before the
    /// translation so the paired edges end up flush along their length.
    pub half_size: Option<Point>,
    pub direction: Direction,
    pub valid: bool,
}

struct BestPair {
    score: (f64, f64, f64),
    group: SnapGroupId,
    entity: Entity,
    entity_rect: Rect,
    direction: Direction,
    gap: f64,
}

fn better(a: &(f64, f64, f64), b: &(f64, f64, f64)) -> bool {
    if a.0 != b.0 {
        return a.0 < b.0;
    }
    if a.1 != b.1 {
        return a.1 < b.1;
    }
    a.2 < b.2
}

/// Scan all other snap groups for the best edge alignment within the snap
/// radius. Lower axial gap wins, then larger parallel overlap, then the
/// entity whose center sits closest to the cursor.
pub fn resolve_snap(
    model: &mut DesktopModel,
    config: &ConfigStore,
    settings: &Settings,
    moving: SnapGroupId,
    cursor: Point,
) -> Option<SnapTarget> {
    let moving_bounds = model.snap_group_bounds(moving);
    if moving_bounds.is_zero() {
        return None;
    }
    let radius = settings.snap_radius;

    let mut best: Option<BestPair> = None;
    for candidate in model.snap_group_ids() {
        if candidate == moving {
            continue;
        }
        let bounds = model.snap_group_bounds(candidate);
        if bounds.is_zero() {
            continue;
        }
        // Coarse cull: the boxes must be within the radius edge-to-edge on
        // at least one axis.
        let dist_h = (-moving_bounds.overlap_along(&bounds, Orientation::Horizontal)).max(0.0);
        let dist_v = (-moving_bounds.overlap_along(&bounds, Orientation::Vertical)).max(0.0);
        if dist_h > radius && dist_v > radius {
            continue;
        }

        for entity in model.group_entities(candidate) {
            let Some(entity_rect) = model.entity_rect(&entity) else { continue };
            let anchor_visible = model
                .entity_anchor_window(&entity)
                .and_then(|id| model.window(&id).map(|w| w.visible_normal()))
                .unwrap_or(false);
            if !anchor_visible {
                continue;
            }
            for direction in Direction::ALL {
                let gap = moving_bounds.edge_gap(&entity_rect, direction);
                if gap.abs() > radius {
                    continue;
                }
                let parallel = direction.orientation().perpendicular();
                let ov = moving_bounds.overlap_along(&entity_rect, parallel);
                let smaller_side = (moving_bounds.half_size.along(parallel) * 2.0)
                    .min(entity_rect.half_size.along(parallel) * 2.0);
                if ov < settings.min_overlap.min(smaller_side) {
                    continue;
                }
                let score = (gap.abs(), -ov, entity_rect.center.distance_to(cursor));
                if best.as_ref().map_or(true, |b| better(&score, &b.score)) {
                    best = Some(BestPair {
                        score,
                        group: candidate,
                        entity: entity.clone(),
                        entity_rect,
                        direction,
                        gap,
                    });
                }
            }
        }
    }

    let best = best?;
    let parallel = best.direction.orientation().perpendicular();
    let mut offset = Point::zero()
        .with_along(best.direction.orientation(), best.gap * best.direction.sign());

    // Length matching: a lone dragged window whose parallel side is within
    // the radius of the target's gets resized flush, and the offset then
    // also aligns the pair along that side.
    let moving_windows: Vec<WindowId> =
        model.snap_group(moving).map(|g| g.windows().to_vec()).unwrap_or_default();
    let mut half_size = None;
    if moving_windows.len() == 1 {
        let moving_len = moving_bounds.half_size.along(parallel) * 2.0;
        let target_len = best.entity_rect.half_size.along(parallel) * 2.0;
        let diff = (target_len - moving_len).abs();
        let anchor = model.entity_anchor_window(&best.entity);
        let dock_allowed = anchor.as_ref().map_or(false, |a| {
            config.effective(&Scope::window(&moving_windows[0])).dock_enabled()
                && config.effective(&Scope::window(a)).dock_enabled()
        });
        let size_allowed = model.window(&moving_windows[0]).map_or(false, |w| {
            target_len >= w.state().min_size.along(parallel)
                && target_len <= w.state().max_size.along(parallel)
        });
        if diff > 0.0 && diff <= radius && dock_allowed && size_allowed {
            half_size = Some(
                moving_bounds.half_size.with_along(parallel, best.entity_rect.half_size.along(parallel)),
            );
            offset = offset.with_along(
                parallel,
                best.entity_rect.center.along(parallel) - moving_bounds.center.along(parallel),
            );
        }
    }

    let active_window = model.entity_anchor_window(&best.entity)?;
    let valid = validate(model, config, settings, moving, &best, offset);
    trace!(
        group = ?best.group,
        direction = ?best.direction,
        gap = best.gap,
        valid,
        "snap target resolved"
    );
    Some(SnapTarget {
        group: best.group,
        active_window,
        offset,
        half_size,
        direction: best.direction,
        valid,
    })
}

fn validate(
    model: &DesktopModel,
    config: &ConfigStore,
    settings: &Settings,
    moving: SnapGroupId,
    best: &BestPair,
    offset: Point,
) -> bool {
    let moving_windows: Vec<WindowId> =
        model.snap_group(moving).map(|g| g.windows().to_vec()).unwrap_or_default();
    let target_windows: Vec<WindowId> =
        model.snap_group(best.group).map(|g| g.windows().to_vec()).unwrap_or_default();

    // Configuration gates every participant.
    for id in moving_windows.iter().chain(&target_windows) {
        let Some(window) = model.window(id) else { return false };
        if !window.enabled() || !config.effective(&Scope::window(id)).snap_enabled() {
            return false;
        }
    }

    // Applying the snap must not bury the moving windows in the target's
    // interiors, and must not cross a maximized or minimized window.
    for id in &moving_windows {
        let Some(window) = model.window(id) else { continue };
        if !window.visible_normal() {
            continue;
        }
        let translated = window.rect().translate(offset);
        for other in &target_windows {
            let Some(target) = model.window(other) else { continue };
            if target.visible_normal() {
                if translated.overlaps_interior(&target.rect(), settings.overlap_epsilon) {
                    return false;
                }
            } else if target.state().mode != WindowMode::Normal
                && translated.overlaps_interior(&target.rect(), 0.0)
            {
                return false;
            }
        }
    }

    // Two tab sets may sit side by side, but stacking one on the other
    // vertically would bury a strip; strips stay on top.
    if best.direction.orientation() == Orientation::Vertical {
        let moving_entities = model.group_entities(moving);
        let moving_is_tab_set =
            moving_entities.len() == 1 && matches!(moving_entities[0], Entity::TabGroup(_));
        if moving_is_tab_set && matches!(best.entity, Entity::TabGroup(_)) {
            return false;
        }
    }

    true
}
