use crate::model::desktop::DesktopModel;
use crate::model::tab_group::TabGroupId;
use crate::sys::geometry::{Point, Rect};
use crate::sys::runtime::WindowId;

/// A snap-resolver participant: a standalone window, or a whole tab group
/// standing in for its tabs so a tab set behaves geometrically as one
/// object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entity {
    Window(WindowId),
    TabGroup(TabGroupId),
}

impl DesktopModel {
    /// Geometric footprint of an entity. For a tab group this is the union
    /// of the strip and the active tab body: the strip sits directly above
    /// the body and spans its width.
    pub fn entity_rect(&self, entity: &Entity) -> Option<Rect> {
        match entity {
            Entity::Window(id) => Some(self.window(id)?.rect()),
            Entity::TabGroup(tid) => {
                let group = self.tab_group(*tid)?;
                let active = self.window(group.active_tab()?)?.rect();
                let strip = self.window(group.tab_strip())?.rect();
                Some(Rect::new(
                    Point::new(active.center.x, active.center.y - strip.half_size.y),
                    Point::new(active.half_size.x, active.half_size.y + strip.half_size.y),
                ))
            }
        }
    }

    pub fn entity_contains(&self, entity: &Entity, point: Point) -> bool {
        self.entity_rect(entity).map_or(false, |rect| rect.contains(point))
    }

    /// The window a snap against this entity anchors to: the window itself,
    /// or a tab group's active tab.
    pub fn entity_anchor_window(&self, entity: &Entity) -> Option<WindowId> {
        match entity {
            Entity::Window(id) => Some(id.clone()),
            Entity::TabGroup(tid) => self.tab_group(*tid)?.active_tab().cloned(),
        }
    }

    /// Snap-group members folded into entities: each window appears once,
    /// except that the tabs of a multi-tab tab group (and its strip) are
    /// replaced by a single `TabGroup` entity at the first tab's position.
    pub fn group_entities(&self, group: crate::model::SnapGroupId) -> Vec<Entity> {
        let Some(snap_group) = self.snap_group(group) else {
            return Vec::new();
        };
        let mut entities = Vec::new();
        let mut seen_tab_groups: Vec<TabGroupId> = Vec::new();
        for window_id in snap_group.windows() {
            let Some(window) = self.window(window_id) else { continue };
            let in_multi_tab = window
                .tab_group()
                .filter(|tid| self.tab_group(*tid).map_or(false, |t| t.len() >= 2));
            match in_multi_tab {
                Some(tid) => {
                    if !seen_tab_groups.contains(&tid) {
                        seen_tab_groups.push(tid);
                        entities.push(Entity::TabGroup(tid));
                    }
                }
                None => {
                    // The strip window of a multi-tab group is subsumed by
                    // its entity as well.
                    let strip_of = self
                        .tab_groups()
                        .find(|(_, t)| t.tab_strip() == window_id && t.len() >= 2)
                        .map(|(tid, _)| tid);
                    match strip_of {
                        Some(tid) => {
                            if !seen_tab_groups.contains(&tid) {
                                seen_tab_groups.push(tid);
                                entities.push(Entity::TabGroup(tid));
                            }
                        }
                        None => entities.push(Entity::Window(window_id.clone())),
                    }
                }
            }
        }
        entities
    }

    pub fn for_each_entity(&self, mut f: impl FnMut(&Entity)) {
        for group in self.snap_group_ids() {
            for entity in self.group_entities(group) {
                f(&entity);
            }
        }
    }
}
