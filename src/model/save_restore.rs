use serde::{Deserialize, Serialize};

use crate::model::desktop::DesktopModel;
use crate::sys::geometry::{Point, Rect};
use crate::sys::runtime::WindowId;

/// One serialized tab group. The wire shape is fixed: integer pixels,
/// camelCase keys under `groupInfo`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabGroupBlob {
    pub tabs: Vec<WindowId>,
    #[serde(rename = "groupInfo")]
    pub group_info: GroupInfo,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub url: String,
    pub active: WindowId,
    pub dimensions: Dimensions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub tab_group_height: i64,
    pub app_height: i64,
}

impl Dimensions {
    pub fn from_rects(strip: &Rect, body: &Rect) -> Dimensions {
        Dimensions {
            x: strip.min().x.round() as i64,
            y: strip.min().y.round() as i64,
            width: strip.width().round() as i64,
            tab_group_height: strip.height().round() as i64,
            app_height: body.height().round() as i64,
        }
    }

    pub fn strip_rect(&self) -> Rect {
        Rect::from_origin_size(
            Point::new(self.x as f64, self.y as f64),
            Point::new(self.width as f64, self.tab_group_height as f64),
        )
    }

    pub fn body_rect(&self) -> Rect {
        Rect::from_origin_size(
            Point::new(self.x as f64, (self.y + self.tab_group_height) as f64),
            Point::new(self.width as f64, self.app_height as f64),
        )
    }
}

/// Serialize every live tab group. Groups whose strip or active tab is no
/// longer resolvable are skipped rather than saved half-formed.
pub fn save_model(model: &DesktopModel) -> Vec<TabGroupBlob> {
    let mut blobs = Vec::new();
    for (_, group) in model.tab_groups() {
        if group.len() < 2 {
            continue;
        }
        let Some(active) = group.active_tab() else { continue };
        let Some(strip) = model.window(group.tab_strip()) else { continue };
        let Some(body) = model.window(active) else { continue };
        blobs.push(TabGroupBlob {
            tabs: group.tabs().to_vec(),
            group_info: GroupInfo {
                url: group.layout().url.clone(),
                active: active.clone(),
                dimensions: Dimensions::from_rects(&strip.rect(), &body.rect()),
            },
        });
    }
    blobs
}
