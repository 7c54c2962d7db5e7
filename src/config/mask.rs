use serde::{Deserialize, Serialize};

/// Boolean tree parallel to [`crate::config::ConfigObject`]: a `true` leaf
/// selects the matching config leaf, a sub-mask recurses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigMask {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeaturesMask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabstrip: Option<TabstripMask>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesMask {
    #[serde(default)]
    pub snap: bool,
    #[serde(default)]
    pub tab: bool,
    #[serde(default)]
    pub dock: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TabstripMask {
    #[serde(default)]
    pub url: bool,
    #[serde(default)]
    pub height: bool,
}

impl ConfigMask {
    /// Select every leaf.
    pub fn all() -> ConfigMask {
        ConfigMask {
            enabled: true,
            features: Some(FeaturesMask { snap: true, tab: true, dock: true }),
            tabstrip: Some(TabstripMask { url: true, height: true }),
        }
    }

    /// Just the `enabled` leaf, the mask the engine itself watches with.
    pub fn enabled_only() -> ConfigMask {
        ConfigMask { enabled: true, features: None, tabstrip: None }
    }
}
