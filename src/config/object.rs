use serde::{Deserialize, Serialize};

use crate::config::mask::{ConfigMask, FeaturesMask, TabstripMask};

/// A partial configuration tree. Every field is optional so entries from
/// different scopes deep-merge leaf-wise, narrower layers overriding broader
/// ones.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeaturesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabstrip: Option<TabstripConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dock: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TabstripConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl ConfigObject {
    /// Overlay `other` onto `self`: leaves present in `other` win, sub-trees
    /// merge recursively.
    pub fn merge(&mut self, other: &ConfigObject) {
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if let Some(ref features) = other.features {
            self.features.get_or_insert_with(FeaturesConfig::default).merge(features);
        }
        if let Some(ref tabstrip) = other.tabstrip {
            self.tabstrip.get_or_insert_with(TabstripConfig::default).merge(tabstrip);
        }
    }

    /// Copy out the leaves the mask selects; everything else stays `None`.
    pub fn masked(&self, mask: &ConfigMask) -> ConfigObject {
        ConfigObject {
            enabled: if mask.enabled { self.enabled } else { None },
            features: match (&self.features, &mask.features) {
                (Some(features), Some(fm)) => Some(features.masked(fm)),
                _ => None,
            },
            tabstrip: match (&self.tabstrip, &mask.tabstrip) {
                (Some(tabstrip), Some(tm)) => Some(tabstrip.masked(tm)),
                _ => None,
            },
        }
    }

    pub fn is_enabled(&self) -> bool { self.enabled.unwrap_or(true) }

    pub fn snap_enabled(&self) -> bool {
        self.is_enabled() && self.features.as_ref().and_then(|f| f.snap).unwrap_or(true)
    }

    pub fn tab_enabled(&self) -> bool {
        self.is_enabled() && self.features.as_ref().and_then(|f| f.tab).unwrap_or(true)
    }

    pub fn dock_enabled(&self) -> bool {
        self.is_enabled() && self.features.as_ref().and_then(|f| f.dock).unwrap_or(true)
    }
}

impl FeaturesConfig {
    fn merge(&mut self, other: &FeaturesConfig) {
        if other.snap.is_some() {
            self.snap = other.snap;
        }
        if other.tab.is_some() {
            self.tab = other.tab;
        }
        if other.dock.is_some() {
            self.dock = other.dock;
        }
    }

    fn masked(&self, mask: &FeaturesMask) -> FeaturesConfig {
        FeaturesConfig {
            snap: if mask.snap { self.snap } else { None },
            tab: if mask.tab { self.tab } else { None },
            dock: if mask.dock { self.dock } else { None },
        }
    }
}

impl TabstripConfig {
    fn merge(&mut self, other: &TabstripConfig) {
        if other.url.is_some() {
            self.url = other.url.clone();
        }
        if other.height.is_some() {
            self.height = other.height;
        }
    }

    fn masked(&self, mask: &TabstripMask) -> TabstripConfig {
        TabstripConfig {
            url: if mask.url { self.url.clone() } else { None },
            height: if mask.height { self.height } else { None },
        }
    }
}
