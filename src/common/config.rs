use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::config::object::{ConfigObject, FeaturesConfig, TabstripConfig};

pub fn data_dir() -> PathBuf { dirs::home_dir().unwrap().join(".sash") }
pub fn settings_file() -> PathBuf { dirs::home_dir().unwrap().join(".sash.toml") }

const MIN_PREVIEW_POOL: usize = 3;

/// Engine-level settings loaded from `~/.sash.toml`.
///
/// These are the process-wide tunables; per-window policy (enabled state,
/// feature gates) lives in the scoped [`crate::config::ConfigStore`], which
/// this struct seeds at the service scope.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Edge-to-edge distance within which a drag proposes a snap target.
    #[serde(default = "default_snap_radius")]
    pub snap_radius: f64,
    /// Minimum overlap on the parallel axis for two edges to pair up.
    #[serde(default = "default_min_overlap")]
    pub min_overlap: f64,
    /// Interior-overlap tolerance when validating a proposed snap.
    #[serde(default = "default_overlap_epsilon")]
    pub overlap_epsilon: f64,
    /// Pre-allocated drag preview markers. Never below 3.
    #[serde(default = "default_preview_pool")]
    pub preview_pool_size: usize,
    /// Adapter command timeout, advisory for the embedder.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default)]
    pub features: FeatureSettings,
    #[serde(default)]
    pub tabstrip: TabstripSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeatureSettings {
    #[serde(default = "yes")]
    pub snap: bool,
    #[serde(default = "yes")]
    pub tab: bool,
    #[serde(default = "yes")]
    pub dock: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct TabstripSettings {
    #[serde(default = "default_tabstrip_url")]
    pub url: String,
    #[serde(default = "default_tabstrip_height")]
    pub height: f64,
}

fn yes() -> bool { true }
fn default_snap_radius() -> f64 { 30.0 }
fn default_min_overlap() -> f64 { 30.0 }
fn default_overlap_epsilon() -> f64 { 16.0 }
fn default_preview_pool() -> usize { MIN_PREVIEW_POOL }
fn default_command_timeout_ms() -> u64 { 5000 }
fn default_tabstrip_url() -> String { "sash://tabstrip/index.html".to_string() }
fn default_tabstrip_height() -> f64 { 60.0 }

impl Default for FeatureSettings {
    fn default() -> Self { Self { snap: true, tab: true, dock: true } }
}

impl Default for TabstripSettings {
    fn default() -> Self {
        Self { url: default_tabstrip_url(), height: default_tabstrip_height() }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snap_radius: default_snap_radius(),
            min_overlap: default_min_overlap(),
            overlap_epsilon: default_overlap_epsilon(),
            preview_pool_size: default_preview_pool(),
            command_timeout_ms: default_command_timeout_ms(),
            features: FeatureSettings::default(),
            tabstrip: TabstripSettings::default(),
        }
    }
}

impl Settings {
    pub fn read(path: &Path) -> anyhow::Result<Settings> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn load() -> Settings {
        let path = settings_file();
        if !path.exists() {
            return Settings::default();
        }
        match Self::read(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Could not read {}: {e}; using defaults", path.display());
                Settings::default()
            }
        }
    }

    fn parse(buf: &str) -> anyhow::Result<Settings> {
        let mut settings: Settings = toml::from_str(buf)?;
        let issues = settings.validate();
        if !issues.is_empty() {
            let fixes = settings.auto_fix_values();
            if fixes < issues.len() {
                bail!("invalid settings: {}", issues.join("; "));
            }
            tracing::warn!("Fixed {fixes} settings issue(s): {}", issues.join("; "));
        }
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.snap_radius <= 0.0 {
            issues.push(format!("snap_radius must be positive, got {}", self.snap_radius));
        }
        if self.min_overlap < 0.0 {
            issues.push(format!("min_overlap must be non-negative, got {}", self.min_overlap));
        }
        if self.overlap_epsilon < 0.0 {
            issues.push(format!(
                "overlap_epsilon must be non-negative, got {}",
                self.overlap_epsilon
            ));
        }
        if self.preview_pool_size < MIN_PREVIEW_POOL {
            issues.push(format!(
                "preview_pool_size must be at least {MIN_PREVIEW_POOL}, got {}",
                self.preview_pool_size
            ));
        }
        if self.tabstrip.height <= 0.0 {
            issues.push(format!(
                "tabstrip.height must be positive, got {}",
                self.tabstrip.height
            ));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.snap_radius <= 0.0 {
            self.snap_radius = default_snap_radius();
            fixes += 1;
        }
        if self.min_overlap < 0.0 {
            self.min_overlap = default_min_overlap();
            fixes += 1;
        }
        if self.overlap_epsilon < 0.0 {
            self.overlap_epsilon = default_overlap_epsilon();
            fixes += 1;
        }
        if self.preview_pool_size < MIN_PREVIEW_POOL {
            self.preview_pool_size = MIN_PREVIEW_POOL;
            fixes += 1;
        }
        if self.tabstrip.height <= 0.0 {
            self.tabstrip.height = default_tabstrip_height();
            fixes += 1;
        }

        fixes
    }

    /// The service-scope layer these settings contribute to the config store.
    pub fn service_config(&self) -> ConfigObject {
        ConfigObject {
            enabled: Some(true),
            features: Some(FeaturesConfig {
                snap: Some(self.features.snap),
                tab: Some(self.features.tab),
                dock: Some(self.features.dock),
            }),
            tabstrip: Some(TabstripConfig {
                url: Some(self.tabstrip.url.clone()),
                height: Some(self.tabstrip.height),
            }),
        }
    }
}
