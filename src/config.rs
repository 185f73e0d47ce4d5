//! Named layout values shared by the dragger and the bumper.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Offset, in workspace units, applied to a block bumped out of the way.
pub const BLOCK_BUMP_DISTANCE: &str = "BlockBumpDistance";
/// Radius, in workspace units, inside which a drag snaps onto a connection.
pub const BLOCK_SNAP_DISTANCE: &str = "BlockSnapDistance";

/// A length in workspace units together with its size on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutConfigUnit {
    pub workspace_unit: f64,
    /// `workspace_unit` at the config's current scale.
    #[serde(skip)]
    pub view_unit: f64,
}

impl LayoutConfigUnit {
    pub fn new(workspace_unit: f64, scale: f64) -> Self {
        Self {
            workspace_unit,
            view_unit: workspace_unit * scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    units: BTreeMap<String, LayoutConfigUnit>,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let mut config = Self::empty();
        config.set_unit(BLOCK_BUMP_DISTANCE, 25.0);
        config.set_unit(BLOCK_SNAP_DISTANCE, 25.0);
        config
    }
}

impl LayoutConfig {
    /// A config with no values set; every unit reads as 0.
    pub fn empty() -> Self {
        Self {
            scale: default_scale(),
            units: BTreeMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: LayoutConfig = serde_json::from_str(json).context("Invalid layout config")?;
        config.set_scale(config.scale);
        Ok(config)
    }

    pub fn load(path: &Utf8Path) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_std_path())
            .with_context(|| format!("Failed to read {}", path))?;
        Self::from_json_str(&json).with_context(|| format!("Failed to load config {}", path))
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Change the scale and recompute every view value.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
        for unit in self.units.values_mut() {
            *unit = LayoutConfigUnit::new(unit.workspace_unit, scale);
        }
    }

    pub fn set_unit(&mut self, key: impl Into<String>, workspace_unit: f64) {
        self.units
            .insert(key.into(), LayoutConfigUnit::new(workspace_unit, self.scale));
    }

    /// The unit stored under `key`, or zero when it was never set.
    pub fn unit(&self, key: &str) -> LayoutConfigUnit {
        self.units.get(key).copied().unwrap_or_default()
    }

    pub fn workspace_unit(&self, key: &str) -> f64 {
        self.unit(key).workspace_unit
    }
}
