//! Named blade property sets.

use serde::{Deserialize, Serialize};

use crate::error::PainterError;
use crate::types::BladeProperties;

/// A named set of blade properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrassPreset {
    /// Display name (lookup key)
    pub name: String,
    pub blade: BladeProperties,
}

impl GrassPreset {
    pub fn new(name: impl Into<String>, blade: BladeProperties) -> Self {
        Self {
            name: name.into(),
            blade,
        }
    }

    /// Short lawn grass.
    pub fn lawn() -> Self {
        Self::new(
            "Lawn",
            BladeProperties {
                height: 0.35,
                width: 0.05,
                spread: 0.25,
                ..Default::default()
            },
        )
    }

    /// Tall, pale meadow grass.
    pub fn meadow() -> Self {
        Self::new(
            "Meadow",
            BladeProperties {
                height: 1.25,
                bend: 0.35,
                spread: 0.5,
                ..BladeProperties::from_srgb([70, 110, 30], [190, 200, 110])
            },
        )
    }

    /// Dry, sparse blades.
    pub fn dry() -> Self {
        Self::new(
            "Dry",
            BladeProperties {
                height: 0.6,
                pitch: 20.0,
                bend: 0.5,
                ..BladeProperties::from_srgb([110, 90, 40], [200, 180, 110])
            },
        )
    }
}

/// Ordered preset list; names are matched exactly and the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrassPresets {
    presets: Vec<GrassPreset>,
}

impl GrassPresets {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in presets.
    pub fn builtin() -> Self {
        Self {
            presets: vec![
                GrassPreset::new("Default", BladeProperties::default()),
                GrassPreset::lawn(),
                GrassPreset::meadow(),
                GrassPreset::dry(),
            ],
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, PainterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, PainterError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add a preset, or replace the blade of an existing one with the same name.
    pub fn insert(&mut self, preset: GrassPreset) {
        match self.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => existing.blade = preset.blade,
            None => self.presets.push(preset),
        }
    }

    /// Blade properties of the preset called `name`.
    pub fn get(&self, name: &str) -> Result<&BladeProperties, PainterError> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.blade)
            .ok_or_else(|| PainterError::PresetNotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
