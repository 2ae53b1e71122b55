//! Shared configuration for the grass painter
//!
//! This crate is the single source of truth for the painter's tunables:
//! the default instance capacity, how parallel jobs are batched, how far
//! above the surface brush rays start, and how far a dragged brush has to
//! move before it paints again.

use serde::{Deserialize, Serialize};

#[cfg(feature = "bevy")]
use bevy::prelude::Resource;

/// Default number of blade instances a painter can hold
pub const DEFAULT_CAPACITY: usize = 2 << 14;

/// Default number of indices handled by one parallel task
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default distance brush rays start above the painted surface
pub const DEFAULT_RAY_OFFSET: f32 = 1.0;

/// Default maximum ray length (slightly longer than the offset)
pub const DEFAULT_RAY_MAX_DISTANCE: f32 = 1.1;

/// Default minimum distance between two clicks that both paint
pub const DEFAULT_CLICK_SPACING: f32 = 0.01;

/// Default drag spacing as a fraction of the brush radius
pub const DEFAULT_DRAG_SPACING_FRACTION: f32 = 0.5;

/// Errors produced while loading or validating a [`PainterConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse painter config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("Ray max distance {max_distance} must exceed ray offset {offset}")]
    RayTooShort { offset: f32, max_distance: f32 },

    #[error("Invalid spacing: {0}")]
    InvalidSpacing(f32),
}

/// Painter configuration shared by the engine and its host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "bevy", derive(Resource))]
#[serde(default)]
pub struct PainterConfig {
    /// Capacity given to freshly created painters
    pub default_capacity: usize,
    /// Indices per parallel task (task-per-range, not per element)
    pub batch_size: usize,
    /// Worker threads in the stroke pool (0 = one per core)
    pub worker_threads: usize,
    /// Offset of the ray grid above the surface, along the brush normal
    pub ray_offset: f32,
    /// Maximum hit distance of every brush ray
    pub ray_max_distance: f32,
    /// Minimum movement before a fresh click paints again
    pub click_spacing: f32,
    /// Minimum movement while dragging, as a fraction of the brush radius
    pub drag_spacing_fraction: f32,
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            worker_threads: 0,
            ray_offset: DEFAULT_RAY_OFFSET,
            ray_max_distance: DEFAULT_RAY_MAX_DISTANCE,
            click_spacing: DEFAULT_CLICK_SPACING,
            drag_spacing_fraction: DEFAULT_DRAG_SPACING_FRACTION,
        }
    }
}

impl PainterConfig {
    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to pretty JSON
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the invariants the painter relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        // Rays have to reach back down through the offset to hit the surface.
        if !(self.ray_max_distance > self.ray_offset) || self.ray_offset < 0.0 {
            return Err(ConfigError::RayTooShort {
                offset: self.ray_offset,
                max_distance: self.ray_max_distance,
            });
        }
        if !(self.click_spacing >= 0.0) {
            return Err(ConfigError::InvalidSpacing(self.click_spacing));
        }
        if !(self.drag_spacing_fraction >= 0.0) {
            return Err(ConfigError::InvalidSpacing(self.drag_spacing_fraction));
        }
        Ok(())
    }

    /// Drag spacing in world units for a brush of the given radius
    pub fn drag_spacing(&self, radius: f32) -> f32 {
        self.drag_spacing_fraction * radius
    }
}
