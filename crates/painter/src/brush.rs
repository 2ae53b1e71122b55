//! Grass brush properties and falloff.
//!
//! Every brush operation is weighted by the same smoothstep falloff: full
//! strength inside the smoothing radius, fading to nothing at the brush
//! radius.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::{DENSITY_RANGE, RADIUS_RANGE, SMOOTHING_RANGE};
use crate::error::PainterError;
use crate::raycast::LayerMask;

/// What a brush stroke does to the grass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PainterMode {
    /// Not painting
    #[default]
    None = 0,
    /// Raycast the surface and add new blades
    Add = 1,
    /// Fade out and drop blades under the brush
    Remove = 2,
    /// Blend blade properties toward the brush's blade
    Modify = 3,
    /// Overwrite blade properties (shape index included) under the brush
    Replace = 4,
    /// Pick the properties of the blade closest to the brush centre
    Copy = 5,
}

impl PainterMode {
    /// Whether a stroke in this mode can change the stored blades.
    pub fn mutates_store(&self) -> bool {
        matches!(
            self,
            PainterMode::Add | PainterMode::Remove | PainterMode::Modify | PainterMode::Replace
        )
    }
}

/// Hermite smoothstep of `x` between `edge0` and `edge1`.
///
/// Coinciding edges degrade to a hard step at `edge0`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Current brush configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrushProperties {
    /// Layers the Add raycasts may hit
    pub raycast_layer: LayerMask,
    /// Outer radius in world units (0.1 to 10)
    pub radius: f32,
    /// Ray samples per world unit (1 to 10)
    pub density: f32,
    /// Fraction of the radius used for the falloff ring (0 to 1)
    pub smoothing: f32,
    /// Active mode
    pub mode: PainterMode,
}

impl Default for BrushProperties {
    fn default() -> Self {
        Self {
            raycast_layer: LayerMask::DEFAULT,
            radius: 1.0,
            density: 2.5,
            smoothing: 0.25,
            mode: PainterMode::None,
        }
    }
}

/// Partial brush update; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BrushOverrides {
    pub raycast_layer: Option<LayerMask>,
    pub radius: Option<f32>,
    pub density: Option<f32>,
    pub smoothing: Option<f32>,
    pub mode: Option<PainterMode>,
}

impl BrushOverrides {
    /// Overrides that only switch the mode.
    pub fn mode(mode: PainterMode) -> Self {
        Self {
            mode: Some(mode),
            ..Default::default()
        }
    }
}

impl BrushProperties {
    pub fn new(
        raycast_layer: LayerMask,
        radius: f32,
        density: f32,
        smoothing: f32,
        mode: PainterMode,
    ) -> Self {
        Self {
            raycast_layer,
            radius,
            density,
            smoothing,
            mode,
        }
    }

    pub fn radius_squared(&self) -> f32 {
        self.radius * self.radius
    }

    /// Inner radius of full brush strength.
    pub fn smoothing_radius(&self) -> f32 {
        (1.0 - self.smoothing.clamp(0.0, 1.0)) * self.radius
    }

    pub fn smoothing_radius_squared(&self) -> f32 {
        let r = self.smoothing_radius();
        r * r
    }

    /// 0 within the smoothing radius, 1 at or beyond the radius.
    pub fn inverse_smoothing_factor(&self, position: Vec3, brush_position: Vec3) -> f32 {
        smoothstep(
            self.smoothing_radius(),
            self.radius,
            position.distance(brush_position),
        )
    }

    /// 1 within the smoothing radius, 0 at or beyond the radius.
    pub fn smoothing_factor(&self, position: Vec3, brush_position: Vec3) -> f32 {
        1.0 - self.inverse_smoothing_factor(position, brush_position)
    }

    /// Apply `overrides`, clamping numeric values into the tool ranges.
    pub fn with_overrides(&self, overrides: BrushOverrides) -> Self {
        Self {
            raycast_layer: overrides.raycast_layer.unwrap_or(self.raycast_layer),
            radius: overrides
                .radius
                .map_or(self.radius, |r| r.clamp(RADIUS_RANGE.0, RADIUS_RANGE.1)),
            density: overrides
                .density
                .map_or(self.density, |d| d.clamp(DENSITY_RANGE.0, DENSITY_RANGE.1)),
            smoothing: overrides
                .smoothing
                .map_or(self.smoothing, |s| s.clamp(SMOOTHING_RANGE.0, SMOOTHING_RANGE.1)),
            mode: overrides.mode.unwrap_or(self.mode),
        }
    }

    /// Reject brushes that cannot produce a sample grid.
    pub fn validate(&self) -> Result<(), PainterError> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(PainterError::InvalidBrush(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        if !self.density.is_finite() || self.density <= 0.0 {
            return Err(PainterError::InvalidBrush(format!(
                "density must be positive, got {}",
                self.density
            )));
        }
        if !(SMOOTHING_RANGE.0..=SMOOTHING_RANGE.1).contains(&self.smoothing) {
            return Err(PainterError::InvalidBrush(format!(
                "smoothing must be within 0..=1, got {}",
                self.smoothing
            )));
        }
        Ok(())
    }
}
