//! Core grass types.
//!
//! [`BladeInstance`] is uploaded to the render buffer as-is, so both records
//! are `#[repr(C)]` and `bytemuck::Pod` with every field a 4-byte slot.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::color::{linear_to_srgb8, srgb8_to_linear};
use crate::constants::{DEGENERATE_TANGENT_EPSILON, INSTANCE_STRIDE, TANGENT_HANDEDNESS};

/// Visual parameters of a single grass blade.
///
/// Colors are linear RGB. The shape index is a categorical handle into the
/// host's shape library; it occupies a float32 slot in the vertex layout and
/// shaders reinterpret its bits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct BladeProperties {
    /// Linear color at the blade root
    pub base_color: [f32; 3],
    /// Linear color at the blade tip
    pub tip_color: [f32; 3],
    /// Lightmap coordinates of the anchor point
    pub lightmap_uv: [f32; 2],
    /// Shape library index
    pub shape_index: u32,
    /// Blade width (0 to 2)
    pub width: f32,
    /// Blade height (0 to 2)
    pub height: f32,
    /// Pitch in degrees (0 to 90)
    pub pitch: f32,
    /// Bend amount (0 to 2)
    pub bend: f32,
    /// Bend curve exponent (1 to 8)
    pub bend_exponent: f32,
    /// Cluster spread (0 to 2)
    pub spread: f32,
}

impl Default for BladeProperties {
    fn default() -> Self {
        Self {
            base_color: srgb8_to_linear([0, 100, 0]),
            tip_color: srgb8_to_linear([64, 168, 64]),
            lightmap_uv: [0.0, 0.0],
            shape_index: 0,
            width: 0.075,
            height: 0.75,
            pitch: 7.5,
            bend: 0.125,
            bend_exponent: 2.0,
            spread: 0.375,
        }
    }
}

impl BladeProperties {
    /// Default blade with the given 8-bit sRGB root and tip colors.
    pub fn from_srgb(base: [u8; 3], tip: [u8; 3]) -> Self {
        Self {
            base_color: srgb8_to_linear(base),
            tip_color: srgb8_to_linear(tip),
            ..Default::default()
        }
    }

    /// Root color as 8-bit sRGB.
    pub fn base_color_srgb(&self) -> [u8; 3] {
        linear_to_srgb8(self.base_color)
    }

    /// Tip color as 8-bit sRGB.
    pub fn tip_color_srgb(&self) -> [u8; 3] {
        linear_to_srgb8(self.tip_color)
    }

    /// The shape index as the float a shader reads from its slot.
    pub fn shape_index_bits(&self) -> f32 {
        f32::from_bits(self.shape_index)
    }

    /// Copy with every scalar clamped into its tool range.
    pub fn clamped(&self) -> Self {
        Self {
            width: self.width.clamp(0.0, 2.0),
            height: self.height.clamp(0.0, 2.0),
            pitch: self.pitch.clamp(0.0, 90.0),
            bend: self.bend.clamp(0.0, 2.0),
            bend_exponent: self.bend_exponent.clamp(1.0, 8.0),
            spread: self.spread.clamp(0.0, 2.0),
            ..*self
        }
    }

    /// Copy with the height multiplied by `factor`.
    pub fn with_height_scaled(&self, factor: f32) -> Self {
        Self {
            height: self.height * factor,
            ..*self
        }
    }

    /// Interpolate from `start` toward `end`.
    ///
    /// Colors interpolate in linear space and scalars linearly. The shape
    /// index is categorical and always comes from `start`, including when
    /// `factor >= 1`.
    pub fn lerp(start: &Self, end: &Self, factor: f32) -> Self {
        if factor <= 0.0 {
            return *start;
        }
        if factor >= 1.0 {
            return Self {
                shape_index: start.shape_index,
                ..*end
            };
        }

        Self {
            base_color: lerp_array(start.base_color, end.base_color, factor),
            tip_color: lerp_array(start.tip_color, end.tip_color, factor),
            lightmap_uv: lerp_array(start.lightmap_uv, end.lightmap_uv, factor),
            shape_index: start.shape_index,
            width: lerp(start.width, end.width, factor),
            height: lerp(start.height, end.height, factor),
            pitch: lerp(start.pitch, end.pitch, factor),
            bend: lerp(start.bend, end.bend, factor),
            bend_exponent: lerp(start.bend_exponent, end.bend_exponent, factor),
            spread: lerp(start.spread, end.spread, factor),
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp_array<const N: usize>(a: [f32; N], b: [f32; N], t: f32) -> [f32; N] {
    std::array::from_fn(|i| lerp(a[i], b[i], t))
}

/// One painted blade cluster: a surface anchor in object space plus its
/// visual properties.
///
/// Layout is fixed for zero-copy upload: position (3×f32), normal (3×f32),
/// tangent (4×f32), then the [`BladeProperties`] fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct BladeInstance {
    /// Object-space anchor position
    pub position: [f32; 3],
    /// Object-space unit surface normal
    pub normal: [f32; 3],
    /// Object-space unit tangent (xyz) and handedness (w)
    pub tangent: [f32; 4],
    /// Visual parameters
    pub blade: BladeProperties,
}

impl BladeInstance {
    /// Create an instance from glam vectors.
    pub fn new(position: Vec3, normal: Vec3, tangent: Vec4, blade: BladeProperties) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            tangent: tangent.to_array(),
            blade,
        }
    }

    /// Create an instance anchored at `position`, deriving the tangent from
    /// `normal`.
    pub fn anchored(position: Vec3, normal: Vec3, blade: BladeProperties) -> Self {
        Self::new(position, normal, tangent_from_normal(normal), blade)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    pub fn tangent(&self) -> Vec4 {
        Vec4::from_array(self.tangent)
    }

    /// Same anchor with different blade properties.
    pub fn with_blade(&self, blade: BladeProperties) -> Self {
        Self { blade, ..*self }
    }
}

/// Unit tangent orthogonal to `normal`, with handedness in `w`.
///
/// Uses `normal × Y`; when the normal is (anti)parallel to Y the cross
/// product degenerates and `normal × X` is used instead.
pub fn tangent_from_normal(normal: Vec3) -> Vec4 {
    let mut tangent = normal.cross(Vec3::Y);

    if tangent.length_squared() < DEGENERATE_TANGENT_EPSILON {
        tangent = normal.cross(Vec3::X);
    }

    tangent.normalize_or_zero().extend(TANGENT_HANDEDNESS)
}

/// Semantic of a vertex buffer attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    Position,
    Normal,
    Tangent,
    Color,
    TexCoord0,
    TexCoord1,
    TexCoord2,
    TexCoord3,
}

/// One float32 attribute of the instance vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeDescriptor {
    pub attribute: VertexAttribute,
    /// Number of float32 components
    pub components: u32,
    /// Byte offset inside [`BladeInstance`]
    pub offset: usize,
}

impl VertexAttributeDescriptor {
    const fn new(attribute: VertexAttribute, components: u32, offset: usize) -> Self {
        Self {
            attribute,
            components,
            offset,
        }
    }
}

/// Vertex layout of [`BladeInstance`] as seen by the grass shader.
///
/// Color carries the base color, TexCoord0 the tip color, TexCoord1 the
/// lightmap UV, TexCoord2 shape/width/height/pitch and TexCoord3
/// bend/bend exponent/spread.
pub const VERTEX_ATTRIBUTES: [VertexAttributeDescriptor; 8] = [
    VertexAttributeDescriptor::new(VertexAttribute::Position, 3, 0),
    VertexAttributeDescriptor::new(VertexAttribute::Normal, 3, 12),
    VertexAttributeDescriptor::new(VertexAttribute::Tangent, 4, 24),
    VertexAttributeDescriptor::new(VertexAttribute::Color, 3, 40),
    VertexAttributeDescriptor::new(VertexAttribute::TexCoord0, 3, 52),
    VertexAttributeDescriptor::new(VertexAttribute::TexCoord1, 2, 64),
    VertexAttributeDescriptor::new(VertexAttribute::TexCoord2, 4, 72),
    VertexAttributeDescriptor::new(VertexAttribute::TexCoord3, 3, 88),
];

const _: () = assert!(std::mem::size_of::<BladeInstance>() == INSTANCE_STRIDE);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    fn target() -> BladeProperties {
        BladeProperties {
            base_color: [1.0, 0.0, 0.0],
            tip_color: [0.0, 0.0, 1.0],
            lightmap_uv: [1.0, 1.0],
            shape_index: 7,
            width: 2.0,
            height: 2.0,
            pitch: 90.0,
            bend: 2.0,
            bend_exponent: 8.0,
            spread: 2.0,
        }
    }

    #[test]
    fn test_instance_layout() {
        assert_eq!(size_of::<BladeProperties>(), 60);
        assert_eq!(size_of::<BladeInstance>(), 100);
        assert_eq!(offset_of!(BladeInstance, normal), 12);
        assert_eq!(offset_of!(BladeInstance, tangent), 24);
        assert_eq!(offset_of!(BladeInstance, blade), 40);

        let last = VERTEX_ATTRIBUTES[VERTEX_ATTRIBUTES.len() - 1];
        assert_eq!(last.offset + last.components as usize * 4, INSTANCE_STRIDE);
        for pair in VERTEX_ATTRIBUTES.windows(2) {
            assert_eq!(pair[0].offset + pair[0].components as usize * 4, pair[1].offset);
        }
    }

    #[test]
    fn test_shape_index_shares_float_slot() {
        let blade = BladeProperties {
            shape_index: 3,
            ..Default::default()
        };
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&blade));
        assert_eq!(floats[8].to_bits(), 3);
        assert_eq!(blade.shape_index_bits().to_bits(), 3);
    }

    #[test]
    fn test_lerp_endpoints() {
        let start = BladeProperties::default();
        let end = target();

        assert_eq!(BladeProperties::lerp(&start, &end, 0.0), start);
        assert_eq!(BladeProperties::lerp(&start, &end, -1.0), start);

        let full = BladeProperties::lerp(&start, &end, 1.0);
        assert_eq!(full.shape_index, start.shape_index);
        assert_eq!(full.base_color, end.base_color);
        assert_eq!(full.height, end.height);
        assert_eq!(BladeProperties::lerp(&start, &end, 3.0), full);
    }

    #[test]
    fn test_lerp_midpoint_keeps_shape() {
        let start = BladeProperties {
            shape_index: 2,
            width: 0.0,
            base_color: [0.0, 0.0, 0.0],
            ..Default::default()
        };
        let mid = BladeProperties::lerp(&start, &target(), 0.5);
        assert_eq!(mid.shape_index, 2);
        assert!((mid.width - 1.0).abs() < 1e-6);
        assert!((mid.base_color[0] - 0.5).abs() < 1e-6);
        assert!((mid.lightmap_uv[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clamped_ranges() {
        let blade = BladeProperties {
            width: 5.0,
            pitch: -3.0,
            bend_exponent: 0.0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(blade.width, 2.0);
        assert_eq!(blade.pitch, 0.0);
        assert_eq!(blade.bend_exponent, 1.0);
    }

    #[test]
    fn test_default_blade_colors() {
        let blade = BladeProperties::default();
        assert_eq!(blade.base_color_srgb(), [0, 100, 0]);
        assert_eq!(blade.tip_color_srgb(), [64, 168, 64]);
    }

    #[test]
    fn test_tangent_orthogonal_to_normal() {
        for normal in [
            Vec3::Z,
            Vec3::X,
            Vec3::new(1.0, 1.0, 0.0).normalize(),
            Vec3::new(0.3, -0.2, 0.9).normalize(),
        ] {
            let tangent = tangent_from_normal(normal);
            assert!((tangent.truncate().length() - 1.0).abs() < 1e-5);
            assert!(tangent.truncate().dot(normal).abs() < 1e-5);
            assert_eq!(tangent.w, TANGENT_HANDEDNESS);
        }
    }

    #[test]
    fn test_tangent_fallback_for_vertical_normal() {
        for normal in [Vec3::Y, Vec3::NEG_Y] {
            let tangent = tangent_from_normal(normal).truncate();
            assert!((tangent.length() - 1.0).abs() < 1e-6);
            assert!(tangent.dot(normal).abs() < 1e-6);
        }
    }
}
