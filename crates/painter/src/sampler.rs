//! Brush footprint sampling for the Add brush.
//!
//! The brush pose is turned into a plane slightly above the surface whose
//! forward axis points back into it. A square grid of `ceil(2·r·d)` cells per
//! side is laid over the plane and every cell whose centre lies inside the
//! brush circle becomes a ray; the corner cells stay inert (`None`) so the
//! output buffer always has the worst-case length and can be written in
//! parallel without resizing.

use glam::{Affine3A, Mat3, Quat, UVec2, Vec2, Vec3};

use crate::brush::BrushProperties;
use crate::constants::DEGENERATE_TANGENT_EPSILON;
use crate::jobs::fill_indexed;
use crate::raycast::RaycastCommand;

/// Rotation whose local +Z axis points along `forward`, keeping +Y as close
/// to world up as possible.
pub fn look_rotation(forward: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }

    let mut up = Vec3::Y;
    if forward.cross(up).length_squared() < DEGENERATE_TANGENT_EPSILON {
        up = Vec3::X;
    }
    let right = up.cross(forward).normalize();
    let up = forward.cross(right);

    Quat::from_mat3(&Mat3::from_cols(right, up, forward))
}

/// Ray grid laid over the brush footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastGrid {
    /// Cells per axis
    pub dimensions: UVec2,
    /// Cell edge length in world units
    pub cell_size: f32,
    /// Grid space to world space; +Z is the ray direction
    pub local_to_world: Affine3A,
}

impl RaycastGrid {
    /// Lay a grid over the brush at `position`, raised `ray_offset` along
    /// `normal`.
    ///
    /// A non-positive or non-finite radius or density gives an empty grid.
    pub fn new(brush: &BrushProperties, position: Vec3, normal: Vec3, ray_offset: f32) -> Self {
        let mut normal = normal.normalize_or_zero();
        if normal == Vec3::ZERO {
            normal = Vec3::Y;
        }

        let valid = brush.radius.is_finite()
            && brush.density.is_finite()
            && brush.radius > 0.0
            && brush.density > 0.0;
        let (dimensions, cell_size) = if valid {
            let side = (2.0 * brush.radius * brush.density).ceil() as u32;
            (UVec2::splat(side), 1.0 / brush.density)
        } else {
            (UVec2::ZERO, 0.0)
        };

        Self {
            dimensions,
            cell_size,
            local_to_world: Affine3A::from_rotation_translation(
                look_rotation(-normal),
                position + normal * ray_offset,
            ),
        }
    }

    /// Upper bound on the number of rays (every cell of the square).
    pub fn max_samples(&self) -> usize {
        self.dimensions.x as usize * self.dimensions.y as usize
    }

    /// Ray direction shared by all cells.
    pub fn forward(&self) -> Vec3 {
        self.local_to_world.matrix3.z_axis.into()
    }

    /// Grid-space centre of cell `index`, relative to the brush origin.
    pub fn grid_position(&self, index: usize) -> Vec2 {
        let width = self.dimensions.x.max(1) as usize;
        let cell = Vec2::new((index % width) as f32, (index / width) as f32);
        (cell + 0.5 - 0.5 * self.dimensions.as_vec2()) * self.cell_size
    }

    /// The ray for cell `index`, or `None` when the cell lies outside the
    /// brush circle.
    pub fn command(
        &self,
        index: usize,
        brush: &BrushProperties,
        max_distance: f32,
    ) -> Option<RaycastCommand> {
        let position = self.grid_position(index);
        if position.length_squared() > brush.radius_squared() {
            return None;
        }

        Some(RaycastCommand {
            origin: self.local_to_world.transform_point3(position.extend(0.0)),
            direction: self.forward(),
            max_distance,
            layer_mask: brush.raycast_layer,
        })
    }

    /// Build the full command buffer in parallel. Must run inside the worker
    /// pool to use it; otherwise rayon's global pool is used.
    pub fn build_commands(
        &self,
        brush: &BrushProperties,
        max_distance: f32,
        batch: usize,
    ) -> Vec<Option<RaycastCommand>> {
        let mut commands = vec![None; self.max_samples()];
        fill_indexed(&mut commands, batch, |index| {
            self.command(index, brush, max_distance)
        });
        commands
    }
}
