//! Surface hit testing for the Add brush.
//!
//! The painter does not own a collision system; it hands batches of
//! [`RaycastCommand`]s to a [`SurfaceRaycaster`] supplied by the host. A small
//! triangle-mesh implementation ([`MeshCollider`], [`ColliderSet`]) using the
//! Möller–Trumbore intersection test is provided for hosts without one.

use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};

/// Epsilon for floating point comparisons in ray intersection
const EPSILON: f32 = 1e-6;

/// Bit mask of collision layers a ray may hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);
    /// Only layer 0
    pub const DEFAULT: Self = Self(1);

    /// Mask containing a single layer.
    pub fn from_layer(layer: u8) -> Self {
        Self(1u32.checked_shl(layer as u32).unwrap_or(0))
    }

    pub fn contains_layer(&self, layer: u8) -> bool {
        self.0 & Self::from_layer(layer).0 != 0
    }
}

/// Identifier of the collider a ray hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColliderId(pub u32);

/// One ray of a batched surface query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastCommand {
    /// World-space ray origin
    pub origin: Vec3,
    /// World-space unit direction
    pub direction: Vec3,
    /// Hits farther than this are ignored
    pub max_distance: f32,
    /// Layers the ray may hit
    pub layer_mask: LayerMask,
}

/// Result of a successful ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// World-space hit point
    pub point: Vec3,
    /// World-space unit surface normal, facing the ray origin
    pub normal: Vec3,
    /// Distance along the ray
    pub distance: f32,
    /// The collider that was hit
    pub collider: ColliderId,
}

/// Ray-vs-surface collision system consumed by the brush engine.
///
/// Called from worker threads, one command at a time, in batches whose
/// output order matches the input order.
pub trait SurfaceRaycaster: Sync {
    fn raycast(&self, command: &RaycastCommand) -> Option<RaycastHit>;
}

impl<F> SurfaceRaycaster for F
where
    F: Fn(&RaycastCommand) -> Option<RaycastHit> + Sync,
{
    fn raycast(&self, command: &RaycastCommand) -> Option<RaycastHit> {
        self(command)
    }
}

/// Result of a ray-triangle intersection test
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    /// Distance along the ray to the intersection point
    pub t: f32,
    /// Barycentric coordinate u (weight for vertex 1)
    pub u: f32,
    /// Barycentric coordinate v (weight for vertex 2)
    pub v: f32,
}

/// Moller-Trumbore ray-triangle intersection algorithm.
///
/// Two-sided: hits are reported regardless of the triangle's winding.
pub fn ray_triangle_intersection(
    ray_origin: Vec3,
    ray_dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let pvec = ray_dir.cross(edge2);
    let det = edge1.dot(pvec);

    // Ray parallel to the triangle plane
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray_origin - v0;

    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray_dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t < EPSILON {
        return None;
    }

    Some(TriangleHit { t, u, v })
}

/// Indexed triangle mesh placed in the world on a single layer.
#[derive(Debug, Clone)]
pub struct MeshCollider {
    pub id: ColliderId,
    pub layer: u8,
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    local_to_world: Affine3A,
    world_to_local: Affine3A,
}

impl MeshCollider {
    /// Create a collider from object-space triangles (3 indices each).
    pub fn new(id: ColliderId, layer: u8, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            id,
            layer,
            positions,
            indices,
            local_to_world: Affine3A::IDENTITY,
            world_to_local: Affine3A::IDENTITY,
        }
    }

    /// Axis-aligned square in the XZ plane facing +Y.
    pub fn quad(id: ColliderId, layer: u8, center: Vec3, half_extent: f32) -> Self {
        let h = half_extent;
        let positions = vec![
            center + Vec3::new(-h, 0.0, -h),
            center + Vec3::new(-h, 0.0, h),
            center + Vec3::new(h, 0.0, h),
            center + Vec3::new(h, 0.0, -h),
        ];
        Self::new(id, layer, positions, vec![0, 1, 2, 0, 2, 3])
    }

    /// Place the collider in the world.
    pub fn with_transform(mut self, local_to_world: Affine3A) -> Self {
        self.local_to_world = local_to_world;
        self.world_to_local = local_to_world.inverse();
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn triangle_positions(&self, tri_index: usize) -> (Vec3, Vec3, Vec3) {
        let base = tri_index * 3;
        (
            self.positions[self.indices[base] as usize],
            self.positions[self.indices[base + 1] as usize],
            self.positions[self.indices[base + 2] as usize],
        )
    }
}

impl SurfaceRaycaster for MeshCollider {
    fn raycast(&self, command: &RaycastCommand) -> Option<RaycastHit> {
        if !command.layer_mask.contains_layer(self.layer) {
            return None;
        }

        let origin = self.world_to_local.transform_point3(command.origin);
        let direction = self.world_to_local.transform_vector3(command.direction);

        // Brute force over all triangles, keep the closest
        let mut closest: Option<(TriangleHit, usize)> = None;
        for tri_idx in 0..self.triangle_count() {
            let (v0, v1, v2) = self.triangle_positions(tri_idx);
            if let Some(hit) = ray_triangle_intersection(origin, direction, v0, v1, v2) {
                if closest.is_none_or(|(prev, _)| hit.t < prev.t) {
                    closest = Some((hit, tri_idx));
                }
            }
        }

        let (hit, tri_idx) = closest?;
        let point = self
            .local_to_world
            .transform_point3(origin + direction * hit.t);
        let distance = point.distance(command.origin);
        if distance > command.max_distance {
            return None;
        }

        let (v0, v1, v2) = self.triangle_positions(tri_idx);
        let face_normal = (v1 - v0).cross(v2 - v0);
        // Normals transform with the inverse transpose
        let mut normal = (self.world_to_local.matrix3.transpose() * glam::Vec3A::from(face_normal))
            .normalize_or_zero();
        if normal.dot(command.direction.into()) > 0.0 {
            normal = -normal;
        }

        Some(RaycastHit {
            point,
            normal: normal.into(),
            distance,
            collider: self.id,
        })
    }
}

/// A set of colliders queried together; returns the closest hit.
#[derive(Debug, Clone, Default)]
pub struct ColliderSet {
    colliders: Vec<MeshCollider>,
}

impl ColliderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, collider: MeshCollider) {
        self.colliders.push(collider);
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl SurfaceRaycaster for ColliderSet {
    fn raycast(&self, command: &RaycastCommand) -> Option<RaycastHit> {
        self.colliders
            .iter()
            .filter_map(|collider| collider.raycast(command))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
