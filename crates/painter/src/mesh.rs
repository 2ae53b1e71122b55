//! Render buffer synchronization for painted grass.
//!
//! The grass renders as a point mesh: one vertex per [`BladeInstance`] and a
//! sequential index buffer. Both buffers are sized to the store capacity so a
//! stroke only rewrites the populated prefix; the index range submitted for
//! drawing and the bounds always cover exactly that prefix.

use glam::Vec3;
use tracing::trace;

use crate::error::PainterError;
use crate::jobs::fill_indexed;
use crate::types::BladeInstance;

/// Axis-aligned bounding box in object space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Aabb {
    /// Degenerate box at the origin (bounds of an empty mesh).
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted box that any included point replaces.
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Smallest box holding every point, or [`Aabb::ZERO`] for none.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bounds = Self::empty();
        let mut any = false;
        for point in points {
            bounds.include_point(point);
            any = true;
        }
        if any { bounds } else { Self::ZERO }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Point mesh mirroring the populated range of an instance store.
#[derive(Debug, Clone)]
pub struct GrassMesh {
    vertices: Vec<BladeInstance>,
    indices: Vec<u32>,
    populated: usize,
    bounds: Aabb,
}

impl GrassMesh {
    /// Allocate buffers for `capacity` instances.
    pub fn new(capacity: usize, batch: usize) -> Result<Self, PainterError> {
        let mut mesh = Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            populated: 0,
            bounds: Aabb::ZERO,
        };
        mesh.resize(capacity, batch)?;
        Ok(mesh)
    }

    /// Reallocate the buffers for a new capacity. The populated range is
    /// clamped to it; callers upload afterwards.
    ///
    /// On allocation failure the mesh is left as it was.
    pub fn resize(&mut self, capacity: usize, batch: usize) -> Result<(), PainterError> {
        let unavailable = |_| PainterError::CapacityUnavailable {
            requested: capacity,
        };
        let mut indices: Vec<u32> = Vec::new();
        indices.try_reserve_exact(capacity).map_err(unavailable)?;
        self.vertices
            .try_reserve_exact(capacity.saturating_sub(self.vertices.len()))
            .map_err(unavailable)?;

        self.vertices.resize(capacity, bytemuck::Zeroable::zeroed());
        self.vertices.shrink_to_fit();

        indices.resize(capacity, 0);
        fill_indexed(&mut indices, batch, |i| i as u32);
        self.indices = indices;

        self.populated = self.populated.min(capacity);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Number of vertices drawn.
    pub fn populated(&self) -> usize {
        self.populated
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Copy `instances` into the front of the vertex buffer and recompute
    /// the bounds over them. Grows the buffers when they do not fit.
    pub fn upload(&mut self, instances: &[BladeInstance], batch: usize) -> Result<(), PainterError> {
        if instances.len() > self.capacity() {
            self.resize(instances.len(), batch)?;
        }

        self.vertices[..instances.len()].copy_from_slice(instances);
        self.populated = instances.len();
        self.bounds = Aabb::from_points(instances.iter().map(BladeInstance::position));

        trace!(
            "GrassMesh: uploaded {} vertices, bounds {:?}..{:?}",
            self.populated,
            self.bounds.min,
            self.bounds.max
        );
        Ok(())
    }

    /// Populated vertices.
    pub fn vertices(&self) -> &[BladeInstance] {
        &self.vertices[..self.populated]
    }

    /// Point indices to draw (`0..populated`).
    pub fn indices(&self) -> &[u32] {
        &self.indices[..self.populated]
    }

    /// Raw bytes of the populated vertices, laid out per
    /// [`crate::types::VERTEX_ATTRIBUTES`].
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.vertices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INSTANCE_STRIDE;
    use crate::types::BladeProperties;

    fn at(x: f32, y: f32, z: f32) -> BladeInstance {
        BladeInstance::anchored(Vec3::new(x, y, z), Vec3::Y, BladeProperties::default())
    }

    #[test]
    fn test_new_mesh_is_empty() {
        let mesh = GrassMesh::new(64, 8).unwrap();
        assert_eq!(mesh.capacity(), 64);
        assert_eq!(mesh.populated(), 0);
        assert!(mesh.indices().is_empty());
        assert!(mesh.vertex_bytes().is_empty());
        assert_eq!(mesh.bounds(), Aabb::ZERO);
    }

    #[test]
    fn test_upload_covers_populated_range() {
        let mut mesh = GrassMesh::new(16, 4).unwrap();
        let instances = [at(-1.0, 0.0, 2.0), at(3.0, 1.0, 0.0), at(0.0, -2.0, 0.0)];
        mesh.upload(&instances, 4).unwrap();

        assert_eq!(mesh.populated(), 3);
        assert_eq!(mesh.indices(), &[0, 1, 2]);
        assert_eq!(mesh.vertex_bytes().len(), 3 * INSTANCE_STRIDE);
        assert_eq!(mesh.bounds().min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(mesh.bounds().max, Vec3::new(3.0, 1.0, 2.0));
    }

    #[test]
    fn test_bounds_ignore_stale_vertices() {
        let mut mesh = GrassMesh::new(16, 4).unwrap();
        mesh.upload(&[at(100.0, 0.0, 0.0), at(0.0, 0.0, 0.0)], 4).unwrap();
        mesh.upload(&[at(1.0, 1.0, 1.0)], 4).unwrap();

        assert_eq!(mesh.populated(), 1);
        assert_eq!(mesh.bounds(), Aabb::new(Vec3::ONE, Vec3::ONE));

        mesh.upload(&[], 4).unwrap();
        assert_eq!(mesh.bounds(), Aabb::ZERO);
    }

    #[test]
    fn test_upload_grows_buffers() {
        let mut mesh = GrassMesh::new(2, 4).unwrap();
        let instances: Vec<_> = (0..5).map(|i| at(i as f32, 0.0, 0.0)).collect();
        mesh.upload(&instances, 4).unwrap();
        assert_eq!(mesh.capacity(), 5);
        assert_eq!(mesh.indices(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_resize_clamps_populated() {
        let mut mesh = GrassMesh::new(8, 4).unwrap();
        let instances: Vec<_> = (0..6).map(|i| at(i as f32, 0.0, 0.0)).collect();
        mesh.upload(&instances, 4).unwrap();
        mesh.resize(4, 4).unwrap();
        assert_eq!(mesh.populated(), 4);
        assert_eq!(mesh.indices().len(), 4);
    }

    #[test]
    fn test_failed_resize_keeps_buffers() {
        let mut mesh = GrassMesh::new(8, 4).unwrap();
        mesh.upload(&[at(1.0, 0.0, 0.0), at(2.0, 0.0, 0.0)], 4).unwrap();

        let err = mesh.resize(usize::MAX / 2, 4).unwrap_err();
        assert!(matches!(err, PainterError::CapacityUnavailable { .. }));
        assert_eq!(mesh.capacity(), 8);
        assert_eq!(mesh.populated(), 2);
        assert_eq!(mesh.indices(), &[0, 1]);
    }

    #[test]
    fn test_aabb_contains() {
        let bounds = Aabb::from_points([Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0)]);
        assert_eq!(bounds.center(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(bounds.size(), Vec3::new(2.0, 4.0, 6.0));
        assert!(bounds.contains_point(Vec3::ONE));
        assert!(!bounds.contains_point(Vec3::splat(-0.1)));
    }
}
