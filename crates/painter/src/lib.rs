//! Grass painting core.
//!
//! This crate paints procedural grass onto arbitrary mesh surfaces with a
//! brush and keeps a render-ready point buffer in sync:
//! - Add: raycast a grid over the brush footprint and anchor new blades
//! - Remove: fade out and drop blades under the brush
//! - Modify / Replace: blend or overwrite blade properties under the brush
//! - Copy: pick up the properties of the blade nearest the brush
//!
//! # Architecture
//!
//! Blades live in a capacity-bounded [`InstanceStore`] owned by the
//! [`BrushEngine`]. Strokes run as data-parallel batch jobs on a bounded
//! worker pool, and after each stroke the populated range is uploaded to a
//! [`GrassMesh`]. Hit testing is delegated to a host [`SurfaceRaycaster`].
//!
//! ## Key Components
//!
//! - **Types**: Blade properties and the 100-byte instance record
//! - **Brush**: Radius, density, smoothing and the falloff curve
//! - **Sampler**: Brush pose to ray grid
//! - **Store**: Instance storage, snapshots and clearing
//! - **Mesh**: Vertex/index buffers and bounds
//! - **Engine**: Stroke dispatch, capacity management and lifecycle

pub mod brush;
pub mod color;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod jobs;
pub mod mesh;
pub mod presets;
pub mod raycast;
pub mod sampler;
pub mod store;
pub mod stroke;
pub mod types;

pub use brush::{BrushOverrides, BrushProperties, PainterMode};
pub use engine::{BrushEngine, PaintResult};
pub use error::PainterError;
pub use events::PainterEvent;
pub use mesh::{Aabb, GrassMesh};
pub use presets::{GrassPreset, GrassPresets};
pub use raycast::{
    ColliderId, ColliderSet, LayerMask, MeshCollider, RaycastCommand, RaycastHit,
    SurfaceRaycaster,
};
pub use store::{ClearScope, GrassSnapshot, InstanceStore};
pub use types::{BladeInstance, BladeProperties, VERTEX_ATTRIBUTES};

pub use grass_painter_config::PainterConfig;
