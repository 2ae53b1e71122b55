//! Grass brush engine.
//!
//! [`BrushEngine`] owns the instance store and the render mesh and applies
//! brush strokes to them. Every mutating paint call runs its data-parallel
//! stages on the engine's worker pool, blocks until they finish and then
//! re-uploads the populated range to the mesh.
//!
//! Instances are stored in object space. World-space brush input is moved
//! into object space with the engine's transform before any distance test.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{Affine3A, Vec3};
use grass_painter_config::PainterConfig;
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::brush::{BrushOverrides, BrushProperties, PainterMode};
use crate::error::PainterError;
use crate::events::{PainterEvent, PainterEvents};
use crate::jobs::{raycast_batch, PaintWorkers};
use crate::mesh::GrassMesh;
use crate::presets::GrassPresets;
use crate::raycast::{RaycastHit, SurfaceRaycaster};
use crate::sampler::RaycastGrid;
use crate::store::{ClearScope, GrassSnapshot, InstanceStore};
use crate::stroke::{ActiveStroke, StrokeTracker};
use crate::types::{BladeInstance, BladeProperties};

/// What a single paint call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintResult {
    pub mode: PainterMode,
    /// Instances added, modified or replaced. For Remove, the instances
    /// dropped plus those shortened by the falloff. 1 or 0 for Copy.
    pub affected: usize,
    /// Instance count after the call
    pub count: usize,
}

/// Paints grass instances onto surfaces.
#[derive(Debug)]
#[cfg_attr(feature = "bevy", derive(bevy::prelude::Resource))]
pub struct BrushEngine {
    config: PainterConfig,
    local_to_world: Affine3A,
    world_to_local: Affine3A,
    brush: BrushProperties,
    blade: BladeProperties,
    presets: GrassPresets,
    store: InstanceStore,
    mesh: Option<GrassMesh>,
    workers: PaintWorkers,
    strokes: StrokeTracker,
    events: PainterEvents,
}

impl BrushEngine {
    /// Create an engine with an empty store of `config.default_capacity`.
    pub fn new(config: PainterConfig) -> Result<Self, PainterError> {
        config.validate()?;
        InstanceStore::check_capacity(config.default_capacity)?;
        let workers = PaintWorkers::from_config(&config)?;
        debug!(
            "BrushEngine: created with capacity {} on {} workers",
            config.default_capacity,
            workers.thread_count()
        );

        Ok(Self {
            store: InstanceStore::new(config.default_capacity),
            config,
            local_to_world: Affine3A::IDENTITY,
            world_to_local: Affine3A::IDENTITY,
            brush: BrushProperties::default(),
            blade: BladeProperties::default(),
            presets: GrassPresets::builtin(),
            mesh: None,
            workers,
            strokes: StrokeTracker::new(),
            events: PainterEvents::new(),
        })
    }

    /// Place the painted object in the world.
    pub fn set_transform(&mut self, local_to_world: Affine3A) {
        self.local_to_world = local_to_world;
        self.world_to_local = local_to_world.inverse();
    }

    pub fn with_transform(mut self, local_to_world: Affine3A) -> Self {
        self.set_transform(local_to_world);
        self
    }

    pub fn local_to_world(&self) -> Affine3A {
        self.local_to_world
    }

    pub fn config(&self) -> &PainterConfig {
        &self.config
    }

    pub fn brush_properties(&self) -> &BrushProperties {
        &self.brush
    }

    /// Target blade properties for Add, Modify and Replace.
    pub fn blade_properties(&self) -> &BladeProperties {
        &self.blade
    }

    pub fn presets(&self) -> &GrassPresets {
        &self.presets
    }

    pub fn set_presets(&mut self, presets: GrassPresets) {
        self.presets = presets;
    }

    pub fn count(&self) -> usize {
        self.store.len()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Fraction of the capacity still unused.
    pub fn free_space(&self) -> f32 {
        self.store.free_space()
    }

    pub fn instances(&self) -> &[BladeInstance] {
        self.store.as_slice()
    }

    /// The render mesh, if it has been built.
    pub fn mesh(&self) -> Option<&GrassMesh> {
        self.mesh.as_ref()
    }

    pub fn add_event_listener<F>(&mut self, listener: F)
    where
        F: Fn(PainterEvent) + Send + Sync + 'static,
    {
        self.events.add_listener(listener);
    }

    /// Update any subset of the brush properties.
    pub fn set_brush_properties(&mut self, overrides: BrushOverrides) {
        self.brush = self.brush.with_overrides(overrides);
    }

    pub fn set_blade_properties(&mut self, blade: BladeProperties) {
        self.blade = blade.clamped();
    }

    /// Make the preset called `name` the target blade properties.
    pub fn apply_preset(&mut self, name: &str) -> Result<(), PainterError> {
        self.blade = *self.presets.get(name)?;
        debug!("BrushEngine: applied preset '{}'", name);
        Ok(())
    }

    /// Apply the brush at a world-space surface point.
    ///
    /// `CapacityExceeded` leaves the store untouched and can be treated as a
    /// skipped stroke.
    pub fn paint<R>(
        &mut self,
        raycaster: &R,
        position: Vec3,
        normal: Vec3,
    ) -> Result<PaintResult, PainterError>
    where
        R: SurfaceRaycaster + ?Sized,
    {
        let mode = self.brush.mode;
        let affected = match mode {
            PainterMode::None => return Err(PainterError::InvalidMode(mode)),
            PainterMode::Add => self.add_grass(raycaster, position, normal)?,
            PainterMode::Remove => self.remove_grass(position),
            PainterMode::Modify => self.modify_grass(position),
            PainterMode::Replace => self.replace_grass(position),
            PainterMode::Copy => usize::from(self.copy_grass(position)),
        };

        let count = self.store.len();
        if mode.mutates_store() {
            self.update_mesh()?;
            self.events.emit(PainterEvent::Painted { mode, count });
        }
        debug!(
            "BrushEngine: {:?} at {:?} affected {} instances ({}/{})",
            mode,
            position,
            affected,
            count,
            self.store.capacity()
        );

        Ok(PaintResult {
            mode,
            affected,
            count,
        })
    }

    fn add_grass<R>(&mut self, raycaster: &R, position: Vec3, normal: Vec3) -> Result<usize, PainterError>
    where
        R: SurfaceRaycaster + ?Sized,
    {
        self.brush.validate()?;
        let grid = RaycastGrid::new(&self.brush, position, normal, self.config.ray_offset);

        let count = self.store.len();
        let capacity = self.store.capacity();
        let max_samples = grid.max_samples();
        if count >= capacity {
            warn!("BrushEngine: unable to add grass, capacity {} reached", capacity);
            return Err(PainterError::CapacityExceeded {
                count,
                requested: max_samples,
                capacity,
            });
        }
        // Every cell is assumed to hit, so strokes near the limit are skipped
        // even when fewer blades would actually be added.
        if count + max_samples > capacity {
            warn!(
                "BrushEngine: unable to add grass, {} samples could exceed capacity ({}/{})",
                max_samples, count, capacity
            );
            return Err(PainterError::CapacityExceeded {
                count,
                requested: max_samples,
                capacity,
            });
        }

        let brush = self.brush;
        let blade = self.blade;
        let world_to_local = self.world_to_local;
        let brush_position = world_to_local.transform_point3(position);
        let max_distance = self.config.ray_max_distance;
        let batch = self.workers.batch_size();

        let instances: Vec<BladeInstance> = self.workers.install(|| {
            let commands = grid.build_commands(&brush, max_distance, batch);
            trace!("add_grass: {} rays", commands.iter().flatten().count());

            let hits = raycast_batch(&commands, raycaster, batch);
            hits.into_par_iter()
                .with_min_len(batch)
                .filter_map(|hit| {
                    hit.map(|hit| instance_from_hit(&hit, &world_to_local, &brush, brush_position, &blade))
                })
                .collect()
        });
        trace!("add_grass: {} hits", instances.len());

        self.store.extend_from_slice(&instances)?;
        Ok(instances.len())
    }

    fn remove_grass(&mut self, position: Vec3) -> usize {
        let brush = self.brush;
        let center = self.world_to_local.transform_point3(position);
        let batch = self.workers.batch_size();
        let store = &mut self.store;
        let rescaled = AtomicUsize::new(0);

        let dropped = self.workers.install(|| {
            store.filter_map_parallel(batch, |instance| {
                let factor = brush.inverse_smoothing_factor(instance.position(), center);
                if factor <= 0.0 {
                    return None;
                }
                if factor < 1.0 {
                    rescaled.fetch_add(1, Ordering::Relaxed);
                }
                Some(instance.with_blade(instance.blade.with_height_scaled(factor)))
            })
        });
        dropped + rescaled.into_inner()
    }

    fn modify_grass(&mut self, position: Vec3) -> usize {
        let brush = self.brush;
        let target = self.blade;
        let center = self.world_to_local.transform_point3(position);
        let batch = self.workers.batch_size();
        let store = &mut self.store;

        self.workers.install(|| {
            store.map_in_place_parallel(batch, |instance| {
                let factor = brush.smoothing_factor(instance.position(), center);
                if factor <= 0.0 {
                    return false;
                }
                instance.blade = BladeProperties::lerp(&instance.blade, &target, factor);
                true
            })
        })
    }

    fn replace_grass(&mut self, position: Vec3) -> usize {
        let brush = self.brush;
        let target = self.blade;
        let center = self.world_to_local.transform_point3(position);
        let batch = self.workers.batch_size();
        let store = &mut self.store;

        self.workers.install(|| {
            store.map_in_place_parallel(batch, |instance| {
                if brush.smoothing_factor(instance.position(), center) <= 0.0 {
                    return false;
                }
                instance.blade = target;
                true
            })
        })
    }

    /// Adopt the properties of the instance nearest the brush centre.
    fn copy_grass(&mut self, position: Vec3) -> bool {
        let radius_squared = self.brush.radius_squared();
        let center = self.world_to_local.transform_point3(position);
        let batch = self.workers.batch_size();
        let instances = self.store.as_slice();

        let nearest = self.workers.install(|| {
            instances
                .par_iter()
                .with_min_len(batch)
                .map(|instance| (instance.position().distance_squared(center), instance))
                .filter(|(distance_squared, _)| *distance_squared <= radius_squared)
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, instance)| instance.blade)
        });

        match nearest {
            Some(blade) => {
                self.blade = blade;
                true
            }
            None => false,
        }
    }

    /// Upload the populated range of the store to the mesh, building the
    /// mesh first if needed.
    ///
    /// If the mesh buffers cannot be allocated the mesh is dropped, so it
    /// never shows instances the store no longer holds.
    pub fn update_mesh(&mut self) -> Result<(), PainterError> {
        let batch = self.workers.batch_size();
        let capacity = self.store.capacity();
        let instances = self.store.as_slice();
        let mesh = &mut self.mesh;

        let uploaded = self.workers.install(|| match mesh {
            Some(existing) => existing.upload(instances, batch),
            None => {
                let mut built = GrassMesh::new(capacity, batch)?;
                built.upload(instances, batch)?;
                *mesh = Some(built);
                Ok(())
            }
        });
        if let Err(err) = &uploaded {
            warn!("BrushEngine: dropping mesh: {}", err);
            self.mesh = None;
        }
        uploaded
    }

    /// Change the capacity; see [`InstanceStore::set_capacity`].
    ///
    /// A capacity the store cannot allocate fails with `CapacityUnavailable`
    /// before anything changes. If only the mesh buffers fail, the mesh is
    /// dropped and rebuilt by the next upload.
    pub fn set_capacity(&mut self, capacity: usize, force: bool) -> Result<(), PainterError> {
        let previous = self.store.capacity();
        let count = self.store.len();

        if let Err(err) = self.store.set_capacity(capacity, force) {
            debug!("BrushEngine: capacity change rejected: {}", err);
            return Err(err);
        }

        let batch = self.workers.batch_size();
        let resized = match &mut self.mesh {
            Some(mesh) => self.workers.install(|| mesh.resize(capacity, batch)),
            None => Ok(()),
        };
        if let Err(err) = resized {
            warn!("BrushEngine: dropping mesh after capacity change: {}", err);
            self.mesh = None;
            return Err(err);
        }
        if self.mesh.is_some() {
            self.update_mesh()?;
        }

        self.events.emit(PainterEvent::CapacityChanged {
            previous,
            capacity,
            truncated: count - self.store.len(),
        });
        Ok(())
    }

    /// Change the capacity, asking `confirm` before discarding instances.
    ///
    /// Returns whether the capacity was changed.
    pub fn set_capacity_with_confirmation<F>(
        &mut self,
        capacity: usize,
        confirm: F,
    ) -> Result<bool, PainterError>
    where
        F: FnOnce(&PainterError) -> bool,
    {
        match self.set_capacity(capacity, false) {
            Ok(()) => Ok(true),
            Err(err @ PainterError::CapacityShrinkDataLoss { .. }) => {
                if confirm(&err) {
                    self.set_capacity(capacity, true)?;
                    Ok(true)
                } else {
                    info!("BrushEngine: capacity change to {} declined", capacity);
                    Ok(false)
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Discard stored instances. Clearing the runtime data drops the mesh;
    /// otherwise an existing mesh is re-uploaded from what remains.
    pub fn clear(&mut self, scope: ClearScope) -> Result<(), PainterError> {
        self.store.clear(scope);
        if scope.includes_runtime() {
            self.mesh = None;
        } else if self.mesh.is_some() {
            self.update_mesh()?;
        }
        info!("BrushEngine: cleared {:?}", scope);
        self.events.emit(PainterEvent::Cleared { scope });
        Ok(())
    }

    pub fn snapshot(&self) -> GrassSnapshot {
        self.store.snapshot()
    }

    /// Replace the stored instances, e.g. after an undo step.
    pub fn restore(&mut self, snapshot: GrassSnapshot) -> Result<(), PainterError> {
        let count = snapshot.len();
        self.store.restore(snapshot);
        self.update_mesh()?;
        self.events.emit(PainterEvent::Restored { count });
        Ok(())
    }

    /// Start a brush stroke and paint at its first point.
    ///
    /// The first point only paints if it moved at least the click spacing
    /// from the last painted point. Returns `None` when nothing was painted.
    pub fn begin_stroke<R>(
        &mut self,
        raycaster: &R,
        position: Vec3,
        normal: Vec3,
    ) -> Result<Option<PaintResult>, PainterError>
    where
        R: SurfaceRaycaster + ?Sized,
    {
        let mode = self.brush.mode;
        if mode == PainterMode::None {
            return Err(PainterError::InvalidMode(mode));
        }

        let (stroke, previous) = self.strokes.begin(mode);
        if let Some(previous) = previous {
            self.emit_stroke_ended(previous);
        }
        self.events.emit(PainterEvent::StrokeStarted {
            stroke_id: stroke.stroke_id,
            mode,
        });

        self.paint_spaced(raycaster, position, normal, self.config.click_spacing)
    }

    /// Continue the active stroke. Paints only once the brush moved at
    /// least the drag spacing (a fraction of the radius) since the last
    /// paint.
    pub fn drag_stroke<R>(
        &mut self,
        raycaster: &R,
        position: Vec3,
        normal: Vec3,
    ) -> Result<Option<PaintResult>, PainterError>
    where
        R: SurfaceRaycaster + ?Sized,
    {
        if self.strokes.active().is_none() {
            return Ok(None);
        }
        let spacing = self.config.drag_spacing(self.brush.radius);
        self.paint_spaced(raycaster, position, normal, spacing)
    }

    pub fn end_stroke(&mut self) -> Option<ActiveStroke> {
        let stroke = self.strokes.end()?;
        self.emit_stroke_ended(stroke);
        Some(stroke)
    }

    fn emit_stroke_ended(&self, stroke: ActiveStroke) {
        self.events.emit(PainterEvent::StrokeEnded {
            stroke_id: stroke.stroke_id,
            mode: stroke.mode,
            dabs: stroke.dabs,
        });
    }

    fn paint_spaced<R>(
        &mut self,
        raycaster: &R,
        position: Vec3,
        normal: Vec3,
        spacing: f32,
    ) -> Result<Option<PaintResult>, PainterError>
    where
        R: SurfaceRaycaster + ?Sized,
    {
        if !self.strokes.should_paint(position, spacing) {
            return Ok(None);
        }
        let result = self.paint(raycaster, position, normal);
        // A skipped stroke still counts as painted for spacing
        self.strokes.record_paint(position);
        result.map(Some)
    }

    /// Allocate the live store and build the mesh.
    pub fn initialize(&mut self) -> Result<(), PainterError> {
        self.store.materialize();
        self.update_mesh()?;
        debug!("BrushEngine: initialized with {} instances", self.store.len());
        Ok(())
    }

    /// Move live data into the persisted snapshot and release the live store
    /// and the mesh.
    pub fn teardown(&mut self) {
        self.end_stroke();
        let persisted = self.store.persist().len();
        self.mesh = None;
        debug!("BrushEngine: torn down, {} instances persisted", persisted);
    }

    /// Persist the live data and return it for serialization.
    pub fn before_serialize(&mut self) -> GrassSnapshot {
        GrassSnapshot::new(self.store.persist().to_vec())
    }

    /// Load deserialized instances.
    pub fn after_deserialize(&mut self, snapshot: GrassSnapshot) {
        self.store.restore(snapshot);
        self.mesh = None;
    }
}

/// Object-space instance for a surface hit, with the blade height faded by
/// the brush falloff.
fn instance_from_hit(
    hit: &RaycastHit,
    world_to_local: &Affine3A,
    brush: &BrushProperties,
    brush_position: Vec3,
    blade: &BladeProperties,
) -> BladeInstance {
    let position = world_to_local.transform_point3(hit.point);
    let mut normal = world_to_local.transform_vector3(hit.normal).normalize_or_zero();
    if normal == Vec3::ZERO {
        normal = Vec3::Y;
    }
    let factor = brush.smoothing_factor(position, brush_position);
    BladeInstance::anchored(position, normal, blade.with_height_scaled(factor))
}
