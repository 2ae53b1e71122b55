//! Capacity-bounded blade instance storage.
//!
//! The store keeps exactly one authoritative copy of its instances: either
//! the live runtime collection (allocated lazily, sized to the capacity so
//! brush strokes never reallocate) or the persisted flat snapshot used across
//! serialize boundaries. Materializing moves the persisted data in;
//! persisting moves the live data out.

use std::alloc::Layout;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::INSTANCE_STRIDE;
use crate::error::PainterError;
use crate::types::BladeInstance;

/// Which representation [`InstanceStore::clear`] discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearScope {
    /// The live runtime collection only
    Runtime,
    /// The persisted snapshot only
    Serialized,
    /// Both
    #[default]
    Everything,
}

impl ClearScope {
    pub fn includes_runtime(&self) -> bool {
        matches!(self, ClearScope::Runtime | ClearScope::Everything)
    }

    pub fn includes_serialized(&self) -> bool {
        matches!(self, ClearScope::Serialized | ClearScope::Everything)
    }
}

/// Flat, order-preserving copy of a store's instances for persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrassSnapshot {
    pub instances: Vec<BladeInstance>,
}

impl GrassSnapshot {
    pub fn new(instances: Vec<BladeInstance>) -> Self {
        Self { instances }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Raw instance records, in vertex layout order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }

    /// Rebuild a snapshot from [`GrassSnapshot::as_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PainterError> {
        if bytes.len() % INSTANCE_STRIDE != 0 {
            return Err(PainterError::CorruptSnapshot(format!(
                "{} bytes is not a multiple of the {INSTANCE_STRIDE}-byte instance stride",
                bytes.len()
            )));
        }
        let instances = bytes
            .chunks_exact(INSTANCE_STRIDE)
            .map(bytemuck::pod_read_unaligned::<BladeInstance>)
            .collect();
        Ok(Self { instances })
    }

    pub fn to_json(&self) -> Result<String, PainterError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PainterError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Ordered blade instances with a fixed capacity.
///
/// `len() <= capacity()` always holds.
#[derive(Debug, Clone)]
pub struct InstanceStore {
    capacity: usize,
    /// Live runtime collection (None until first mutable access)
    live: Option<Vec<BladeInstance>>,
    /// Persisted snapshot, authoritative only while `live` is None
    persisted: Vec<BladeInstance>,
}

impl InstanceStore {
    /// Create an empty store. No memory is reserved until first use.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            live: None,
            persisted: Vec::new(),
        }
    }

    /// Reject capacities whose instance buffer could never be allocated.
    pub fn check_capacity(capacity: usize) -> Result<(), PainterError> {
        Layout::array::<BladeInstance>(capacity)
            .map(|_| ())
            .map_err(|_| PainterError::CapacityUnavailable {
                requested: capacity,
            })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Number of instances that can still be appended.
    pub fn headroom(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    /// Fraction of the capacity still unused (0 when the capacity is 0).
    pub fn free_space(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        1.0 - self.len() as f32 / self.capacity as f32
    }

    /// Whether the live runtime collection is currently allocated.
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Instances in stored order.
    pub fn as_slice(&self) -> &[BladeInstance] {
        match &self.live {
            Some(live) => live,
            None => &self.persisted,
        }
    }

    pub fn get(&self, index: usize) -> Option<&BladeInstance> {
        self.as_slice().get(index)
    }

    /// Allocate the live collection, moving the persisted snapshot into it.
    pub fn materialize(&mut self) {
        self.live_mut();
    }

    fn live_mut(&mut self) -> &mut Vec<BladeInstance> {
        let capacity = self.capacity;
        let persisted = &mut self.persisted;
        self.live.get_or_insert_with(|| {
            let mut live = std::mem::take(persisted);
            live.reserve_exact(capacity.saturating_sub(live.len()));
            debug!(
                "InstanceStore: materialized {} instances (capacity {})",
                live.len(),
                capacity
            );
            live
        })
    }

    /// Move the live collection into the persisted snapshot and release it.
    ///
    /// Returns the persisted instances.
    pub fn persist(&mut self) -> &[BladeInstance] {
        if let Some(live) = self.live.take() {
            self.persisted = live;
            self.persisted.shrink_to_fit();
        }
        &self.persisted
    }

    /// Append one instance.
    pub fn push(&mut self, instance: BladeInstance) -> Result<(), PainterError> {
        self.extend_from_slice(std::slice::from_ref(&instance))
    }

    /// Append instances in order; fails without change if they do not fit.
    pub fn extend_from_slice(&mut self, instances: &[BladeInstance]) -> Result<(), PainterError> {
        let count = self.len();
        if count + instances.len() > self.capacity {
            return Err(PainterError::CapacityExceeded {
                count,
                requested: instances.len(),
                capacity: self.capacity,
            });
        }
        self.live_mut().extend_from_slice(instances);
        Ok(())
    }

    /// Rebuild the store from the `Some` results of `f`, evaluated in
    /// parallel. Returns how many instances were dropped.
    pub fn filter_map_parallel<F>(&mut self, batch: usize, f: F) -> usize
    where
        F: Fn(&BladeInstance) -> Option<BladeInstance> + Sync,
    {
        let capacity = self.capacity;
        let live = self.live_mut();
        let before = live.len();

        let mut kept: Vec<BladeInstance> = live
            .par_iter()
            .with_min_len(batch.max(1))
            .filter_map(|instance| f(instance))
            .collect();
        kept.reserve_exact(capacity.saturating_sub(kept.len()));
        let dropped = before - kept.len();
        *live = kept;
        dropped
    }

    /// Rewrite instances in place in parallel; `f` returns whether it changed
    /// the instance. Returns the number of changed instances.
    pub fn map_in_place_parallel<F>(&mut self, batch: usize, f: F) -> usize
    where
        F: Fn(&mut BladeInstance) -> bool + Sync,
    {
        self.live_mut()
            .par_iter_mut()
            .with_min_len(batch.max(1))
            .map(|instance| usize::from(f(instance)))
            .sum()
    }

    /// Change the capacity.
    ///
    /// Shrinking below the current count is rejected unless `force` is set,
    /// in which case the trailing instances are discarded. Returns whether
    /// anything was truncated.
    /// Fails without change when the new capacity cannot be allocated.
    pub fn set_capacity(&mut self, capacity: usize, force: bool) -> Result<bool, PainterError> {
        let count = self.len();
        let truncated = capacity < count;

        if truncated && !force {
            return Err(PainterError::CapacityShrinkDataLoss {
                requested: capacity,
                count,
            });
        }
        Self::check_capacity(capacity)?;
        if let Some(live) = &mut self.live {
            live.try_reserve_exact(capacity.saturating_sub(live.len()))
                .map_err(|_| PainterError::CapacityUnavailable {
                    requested: capacity,
                })?;
        }

        if truncated {
            warn!(
                "InstanceStore: truncating {} instances to new capacity {}",
                count - capacity,
                capacity
            );
            match &mut self.live {
                Some(live) => live.truncate(capacity),
                None => self.persisted.truncate(capacity),
            }
        }

        info!("InstanceStore: capacity {} -> {}", self.capacity, capacity);
        self.capacity = capacity;
        if let Some(live) = &mut self.live {
            live.shrink_to(capacity);
        }
        Ok(truncated)
    }

    /// Flat copy of the current contents.
    pub fn snapshot(&self) -> GrassSnapshot {
        GrassSnapshot::new(self.as_slice().to_vec())
    }

    /// Make `snapshot` the live contents and drop any persisted copy.
    ///
    /// A snapshot larger than the capacity grows the capacity to fit.
    pub fn restore(&mut self, snapshot: GrassSnapshot) {
        let mut instances = snapshot.instances;
        if instances.len() > self.capacity {
            warn!(
                "InstanceStore: snapshot of {} instances exceeds capacity {}, growing",
                instances.len(),
                self.capacity
            );
            self.capacity = instances.len();
        }
        instances.reserve_exact(self.capacity - instances.len());
        self.live = Some(instances);
        self.persisted = Vec::new();
    }

    /// Discard the representations selected by `scope`.
    ///
    /// Clearing only the runtime collection leaves whatever was persisted to
    /// be materialized again on next use.
    pub fn clear(&mut self, scope: ClearScope) {
        if scope.includes_runtime() {
            self.live = None;
        }
        if scope.includes_serialized() {
            self.persisted = Vec::new();
        }
        debug!("InstanceStore: cleared {:?}, {} instances remain", scope, self.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BladeProperties;
    use glam::Vec3;

    fn instance(i: usize) -> BladeInstance {
        BladeInstance::anchored(
            Vec3::new(i as f32, 0.0, 0.0),
            Vec3::Y,
            BladeProperties {
                shape_index: i as u32,
                ..Default::default()
            },
        )
    }

    fn filled(capacity: usize, count: usize) -> InstanceStore {
        let mut store = InstanceStore::new(capacity);
        let instances: Vec<_> = (0..count).map(instance).collect();
        store.extend_from_slice(&instances).unwrap();
        store
    }

    #[test]
    fn test_lazy_allocation() {
        let mut store = InstanceStore::new(16);
        assert!(!store.is_live());
        assert!(store.is_empty());
        store.materialize();
        assert!(store.is_live());
        assert_eq!(store.free_space(), 1.0);
    }

    #[test]
    fn test_push_respects_capacity() {
        let mut store = filled(3, 2);
        store.push(instance(2)).unwrap();
        assert!(store.is_full());

        let err = store.push(instance(3)).unwrap_err();
        assert!(matches!(
            err,
            PainterError::CapacityExceeded { count: 3, requested: 1, capacity: 3 }
        ));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_extend_is_all_or_nothing() {
        let mut store = filled(4, 2);
        let extra: Vec<_> = (10..13).map(instance).collect();
        assert!(store.extend_from_slice(&extra).is_err());
        assert_eq!(store.len(), 2);
        assert_eq!(store.headroom(), 2);
    }

    #[test]
    fn test_shrink_without_force_is_rejected() {
        let mut store = filled(10, 5);
        let err = store.set_capacity(3, false).unwrap_err();
        assert!(matches!(
            err,
            PainterError::CapacityShrinkDataLoss { requested: 3, count: 5 }
        ));
        assert_eq!(store.capacity(), 10);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_forced_shrink_keeps_leading_instances() {
        let mut store = filled(10, 5);
        assert!(store.set_capacity(3, true).unwrap());
        assert_eq!(store.capacity(), 3);
        assert_eq!(store.len(), 3);
        let shapes: Vec<u32> = store.as_slice().iter().map(|i| i.blade.shape_index).collect();
        assert_eq!(shapes, vec![0, 1, 2]);
    }

    #[test]
    fn test_unallocatable_capacity_is_rejected() {
        let mut store = filled(10, 5);
        let before = store.snapshot();

        let err = store.set_capacity(usize::MAX / 2, false).unwrap_err();
        assert!(matches!(
            err,
            PainterError::CapacityUnavailable { requested } if requested == usize::MAX / 2
        ));
        assert_eq!(store.capacity(), 10);
        assert_eq!(store.snapshot(), before);

        // Same check while nothing is allocated yet
        store.persist();
        assert!(store.set_capacity(usize::MAX, false).is_err());
        assert_eq!(store.capacity(), 10);
        assert!(InstanceStore::check_capacity(1 << 20).is_ok());
    }

    #[test]
    fn test_grow_capacity() {
        let mut store = filled(2, 2);
        assert!(!store.set_capacity(8, false).unwrap());
        assert_eq!(store.headroom(), 6);
        // Shrinking to exactly the count needs no confirmation
        assert!(!store.set_capacity(2, false).unwrap());
    }

    #[test]
    fn test_filter_map_parallel() {
        let mut store = filled(100, 100);
        let dropped = store.filter_map_parallel(8, |i| {
            (i.blade.shape_index % 2 == 0).then(|| i.with_blade(i.blade.with_height_scaled(0.5)))
        });
        assert_eq!(dropped, 50);
        assert_eq!(store.len(), 50);
        assert!(store.as_slice().iter().all(|i| i.blade.shape_index % 2 == 0));
        assert!(store.as_slice().iter().all(|i| i.blade.height == 0.375));
        // Still room for the full capacity without reallocating
        assert_eq!(store.headroom(), 50);
    }

    #[test]
    fn test_map_in_place_parallel() {
        let mut store = filled(64, 40);
        let changed = store.map_in_place_parallel(4, |i| {
            if i.position[0] < 10.0 {
                i.blade.width = 1.0;
                true
            } else {
                false
            }
        });
        assert_eq!(changed, 10);
        assert_eq!(store.as_slice().iter().filter(|i| i.blade.width == 1.0).count(), 10);
    }

    #[test]
    fn test_snapshot_round_trip() {
        for (capacity, count) in [(8, 0), (8, 5), (8, 8)] {
            let store = filled(capacity, count);
            let mut restored = InstanceStore::new(capacity);
            restored.restore(store.snapshot());
            assert_eq!(restored.as_slice(), store.as_slice());
            assert_eq!(restored.len(), count);
        }
    }

    #[test]
    fn test_restore_grows_capacity() {
        let store = filled(10, 10);
        let mut small = InstanceStore::new(4);
        small.restore(store.snapshot());
        assert_eq!(small.capacity(), 10);
        assert_eq!(small.len(), 10);
    }

    #[test]
    fn test_persist_and_rematerialize() {
        let mut store = filled(10, 4);
        let expected = store.snapshot();

        assert_eq!(store.persist().len(), 4);
        assert!(!store.is_live());
        assert_eq!(store.len(), 4);

        store.materialize();
        assert!(store.is_live());
        assert_eq!(store.snapshot(), expected);
        // The persisted copy moved into the live collection
        store.clear(ClearScope::Serialized);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_clear_scopes() {
        let mut store = filled(10, 4);
        store.persist();
        store.clear(ClearScope::Runtime);
        // Runtime was not allocated; the persisted data survives
        assert_eq!(store.len(), 4);

        store.materialize();
        store.clear(ClearScope::Runtime);
        assert!(store.is_empty());

        let mut store = filled(10, 4);
        store.persist();
        store.clear(ClearScope::Serialized);
        assert!(store.is_empty());

        let mut store = filled(10, 4);
        store.clear(ClearScope::Everything);
        assert!(store.is_empty());
        assert!(!store.is_live());
    }

    #[test]
    fn test_snapshot_bytes_and_json() {
        let snapshot = filled(6, 6).snapshot();

        let bytes = snapshot.as_bytes();
        assert_eq!(bytes.len(), 6 * INSTANCE_STRIDE);
        assert_eq!(GrassSnapshot::from_bytes(bytes).unwrap(), snapshot);
        assert!(GrassSnapshot::from_bytes(&bytes[1..]).is_err());

        let json = snapshot.to_json().unwrap();
        assert_eq!(GrassSnapshot::from_json(&json).unwrap(), snapshot);
    }
}
