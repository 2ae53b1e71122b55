//! Bounded worker pool and the data-parallel stages run on it.
//!
//! Work is split into index ranges of `batch_size` elements (one task per
//! range, not per element). A stroke runs its stages back to back inside
//! [`PaintWorkers::install`]; each stage's output is fully materialized
//! before the next starts, and the calling thread blocks until the chain
//! completes.

use grass_painter_config::PainterConfig;
use rayon::prelude::*;

use crate::error::PainterError;
use crate::raycast::{RaycastCommand, RaycastHit, SurfaceRaycaster};

/// Thread pool used for every parallel brush stage.
#[derive(Debug)]
pub struct PaintWorkers {
    pool: rayon::ThreadPool,
    batch_size: usize,
}

impl PaintWorkers {
    /// Build a pool with `threads` workers (0 = one per core).
    pub fn new(threads: usize, batch_size: usize) -> Result<Self, PainterError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("grass-painter-{i}"))
            .build()?;
        Ok(Self {
            pool,
            batch_size: batch_size.max(1),
        })
    }

    pub fn from_config(config: &PainterConfig) -> Result<Self, PainterError> {
        Self::new(config.worker_threads, config.batch_size)
    }

    /// Run `op` on the pool and block until it returns.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Fill `out[i] = f(i)` in parallel, `batch` indices per task.
pub fn fill_indexed<T, F>(out: &mut [T], batch: usize, f: F)
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let batch = batch.max(1);
    out.par_chunks_mut(batch)
        .enumerate()
        .for_each(|(chunk_index, chunk)| {
            let base = chunk_index * batch;
            for (offset, slot) in chunk.iter_mut().enumerate() {
                *slot = f(base + offset);
            }
        });
}

/// Hit-test every non-inert command; output order matches input order.
pub fn raycast_batch<R>(
    commands: &[Option<RaycastCommand>],
    raycaster: &R,
    batch: usize,
) -> Vec<Option<RaycastHit>>
where
    R: SurfaceRaycaster + ?Sized,
{
    commands
        .par_iter()
        .with_min_len(batch.max(1))
        .map(|command| command.as_ref().and_then(|c| raycaster.raycast(c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raycast::{ColliderId, LayerMask};
    use glam::Vec3;

    #[test]
    fn test_pool_size() {
        let workers = PaintWorkers::new(2, 0).unwrap();
        assert_eq!(workers.thread_count(), 2);
        assert_eq!(workers.batch_size(), 1);
    }

    #[test]
    fn test_fill_indexed_covers_every_slot() {
        let workers = PaintWorkers::new(3, 7).unwrap();
        let mut out = vec![0u32; 100];
        workers.install(|| fill_indexed(&mut out, workers.batch_size(), |i| i as u32 * 2));
        assert!(out.iter().enumerate().all(|(i, &v)| v == i as u32 * 2));
    }

    #[test]
    fn test_raycast_batch_preserves_order() {
        let raycaster = |command: &RaycastCommand| -> Option<RaycastHit> {
            (command.origin.x >= 0.0).then(|| RaycastHit {
                point: command.origin,
                normal: Vec3::Y,
                distance: 0.0,
                collider: ColliderId(command.origin.x as u32),
            })
        };
        let commands: Vec<Option<RaycastCommand>> = (0..50)
            .map(|i| {
                (i % 5 != 0).then(|| RaycastCommand {
                    origin: Vec3::new(if i % 2 == 0 { i as f32 } else { -1.0 }, 0.0, 0.0),
                    direction: Vec3::NEG_Y,
                    max_distance: 1.0,
                    layer_mask: LayerMask::ALL,
                })
            })
            .collect();

        let hits = raycast_batch(&commands, &raycaster, 4);
        assert_eq!(hits.len(), commands.len());
        for (i, hit) in hits.iter().enumerate() {
            let expected = i % 5 != 0 && i % 2 == 0;
            assert_eq!(hit.is_some(), expected, "index {i}");
            if let Some(hit) = hit {
                assert_eq!(hit.collider, ColliderId(i as u32));
            }
        }
    }
}
