//! Stroke sessions and paint spacing.
//!
//! A stroke is one press-drag-release of the brush. The tracker hands out
//! stroke ids and decides whether the brush moved far enough since the last
//! paint call to paint again. The last painted point survives between
//! strokes, so clicking twice on the same spot paints once.

use glam::Vec3;

use crate::brush::PainterMode;

/// The stroke currently in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveStroke {
    pub stroke_id: u64,
    pub mode: PainterMode,
    /// Paint calls made during this stroke
    pub dabs: usize,
}

#[derive(Debug, Default)]
pub struct StrokeTracker {
    active: Option<ActiveStroke>,
    last_paint_position: Option<Vec3>,
    next_stroke_id: u64,
}

impl StrokeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new stroke, returning it together with the stroke it
    /// replaced if one was still open.
    pub fn begin(&mut self, mode: PainterMode) -> (ActiveStroke, Option<ActiveStroke>) {
        let previous = self.active.take();
        let stroke = ActiveStroke {
            stroke_id: self.next_stroke_id,
            mode,
            dabs: 0,
        };
        self.next_stroke_id += 1;
        self.active = Some(stroke);
        (stroke, previous)
    }

    /// Finish the active stroke.
    pub fn end(&mut self) -> Option<ActiveStroke> {
        self.active.take()
    }

    pub fn active(&self) -> Option<&ActiveStroke> {
        self.active.as_ref()
    }

    pub fn last_paint_position(&self) -> Option<Vec3> {
        self.last_paint_position
    }

    /// Whether `position` is at least `min_distance` from the last painted
    /// point. Always true before the first paint.
    pub fn should_paint(&self, position: Vec3, min_distance: f32) -> bool {
        self.last_paint_position.is_none_or(|last| {
            last.distance_squared(position) >= min_distance * min_distance
        })
    }

    /// Remember `position` as painted and count it against the active stroke.
    pub fn record_paint(&mut self, position: Vec3) {
        self.last_paint_position = Some(position);
        if let Some(stroke) = &mut self.active {
            stroke.dabs += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_ids_increase() {
        let mut tracker = StrokeTracker::new();
        let (first, previous) = tracker.begin(PainterMode::Add);
        assert!(previous.is_none());
        let (second, previous) = tracker.begin(PainterMode::Remove);
        assert_eq!(previous.map(|s| s.stroke_id), Some(first.stroke_id));
        assert!(second.stroke_id > first.stroke_id);
        assert_eq!(tracker.end().map(|s| s.mode), Some(PainterMode::Remove));
        assert!(tracker.end().is_none());
    }

    #[test]
    fn test_first_paint_always_allowed() {
        let tracker = StrokeTracker::new();
        assert!(tracker.should_paint(Vec3::ZERO, 100.0));
    }

    #[test]
    fn test_spacing() {
        let mut tracker = StrokeTracker::new();
        tracker.begin(PainterMode::Add);
        tracker.record_paint(Vec3::ZERO);

        assert!(!tracker.should_paint(Vec3::new(0.2, 0.0, 0.0), 0.5));
        assert!(tracker.should_paint(Vec3::new(0.5, 0.0, 0.0), 0.5));
        assert!(!tracker.should_paint(Vec3::new(0.005, 0.0, 0.0), 0.01));

        tracker.record_paint(Vec3::X);
        assert_eq!(tracker.active().map(|s| s.dabs), Some(2));
        assert_eq!(tracker.last_paint_position(), Some(Vec3::X));
    }

    #[test]
    fn test_last_point_survives_stroke_end() {
        let mut tracker = StrokeTracker::new();
        tracker.begin(PainterMode::Add);
        tracker.record_paint(Vec3::ONE);
        tracker.end();

        tracker.begin(PainterMode::Add);
        assert!(!tracker.should_paint(Vec3::ONE, 0.01));
    }
}
