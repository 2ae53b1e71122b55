//! Error types for grass painting operations.

use crate::brush::PainterMode;

/// Errors that can occur while painting or managing grass storage.
#[derive(Debug, thiserror::Error)]
pub enum PainterError {
    #[error("Not enough space for {requested} blades ({count}/{capacity} used)")]
    CapacityExceeded {
        count: usize,
        requested: usize,
        capacity: usize,
    },

    #[error("Painter mode {0:?} cannot paint")]
    InvalidMode(PainterMode),

    #[error("Capacity {requested} is below the current {count} blades; confirm to discard the excess")]
    CapacityShrinkDataLoss { requested: usize, count: usize },

    #[error("Cannot allocate storage for {requested} blades")]
    CapacityUnavailable { requested: usize },

    #[error("Invalid brush: {0}")]
    InvalidBrush(String),

    #[error("No grass preset named '{0}'")]
    PresetNotFound(String),

    #[error("Corrupt grass snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to (de)serialize grass data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid painter configuration: {0}")]
    Config(#[from] grass_painter_config::ConfigError),
}

impl PainterError {
    /// Whether the operation was skipped without changing any state, so the
    /// caller can keep painting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PainterError::CapacityExceeded { .. }
                | PainterError::CapacityShrinkDataLoss { .. }
                | PainterError::CapacityUnavailable { .. }
                | PainterError::PresetNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message() {
        let err = PainterError::CapacityExceeded {
            count: 8,
            requested: 25,
            capacity: 10,
        };
        assert_eq!(err.to_string(), "Not enough space for 25 blades (8/10 used)");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_recoverable() {
        assert!(PainterError::CapacityUnavailable { requested: 1 << 60 }.is_recoverable());
        // Painting in a non-painting mode is a caller bug
        assert!(!PainterError::InvalidMode(PainterMode::None).is_recoverable());
        assert!(!PainterError::InvalidBrush("radius".into()).is_recoverable());
        assert!(!PainterError::CorruptSnapshot("short".into()).is_recoverable());
    }
}
