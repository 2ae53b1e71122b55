/// Smallest squared length a tangent candidate may have before the fallback
/// reference axis is used.
pub const DEGENERATE_TANGENT_EPSILON: f32 = 8.0 * f32::EPSILON;

/// Tangent handedness written for every painted blade.
pub const TANGENT_HANDEDNESS: f32 = -1.0;

/// Number of f32 slots in one blade instance record.
pub const INSTANCE_FLOATS: usize = 25;

/// Size of one blade instance record in bytes.
pub const INSTANCE_STRIDE: usize = INSTANCE_FLOATS * 4;

/// Brush radius range exposed to tools.
pub const RADIUS_RANGE: (f32, f32) = (0.1, 10.0);

/// Brush density range exposed to tools (samples per unit).
pub const DENSITY_RANGE: (f32, f32) = (1.0, 10.0);

/// Brush smoothing range.
pub const SMOOTHING_RANGE: (f32, f32) = (0.0, 1.0);
