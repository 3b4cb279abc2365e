//! Small numeric helpers shared across the pipeline.

/// Linear interpolation between `a` and `b`.
///
/// `t = 0` yields `a`, `t = 1` yields `b`. `t` is not clamped.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (1.0 - t) * a + t * b
}

/// Move `current` toward `target` by at most `rate`.
///
/// Never overshoots: once within `rate` of the target, returns the target
/// exactly. `rate` must be non-negative.
pub fn step(current: f32, target: f32, rate: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= rate {
        target
    } else {
        current + rate * delta.signum()
    }
}

/// Clamp a value to a range.
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
