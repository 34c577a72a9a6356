//! Easing curves behind the crystal animation.

/// `3x² − 2x³`; maps `[0, 1]` onto `[0, 1]` with zero slope at both ends.
pub fn ease_in_out_cubic(x: f64) -> f64 {
    x * x * 3.0 - x * x * x * 2.0
}

/// Position of `x` between `edge0` and `edge1`, clamped to `[0, 1]`.
///
/// A degenerate interval (`edge0 == edge1`) acts as a hard step at the edge.
pub fn linear_step(x: f64, edge0: f64, edge1: f64) -> f64 {
    let width = edge1 - edge0;
    if width == 0.0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    ((x - edge0) / width).clamp(0.0, 1.0)
}

/// Cycle count that holds for `downtime` seconds of each `period`, then
/// eases up to the next integer over the remainder.
///
/// `period <= downtime` never leaves the hold phase, and a non-positive
/// period yields `0`.
pub fn stop_go_eased(t: f64, downtime: f64, period: f64) -> f64 {
    if period <= 0.0 {
        return 0.0;
    }
    let cycle = (t / period).floor();
    if period <= downtime {
        return cycle;
    }
    let tween = t - cycle * period;
    cycle + ease_in_out_cubic(linear_step(tween, downtime, period))
}

/// Emissive pulse in `[0, 1]`.
pub fn intensity(t: f64) -> f64 {
    ((t * 3.0).sin() * 0.5 + 0.5).clamp(0.0, 1.0)
}

/// Vertical bob around 0.7.
pub fn offset_y(t: f64) -> f64 {
    0.7 + (t * 2.0).sin() * 0.05
}
