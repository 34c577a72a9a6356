/// Deterministic frame clock.
///
/// Time only moves when the host feeds it a frame delta, so headless runs
/// and tests replay exactly. Bad deltas (negative, NaN) count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameClock {
    tick: u64,
    elapsed: f64,
    delta: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one frame by `dt` seconds. Returns the new elapsed time.
    pub fn advance(&mut self, dt: f64) -> f64 {
        let dt = if dt.is_finite() && dt > 0.0 {
            dt
        } else {
            if dt != 0.0 {
                tracing::warn!(dt, "ignoring invalid frame delta");
            }
            0.0
        };
        self.tick += 1;
        self.delta = dt;
        self.elapsed += dt;
        self.elapsed
    }

    /// Frames advanced so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Total elapsed time in seconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Delta of the latest frame in seconds.
    pub fn delta(&self) -> f64 {
        self.delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_deltas() {
        let mut clock = FrameClock::new();
        clock.advance(0.5);
        clock.advance(0.25);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.elapsed(), 0.75);
        assert_eq!(clock.delta(), 0.25);
    }

    #[test]
    fn elapsed_never_decreases() {
        let mut clock = FrameClock::new();
        clock.advance(1.0);
        for dt in [-1.0, f64::NAN, f64::INFINITY, 0.0] {
            assert_eq!(clock.advance(dt), 1.0);
        }
        assert_eq!(clock.tick(), 5);
    }
}
