//! Frame animator: pure functions of elapsed time.
//!
//! # Invariants
//! - The same elapsed time always yields the same sample.
//! - Nothing here reads clocks or keeps state between calls.

mod curve;

pub use curve::{ease_in_out_cubic, intensity, linear_step, offset_y, stop_go_eased};

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Errors from animator configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnimError {
    #[error("invalid timing: downtime {downtime}s must be >= 0 and shorter than period {period}s")]
    InvalidTiming { downtime: f64, period: f64 },
}

/// Values for one frame of the crystal effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSample {
    /// Emissive intensity in `[0, 1]`.
    pub intensity: f32,
    /// Height above the floor.
    pub offset_y: f32,
    /// Rotation about Y in radians.
    pub rotation_y: f32,
}

/// Timing of the stop-go spin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationTiming {
    /// Seconds the spin holds still at the start of each cycle.
    pub downtime: f64,
    /// Length of one full cycle in seconds.
    pub period: f64,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            downtime: 2.0,
            period: 4.0,
        }
    }
}

impl AnimationTiming {
    pub fn validate(&self) -> Result<(), AnimError> {
        let ok = self.downtime.is_finite()
            && self.period.is_finite()
            && self.downtime >= 0.0
            && self.downtime < self.period;
        if ok {
            Ok(())
        } else {
            Err(AnimError::InvalidTiming {
                downtime: self.downtime,
                period: self.period,
            })
        }
    }
}

/// Drives the crystal: pulse, bob and stop-go spin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAnimator {
    timing: AnimationTiming,
}

impl Default for FrameAnimator {
    fn default() -> Self {
        Self {
            timing: AnimationTiming::default(),
        }
    }
}

impl FrameAnimator {
    pub fn new(timing: AnimationTiming) -> Result<Self, AnimError> {
        timing.validate()?;
        Ok(Self { timing })
    }

    pub fn timing(&self) -> AnimationTiming {
        self.timing
    }

    /// Sample every animated value at `elapsed` seconds.
    pub fn animate(&self, elapsed: f64) -> AnimationSample {
        let turns = stop_go_eased(elapsed, self.timing.downtime, self.timing.period);
        AnimationSample {
            intensity: intensity(elapsed) as f32,
            offset_y: offset_y(elapsed) as f32,
            rotation_y: (turns * TAU) as f32,
        }
    }
}

/// [`FrameAnimator::animate`] with the default 2 s / 4 s timing.
pub fn animate(elapsed: f64) -> AnimationSample {
    FrameAnimator::default().animate(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_time_same_sample() {
        let a = FrameAnimator::default();
        for t in [0.0, 0.016, 1.5, 3.3, 123.456] {
            assert_eq!(a.animate(t), a.animate(t));
            assert_eq!(animate(t), a.animate(t));
        }
    }

    #[test]
    fn spin_holds_during_downtime() {
        let s = animate(1.0);
        assert_eq!(s.rotation_y, 0.0);
        let s = animate(4.0);
        assert!((s.rotation_y - std::f32::consts::TAU).abs() < 1e-5);
    }

    #[test]
    fn sample_at_zero() {
        let s = animate(0.0);
        assert!((s.intensity - 0.5).abs() < 1e-6);
        assert!((s.offset_y - 0.7).abs() < 1e-6);
        assert_eq!(s.rotation_y, 0.0);
    }

    #[test]
    fn timing_validation() {
        assert!(FrameAnimator::new(AnimationTiming::default()).is_ok());
        let bad = AnimationTiming {
            downtime: 4.0,
            period: 4.0,
        };
        assert_eq!(
            FrameAnimator::new(bad).unwrap_err(),
            AnimError::InvalidTiming {
                downtime: 4.0,
                period: 4.0
            }
        );
        assert!(AnimationTiming {
            downtime: -1.0,
            period: 4.0
        }
        .validate()
        .is_err());
        assert!(AnimationTiming {
            downtime: 0.0,
            period: f64::NAN
        }
        .validate()
        .is_err());
    }
}
