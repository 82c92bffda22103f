//! # One-Pole Parameter Smoother
//!
//! Jumps in a control value (a knob moving, a new LFO rate, a tempo change)
//! become audible clicks if applied instantly. The smoother glides toward
//! each new target exponentially, the same way an RC circuit charges:
//!
//! ```text
//! current += (target - current) * (1 - e^(-1 / (time_constant * sample_rate)))
//! ```
//!
//! After one time constant the value has covered ~63% of the distance, and
//! the largest possible step between two consecutive outputs is the
//! distance to the target times that per-sample factor. That bound is what
//! keeps the modulation buffer free of discontinuities.
//!
//! The value is accumulated in `f64`. In `f32` the step for a long delay
//! time (thousands of milliseconds, a factor near 4e-4) rounds to zero
//! well before the target is reached, and the glide stalls. Once the
//! remaining distance is inside [`SETTLE_TOLERANCE`] the smoother lands
//! exactly on the target, so a caller that switches to the raw target
//! after [`Smoother::is_settled`] sees no jump.

/// Remaining distance, relative to the target (at least 1.0), below which
/// the smoother snaps onto the target.
const SETTLE_TOLERANCE: f64 = 1e-9;

/// Exponential smoother for a single control value.
#[derive(Debug, Clone)]
pub struct Smoother {
    /// Per-sample fraction of the remaining distance covered.
    factor: f64,
    current: f64,
}

impl Smoother {
    /// Create a smoother with the given time constant, starting at `initial`.
    pub fn new(time_constant_ms: f32, sample_rate: f32, initial: f32) -> Self {
        let mut smoother = Self {
            factor: 1.0,
            current: f64::from(initial),
        };
        smoother.set_time_constant(time_constant_ms, sample_rate);
        smoother
    }

    /// A zero (or negative) time constant makes the smoother a passthrough.
    pub fn set_time_constant(&mut self, time_constant_ms: f32, sample_rate: f32) {
        let samples = f64::from(time_constant_ms) * 0.001 * f64::from(sample_rate);
        self.factor = if samples > 0.0 {
            1.0 - (-1.0 / samples).exp()
        } else {
            1.0
        };
    }

    /// Advance one sample toward `target` and return the new value.
    #[inline]
    pub fn next(&mut self, target: f32) -> f32 {
        let target = f64::from(target);
        self.current += (target - self.current) * self.factor;
        if (target - self.current).abs() <= SETTLE_TOLERANCE * target.abs().max(1.0) {
            self.current = target;
        }
        self.current as f32
    }

    /// Current value without advancing.
    pub fn current(&self) -> f32 {
        self.current as f32
    }

    /// True once the smoother sits exactly on `target`; `next()` will keep
    /// returning it unchanged.
    pub fn is_settled(&self, target: f32) -> bool {
        self.current == f64::from(target)
    }

    /// Jump straight to `value`.
    pub fn reset(&mut self, value: f32) {
        self.current = f64::from(value);
    }
}
