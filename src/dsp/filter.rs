//! # Filters
//!
//! Three filter shapes cover everything the engine needs:
//!
//! - [`OnePoleFilter`]: the gentlest lowpass (6 dB/octave). Used to take the
//!   edge off the signal before it enters the diffusion stages.
//! - [`DcBlocker`]: a one-pole *highpass* that removes constant offset. The
//!   bitcrusher and the diffusion soft clip are both asymmetric enough to
//!   leave a small DC bias, which the feedback loop would otherwise pile up.
//! - [`Biquad`]: a two-pole (12 dB/octave) filter with lowpass, highpass and
//!   bandpass responses, used for the modulated filter pair and the
//!   resonant diffusion stages.
//!
//! ## The One-Pole Equation
//!
//! ```text
//! y[n] = (1 - a) * x[n] + a * y[n-1],    a = e^(-2π * cutoff / sample_rate)
//! ```
//!
//! ## The DC Blocker Equation
//!
//! ```text
//! y[n] = x[n] - x[n-1] + R * y[n-1],     R = e^(-2π * cutoff / sample_rate)
//! ```
//!
//! The `x[n] - x[n-1]` term is a differentiator: it is exactly zero for a
//! constant input. The `R * y[n-1]` term leaks the previous output back in
//! so that everything above a few Hz passes almost untouched.

use std::f32::consts::PI;

/// A one-pole (6 dB/octave) lowpass filter.
pub struct OnePoleFilter {
    /// Higher values = more filtering (lower cutoff).
    coefficient: f32,

    /// The previous output sample; the filter's only state variable.
    prev_output: f32,
}

impl OnePoleFilter {
    /// Create a new filter initialized to passthrough (no filtering).
    pub fn new() -> Self {
        Self {
            coefficient: 0.0,
            prev_output: 0.0,
        }
    }

    /// Update the filter coefficient for a given cutoff frequency.
    ///
    /// The cutoff is clamped to `[20 Hz, 0.49 × sample_rate]`: below 20 Hz
    /// the coefficient creeps so close to 1.0 that the filter stagnates,
    /// and Nyquist is the hard upper limit of the math.
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        let safe_cutoff = cutoff_hz.clamp(20.0, sample_rate * 0.49);
        self.coefficient = (-2.0 * PI * safe_cutoff / sample_rate).exp();
    }

    /// Process one sample through the filter.
    pub fn process(&mut self, input: f32) -> f32 {
        let output = (1.0 - self.coefficient) * input + self.coefficient * self.prev_output;
        self.prev_output = output;
        output
    }

    /// Reset the filter state to zero.
    pub fn reset(&mut self) {
        self.prev_output = 0.0;
    }
}

impl Default for OnePoleFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// A one-pole DC-blocking highpass.
pub struct DcBlocker {
    /// Pole radius `R`. Closer to 1.0 = lower cutoff.
    pole: f32,
    prev_input: f32,
    prev_output: f32,
}

impl DcBlocker {
    /// Create a blocker with the given cutoff.
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let mut blocker = Self {
            pole: 0.0,
            prev_input: 0.0,
            prev_output: 0.0,
        };
        blocker.set_cutoff(cutoff_hz, sample_rate);
        blocker
    }

    /// Cutoff is clamped to `[1 Hz, 0.49 × sample_rate]`.
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        let safe_cutoff = cutoff_hz.clamp(1.0, sample_rate * 0.49);
        self.pole = (-2.0 * PI * safe_cutoff / sample_rate).exp();
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = input - self.prev_input + self.pole * self.prev_output;
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }
}

/// Which response a [`BiquadCoefficients`] set describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    Lowpass,
    Highpass,
    /// Constant 0 dB peak gain bandpass.
    Bandpass,
}

/// Normalized biquad coefficients (`a0` divided out).
///
/// Kept separate from the filter state so one coefficient set can drive
/// the left and right channel filters at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoefficients {
    /// Unity passthrough.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Coefficients from the Audio EQ Cookbook (Robert Bristow-Johnson).
    ///
    /// `frequency_hz` is clamped to `[10 Hz, 0.49 × sample_rate]` and `q` to
    /// `[0.1, 20]`; both poles then stay strictly inside the unit circle.
    pub fn new(kind: BiquadKind, frequency_hz: f32, q: f32, sample_rate: f32) -> Self {
        let frequency = frequency_hz.clamp(10.0, sample_rate * 0.49);
        let q = q.clamp(0.1, 20.0);

        let w0 = 2.0 * PI * frequency / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2) = match kind {
            BiquadKind::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            BiquadKind::Highpass => {
                let b1 = -(1.0 + cos_w0);
                (-b1 / 2.0, b1, -b1 / 2.0)
            }
            BiquadKind::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Biquad filter state (Direct Form II Transposed).
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a single sample with the given coefficients.
    pub fn process(&mut self, input: f32, c: &BiquadCoefficients) -> f32 {
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
