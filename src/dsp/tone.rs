//! # Tone Shaper (Bitcrush + Saturation)
//!
//! ## Bitcrushing
//!
//! A bitcrusher throws away amplitude resolution. At `b` bits there are
//! `2^b - 1` steps between 0 and 1, and every sample is rounded to the
//! nearest step:
//!
//! ```text
//! levels = 2^bits - 1
//! output = round(input * levels) / levels
//! ```
//!
//! | bits | levels | step size |
//! |------|--------|-----------|
//! | 1    | 1      | 1.0       |
//! | 4    | 15     | 0.067     |
//! | 8    | 255    | 0.0039    |
//!
//! `bits` is a float so the LFO can sweep it smoothly; `2^bits` is computed
//! with `exp2` rather than truncating to whole bits.
//!
//! ## Saturation
//!
//! After quantizing, a cubic soft clipper can be blended in:
//!
//! ```text
//! shape(x) = 1.5x - 0.5x³     for x clamped to [-1, 1]
//! output   = crushed + (shape(crushed) - crushed) * saturation
//! ```
//!
//! With `saturation = 0` the output is exactly the quantized sample.

use super::modulation::BIT_DEPTH_RANGE;

/// Bit depth at or above which the quantizer is skipped.
pub const TRANSPARENT_BITS: f32 = 16.0;

/// Quantize `sample` to `bits` of resolution.
pub fn bitcrush(sample: f32, bits: f32) -> f32 {
    let (min, max) = BIT_DEPTH_RANGE;
    let bits = if bits.is_finite() { bits.clamp(min, max) } else { max };
    let levels = bits.exp2() - 1.0;
    (sample * levels).round() / levels
}

/// Cubic soft clip. Output is bounded to `[-1, 1]`.
pub fn waveshape(sample: f32) -> f32 {
    let x = sample.clamp(-1.0, 1.0);
    1.5 * x - 0.5 * x * x * x
}

/// Bitcrush followed by blended saturation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneShaper {
    /// Waveshaper blend, `[0, 1]`.
    saturation: f32,
}

impl ToneShaper {
    pub fn new(saturation: f32) -> Self {
        Self {
            saturation: saturation.clamp(0.0, 1.0),
        }
    }

    /// True when neither stage would touch the signal at `bits`.
    pub fn is_transparent(&self, bits: f32) -> bool {
        bits >= TRANSPARENT_BITS && self.saturation <= 0.0
    }

    pub fn process(&self, sample: f32, bits: f32) -> f32 {
        let crushed = if bits < TRANSPARENT_BITS {
            bitcrush(sample, bits)
        } else {
            sample
        };

        if self.saturation > 0.0 {
            crushed + (waveshape(crushed) - crushed) * self.saturation
        } else {
            crushed
        }
    }
}
