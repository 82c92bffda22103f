//! # Modulation (LFO)
//!
//! A single sine LFO drives every modulated destination in the plugin. Once
//! per block the oscillator renders a whole block of values; recomputing
//! the waveform halfway through a block would put a step in it.
//!
//! ## From Oscillator to Modulation Buffer
//!
//! ```text
//! sin(phase)  ──►  * 0.5 + 0.5  ──►  [50 ms smoother]  ──►  buffer[i] ∈ [0, 1]
//!  [-1, 1]          [0, 1]
//! ```
//!
//! The smoother matters when the rate changes (a knob turn, a new tempo):
//! without it the jump in rate would show up as a kink in the waveform.
//!
//! ## Routing
//!
//! Each destination reads the same buffer value and maps it through its own
//! curve ([`ModulationRouting`]). Frequency destinations move
//! *exponentially* (in octaves), because a sweep from 500 Hz to 1 kHz sounds
//! as wide as one from 5 kHz to 10 kHz. Bit depth, pan and delay time move
//! linearly. Every mapped value is clamped to its destination's range.

use std::f32::consts::TAU;

use super::smoother::Smoother;
use super::tempo_sync::LFO_RATE_RANGE;

/// Time constant of the modulation buffer smoother.
pub const MODULATION_SMOOTHING_MS: f32 = 50.0;

/// Renders the per-block modulation buffer.
pub struct ModulationEngine {
    sample_rate: f32,
    /// Oscillator phase in radians, kept in `[0, TAU)`.
    phase: f32,
    frequency_hz: f32,
    smoother: Smoother,
    /// Pre-allocated to the maximum block size in `prepare()`.
    buffer: Vec<f32>,
    /// Number of valid values in `buffer` for the current block.
    len: usize,
}

impl ModulationEngine {
    pub fn new(sample_rate: f32, max_block_size: usize) -> Self {
        Self {
            sample_rate,
            phase: 0.0,
            frequency_hz: 1.0,
            smoother: Smoother::new(MODULATION_SMOOTHING_MS, sample_rate, 0.5),
            buffer: vec![0.5; max_block_size],
            len: 0,
        }
    }

    /// Set the oscillator rate, clamped to the LFO range.
    pub fn set_frequency(&mut self, frequency_hz: f32) {
        let (min, max) = LFO_RATE_RANGE;
        if frequency_hz.is_finite() {
            self.frequency_hz = frequency_hz.clamp(min, max);
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency_hz
    }

    /// Render `len` values (at most the prepared block size).
    pub fn generate(&mut self, len: usize) {
        let len = len.min(self.buffer.len());
        let phase_inc = TAU * self.frequency_hz / self.sample_rate;

        for value in &mut self.buffer[..len] {
            let unipolar = self.phase.sin() * 0.5 + 0.5;
            *value = self.smoother.next(unipolar).clamp(0.0, 1.0);

            self.phase += phase_inc;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
        self.len = len;
    }

    /// The values rendered by the last `generate()`.
    pub fn values(&self) -> &[f32] {
        &self.buffer[..self.len]
    }

    /// Value for sample `index` of the current block, or the resting
    /// midpoint when out of range.
    #[inline]
    pub fn value(&self, index: usize) -> f32 {
        self.values().get(index).copied().unwrap_or(0.5)
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.smoother.reset(0.5);
        self.buffer.fill(0.5);
        self.len = 0;
    }
}

/// Per-destination routing flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModulationRoutes {
    pub bitcrush: bool,
    pub highpass: bool,
    pub lowpass: bool,
    pub pan: bool,
    pub delay_time: bool,
}

/// Valid bit-depth range for the bitcrusher.
pub const BIT_DEPTH_RANGE: (f32, f32) = (1.0, 16.0);
/// Valid highpass cutoff range.
pub const HIGHPASS_RANGE: (f32, f32) = (20.0, 5000.0);
/// Valid lowpass cutoff range.
pub const LOWPASS_RANGE: (f32, f32) = (200.0, 20000.0);

/// Octaves of highpass sweep at full LFO amount.
const HIGHPASS_DEPTH_OCTAVES: f32 = 3.0;
/// Octaves of lowpass sweep at full LFO amount.
const LOWPASS_DEPTH_OCTAVES: f32 = 2.0;
/// Fraction of the base delay time swept at full LFO amount.
const DELAY_DEPTH: f32 = 0.25;

/// Maps the shared `[0, 1]` LFO value onto each destination.
///
/// A destination whose route is off gets its base value back unchanged
/// (still clamped).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModulationRouting {
    pub routes: ModulationRoutes,
    /// Global depth, `[0, 1]`.
    pub amount: f32,
}

impl ModulationRouting {
    pub fn new(routes: ModulationRoutes, amount: f32) -> Self {
        Self {
            routes,
            amount: amount.clamp(0.0, 1.0),
        }
    }

    #[inline]
    fn bipolar(lfo: f32) -> f32 {
        lfo.clamp(0.0, 1.0) * 2.0 - 1.0
    }

    /// Linear: ±half the 1-16 bit range at full amount.
    pub fn bit_depth(&self, base_bits: f32, lfo: f32) -> f32 {
        let (min, max) = BIT_DEPTH_RANGE;
        let bits = if self.routes.bitcrush {
            base_bits + Self::bipolar(lfo) * self.amount * (max - min) * 0.5
        } else {
            base_bits
        };
        bits.clamp(min, max)
    }

    /// Exponential: `base × 2^(3 octaves × amount × bipolar)`.
    pub fn highpass_hz(&self, base_hz: f32, lfo: f32) -> f32 {
        let octaves = if self.routes.highpass {
            HIGHPASS_DEPTH_OCTAVES * self.amount * Self::bipolar(lfo)
        } else {
            0.0
        };
        let (min, max) = HIGHPASS_RANGE;
        (base_hz * octaves.exp2()).clamp(min, max)
    }

    /// Exponential: `base × 2^(2 octaves × amount × bipolar)`.
    pub fn lowpass_hz(&self, base_hz: f32, lfo: f32) -> f32 {
        let octaves = if self.routes.lowpass {
            LOWPASS_DEPTH_OCTAVES * self.amount * Self::bipolar(lfo)
        } else {
            0.0
        };
        let (min, max) = LOWPASS_RANGE;
        (base_hz * octaves.exp2()).clamp(min, max)
    }

    /// Linear, scaled by the headroom left on the pan knob.
    ///
    /// The excursion is multiplied by `1 - |pan|`, so the result can never
    /// leave `[-1, 1]` even before the final clamp.
    pub fn pan(&self, base_pan: f32, lfo: f32) -> f32 {
        let base_pan = base_pan.clamp(-1.0, 1.0);
        let pan = if self.routes.pan {
            base_pan + Self::bipolar(lfo) * self.amount * (1.0 - base_pan.abs())
        } else {
            base_pan
        };
        pan.clamp(-1.0, 1.0)
    }

    /// Offset in milliseconds to add to the base delay time, proportional
    /// to it (±25% at full amount). Zero when the route is off.
    pub fn delay_offset_ms(&self, base_ms: f32, lfo: f32) -> f32 {
        if self.routes.delay_time {
            base_ms * DELAY_DEPTH * self.amount * Self::bipolar(lfo)
        } else {
            0.0
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
