//! # Parameter Snapshot
//!
//! The engine never reads parameters one at a time in the middle of its
//! sample loop. At the top of every block it asks the [`ParameterStore`]
//! for a [`ParameterSnapshot`], a plain `Copy` struct, and uses only that
//! for the rest of the block. Every value is forced into its valid domain
//! on the way in, so nothing downstream has to guard against NaN or
//! out-of-range input.

use crate::dsp::delay::{MAX_DELAY_SECONDS, MAX_FEEDBACK};
use crate::dsp::modulation::{ModulationRoutes, BIT_DEPTH_RANGE, HIGHPASS_RANGE, LOWPASS_RANGE};
use crate::dsp::stereo::WIDTH_RANGE;
use crate::dsp::tempo_sync::{SyncRatio, LFO_RATE_RANGE};

/// One block's worth of control values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    /// Manual delay time, `[0, 5000]` ms. Ignored while `delay_sync` is set.
    pub delay_ms: f32,
    /// `[0, 0.95]`
    pub feedback: f32,
    /// Dry/wet, `[0, 1]`
    pub mix: f32,
    /// `[1, 16]`; 16 bypasses the quantizer.
    pub bitcrush_bits: f32,
    /// Waveshaper blend after the bitcrusher, `[0, 1]`.
    pub saturation: f32,
    /// `[0, 2]`
    pub stereo_width: f32,
    /// `[-1, 1]`
    pub pan: f32,
    /// `[20, 5000]` Hz
    pub highpass_hz: f32,
    /// `[200, 20000]` Hz
    pub lowpass_hz: f32,
    /// Manual LFO rate, `[0.01, 20]` Hz. Ignored while `lfo_sync` is set.
    pub lfo_rate_hz: f32,
    /// `[0, 1]`
    pub lfo_amount: f32,
    /// Diffusion/chorus amount, `[0, 1]`.
    pub smear: f32,
    pub delay_sync: SyncRatio,
    pub lfo_sync: SyncRatio,
    pub routes: ModulationRoutes,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            delay_ms: 500.0,
            feedback: 0.4,
            mix: 0.5,
            bitcrush_bits: 16.0,
            saturation: 0.0,
            stereo_width: 1.0,
            pan: 0.0,
            highpass_hz: 20.0,
            lowpass_hz: 20000.0,
            lfo_rate_hz: 1.0,
            lfo_amount: 0.0,
            smear: 0.0,
            delay_sync: SyncRatio::Free,
            lfo_sync: SyncRatio::Free,
            routes: ModulationRoutes::default(),
        }
    }
}

/// Clamp `value` into `[min, max]`, replacing NaN with `fallback`.
fn sanitize(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

impl ParameterSnapshot {
    /// Every field forced into its valid domain. NaN falls back to the
    /// default value; infinities clamp to the nearest bound.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            delay_ms: sanitize(
                self.delay_ms,
                (0.0, MAX_DELAY_SECONDS * 1000.0),
                defaults.delay_ms,
            ),
            feedback: sanitize(self.feedback, (0.0, MAX_FEEDBACK), defaults.feedback),
            mix: sanitize(self.mix, (0.0, 1.0), defaults.mix),
            bitcrush_bits: sanitize(self.bitcrush_bits, BIT_DEPTH_RANGE, defaults.bitcrush_bits),
            saturation: sanitize(self.saturation, (0.0, 1.0), defaults.saturation),
            stereo_width: sanitize(self.stereo_width, WIDTH_RANGE, defaults.stereo_width),
            pan: sanitize(self.pan, (-1.0, 1.0), defaults.pan),
            highpass_hz: sanitize(self.highpass_hz, HIGHPASS_RANGE, defaults.highpass_hz),
            lowpass_hz: sanitize(self.lowpass_hz, LOWPASS_RANGE, defaults.lowpass_hz),
            lfo_rate_hz: sanitize(self.lfo_rate_hz, LFO_RATE_RANGE, defaults.lfo_rate_hz),
            lfo_amount: sanitize(self.lfo_amount, (0.0, 1.0), defaults.lfo_amount),
            smear: sanitize(self.smear, (0.0, 1.0), defaults.smear),
            ..self
        }
    }
}

/// Where the engine reads its controls from and publishes synced values to.
///
/// Implementations must be lock-free: both methods are called from the
/// audio thread, once per block at most.
pub trait ParameterStore {
    /// Current control values.
    fn snapshot(&self) -> ParameterSnapshot;

    /// The delay time the engine is actually using while tempo sync is
    /// active, or `None` once the delay is back in `Free` mode.
    fn publish_synced_delay(&self, delay_ms: Option<f32>);

    /// The LFO rate the engine is actually using while tempo sync is
    /// active, or `None` once the LFO is back in `Free` mode.
    fn publish_synced_lfo_rate(&self, rate_hz: Option<f32>);
}
