//! # Plugin Parameters
//!
//! Parameters are the knobs, switches and menus the user sees in the DAW.
//! Each has a **unique string ID** (`#[id = "..."]`) that the host uses to
//! save and recall presets. Once published, never change these IDs or
//! existing presets will break.
//!
//! ## Smoothing
//!
//! None of these parameters carries an nih-plug smoother. The engine reads
//! a snapshot once per block and runs its own per-sample smoothers for the
//! controls that would click if they jumped (delay time, feedback, mix).
//!
//! ## Tempo-Synced Values
//!
//! While a sync selector is set, the delay time and LFO rate the engine
//! actually uses come from the host tempo, not from the knobs. A plugin
//! cannot move its own parameters in nih-plug, so the engine publishes the
//! synced values into two `AtomicF32` cells instead (`NaN` meaning "not
//! synced"). The knobs' display formatters read those cells, so the host
//! shows the synced value in place of the manual one.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic_float::AtomicF32;
use nih_plug::prelude::*;

use crate::dsp::modulation::ModulationRoutes;
use crate::dsp::tempo_sync::SyncRatio;
use crate::engine::{ParameterSnapshot, ParameterStore};

/// All user-facing parameters for Smear Delay.
#[derive(Params)]
pub struct PluginParams {
    // ── Delay ───────────────────────────────────────────────────────────
    /// **Delay Time**, 0 to 5000 ms. Skewed so the first half of the knob
    /// covers the short times where small changes matter most.
    #[id = "delay"]
    pub delay_time: FloatParam,

    /// **Feedback**, capped at 95% so the repeats always die out.
    #[id = "fdbk"]
    pub feedback: FloatParam,

    /// **Mix**: 0% is fully dry, 100% fully wet.
    #[id = "mix"]
    pub mix: FloatParam,

    /// **Delay Sync**: `Free` uses the Delay Time knob; any note value
    /// derives the time from the host tempo.
    #[id = "delay_sync"]
    pub delay_sync: EnumParam<SyncRatio>,

    // ── Tone ────────────────────────────────────────────────────────────
    /// **Bits**: quantizer resolution inside the feedback loop. 16 bits is
    /// clean.
    #[id = "bits"]
    pub bit_depth: FloatParam,

    /// **Saturation**: how much of the soft-clipped signal replaces the
    /// crushed one.
    #[id = "sat"]
    pub saturation: FloatParam,

    /// **Smear**: diffusion and chorus inside the feedback loop. 0% leaves
    /// the echoes untouched.
    #[id = "smear"]
    pub smear: FloatParam,

    /// **Low Cut** on the wet signal.
    #[id = "hpf"]
    pub highpass: FloatParam,

    /// **High Cut** on the wet signal.
    #[id = "lpf"]
    pub lowpass: FloatParam,

    // ── Stereo ──────────────────────────────────────────────────────────
    /// **Width**: 0% folds the echoes to mono, 200% doubles the side signal.
    #[id = "width"]
    pub width: FloatParam,

    #[id = "pan"]
    pub pan: FloatParam,

    // ── LFO ─────────────────────────────────────────────────────────────
    #[id = "lfo_rate"]
    pub lfo_rate: FloatParam,

    /// **LFO Amount**: depth applied to every routed destination.
    #[id = "lfo_amt"]
    pub lfo_amount: FloatParam,

    #[id = "lfo_sync"]
    pub lfo_sync: EnumParam<SyncRatio>,

    #[id = "lfo_bits"]
    pub lfo_to_bits: BoolParam,

    #[id = "lfo_hpf"]
    pub lfo_to_highpass: BoolParam,

    #[id = "lfo_lpf"]
    pub lfo_to_lowpass: BoolParam,

    #[id = "lfo_pan"]
    pub lfo_to_pan: BoolParam,

    #[id = "lfo_delay"]
    pub lfo_to_delay: BoolParam,

    // ── Write-back cells (not host parameters) ──────────────────────────
    /// Delay time in use while `delay_sync` is active, `NaN` otherwise.
    pub synced_delay_ms: Arc<AtomicF32>,

    /// LFO rate in use while `lfo_sync` is active, `NaN` otherwise.
    pub synced_lfo_hz: Arc<AtomicF32>,
}

/// A value-to-string formatter that shows the synced value from `cell`
/// when there is one, and the parameter's own value otherwise.
fn synced_or_manual(cell: Arc<AtomicF32>, digits: usize) -> Arc<dyn Fn(f32) -> String + Send + Sync> {
    Arc::new(move |value| {
        let synced = cell.load(Ordering::Relaxed);
        let shown = if synced.is_finite() { synced } else { value };
        format!("{shown:.digits$}")
    })
}

fn routing_switch(name: &'static str) -> BoolParam {
    BoolParam::new(name, false)
}

impl Default for PluginParams {
    fn default() -> Self {
        let synced_delay_ms = Arc::new(AtomicF32::new(f32::NAN));
        let synced_lfo_hz = Arc::new(AtomicF32::new(f32::NAN));

        Self {
            delay_time: FloatParam::new(
                "Delay Time",
                500.0,
                FloatRange::Skewed {
                    min: 0.0,
                    max: 5000.0,
                    factor: FloatRange::skew_factor(-1.5),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1)
            .with_value_to_string(synced_or_manual(synced_delay_ms.clone(), 1)),

            feedback: FloatParam::new(
                "Feedback",
                0.40,
                FloatRange::Linear {
                    min: 0.0,
                    max: 0.95,
                },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            mix: FloatParam::new("Mix", 0.50, FloatRange::Linear { min: 0.0, max: 1.0 })
                .with_unit("%")
                .with_value_to_string(formatters::v2s_f32_percentage(1))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            delay_sync: EnumParam::new("Delay Sync", SyncRatio::Free),

            bit_depth: FloatParam::new("Bits", 16.0, FloatRange::Linear { min: 1.0, max: 16.0 })
                .with_unit(" bits")
                .with_step_size(0.1),

            saturation: FloatParam::new(
                "Saturation",
                0.0,
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            smear: FloatParam::new("Smear", 0.0, FloatRange::Linear { min: 0.0, max: 1.0 })
                .with_unit("%")
                .with_value_to_string(formatters::v2s_f32_percentage(1))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            // Frequency knobs get a strong skew because pitch perception
            // is roughly logarithmic.
            highpass: FloatParam::new(
                "Low Cut",
                20.0,
                FloatRange::Skewed {
                    min: 20.0,
                    max: 5000.0,
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_value_to_string(formatters::v2s_f32_hz_then_khz(1))
            .with_string_to_value(formatters::s2v_f32_hz_then_khz()),

            lowpass: FloatParam::new(
                "High Cut",
                20000.0,
                FloatRange::Skewed {
                    min: 200.0,
                    max: 20000.0,
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_value_to_string(formatters::v2s_f32_hz_then_khz(1))
            .with_string_to_value(formatters::s2v_f32_hz_then_khz()),

            width: FloatParam::new("Width", 1.0, FloatRange::Linear { min: 0.0, max: 2.0 })
                .with_unit("%")
                .with_value_to_string(formatters::v2s_f32_percentage(0))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            pan: FloatParam::new("Pan", 0.0, FloatRange::Linear { min: -1.0, max: 1.0 })
                .with_value_to_string(formatters::v2s_f32_panning())
                .with_string_to_value(formatters::s2v_f32_panning()),

            lfo_rate: FloatParam::new(
                "LFO Rate",
                1.0,
                FloatRange::Skewed {
                    min: 0.01,
                    max: 20.0,
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_unit(" Hz")
            .with_value_to_string(synced_or_manual(synced_lfo_hz.clone(), 2)),

            lfo_amount: FloatParam::new(
                "LFO Amount",
                0.0,
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            lfo_sync: EnumParam::new("LFO Sync", SyncRatio::Free),

            lfo_to_bits: routing_switch("LFO to Bits"),
            lfo_to_highpass: routing_switch("LFO to Low Cut"),
            lfo_to_lowpass: routing_switch("LFO to High Cut"),
            lfo_to_pan: routing_switch("LFO to Pan"),
            lfo_to_delay: routing_switch("LFO to Delay Time"),

            synced_delay_ms,
            synced_lfo_hz,
        }
    }
}

impl PluginParams {
    /// The synced delay time last published by the engine.
    pub fn synced_delay_ms(&self) -> Option<f32> {
        let value = self.synced_delay_ms.load(Ordering::Relaxed);
        value.is_finite().then_some(value)
    }

    /// The synced LFO rate last published by the engine.
    pub fn synced_lfo_hz(&self) -> Option<f32> {
        let value = self.synced_lfo_hz.load(Ordering::Relaxed);
        value.is_finite().then_some(value)
    }
}

impl ParameterStore for PluginParams {
    fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            delay_ms: self.delay_time.value(),
            feedback: self.feedback.value(),
            mix: self.mix.value(),
            bitcrush_bits: self.bit_depth.value(),
            saturation: self.saturation.value(),
            stereo_width: self.width.value(),
            pan: self.pan.value(),
            highpass_hz: self.highpass.value(),
            lowpass_hz: self.lowpass.value(),
            lfo_rate_hz: self.lfo_rate.value(),
            lfo_amount: self.lfo_amount.value(),
            smear: self.smear.value(),
            delay_sync: self.delay_sync.value(),
            lfo_sync: self.lfo_sync.value(),
            routes: ModulationRoutes {
                bitcrush: self.lfo_to_bits.value(),
                highpass: self.lfo_to_highpass.value(),
                lowpass: self.lfo_to_lowpass.value(),
                pan: self.lfo_to_pan.value(),
                delay_time: self.lfo_to_delay.value(),
            },
        }
    }

    fn publish_synced_delay(&self, delay_ms: Option<f32>) {
        self.synced_delay_ms
            .store(delay_ms.unwrap_or(f32::NAN), Ordering::Relaxed);
    }

    fn publish_synced_lfo_rate(&self, rate_hz: Option<f32>) {
        self.synced_lfo_hz
            .store(rate_hz.unwrap_or(f32::NAN), Ordering::Relaxed);
    }
}
