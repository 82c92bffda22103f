//! # Diffusion Network ("Smear")
//!
//! Smear blurs each repeat so that echoes melt into a wash instead of
//! arriving as clean copies. Two things happen in parallel:
//!
//! ```text
//!        ┌─► [one-pole LP] ─► [4 × resonant stage] ─► [biquad LP] ─► tanh ─┐
//! x ─────┤                                                                ├─► 0.6 / 0.4 blend ─┐
//!        └─► [chorus tap: 5-20 ms, sine-modulated] ──────────────────────┘                    │
//!        │                                                                                     ▼
//!        └────────────────────────────── × (1 − smear) ──────────────────────────────► (+) ─► out
//!                                                                                       ▲
//!                                                                      blend × smear ───┘
//! ```
//!
//! ## Resonant Stages
//!
//! Each stage adds a bandpassed copy of its input back onto itself:
//!
//! ```text
//! y = x + 0.5 * bandpass(x)
//! ```
//!
//! which puts a resonant bump at the stage's centre frequency. Four stages
//! at spread-out centres (350 Hz, 800 Hz, 1.8 kHz, 4 kHz), each nudged up or
//! down by the LFO, give the smeared repeats their shifting colour.
//!
//! Resonance *falls* as smear rises (`Q = 4 × (1 − 0.75 × smear)`): the
//! more of the diffused signal is audible, the less peaky it should be, or
//! high settings ring. Q is clamped to `[0.5, 4]`, which keeps every stage
//! far from self-oscillation.
//!
//! ## Smear Is Its Own Dry/Wet
//!
//! At `smear = 0` the network returns its input untouched, bit for bit.
//! The chorus tap keeps recording even then, and the filters start from
//! silence whenever smear comes back up, so turning it up never plays back
//! stale audio.

use std::f32::consts::{FRAC_PI_2, TAU};
use std::num::NonZeroUsize;

use super::delay_line::DelayLine;
use super::filter::{Biquad, BiquadCoefficients, BiquadKind, OnePoleFilter};

/// Centre frequencies of the four resonant stages.
const STAGE_CENTRES_HZ: [f32; 4] = [350.0, 800.0, 1800.0, 4000.0];
/// How much bandpassed signal each stage adds back.
const STAGE_MIX: f32 = 0.5;
/// Resonance range of a stage.
const STAGE_Q_RANGE: (f32, f32) = (0.5, 4.0);
/// LFO sweep of the stage centres at full smear, in octaves.
const STAGE_SWEEP_OCTAVES: f32 = 0.5;

const PRE_LOWPASS_HZ: f32 = 9000.0;
const POST_LOWPASS_HZ: f32 = 7000.0;

/// Capacity of the chorus tap.
const CHORUS_MAX_MS: f32 = 50.0;

/// Weight of the diffused path in the diffused/chorus blend.
const DIFFUSED_WEIGHT: f32 = 0.6;
/// Weight of the chorus path in the diffused/chorus blend.
const CHORUS_WEIGHT: f32 = 0.4;

/// Resonance of every stage at the given smear amount.
pub fn stage_q(smear: f32) -> f32 {
    let (min, max) = STAGE_Q_RANGE;
    let smear = if smear.is_finite() { smear.clamp(0.0, 1.0) } else { 0.0 };
    (max * (1.0 - 0.75 * smear)).clamp(min, max)
}

/// One channel of the smear network.
pub struct DiffusionNetwork {
    sample_rate: f32,
    smear: f32,

    pre_lowpass: OnePoleFilter,
    stages: [Biquad; 4],
    stage_coefficients: [BiquadCoefficients; 4],
    post_lowpass: Biquad,
    post_coefficients: BiquadCoefficients,

    chorus: DelayLine,
    /// Chorus LFO phase in radians.
    chorus_phase: f32,
    /// Where `chorus_phase` restarts after `reset()`.
    initial_phase: f32,
}

impl DiffusionNetwork {
    /// `channel` only picks the chorus phase: odd channels run 90° behind
    /// even ones so the chorus widens a stereo image.
    pub fn new(sample_rate: f32, channel: usize) -> Self {
        let mut pre_lowpass = OnePoleFilter::new();
        pre_lowpass.set_cutoff(PRE_LOWPASS_HZ, sample_rate);

        let chorus_len = (CHORUS_MAX_MS * 0.001 * sample_rate) as usize + 2;
        let chorus_len = NonZeroUsize::new(chorus_len).unwrap_or(NonZeroUsize::MIN);

        let initial_phase = if channel % 2 == 1 { FRAC_PI_2 } else { 0.0 };

        Self {
            sample_rate,
            smear: 0.0,
            pre_lowpass,
            stages: Default::default(),
            stage_coefficients: [BiquadCoefficients::IDENTITY; 4],
            post_lowpass: Biquad::new(),
            post_coefficients: BiquadCoefficients::new(
                BiquadKind::Lowpass,
                POST_LOWPASS_HZ,
                std::f32::consts::FRAC_1_SQRT_2,
                sample_rate,
            ),
            chorus: DelayLine::new(chorus_len),
            chorus_phase: initial_phase,
            initial_phase,
        }
    }

    /// Set this block's smear amount and sweep the stage centres with the
    /// block's LFO value. Coefficients are only recomputed while smear is
    /// active.
    pub fn update(&mut self, smear: f32, lfo: f32) {
        let was_active = self.smear > 0.0;
        self.smear = if smear.is_finite() { smear.clamp(0.0, 1.0) } else { 0.0 };
        if self.smear <= 0.0 {
            return;
        }
        if !was_active {
            self.reset_filters();
        }

        let q = stage_q(self.smear);
        let bipolar = lfo.clamp(0.0, 1.0) * 2.0 - 1.0;
        let sweep = STAGE_SWEEP_OCTAVES * self.smear * bipolar;

        for (k, (coefficients, centre)) in self
            .stage_coefficients
            .iter_mut()
            .zip(STAGE_CENTRES_HZ)
            .enumerate()
        {
            // Neighbouring stages move in opposite directions.
            let direction = if k % 2 == 0 { 1.0 } else { -1.0 };
            let hz = centre * (direction * sweep).exp2();
            *coefficients = BiquadCoefficients::new(BiquadKind::Bandpass, hz, q, self.sample_rate);
        }
    }

    pub fn smear(&self) -> f32 {
        self.smear
    }

    fn chorus_base_ms(&self) -> f32 {
        5.0 + 15.0 * self.smear
    }

    fn chorus_depth_ms(&self) -> f32 {
        8.0 * self.smear
    }

    fn chorus_rate_hz(&self) -> f32 {
        0.2 + 1.3 * self.smear
    }

    /// The chorus LFO's current excursion, in samples. Zero at `smear = 0`.
    ///
    /// The delay engine adds this to its own read offset when delay-time
    /// modulation is on.
    pub fn chorus_offset_samples(&self) -> f32 {
        self.chorus_depth_ms() * self.chorus_phase.sin() * 0.001 * self.sample_rate
    }

    fn advance_chorus(&mut self, input: f32) {
        self.chorus.write(input);
        self.chorus.advance();

        self.chorus_phase += TAU * self.chorus_rate_hz() / self.sample_rate;
        if self.chorus_phase >= TAU {
            self.chorus_phase -= TAU;
        }
    }

    /// Process one sample.
    pub fn process(&mut self, input: f32) -> f32 {
        if self.smear <= 0.0 {
            self.advance_chorus(input);
            return input;
        }

        let mut diffused = self.pre_lowpass.process(input);
        for (stage, coefficients) in self.stages.iter_mut().zip(&self.stage_coefficients) {
            diffused += STAGE_MIX * stage.process(diffused, coefficients);
        }
        let diffused = self
            .post_lowpass
            .process(diffused, &self.post_coefficients)
            .tanh();

        let chorus_ms = self.chorus_base_ms() + self.chorus_depth_ms() * self.chorus_phase.sin();
        let chorus = self.chorus.read(chorus_ms * 0.001 * self.sample_rate);
        self.advance_chorus(input);

        let blend = DIFFUSED_WEIGHT * diffused + CHORUS_WEIGHT * chorus;
        input * (1.0 - self.smear) + blend * self.smear
    }

    fn reset_filters(&mut self) {
        self.pre_lowpass.reset();
        for stage in &mut self.stages {
            stage.reset();
        }
        self.post_lowpass.reset();
    }

    pub fn reset(&mut self) {
        self.reset_filters();
        self.chorus.clear();
        self.chorus_phase = self.initial_phase;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
