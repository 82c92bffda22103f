//! # The Smear Engine
//!
//! Everything that happens to audio happens here. The engine knows nothing
//! about plugin formats: it reads its controls from a [`ParameterStore`],
//! takes the host tempo as a plain `Option<f64>`, and works on a slice of
//! channel buffers in place.
//!
//! ## Lifecycle
//!
//! 1. [`Engine::prepare`] validates the audio configuration and allocates
//!    every buffer the engine will ever need. Calling it again with the
//!    same configuration only resets state.
//! 2. [`Engine::process`] runs once per host block. It never allocates,
//!    locks or logs. Blocks longer than the prepared maximum are cut into
//!    sub-blocks.
//! 3. [`Engine::reset`] silences every echo without reallocating.
//!
//! ## Per-Block Flow
//!
//! ```text
//! snapshot ─► tempo sync ─► LFO block
//!
//! per sample:  read line ─► bitcrush/saturate ─► smear ─► DC 20 Hz ─► write line
//!                                                                └──► wet buffer
//!
//! wet buffer ─► HPF/LPF ─► width ─► pan ─► mix with dry ─► DC 5 Hz ─► output
//! ```
//!
//! Delay time, feedback and mix glide toward their targets through
//! per-sample smoothers. Everything else is read once per block, except
//! where the LFO is routed: then the modulated value is recomputed for
//! every sample from the block's modulation buffer.

mod error;
mod instrument;
mod snapshot;

pub use error::{EngineError, MAX_CHANNELS, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
pub use instrument::{BlockReport, Instrumentation};
pub use snapshot::{ParameterSnapshot, ParameterStore};

use crate::dsp::delay::DelayEngine;
use crate::dsp::diffusion::DiffusionNetwork;
use crate::dsp::filter::DcBlocker;
use crate::dsp::filter_pair::{FilterPairSettings, ModulatedFilterPair};
use crate::dsp::mixer::crossfade;
use crate::dsp::modulation::{ModulationEngine, ModulationRouting};
use crate::dsp::smoother::Smoother;
use crate::dsp::stereo::{apply_pan, apply_width};
use crate::dsp::tempo_sync::TempoSyncResolver;
use crate::dsp::tone::ToneShaper;

/// Time constant for the delay time, feedback and mix smoothers.
const PARAMETER_SMOOTHING_MS: f32 = 50.0;

/// Cutoff of the DC blocker on the final output.
const OUTPUT_DC_CUTOFF_HZ: f32 = 5.0;

/// Targets resolved once per host block and shared by its sub-blocks.
struct BlockTargets {
    snapshot: ParameterSnapshot,
    delay_ms: f32,
    lfo_rate_hz: f32,
}

/// All state allocated by `prepare()`.
struct Core {
    sample_rate: f32,
    max_block_size: usize,
    num_channels: usize,

    delay: DelayEngine,
    resolver: TempoSyncResolver,
    modulation: ModulationEngine,
    diffusion: Vec<DiffusionNetwork>,
    filters: ModulatedFilterPair,
    output_dc: Vec<DcBlocker>,
    /// One wet buffer per channel, capacity `max_block_size`.
    wet: Vec<Vec<f32>>,

    delay_smoother: Smoother,
    feedback_smoother: Smoother,
    mix_smoother: Smoother,

    /// False until the smoothers have been snapped to their first targets.
    primed: bool,
    /// Republish synced values on the next block even if nothing changed.
    publish_pending: bool,
}

impl Core {
    fn new(sample_rate: f32, max_block_size: usize, num_channels: usize) -> Self {
        let delay = DelayEngine::new(sample_rate, num_channels);
        Self {
            sample_rate,
            max_block_size,
            num_channels,
            resolver: TempoSyncResolver::new(delay.max_delay_ms()),
            delay,
            modulation: ModulationEngine::new(sample_rate, max_block_size),
            diffusion: (0..num_channels)
                .map(|channel| DiffusionNetwork::new(sample_rate, channel))
                .collect(),
            filters: ModulatedFilterPair::new(sample_rate, num_channels),
            output_dc: (0..num_channels)
                .map(|_| DcBlocker::new(OUTPUT_DC_CUTOFF_HZ, sample_rate))
                .collect(),
            wet: (0..num_channels)
                .map(|_| Vec::with_capacity(max_block_size))
                .collect(),
            delay_smoother: Smoother::new(PARAMETER_SMOOTHING_MS, sample_rate, 0.0),
            feedback_smoother: Smoother::new(PARAMETER_SMOOTHING_MS, sample_rate, 0.0),
            mix_smoother: Smoother::new(PARAMETER_SMOOTHING_MS, sample_rate, 0.0),
            primed: false,
            publish_pending: true,
        }
    }

    fn matches(&self, sample_rate: f32, max_block_size: usize, num_channels: usize) -> bool {
        self.sample_rate == sample_rate
            && self.max_block_size == max_block_size
            && self.num_channels == num_channels
    }

    fn reset(&mut self) {
        self.delay.reset();
        self.resolver.reset();
        self.modulation.reset();
        for network in &mut self.diffusion {
            network.reset();
        }
        self.filters.reset();
        for dc_blocker in &mut self.output_dc {
            dc_blocker.reset();
        }
        for buffer in &mut self.wet {
            buffer.clear();
        }
        self.primed = false;
        self.publish_pending = true;
    }

    /// Snap the smoothers to the first block's targets so the engine does
    /// not glide in from zero.
    fn prime(&mut self, targets: &BlockTargets) {
        self.delay_smoother.reset(targets.delay_ms);
        self.feedback_smoother.reset(targets.snapshot.feedback);
        self.mix_smoother.reset(targets.snapshot.mix);
        self.primed = true;
    }

    /// Read offset of channel `ch`, in samples.
    ///
    /// `base_samples` already carries the LFO offset. With delay-time
    /// modulation on and smear active, the chorus excursion is added to it,
    /// and only the sum is clamped to the line.
    fn read_offset(&self, ch: usize, base_samples: f32, routing: &ModulationRouting) -> f32 {
        let chorus = match self.diffusion.get(ch) {
            Some(network) if routing.routes.delay_time && network.smear() > 0.0 => {
                network.chorus_offset_samples()
            }
            _ => 0.0,
        };
        (base_samples + chorus).clamp(1.0, self.delay.max_delay_samples())
    }

    /// Process frames `start..start + len` of `channels`, with
    /// `len <= max_block_size`.
    fn process_chunk(
        &mut self,
        channels: &mut [&mut [f32]],
        start: usize,
        len: usize,
        targets: &BlockTargets,
        report: &mut BlockReport,
    ) {
        let snapshot = &targets.snapshot;
        let routing = ModulationRouting::new(snapshot.routes, snapshot.lfo_amount);
        let tone = ToneShaper::new(snapshot.saturation);

        self.modulation.set_frequency(targets.lfo_rate_hz);
        self.modulation.generate(len);

        let block_lfo = self.modulation.value(0);
        for network in &mut self.diffusion {
            network.update(snapshot.smear, block_lfo);
        }

        // Within capacity, so this never reallocates.
        for buffer in &mut self.wet {
            buffer.clear();
            buffer.resize(len, 0.0);
        }

        // Settled and unmodulated: one read offset covers the whole chunk.
        let fixed_offset = (!routing.routes.delay_time
            && self.delay_smoother.is_settled(targets.delay_ms))
        .then(|| self.delay.ms_to_samples(targets.delay_ms));

        // ── Feedback loop ───────────────────────────────────────────────
        for i in 0..len {
            let lfo = self.modulation.value(i);
            let delay_ms = self.delay_smoother.next(targets.delay_ms);
            let feedback = self.feedback_smoother.next(snapshot.feedback);
            let bits = routing.bit_depth(snapshot.bitcrush_bits, lfo);

            let base_offset = fixed_offset.unwrap_or_else(|| {
                self.delay
                    .ms_to_samples(delay_ms + routing.delay_offset_ms(delay_ms, lfo))
            });

            for ch in 0..self.num_channels {
                let Some(input) = channels.get(ch).and_then(|c| c.get(start + i)).copied() else {
                    continue;
                };

                let offset = self.read_offset(ch, base_offset, &routing);
                let network = &mut self.diffusion[ch];
                let sample = self.delay.tick(ch, input, offset, feedback, |delayed| {
                    let shaped = if tone.is_transparent(bits) {
                        delayed
                    } else {
                        tone.process(delayed, bits)
                    };
                    network.process(shaped)
                });

                self.wet[ch][i] = sample;
                report.wet_peak = report.wet_peak.max(sample.abs());
            }
        }

        // ── Wet post-processing ─────────────────────────────────────────
        let settings = FilterPairSettings {
            highpass_hz: snapshot.highpass_hz,
            lowpass_hz: snapshot.lowpass_hz,
        };
        self.filters.process_block(
            self.wet.as_mut_slice(),
            self.modulation.values(),
            settings,
            &routing,
        );

        if let [left, right] = self.wet.as_mut_slice() {
            apply_width(left, right, snapshot.stereo_width);
            apply_pan(left, right, snapshot.pan, self.modulation.values(), &routing);
        }

        // ── Output ──────────────────────────────────────────────────────
        for i in 0..len {
            let mix = self.mix_smoother.next(snapshot.mix);
            for ((channel, wet), dc_blocker) in channels
                .iter_mut()
                .zip(&self.wet)
                .zip(&mut self.output_dc)
            {
                let Some(sample) = channel.get_mut(start + i) else {
                    continue;
                };
                let out = dc_blocker.process(crossfade(*sample, wet[i], mix));
                *sample = out;
                report.output_peak = report.output_peak.max(out.abs());
            }
        }
    }
}

/// Host-independent processor for the smear delay.
#[derive(Default)]
pub struct Engine {
    core: Option<Core>,
    instrumentation: Option<Box<dyn Instrumentation>>,
}

impl Engine {
    /// An unprepared engine. `process()` leaves audio untouched until
    /// `prepare()` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and allocate everything `process()`
    /// needs. Not real-time safe.
    pub fn prepare(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        num_channels: usize,
    ) -> Result<(), EngineError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            return Err(EngineError::InvalidBlockSize);
        }
        if num_channels == 0 || num_channels > MAX_CHANNELS {
            return Err(EngineError::UnsupportedChannelCount(num_channels));
        }

        let reusable = self
            .core
            .as_ref()
            .is_some_and(|core| core.matches(sample_rate, max_block_size, num_channels));

        if reusable {
            self.reset();
        } else {
            self.core = Some(Core::new(sample_rate, max_block_size, num_channels));
        }

        Ok(())
    }

    /// Process `channels` in place.
    ///
    /// `host_bpm` is whatever the host reported for this block; absent or
    /// invalid values keep the last valid tempo. Synced delay time and LFO
    /// rate are published to `store` only when they change, plus once
    /// after every `prepare()` or `reset()`.
    pub fn process<S>(&mut self, channels: &mut [&mut [f32]], store: &S, host_bpm: Option<f64>)
    where
        S: ParameterStore + ?Sized,
    {
        let Some(core) = self.core.as_mut() else {
            return;
        };

        let num_frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        if num_frames == 0 {
            return;
        }

        let snapshot = store.snapshot().sanitized();

        let change = core
            .resolver
            .update(host_bpm, snapshot.delay_sync, snapshot.lfo_sync);
        if change.delay || core.publish_pending {
            store.publish_synced_delay(core.resolver.delay_ms());
        }
        if change.lfo || core.publish_pending {
            store.publish_synced_lfo_rate(core.resolver.lfo_hz());
        }
        core.publish_pending = false;

        let targets = BlockTargets {
            snapshot,
            delay_ms: core.resolver.delay_ms().unwrap_or(snapshot.delay_ms),
            lfo_rate_hz: core.resolver.lfo_hz().unwrap_or(snapshot.lfo_rate_hz),
        };

        if !core.primed {
            core.prime(&targets);
        }

        let mut report = BlockReport {
            frames: num_frames,
            bpm: core.resolver.bpm(),
            delay_ms: targets.delay_ms,
            ..Default::default()
        };

        let mut start = 0;
        while start < num_frames {
            let len = (num_frames - start).min(core.max_block_size);
            core.process_chunk(channels, start, len, &targets, &mut report);
            start += len;
        }
        report.lfo_rate_hz = core.modulation.frequency();

        if let Some(hook) = self.instrumentation.as_mut() {
            hook.block_processed(&report);
        }
    }

    /// Clear every echo and filter state. Smoothers snap to the next
    /// block's targets and synced values are republished.
    pub fn reset(&mut self) {
        if let Some(core) = self.core.as_mut() {
            core.reset();
        }
    }

    /// How long the echoes keep ringing after the input stops, in samples.
    ///
    /// The repeats fall to -60 dB after `N` trips around the loop, where
    /// `feedback^N = 0.001`, so `N = -3 / log10(feedback)`.
    pub fn tail_samples(&self) -> u32 {
        let Some(core) = self.core.as_ref() else {
            return 0;
        };

        let feedback = core.feedback_smoother.current();
        let delay_samples = core.delay.ms_to_samples(core.delay_smoother.current());

        let repeats = if feedback > 0.001 {
            -3.0 / feedback.log10()
        } else {
            1.0
        };
        (repeats * delay_samples).max(0.0) as u32
    }

    /// Install or remove the per-block instrumentation hook.
    pub fn set_instrumentation(&mut self, hook: Option<Box<dyn Instrumentation>>) {
        self.instrumentation = hook;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::delay::MAX_DELAY_SECONDS;
    use crate::dsp::modulation::ModulationRoutes;
    use crate::dsp::tempo_sync::SyncRatio;
    use float_cmp::approx_eq;
    use more_asserts::{assert_gt, assert_lt};
    use std::cell::Cell;
    use std::f32::consts::PI;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SR: f32 = 48000.0;

    struct TestStore {
        snapshot: Cell<ParameterSnapshot>,
        delay_publications: Cell<usize>,
        synced_delay: Cell<Option<f32>>,
        lfo_publications: Cell<usize>,
        synced_lfo: Cell<Option<f32>>,
    }

    impl TestStore {
        fn new(snapshot: ParameterSnapshot) -> Self {
            Self {
                snapshot: Cell::new(snapshot),
                delay_publications: Cell::new(0),
                synced_delay: Cell::new(None),
                lfo_publications: Cell::new(0),
                synced_lfo: Cell::new(None),
            }
        }

        fn update(&self, f: impl FnOnce(&mut ParameterSnapshot)) {
            let mut snapshot = self.snapshot.get();
            f(&mut snapshot);
            self.snapshot.set(snapshot);
        }
    }

    impl ParameterStore for TestStore {
        fn snapshot(&self) -> ParameterSnapshot {
            self.snapshot.get()
        }

        fn publish_synced_delay(&self, delay_ms: Option<f32>) {
            self.delay_publications.set(self.delay_publications.get() + 1);
            self.synced_delay.set(delay_ms);
        }

        fn publish_synced_lfo_rate(&self, rate_hz: Option<f32>) {
            self.lfo_publications.set(self.lfo_publications.get() + 1);
            self.synced_lfo.set(rate_hz);
        }
    }

    /// Fully wet, no feedback, everything else neutral.
    fn clean_wet() -> ParameterSnapshot {
        ParameterSnapshot {
            delay_ms: 10.0,
            feedback: 0.0,
            mix: 1.0,
            ..Default::default()
        }
    }

    fn prepared(max_block: usize, channels: usize) -> Engine {
        let mut engine = Engine::new();
        engine
            .prepare(SR, max_block, channels)
            .expect("valid configuration");
        engine
    }

    fn run(engine: &mut Engine, buffers: &mut [Vec<f32>], store: &TestStore, bpm: Option<f64>) {
        let mut channels: Vec<&mut [f32]> = buffers.iter_mut().map(Vec::as_mut_slice).collect();
        engine.process(&mut channels, store, bpm);
    }

    fn impulse(len: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; len];
        buffer[0] = 1.0;
        buffer
    }

    // ── prepare ─────────────────────────────────────────────────────────

    #[test]
    fn test_prepare_rejects_bad_configurations() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.prepare(0.0, 512, 2),
            Err(EngineError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            engine.prepare(f32::NAN, 512, 2),
            Err(EngineError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            engine.prepare(1_000_000.0, 512, 2),
            Err(EngineError::InvalidSampleRate(_))
        ));
        assert_eq!(engine.prepare(SR, 0, 2), Err(EngineError::InvalidBlockSize));
        assert_eq!(
            engine.prepare(SR, 512, 0),
            Err(EngineError::UnsupportedChannelCount(0))
        );
        assert_eq!(
            engine.prepare(SR, 512, 3),
            Err(EngineError::UnsupportedChannelCount(3))
        );
        assert_eq!(engine.tail_samples(), 0);

        assert_eq!(engine.prepare(SR, 512, 2), Ok(()));
    }

    #[test]
    fn test_unprepared_engine_leaves_audio_alone() {
        let mut engine = Engine::new();
        let store = TestStore::new(clean_wet());
        let mut buffers = vec![vec![0.25; 64]];
        run(&mut engine, &mut buffers, &store, None);
        assert!(buffers[0].iter().all(|&s| s == 0.25));
        assert_eq!(store.delay_publications.get(), 0);
        assert_eq!(engine.tail_samples(), 0);
    }

    #[test]
    fn test_error_messages_are_readable() {
        let message = EngineError::UnsupportedChannelCount(6).to_string();
        assert!(message.contains('6'));
    }

    // ── signal path ─────────────────────────────────────────────────────

    #[test]
    fn test_impulse_returns_after_delay_time() {
        let mut engine = prepared(512, 1);
        let store = TestStore::new(clean_wet());
        let mut buffers = vec![impulse(1024)];
        run(&mut engine, &mut buffers, &store, None);

        let out = &buffers[0];
        // 10 ms at 48 kHz.
        assert!(out[..480].iter().all(|&s| s == 0.0));
        let peak = out[480..500].iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert_gt!(peak, 0.5);
    }

    #[test]
    fn test_zero_mix_passes_input() {
        let mut engine = prepared(512, 1);
        let store = TestStore::new(ParameterSnapshot {
            mix: 0.0,
            feedback: 0.8,
            ..Default::default()
        });
        let input: Vec<f32> = (0..4096)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / SR).sin() * 0.5)
            .collect();
        let mut buffers = vec![input.clone()];
        run(&mut engine, &mut buffers, &store, None);

        for (out, dry) in buffers[0].iter().zip(&input).skip(1000) {
            assert_lt!((out - dry).abs(), 0.01);
        }
    }

    #[test]
    fn test_zero_width_collapses_to_mono() {
        let mut engine = prepared(512, 2);
        let store = TestStore::new(ParameterSnapshot {
            stereo_width: 0.0,
            ..clean_wet()
        });
        let mut buffers = vec![impulse(1024), vec![0.0; 1024]];
        run(&mut engine, &mut buffers, &store, None);

        for (l, r) in buffers[0].iter().zip(&buffers[1]) {
            assert!(approx_eq!(f32, *l, *r, epsilon = 1e-6));
        }
        assert_gt!(buffers[0][480..500].iter().fold(0.0_f32, |m, s| m.max(s.abs())), 0.2);
    }

    #[test]
    fn test_hard_pan_silences_one_side() {
        let mut engine = prepared(512, 2);
        let store = TestStore::new(ParameterSnapshot {
            pan: 1.0,
            ..clean_wet()
        });
        let mut buffers = vec![impulse(1024), impulse(1024)];
        run(&mut engine, &mut buffers, &store, None);

        // Fully wet: the left channel carries nothing but the panned wet.
        assert!(buffers[0].iter().all(|s| s.abs() < 1e-6));
        assert_gt!(buffers[1][480..500].iter().fold(0.0_f32, |m, s| m.max(s.abs())), 0.5);
    }

    #[test]
    fn test_everything_on_stays_bounded() {
        let mut engine = prepared(256, 2);
        let store = TestStore::new(ParameterSnapshot {
            delay_ms: 120.0,
            feedback: 0.95,
            mix: 1.0,
            bitcrush_bits: 4.0,
            saturation: 1.0,
            stereo_width: 2.0,
            lfo_rate_hz: 7.0,
            lfo_amount: 1.0,
            smear: 1.0,
            routes: ModulationRoutes {
                bitcrush: true,
                highpass: true,
                lowpass: true,
                pan: true,
                delay_time: true,
            },
            ..Default::default()
        });

        let mut peak = 0.0_f32;
        for block in 0..(SR as usize * 5 / 1024) {
            let mut buffers: Vec<Vec<f32>> = (0..2)
                .map(|ch| {
                    (0..1024)
                        .map(|i| {
                            let n = block * 1024 + i;
                            let phase = 2.0 * PI * (220.0 + 110.0 * ch as f32) * n as f32 / SR;
                            if n < SR as usize { phase.sin() } else { 0.0 }
                        })
                        .collect()
                })
                .collect();
            run(&mut engine, &mut buffers, &store, None);
            for sample in buffers.iter().flatten() {
                assert!(sample.is_finite());
                peak = peak.max(sample.abs());
            }
        }
        assert_lt!(peak, 30.0);
    }

    #[test]
    fn test_oversized_blocks_match_prepared_blocks() {
        let store = TestStore::new(ParameterSnapshot {
            feedback: 0.5,
            ..clean_wet()
        });

        let mut small = prepared(64, 1);
        let mut large = prepared(2048, 1);
        let mut a = vec![impulse(2000)];
        let mut b = vec![impulse(2000)];
        run(&mut small, &mut a, &store, None);
        run(&mut large, &mut b, &store, None);

        for (x, y) in a[0].iter().zip(&b[0]) {
            assert!(approx_eq!(f32, *x, *y, epsilon = 1e-6));
        }
        assert_gt!(a[0][960..980].iter().fold(0.0_f32, |m, s| m.max(s.abs())), 0.2);
    }

    #[test]
    fn test_reset_silences_echoes() {
        let mut engine = prepared(512, 1);
        let store = TestStore::new(ParameterSnapshot {
            feedback: 0.9,
            ..clean_wet()
        });
        let mut buffers = vec![impulse(256)];
        run(&mut engine, &mut buffers, &store, None);

        engine.reset();
        let mut silence = vec![vec![0.0; 4096]];
        run(&mut engine, &mut silence, &store, None);
        assert!(silence[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_reprepare_same_config_resets() {
        let mut engine = prepared(512, 1);
        let store = TestStore::new(ParameterSnapshot {
            feedback: 0.9,
            ..clean_wet()
        });
        run(&mut engine, &mut [impulse(256)], &store, None);

        engine.prepare(SR, 512, 1).expect("same configuration");
        let mut silence = vec![vec![0.0; 2048]];
        run(&mut engine, &mut silence, &store, None);
        assert!(silence[0].iter().all(|&s| s == 0.0));
    }

    // ── tempo sync ──────────────────────────────────────────────────────

    #[test]
    fn test_synced_delay_published_once_per_change() {
        let mut engine = prepared(512, 1);
        let store = TestStore::new(ParameterSnapshot {
            delay_sync: SyncRatio::Quarter,
            ..clean_wet()
        });

        let block = || vec![vec![0.0_f32; 256]];

        run(&mut engine, &mut block(), &store, Some(120.0));
        assert_eq!(store.delay_publications.get(), 1);
        assert_eq!(store.synced_delay.get(), Some(500.0));

        // Same tempo, and a wobble inside the hysteresis band.
        run(&mut engine, &mut block(), &store, Some(120.0));
        run(&mut engine, &mut block(), &store, Some(120.005));
        assert_eq!(store.delay_publications.get(), 1);

        run(&mut engine, &mut block(), &store, Some(90.0));
        assert_eq!(store.delay_publications.get(), 2);
        let synced = store.synced_delay.get().expect("synced");
        assert!(approx_eq!(f32, synced, 666.6667, epsilon = 0.01));

        store.update(|s| s.delay_sync = SyncRatio::Free);
        run(&mut engine, &mut block(), &store, Some(90.0));
        assert_eq!(store.delay_publications.get(), 3);
        assert_eq!(store.synced_delay.get(), None);
    }

    #[test]
    fn test_invalid_tempo_keeps_last_valid() {
        let mut engine = prepared(512, 1);
        let store = TestStore::new(ParameterSnapshot {
            delay_sync: SyncRatio::Eighth,
            ..clean_wet()
        });

        run(&mut engine, &mut [vec![0.0; 64]], &store, Some(100.0));
        assert_eq!(store.delay_publications.get(), 1);
        assert_eq!(store.synced_delay.get(), Some(300.0));

        for bpm in [None, Some(0.0), Some(-50.0), Some(f64::NAN), Some(f64::INFINITY)] {
            run(&mut engine, &mut [vec![0.0; 64]], &store, bpm);
        }
        assert_eq!(store.delay_publications.get(), 1);
        assert_eq!(store.synced_delay.get(), Some(300.0));
    }

    #[test]
    fn test_reset_republishes_synced_values() {
        let mut engine = prepared(512, 1);
        let store = TestStore::new(ParameterSnapshot {
            lfo_sync: SyncRatio::Quarter,
            ..clean_wet()
        });

        run(&mut engine, &mut [vec![0.0; 64]], &store, Some(120.0));
        assert_eq!(store.lfo_publications.get(), 1);
        assert_eq!(store.synced_lfo.get(), Some(2.0));

        // A free-running delay after reset still gets its `None` republished.
        engine.reset();
        run(&mut engine, &mut [vec![0.0; 64]], &store, Some(120.0));
        assert_eq!(store.lfo_publications.get(), 2);
        assert_eq!(store.delay_publications.get(), 2);
        assert_eq!(store.synced_delay.get(), None);
    }

    #[test]
    fn test_synced_delay_drives_echo_position() {
        let mut engine = prepared(1024, 1);
        let store = TestStore::new(ParameterSnapshot {
            delay_ms: 1000.0,
            delay_sync: SyncRatio::ThirtySecond,
            ..clean_wet()
        });
        // A 32nd at 120 BPM is 62.5 ms, or 3000 samples.
        let mut buffers = vec![impulse(4096)];
        run(&mut engine, &mut buffers, &store, Some(120.0));

        assert!(buffers[0][..3000].iter().all(|&s| s == 0.0));
        assert_gt!(buffers[0][3000..3020].iter().fold(0.0_f32, |m, s| m.max(s.abs())), 0.5);
    }

    // ── delay time ──────────────────────────────────────────────────────

    /// Feeds a 100 Hz sine with the delay at `from_ms`, moves it to `to_ms`
    /// well after the echo has started, and returns the largest
    /// sample-to-sample step of the output from half a second after the
    /// move onward. The glide never reads back past the start of the sine.
    fn largest_step_after_glide(from_ms: f32, to_ms: f32) -> f32 {
        let mut engine = prepared(480, 1);
        let store = TestStore::new(ParameterSnapshot {
            delay_ms: from_ms,
            ..clean_wet()
        });

        let switch_at = ((from_ms / 1000.0 + 1.5) * SR) as usize;
        let measure_from = switch_at + SR as usize / 2;
        let end = measure_from + 2 * SR as usize;

        let mut largest = 0.0_f32;
        let mut previous = 0.0_f32;
        for start in (0..end).step_by(480) {
            if start >= switch_at {
                store.update(|s| s.delay_ms = to_ms);
            }
            let mut buffers = vec![(start..start + 480)
                .map(|n| 0.5 * (2.0 * PI * 100.0 * n as f32 / SR).sin())
                .collect::<Vec<_>>()];
            run(&mut engine, &mut buffers, &store, None);

            for (n, &sample) in (start..).zip(&buffers[0]) {
                if n > measure_from {
                    largest = largest.max((sample - previous).abs());
                }
                previous = sample;
            }
        }

        let core = engine.core.as_ref().expect("prepared");
        assert!(core.delay_smoother.is_settled(to_ms));
        largest
    }

    /// Once a long glide finishes, the echo sits exactly on the new delay
    /// time instead of a few samples early.
    #[test]
    fn test_long_delay_glide_lands_on_target() {
        let mut engine = prepared(1024, 1);
        let store = TestStore::new(ParameterSnapshot {
            delay_ms: 4000.0,
            ..clean_wet()
        });
        run(&mut engine, &mut [vec![0.0; 1024]], &store, None);

        store.update(|s| s.delay_ms = 5000.0);
        run(&mut engine, &mut [vec![0.0; 2 * SR as usize]], &store, None);

        let mut buffers = vec![impulse(240_100)];
        run(&mut engine, &mut buffers, &store, None);

        // 5000 ms at 48 kHz.
        assert!(buffers[0][..240_000].iter().all(|&s| s == 0.0));
        assert_gt!(buffers[0][240_000..240_020].iter().fold(0.0_f32, |m, s| m.max(s.abs())), 0.5);
    }

    /// Settling onto the new delay time does not jump the read position:
    /// after the glide the output moves no faster than the sine itself.
    #[test]
    fn test_delay_glide_settles_without_a_jump() {
        let natural_step = 0.5 * 2.0 * PI * 100.0 / SR;
        for (from_ms, to_ms) in [(4000.0, 5000.0), (3000.0, 2000.0), (800.0, 1000.0)] {
            let largest = largest_step_after_glide(from_ms, to_ms);
            assert_lt!(largest, natural_step * 1.1, "{from_ms} -> {to_ms} ms");
            assert_gt!(largest, natural_step * 0.5, "{from_ms} -> {to_ms} ms");
        }
    }

    /// Fully wet, no feedback, delay time routed to a very slow LFO.
    fn lfo_on_delay_time(delay_ms: f32) -> ParameterSnapshot {
        ParameterSnapshot {
            delay_ms,
            lfo_rate_hz: 0.05,
            lfo_amount: 1.0,
            routes: ModulationRoutes {
                delay_time: true,
                ..Default::default()
            },
            ..clean_wet()
        }
    }

    #[test]
    fn test_lfo_moves_echo_by_its_offset() {
        let mut engine = prepared(1024, 1);
        let store = TestStore::new(lfo_on_delay_time(100.0));

        // A quarter of a 0.05 Hz cycle: the LFO sits at its peak, +25%.
        run(&mut engine, &mut [vec![0.0; 5 * SR as usize]], &store, None);

        let mut buffers = vec![impulse(8000)];
        run(&mut engine, &mut buffers, &store, None);
        let out = &buffers[0];

        let loudest = (0..out.len())
            .max_by(|&a, &b| out[a].abs().total_cmp(&out[b].abs()))
            .unwrap_or(0);
        // 125 ms rather than the unmodulated 100 ms (4800 samples).
        assert!((5995..=6005).contains(&loudest), "echo at {loudest}");
        assert!(out[..5900].iter().all(|&s| s == 0.0));
    }

    /// An LFO pushing a 5 s delay further out clamps to the line's capacity
    /// instead of wrapping round to an early echo.
    #[test]
    fn test_lfo_offset_clamps_to_capacity() {
        let mut engine = prepared(1024, 1);
        let store = TestStore::new(lfo_on_delay_time(MAX_DELAY_SECONDS * 1000.0));

        // An eighth of a cycle in, so the LFO stays above its midpoint for
        // the whole echo.
        run(&mut engine, &mut [vec![0.0; 5 * SR as usize / 2]], &store, None);

        let mut buffers = vec![impulse(240_100)];
        run(&mut engine, &mut buffers, &store, None);

        assert!(buffers[0][..240_000].iter().all(|&s| s == 0.0));
        assert_gt!(buffers[0][240_000..240_020].iter().fold(0.0_f32, |m, s| m.max(s.abs())), 0.5);
    }

    #[test]
    fn test_chorus_excursion_adds_to_modulated_offset() {
        let mut engine = prepared(256, 1);
        let core = engine.core.as_mut().expect("prepared");
        let routing = ModulationRouting::new(
            ModulationRoutes {
                delay_time: true,
                ..Default::default()
            },
            1.0,
        );

        // Full smear runs the chorus at 1.5 Hz with 8 ms of depth; a quarter
        // of a cycle puts it at its peak.
        core.diffusion[0].update(1.0, 0.5);
        for _ in 0..8000 {
            core.diffusion[0].process(0.0);
        }
        let chorus = core.diffusion[0].chorus_offset_samples();
        assert_gt!(chorus, 380.0);

        let base = core.delay.ms_to_samples(100.0);
        assert_eq!(core.read_offset(0, base, &routing), base + chorus);
        assert_eq!(core.read_offset(0, base, &ModulationRouting::default()), base);

        let max = core.delay.max_delay_samples();
        assert_eq!(core.read_offset(0, max, &routing), max);

        // Half a cycle later the excursion is negative. It is summed with a
        // base beyond capacity before the clamp, not after.
        for _ in 0..16000 {
            core.diffusion[0].process(0.0);
        }
        let chorus = core.diffusion[0].chorus_offset_samples();
        assert_lt!(chorus, -380.0);

        let offset = core.read_offset(0, max + 100.0, &routing);
        assert_eq!(offset, max + 100.0 + chorus);
        assert_lt!(offset, max);
    }

    // ── instrumentation and tail ────────────────────────────────────────

    #[test]
    fn test_instrumentation_sees_every_block() {
        let mut engine = prepared(128, 1);
        let blocks = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(AtomicUsize::new(0));
        {
            let blocks = blocks.clone();
            let frames = frames.clone();
            engine.set_instrumentation(Some(Box::new(move |report: &BlockReport| {
                blocks.fetch_add(1, Ordering::Relaxed);
                frames.fetch_add(report.frames, Ordering::Relaxed);
                assert_eq!(report.bpm, 140.0);
            })));
        }

        let store = TestStore::new(clean_wet());
        run(&mut engine, &mut [impulse(1000)], &store, Some(140.0));
        run(&mut engine, &mut [vec![0.0; 300]], &store, Some(140.0));

        assert_eq!(blocks.load(Ordering::Relaxed), 2);
        assert_eq!(frames.load(Ordering::Relaxed), 1300);

        engine.set_instrumentation(None);
        run(&mut engine, &mut [vec![0.0; 300]], &store, Some(140.0));
        assert_eq!(blocks.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_tail_grows_with_feedback() {
        let store_low = TestStore::new(ParameterSnapshot {
            delay_ms: 100.0,
            feedback: 0.3,
            ..Default::default()
        });
        let store_high = TestStore::new(ParameterSnapshot {
            delay_ms: 100.0,
            feedback: 0.9,
            ..Default::default()
        });

        let mut low = prepared(256, 1);
        let mut high = prepared(256, 1);
        run(&mut low, &mut [vec![0.0; 256]], &store_low, None);
        run(&mut high, &mut [vec![0.0; 256]], &store_high, None);

        assert_gt!(low.tail_samples(), 4800);
        assert_gt!(high.tail_samples(), low.tail_samples());
    }
}
