//! # Smear Delay: An AU/VST3/CLAP Modulated Delay
//!
//! A stereo delay built with [nih-plug](https://github.com/robbert-vdh/nih-plug).
//! The echoes can be crushed, saturated, smeared into a diffuse chorus,
//! band-limited, widened and panned, and an LFO can wobble most of those
//! stages. Delay time and LFO rate can follow the host tempo. Outputs
//! Audio Unit (AUv2), VST3 and CLAP from a single codebase.
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──┬─────────────────────────────────────────────── × (1 - mix) ──┐
//!         │                                                              │
//!         │   ┌───────────────── FEEDBACK LOOP ───────────────────┐      │
//!         │   │                                                   │      │
//!         └─►(+)─► [Delay Line] ─► [Bits/Sat] ─► [Smear] ─► [DC] ─┤      │
//!             ▲     ▲ time ± LFO                                  │      │
//!             │     │                                             │      │
//!             └─────│──────────────────────── × feedback ◄────────┤      │
//!                   │                                             ▼      │
//!                   │                      [HPF/LPF] ─► [Width] ─► [Pan] │
//!                   │                                               │    │
//!              host tempo                                     × mix │    │
//!                                                                   ▼    ▼
//!                                                                  (+) ─► [DC] ─► Output
//! ```
//!
//! The plugin itself is thin: all DSP lives in [`engine::Engine`], which
//! knows nothing about nih-plug and is tested on its own.

mod dsp;
mod engine;
mod meters;
mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use engine::Engine;
use meters::{BlockMeters, MeterRecorder};
use nih_plug::prelude::*;
use params::PluginParams;

/// The main plugin struct.
///
/// `params` is shared with the host and read from any thread. The engine
/// is owned by the audio thread. `meters` is the one piece of state both
/// sides see: the engine writes a report after every block and `reset()`
/// logs it.
struct SmearDelay {
    params: Arc<PluginParams>,
    engine: Engine,
    meters: Arc<BlockMeters>,
}

impl Default for SmearDelay {
    fn default() -> Self {
        let meters = Arc::new(BlockMeters::default());

        // Buffers are allocated in initialize(), once the host has told us
        // the sample rate, block size and channel count.
        let mut engine = Engine::new();
        engine.set_instrumentation(Some(Box::new(MeterRecorder::new(meters.clone()))));

        Self {
            params: Arc::new(PluginParams::default()),
            engine,
            meters,
        }
    }
}

impl Plugin for SmearDelay {
    const NAME: &'static str = "Smear Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first: width and pan only act on a stereo pair.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Blocks are split at automation points, so each snapshot the engine
    // takes is exact for the frames it covers.
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Allocate the engine for this audio configuration.
    ///
    /// Returning `false` tells the host we cannot run with it.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_output_channels
            .map(|c| c.get() as usize)
            .unwrap_or(2);
        let max_block_size = buffer_config.max_buffer_size as usize;

        match self
            .engine
            .prepare(buffer_config.sample_rate, max_block_size, num_channels)
        {
            Ok(()) => {
                nih_log!(
                    "prepared for {} Hz, {} channel(s), blocks of up to {} samples",
                    buffer_config.sample_rate,
                    num_channels,
                    max_block_size
                );
                true
            }
            Err(err) => {
                nih_log!("rejected audio configuration: {err}");
                false
            }
        }
    }

    /// Called when playback stops or the plugin is bypassed. Logs what the
    /// engine did since the last reset, then silences every echo.
    fn reset(&mut self) {
        let report = self.meters.take();
        if report.frames > 0 {
            nih_log!(
                "reset after {} frames: {:.2} BPM, delay {:.1} ms{}, LFO {:.2} Hz{}, \
                 wet peak {:.3}, output peak {:.3}",
                report.frames,
                report.bpm,
                report.delay_ms,
                synced_tag(self.params.synced_delay_ms()),
                report.lfo_rate_hz,
                synced_tag(self.params.synced_lfo_hz()),
                report.wet_peak,
                report.output_peak
            );
        }

        self.engine.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let tempo = context.transport().tempo;
        self.engine.process(buffer.as_slice(), &*self.params, tempo);

        // Keep the host calling us until the repeats have died away.
        ProcessStatus::Tail(self.engine.tail_samples())
    }
}

fn synced_tag(synced: Option<f32>) -> &'static str {
    if synced.is_some() {
        " (synced)"
    } else {
        ""
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────

impl ClapPlugin for SmearDelay {
    const CLAP_ID: &'static str = "com.loveless-audio.smear-delay-v1";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A tempo-synced delay with bitcrushing, diffusion and LFO modulation");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
        ClapFeature::Chorus,
        ClapFeature::Distortion,
    ];
}

impl Vst3Plugin for SmearDelay {
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssSmearDly001";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Delay,
        Vst3SubCategory::Modulation,
    ];
}

// ─────────────────────────────────────────────────────────────────────
// Export macros
// ─────────────────────────────────────────────────────────────────────
//
// nih_export_clap! exports the `clap_entry` symbol for CLAP hosts.
// nih_export_vst3! exports `GetPluginFactory` for VST3 hosts.
// clap_wrapper re-exports the CLAP entry point as AUv2 for Logic Pro.

nih_export_clap!(SmearDelay);
nih_export_vst3!(SmearDelay);
clap_wrapper::export_auv2!();
