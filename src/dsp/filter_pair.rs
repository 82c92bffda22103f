//! # Modulated Filter Pair
//!
//! A highpass and a lowpass in series on the wet signal, together forming
//! a band that the LFO can sweep.
//!
//! Recomputing biquad coefficients costs a `sin` and a `cos`, so each
//! filter only does it every sample when the LFO is routed to it. An
//! unmodulated filter computes its coefficients once per block.
//!
//! ```text
//! cutoff = clamp(band, base × 2^(depth × amount × (lfo × 2 − 1)))
//! ```
//!
//! The octave `depth` comes from [`ModulationRouting`]: the highpass is
//! allowed a wider excursion than the lowpass.

use super::filter::{Biquad, BiquadCoefficients, BiquadKind};
use super::modulation::ModulationRouting;

/// Butterworth Q: the flattest passband without a resonant bump.
const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Base cutoffs for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterPairSettings {
    pub highpass_hz: f32,
    pub lowpass_hz: f32,
}

/// Highpass + lowpass with per-channel state and shared coefficients.
pub struct ModulatedFilterPair {
    sample_rate: f32,
    highpass: BiquadCoefficients,
    lowpass: BiquadCoefficients,
    /// `(highpass, lowpass)` state for each channel.
    states: Vec<(Biquad, Biquad)>,
}

impl ModulatedFilterPair {
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        Self {
            sample_rate,
            highpass: BiquadCoefficients::IDENTITY,
            lowpass: BiquadCoefficients::IDENTITY,
            states: (0..num_channels)
                .map(|_| (Biquad::new(), Biquad::new()))
                .collect(),
        }
    }

    fn update_highpass(&mut self, cutoff_hz: f32) {
        self.highpass = BiquadCoefficients::new(
            BiquadKind::Highpass,
            cutoff_hz,
            BUTTERWORTH_Q,
            self.sample_rate,
        );
    }

    fn update_lowpass(&mut self, cutoff_hz: f32) {
        self.lowpass = BiquadCoefficients::new(
            BiquadKind::Lowpass,
            cutoff_hz,
            BUTTERWORTH_Q,
            self.sample_rate,
        );
    }

    /// Filter every channel of `wet` in place. The block length is taken
    /// from the first channel.
    ///
    /// `modulation` holds one `[0, 1]` LFO value per sample; missing
    /// entries read as the resting midpoint.
    pub fn process_block<C: AsMut<[f32]>>(
        &mut self,
        wet: &mut [C],
        modulation: &[f32],
        settings: FilterPairSettings,
        routing: &ModulationRouting,
    ) {
        let num_samples = wet.first_mut().map_or(0, |channel| channel.as_mut().len());
        let per_sample_hp = routing.routes.highpass && routing.amount > 0.0;
        let per_sample_lp = routing.routes.lowpass && routing.amount > 0.0;

        // Unmodulated filters: once per block. The routing still applies
        // its clamp to the base frequency.
        if !per_sample_hp {
            self.update_highpass(routing.highpass_hz(settings.highpass_hz, 0.5));
        }
        if !per_sample_lp {
            self.update_lowpass(routing.lowpass_hz(settings.lowpass_hz, 0.5));
        }

        for i in 0..num_samples {
            let lfo = modulation.get(i).copied().unwrap_or(0.5);
            if per_sample_hp {
                self.update_highpass(routing.highpass_hz(settings.highpass_hz, lfo));
            }
            if per_sample_lp {
                self.update_lowpass(routing.lowpass_hz(settings.lowpass_hz, lfo));
            }

            for (channel, (hp, lp)) in wet.iter_mut().zip(self.states.iter_mut()) {
                if let Some(sample) = channel.as_mut().get_mut(i) {
                    *sample = lp.process(hp.process(*sample, &self.highpass), &self.lowpass);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        for (hp, lp) in &mut self.states {
            hp.reset();
            lp.reset();
        }
    }
}
