//! # Feedback Delay Engine
//!
//! Owns one [`DelayLine`] per channel and runs the feedback loop:
//!
//! ```text
//!            ┌────────────────────────────────────────────┐
//!            ▼                                            │
//! input ──►(+)──► [delay line] ──► shape ──► [DC 20 Hz] ──┼──► wet out
//!                                  (tone,                 │
//!                                   smear)          × feedback
//! ```
//!
//! ## Why Feedback Stops at 0.95
//!
//! Each trip around the loop multiplies the signal by `feedback`. Below 1.0
//! the repeats shrink geometrically; at 1.0 they never decay; above it they
//! grow without bound. Every stage inside the loop (quantizer, soft clip,
//! filters, DC blocker) has a gain close to or below one, so capping
//! feedback at [`MAX_FEEDBACK`] keeps the loop gain safely below unity.

use std::num::NonZeroUsize;

use super::delay_line::DelayLine;
use super::filter::DcBlocker;

/// Longest delay the line can hold.
pub const MAX_DELAY_SECONDS: f32 = 5.0;

/// Upper bound for the feedback amount.
pub const MAX_FEEDBACK: f32 = 0.95;

/// Cutoff of the DC blocker inside the feedback path.
const FEEDBACK_DC_CUTOFF_HZ: f32 = 20.0;

/// Convert milliseconds to (fractional) samples.
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * sample_rate / 1000.0
}

/// Per-channel feedback delay lines.
pub struct DelayEngine {
    sample_rate: f32,
    lines: Vec<DelayLine>,
    dc_blockers: Vec<DcBlocker>,
}

impl DelayEngine {
    /// Allocate `num_channels` lines of [`MAX_DELAY_SECONDS`] each.
    pub fn new(sample_rate: f32, num_channels: usize) -> Self {
        let capacity = (MAX_DELAY_SECONDS * sample_rate) as usize + 1;
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            sample_rate,
            lines: (0..num_channels).map(|_| DelayLine::new(capacity)).collect(),
            dc_blockers: (0..num_channels)
                .map(|_| DcBlocker::new(FEEDBACK_DC_CUTOFF_HZ, sample_rate))
                .collect(),
        }
    }

    /// Longest delay in milliseconds.
    pub fn max_delay_ms(&self) -> f32 {
        MAX_DELAY_SECONDS * 1000.0
    }

    /// Longest read offset in samples; offsets beyond it are clamped.
    pub fn max_delay_samples(&self) -> f32 {
        self.lines.first().map_or(1.0, DelayLine::max_delay)
    }

    pub fn ms_to_samples(&self, ms: f32) -> f32 {
        ms_to_samples(ms, self.sample_rate)
    }

    /// Run one sample of one channel through the loop and return the wet
    /// (delayed, shaped, DC-blocked) sample.
    ///
    /// `shape` receives the raw delayed sample and returns it processed by
    /// whatever sits inside the loop. `feedback` is clamped to
    /// `[0, MAX_FEEDBACK]`. Channels without a line pass silence.
    #[inline]
    pub fn tick(
        &mut self,
        channel: usize,
        input: f32,
        delay_samples: f32,
        feedback: f32,
        shape: impl FnOnce(f32) -> f32,
    ) -> f32 {
        let (Some(line), Some(dc_blocker)) =
            (self.lines.get_mut(channel), self.dc_blockers.get_mut(channel))
        else {
            return 0.0;
        };

        let feedback = if feedback.is_finite() {
            feedback.clamp(0.0, MAX_FEEDBACK)
        } else {
            0.0
        };

        let delayed = line.read(delay_samples);
        let wet = dc_blocker.process(shape(delayed));

        line.write(input + wet * feedback);
        line.advance();

        wet
    }

    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        for dc_blocker in &mut self.dc_blockers {
            dc_blocker.reset();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
