//! # Delay Line
//!
//! A circular buffer with one write head and any number of fractional
//! read taps behind it. The main echo path and the chorus tap inside the
//! diffusion network are both built on it.
//!
//! Each sample the caller reads, then writes, then advances:
//!
//! ```text
//!                 write_pos
//!                     ▼
//! [ ... | x[n-2] | x[n-1] | (x[n]) | ... ]
//!            ▲       ▲
//!        read(2.0) read(1.0)
//! ```
//!
//! Reads between two samples are linearly interpolated, which is what lets
//! an LFO sweep the delay time smoothly.

use std::num::NonZeroUsize;

/// Fixed-capacity ring buffer with linearly interpolated reads.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    /// Longest offset `read()` honours.
    max_delay: f32,
}

impl DelayLine {
    /// Allocate a silent line able to hold `capacity` samples.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffer: vec![0.0; capacity.get()],
            write_pos: 0,
            max_delay: (capacity.get() - 1).max(1) as f32,
        }
    }

    /// Longest delay in samples that [`read()`](Self::read) will honour.
    pub fn max_delay(&self) -> f32 {
        self.max_delay
    }

    /// Store `sample` at the write head. Does not advance.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
    }

    /// The sample written `delay_samples` ago, interpolated.
    ///
    /// The offset is clamped to `[1, max_delay()]`: the line is read before
    /// the current sample is written, so one sample is the shortest delay.
    /// NaN and infinite offsets read at the minimum.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let delay = if delay_samples.is_finite() {
            delay_samples.clamp(1.0, self.max_delay)
        } else {
            1.0
        };

        let whole = delay as usize;
        let frac = delay - whole as f32;

        // Adding the length before subtracting keeps the index unsigned.
        let len = self.buffer.len();
        let newer = self.buffer[(self.write_pos + len - whole) % len];
        let older = self.buffer[(self.write_pos + 2 * len - whole - 1) % len];

        newer + (older - newer) * frac
    }

    /// Move the write head one sample forward.
    #[inline]
    pub fn advance(&mut self) {
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Silence the whole line.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
