//! # Instrumentation Hook
//!
//! Debugging a real-time engine by printing from the sample loop changes
//! the timing you are trying to observe, and in debug builds trips
//! `assert_process_allocs`. Instead, the engine fills in a [`BlockReport`]
//! while it works and hands it to an optional [`Instrumentation`] hook
//! once the block is finished. What the hook does with it (store it in
//! atomics, push it to a meter) is up to the caller, as long as it does
//! not block.

/// Summary of one processed block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockReport {
    /// Frames processed (all sub-blocks together).
    pub frames: usize,
    /// Tempo in use after this block's sync update.
    pub bpm: f64,
    /// Delay time target (synced or manual), before LFO modulation.
    pub delay_ms: f32,
    /// LFO rate in use (synced or manual).
    pub lfo_rate_hz: f32,
    /// Largest absolute wet sample, before width, pan and mix.
    pub wet_peak: f32,
    /// Largest absolute output sample.
    pub output_peak: f32,
}

/// Receives a [`BlockReport`] after every block.
///
/// Called on the audio thread, outside the sample loop. Must not allocate,
/// lock or perform I/O.
pub trait Instrumentation: Send {
    fn block_processed(&mut self, report: &BlockReport);
}

impl<F> Instrumentation for F
where
    F: FnMut(&BlockReport) + Send,
{
    fn block_processed(&mut self, report: &BlockReport) {
        self(report)
    }
}
