//! Lock-free storage for the engine's per-block reports.
//!
//! The audio thread writes through a [`MeterRecorder`] installed as the
//! engine's instrumentation hook; anything else (the `reset()` log line,
//! a future editor) reads through the shared [`BlockMeters`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use atomic_float::{AtomicF32, AtomicF64};

use crate::engine::{BlockReport, Instrumentation};

/// The latest report, plus frame count and peaks accumulated since the
/// last [`BlockMeters::take`].
pub struct BlockMeters {
    frames: AtomicUsize,
    bpm: AtomicF64,
    delay_ms: AtomicF32,
    lfo_rate_hz: AtomicF32,
    wet_peak: AtomicF32,
    output_peak: AtomicF32,
}

impl Default for BlockMeters {
    fn default() -> Self {
        Self {
            frames: AtomicUsize::new(0),
            bpm: AtomicF64::new(0.0),
            delay_ms: AtomicF32::new(0.0),
            lfo_rate_hz: AtomicF32::new(0.0),
            wet_peak: AtomicF32::new(0.0),
            output_peak: AtomicF32::new(0.0),
        }
    }
}

impl BlockMeters {
    fn record(&self, report: &BlockReport) {
        self.frames.fetch_add(report.frames, Ordering::Relaxed);
        self.bpm.store(report.bpm, Ordering::Relaxed);
        self.delay_ms.store(report.delay_ms, Ordering::Relaxed);
        self.lfo_rate_hz.store(report.lfo_rate_hz, Ordering::Relaxed);
        self.wet_peak.fetch_max(report.wet_peak, Ordering::Relaxed);
        self.output_peak.fetch_max(report.output_peak, Ordering::Relaxed);
    }

    /// Read everything and restart the accumulators.
    pub fn take(&self) -> BlockReport {
        BlockReport {
            frames: self.frames.swap(0, Ordering::Relaxed),
            bpm: self.bpm.load(Ordering::Relaxed),
            delay_ms: self.delay_ms.load(Ordering::Relaxed),
            lfo_rate_hz: self.lfo_rate_hz.load(Ordering::Relaxed),
            wet_peak: self.wet_peak.swap(0.0, Ordering::Relaxed),
            output_peak: self.output_peak.swap(0.0, Ordering::Relaxed),
        }
    }
}

/// Instrumentation hook that records into shared [`BlockMeters`].
pub struct MeterRecorder {
    meters: Arc<BlockMeters>,
}

impl MeterRecorder {
    pub fn new(meters: Arc<BlockMeters>) -> Self {
        Self { meters }
    }
}

impl Instrumentation for MeterRecorder {
    fn block_processed(&mut self, report: &BlockReport) {
        self.meters.record(report);
    }
}
