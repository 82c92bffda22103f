//! # Tempo Sync
//!
//! Converts the host's tempo (BPM) plus a note-value selector into either a
//! delay time in milliseconds or an LFO rate in Hz.
//!
//! ## The Math
//!
//! One beat is a quarter note, so:
//!
//! ```text
//! quarter_ms = 60000 / bpm
//! delay_ms   = quarter_ms * multiplier
//! lfo_hz     = 1000 / (quarter_ms * multiplier)
//! ```
//!
//! At 120 BPM a quarter note is 500 ms, a whole note 2000 ms, a dotted
//! quarter 750 ms and a quarter-note triplet 333.3 ms.
//!
//! ## Tempo Jitter
//!
//! Hosts report tempo as a float that can wobble in the last decimal place
//! from block to block. A new BPM is only adopted when it moves more than
//! [`BPM_HYSTERESIS`] away from the last one, so the synced values are not
//! recomputed (and republished) on every block.

use nih_plug::prelude::Enum;

/// Smallest BPM change that triggers a recompute.
pub const BPM_HYSTERESIS: f64 = 0.01;

/// Tempo assumed until the host reports a valid one.
pub const DEFAULT_BPM: f64 = 120.0;

/// Slowest and fastest LFO rate a synced value may resolve to.
pub const LFO_RATE_RANGE: (f32, f32) = (0.01, 20.0);

/// Note value a synchronized parameter locks to.
///
/// `Free` means the parameter is not synchronized: its manual value is
/// used as-is and never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum SyncRatio {
    #[id = "free"]
    #[name = "Free"]
    Free,
    #[id = "1/1"]
    #[name = "1/1"]
    Whole,
    #[id = "1/2"]
    #[name = "1/2"]
    Half,
    #[id = "1/4"]
    #[name = "1/4"]
    Quarter,
    #[id = "1/8"]
    #[name = "1/8"]
    Eighth,
    #[id = "1/16"]
    #[name = "1/16"]
    Sixteenth,
    #[id = "1/32"]
    #[name = "1/32"]
    ThirtySecond,
    #[id = "1/1t"]
    #[name = "1/1T"]
    WholeTriplet,
    #[id = "1/2t"]
    #[name = "1/2T"]
    HalfTriplet,
    #[id = "1/4t"]
    #[name = "1/4T"]
    QuarterTriplet,
    #[id = "1/8t"]
    #[name = "1/8T"]
    EighthTriplet,
    #[id = "1/16t"]
    #[name = "1/16T"]
    SixteenthTriplet,
    #[id = "1/32t"]
    #[name = "1/32T"]
    ThirtySecondTriplet,
    #[id = "1/1d"]
    #[name = "1/1D"]
    WholeDotted,
    #[id = "1/2d"]
    #[name = "1/2D"]
    HalfDotted,
    #[id = "1/4d"]
    #[name = "1/4D"]
    QuarterDotted,
    #[id = "1/8d"]
    #[name = "1/8D"]
    EighthDotted,
    #[id = "1/16d"]
    #[name = "1/16D"]
    SixteenthDotted,
    #[id = "1/32d"]
    #[name = "1/32D"]
    ThirtySecondDotted,
}

impl SyncRatio {
    /// Length of this note value in quarter notes, or `None` for `Free`.
    pub fn quarter_notes(self) -> Option<f64> {
        const TRIPLET: f64 = 2.0 / 3.0;
        const DOTTED: f64 = 1.5;

        let multiplier = match self {
            Self::Free => return None,
            Self::Whole => 4.0,
            Self::Half => 2.0,
            Self::Quarter => 1.0,
            Self::Eighth => 0.5,
            Self::Sixteenth => 0.25,
            Self::ThirtySecond => 0.125,
            Self::WholeTriplet => 4.0 * TRIPLET,
            Self::HalfTriplet => 2.0 * TRIPLET,
            Self::QuarterTriplet => TRIPLET,
            Self::EighthTriplet => 0.5 * TRIPLET,
            Self::SixteenthTriplet => 0.25 * TRIPLET,
            Self::ThirtySecondTriplet => 0.125 * TRIPLET,
            Self::WholeDotted => 4.0 * DOTTED,
            Self::HalfDotted => 2.0 * DOTTED,
            Self::QuarterDotted => DOTTED,
            Self::EighthDotted => 0.5 * DOTTED,
            Self::SixteenthDotted => 0.25 * DOTTED,
            Self::ThirtySecondDotted => 0.125 * DOTTED,
        };
        Some(multiplier)
    }
}

/// A BPM the resolver is willing to divide by.
fn is_valid_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

/// Delay time for `ratio` at `bpm`, clamped to `[0, max_delay_ms]`.
///
/// Returns `None` for `Free` or an invalid BPM.
pub fn synced_delay_ms(bpm: f64, ratio: SyncRatio, max_delay_ms: f32) -> Option<f32> {
    if !is_valid_bpm(bpm) {
        return None;
    }
    let quarter_ms = 60_000.0 / bpm;
    let delay_ms = quarter_ms * ratio.quarter_notes()?;
    Some((delay_ms as f32).clamp(0.0, max_delay_ms.max(0.0)))
}

/// LFO rate for `ratio` at `bpm`, clamped to [`LFO_RATE_RANGE`].
///
/// Returns `None` for `Free` or an invalid BPM.
pub fn synced_lfo_hz(bpm: f64, ratio: SyncRatio) -> Option<f32> {
    if !is_valid_bpm(bpm) {
        return None;
    }
    let period_ms = 60_000.0 / bpm * ratio.quarter_notes()?;
    let (min, max) = LFO_RATE_RANGE;
    Some(((1000.0 / period_ms) as f32).clamp(min, max))
}

/// What changed during a [`TempoSyncResolver::update()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncChange {
    /// The synced delay time was recomputed (or synchronization turned off).
    pub delay: bool,
    /// The synced LFO rate was recomputed (or synchronization turned off).
    pub lfo: bool,
}

/// Tracks host tempo and the two sync selectors, recomputing the synced
/// delay time and LFO rate only when one of them actually changes.
///
/// The resolver owns all of its change-detection state, so nothing outside
/// the engine instance is needed to avoid redundant recomputation.
#[derive(Debug, Clone)]
pub struct TempoSyncResolver {
    bpm: f64,
    delay_ratio: SyncRatio,
    lfo_ratio: SyncRatio,
    max_delay_ms: f32,
    delay_ms: Option<f32>,
    lfo_hz: Option<f32>,
}

impl TempoSyncResolver {
    pub fn new(max_delay_ms: f32) -> Self {
        Self {
            bpm: DEFAULT_BPM,
            delay_ratio: SyncRatio::Free,
            lfo_ratio: SyncRatio::Free,
            max_delay_ms,
            delay_ms: None,
            lfo_hz: None,
        }
    }

    /// The BPM currently in use (the last valid one the host reported).
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Synced delay time, or `None` when the delay is in `Free` mode.
    pub fn delay_ms(&self) -> Option<f32> {
        self.delay_ms
    }

    /// Synced LFO rate, or `None` when the LFO is in `Free` mode.
    pub fn lfo_hz(&self) -> Option<f32> {
        self.lfo_hz
    }

    /// Feed this block's host tempo and selectors.
    ///
    /// `host_bpm` may be absent, zero, negative or non-finite; in all those
    /// cases the last valid BPM is kept. Call once per block.
    pub fn update(
        &mut self,
        host_bpm: Option<f64>,
        delay_ratio: SyncRatio,
        lfo_ratio: SyncRatio,
    ) -> SyncChange {
        let tempo_changed = match host_bpm {
            Some(bpm) if is_valid_bpm(bpm) && (bpm - self.bpm).abs() > BPM_HYSTERESIS => {
                self.bpm = bpm;
                true
            }
            _ => false,
        };

        let mut change = SyncChange::default();

        if delay_ratio != self.delay_ratio || (tempo_changed && delay_ratio != SyncRatio::Free) {
            self.delay_ratio = delay_ratio;
            self.delay_ms = synced_delay_ms(self.bpm, delay_ratio, self.max_delay_ms);
            change.delay = true;
        }

        if lfo_ratio != self.lfo_ratio || (tempo_changed && lfo_ratio != SyncRatio::Free) {
            self.lfo_ratio = lfo_ratio;
            self.lfo_hz = synced_lfo_hz(self.bpm, lfo_ratio);
            change.lfo = true;
        }

        change
    }

    /// Forget the selectors so the next `update()` recomputes and
    /// republishes everything. The BPM is kept.
    pub fn reset(&mut self) {
        self.delay_ratio = SyncRatio::Free;
        self.lfo_ratio = SyncRatio::Free;
        self.delay_ms = None;
        self.lfo_hz = None;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
