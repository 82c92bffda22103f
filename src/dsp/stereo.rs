//! # Stereo Imager
//!
//! ## Width (Mid/Side)
//!
//! Any stereo pair can be rewritten as what the channels share (mid) and
//! how they differ (side):
//!
//! ```text
//! mid  = (L + R) / 2          L' = mid − side × width
//! side = (R − L) / 2          R' = mid + side × width
//! ```
//!
//! - `width = 1`: the original signal
//! - `width = 0`: side removed, both channels equal `mid` (mono)
//! - `width = 2`: side doubled, exaggerated stereo
//!
//! ## Panning
//!
//! Pan uses the balanced law: the channel being panned *toward* stays at
//! unity and the other one is turned down linearly.
//!
//! ```text
//! gain_l = min(1, 1 − pan)     pan = −1 → (1, 0)
//! gain_r = min(1, 1 + pan)     pan =  0 → (1, 1)
//!                              pan = +1 → (0, 1)
//! ```

use super::modulation::ModulationRouting;

/// Valid stereo width range.
pub const WIDTH_RANGE: (f32, f32) = (0.0, 2.0);

/// Apply mid/side width to a stereo pair in place.
pub fn apply_width(left: &mut [f32], right: &mut [f32], width: f32) {
    let (min, max) = WIDTH_RANGE;
    let width = if width.is_finite() { width.clamp(min, max) } else { 1.0 };
    if width == 1.0 {
        return;
    }

    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        let mid = (*l + *r) * 0.5;
        let side = (*r - *l) * 0.5;
        *l = mid - side * width;
        *r = mid + side * width;
    }
}

/// Balanced-law gains `(left, right)` for a pan position in `[-1, 1]`.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

/// Pan a stereo pair in place.
///
/// When the LFO is routed to pan, the position is recomputed every sample
/// from `modulation`; otherwise one gain pair covers the whole block.
pub fn apply_pan(
    left: &mut [f32],
    right: &mut [f32],
    pan: f32,
    modulation: &[f32],
    routing: &ModulationRouting,
) {
    if routing.routes.pan && routing.amount > 0.0 {
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let lfo = modulation.get(i).copied().unwrap_or(0.5);
            let (gain_l, gain_r) = pan_gains(routing.pan(pan, lfo));
            *l *= gain_l;
            *r *= gain_r;
        }
    } else {
        let (gain_l, gain_r) = pan_gains(routing.pan(pan, 0.5));
        if gain_l == 1.0 && gain_r == 1.0 {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            *l *= gain_l;
            *r *= gain_r;
        }
    }
}
