//! # Dry/Wet Mixer
//!
//! A linear crossfade between the untouched input and the processed signal:
//!
//! ```text
//! output = dry * (1 - mix) + wet * mix
//! ```
//!
//! - `mix = 0.0` → input only
//! - `mix = 0.5` → equal blend
//! - `mix = 1.0` → processed signal only

/// Crossfade one sample. `mix` is clamped to `[0, 1]`.
#[inline]
pub fn crossfade(dry: f32, wet: f32, mix: f32) -> f32 {
    let mix = mix.clamp(0.0, 1.0);
    dry * (1.0 - mix) + wet * mix
}
