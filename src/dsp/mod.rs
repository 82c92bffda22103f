//! # DSP (Digital Signal Processing) Building Blocks
//!
//! Everything the engine chains together, leaves first:
//!
//! - **`delay_line`**: ring buffer with fractional reads.
//! - **`filter`**: one-pole lowpass, DC blocker and biquad filters.
//! - **`smoother`**: one-pole glide for control values.
//! - **`tempo_sync`**: host BPM + note value → milliseconds or Hz.
//! - **`modulation`**: the LFO block renderer and its per-destination curves.
//! - **`delay`**: the per-channel feedback loop around the delay lines.
//! - **`tone`**: bitcrusher with blended saturation.
//! - **`diffusion`**: the "smear" network (resonant stages + chorus tap).
//! - **`filter_pair`**: the LFO-sweepable highpass/lowpass on the wet signal.
//! - **`stereo`**: mid/side width and panning.
//! - **`mixer`**: the final dry/wet crossfade.

pub mod delay;
pub mod delay_line;
pub mod diffusion;
pub mod filter;
pub mod filter_pair;
pub mod mixer;
pub mod modulation;
pub mod smoother;
pub mod stereo;
pub mod tempo_sync;
pub mod tone;
