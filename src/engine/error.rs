use thiserror::Error;

/// Lowest sample rate the filters are designed for.
pub const MIN_SAMPLE_RATE: f32 = 8000.0;
/// Highest sample rate accepted (a 5 s line at this rate is ~3.8 MB).
pub const MAX_SAMPLE_RATE: f32 = 192_000.0;
/// Most channels the engine processes.
pub const MAX_CHANNELS: usize = 2;

/// Reasons `prepare()` can refuse an audio configuration.
///
/// Only the non-real-time prepare phase returns errors. `process()` clamps
/// and carries on.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum EngineError {
    #[error("sample rate {0} Hz is outside the supported range ({MIN_SAMPLE_RATE}-{MAX_SAMPLE_RATE} Hz)")]
    InvalidSampleRate(f32),
    #[error("maximum block size must be at least one sample")]
    InvalidBlockSize,
    #[error("{0} channels requested; only mono and stereo are supported")]
    UnsupportedChannelCount(usize),
}
