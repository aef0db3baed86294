//! Audio constants for the classification pipeline

/// Standard sample rate for capture-side processing (Hz)
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Sub-window duration the speech detector is fed (ms)
pub const SUB_WINDOW_MS: u32 = 20;

/// Standard number of channels for mono audio processing
pub const CHANNELS_MONO: u16 = 1;

/// Sub-window size in samples at the standard rate (derived constant)
pub const SUB_WINDOW_SAMPLES: usize =
    (SAMPLE_RATE_HZ as usize / 1000) * SUB_WINDOW_MS as usize;
