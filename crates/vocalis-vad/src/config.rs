use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::{SAMPLE_RATE_HZ, SUB_WINDOW_MS};

/// Tuning for the two-stage speech/silence classifier.
///
/// All thresholds live here and are passed into constructors; there is no
/// process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub sample_rate_hz: u32,
    /// Normalized RMS (0.0..1.0) below which a frame is silence without
    /// consulting the detector.
    pub volume_threshold: f32,
    /// Fraction of sub-windows that must vote speech.
    pub confidence_threshold: f32,
    /// Sub-window duration handed to the detector (ms).
    pub sub_window_ms: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            // 2000 on the raw i16 amplitude scale
            volume_threshold: 2000.0 / 32768.0,
            confidence_threshold: 0.1,
            sub_window_ms: SUB_WINDOW_MS,
        }
    }
}

impl ClassifierConfig {
    pub fn sub_window_samples(&self) -> usize {
        (self.sample_rate_hz as usize / 1000) * self.sub_window_ms as usize
    }
}

/// Endpointing policy: how long trailing silence must last before a speech
/// run is closed, and how far the extracted segment is widened.
#[derive(Debug, Clone, Copy)]
pub struct EndpointConfig {
    pub silence_timeout: Duration,
    pub padding: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            silence_timeout: Duration::from_secs(2),
            padding: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sub_window_is_20ms_at_16k() {
        let config = ClassifierConfig::default();
        assert_eq!(config.sub_window_samples(), 320);
    }
}
