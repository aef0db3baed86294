use crate::energy::EnergyCalculator;
use crate::error::VadError;

/// A binary speech detector judging one fixed-duration sub-window at a time.
///
/// This is the seam for external detectors; the classifier swallows
/// per-window errors as abstentions, so a detector rejecting an irregular
/// window size never blocks endpointing.
pub trait SpeechDetector: Send {
    fn is_speech(&mut self, sub_window: &[i16], sample_rate_hz: u32) -> Result<bool, VadError>;
}

/// Energy-threshold detector.
///
/// Accepts only the window durations external detectors accept (10/20/30 ms)
/// and rejects anything else, so the classifier's abstention path is
/// exercised the same way it would be with a real external engine.
pub struct EnergyDetector {
    threshold_dbfs: f32,
    energy: EnergyCalculator,
}

impl EnergyDetector {
    pub fn new(threshold_dbfs: f32) -> Self {
        Self {
            threshold_dbfs,
            energy: EnergyCalculator::new(),
        }
    }
}

impl Default for EnergyDetector {
    fn default() -> Self {
        // Roughly the noise floor of a quiet room on consumer microphones
        Self::new(-40.0)
    }
}

impl SpeechDetector for EnergyDetector {
    fn is_speech(&mut self, sub_window: &[i16], sample_rate_hz: u32) -> Result<bool, VadError> {
        let per_ms = sample_rate_hz as usize / 1000;
        let valid = per_ms > 0
            && [10, 20, 30]
                .iter()
                .any(|ms| sub_window.len() == per_ms * ms);
        if !valid {
            return Err(VadError::InvalidWindow {
                got: sub_window.len(),
                sample_rate_hz,
            });
        }

        Ok(self.energy.dbfs(sub_window) > self.threshold_dbfs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SAMPLE_RATE_HZ, SUB_WINDOW_SAMPLES};

    #[test]
    fn rejects_irregular_window() {
        let mut detector = EnergyDetector::default();
        let odd = vec![0i16; SUB_WINDOW_SAMPLES - 1];
        assert!(matches!(
            detector.is_speech(&odd, SAMPLE_RATE_HZ),
            Err(VadError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn loud_window_is_speech() {
        let mut detector = EnergyDetector::default();
        let loud = vec![8000i16; SUB_WINDOW_SAMPLES];
        assert!(detector.is_speech(&loud, SAMPLE_RATE_HZ).unwrap());
    }

    #[test]
    fn quiet_window_is_silence() {
        let mut detector = EnergyDetector::default();
        let quiet = vec![10i16; SUB_WINDOW_SAMPLES];
        assert!(!detector.is_speech(&quiet, SAMPLE_RATE_HZ).unwrap());
    }
}
