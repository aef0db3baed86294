use crate::config::ClassifierConfig;
use crate::detector::SpeechDetector;
use crate::energy::EnergyCalculator;
use crate::FrameClassifier;

/// Two-stage speech/silence classifier.
///
/// Stage 1 is a cheap RMS gate so the detector is never consulted for frames
/// at the hardware noise floor. Stage 2 splits the frame into fixed sub-windows
/// and requires a configurable fraction of them to vote speech, which keeps a
/// single noisy sub-window from flipping the frame.
pub struct VoiceActivityClassifier<D: SpeechDetector> {
    config: ClassifierConfig,
    detector: D,
    energy: EnergyCalculator,
}

impl<D: SpeechDetector> VoiceActivityClassifier<D> {
    pub fn new(config: ClassifierConfig, detector: D) -> Self {
        Self {
            config,
            detector,
            energy: EnergyCalculator::new(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn classify_frame(&mut self, frame: &[i16]) -> bool {
        if frame.is_empty() {
            return false;
        }

        if self.energy.rms(frame) < self.config.volume_threshold {
            return false;
        }

        let step = self.config.sub_window_samples();
        if step == 0 {
            return false;
        }

        let mut votes = 0usize;
        // Trailing partial sub-window is discarded by chunks_exact.
        for sub_window in frame.chunks_exact(step) {
            match self
                .detector
                .is_speech(sub_window, self.config.sample_rate_hz)
            {
                Ok(true) => votes += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::trace!("sub-window abstained: {}", e);
                }
            }
        }

        let windows_per_frame = frame.len() as f32 / step as f32;
        votes as f32 > self.config.confidence_threshold * windows_per_frame
    }
}

impl<D: SpeechDetector> FrameClassifier for VoiceActivityClassifier<D> {
    fn classify(&mut self, frame: &[i16]) -> bool {
        self.classify_frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SAMPLE_RATE_HZ, SUB_WINDOW_SAMPLES};
    use crate::error::VadError;

    /// Scripted detector that records how often it was consulted.
    struct StubDetector {
        verdicts: Vec<Result<bool, VadError>>,
        calls: usize,
    }

    impl StubDetector {
        fn always(verdict: bool) -> Self {
            Self {
                verdicts: vec![Ok(verdict)],
                calls: 0,
            }
        }

        fn scripted(verdicts: Vec<Result<bool, VadError>>) -> Self {
            Self { verdicts, calls: 0 }
        }
    }

    impl SpeechDetector for StubDetector {
        fn is_speech(&mut self, _w: &[i16], _rate: u32) -> Result<bool, VadError> {
            let verdict = self.verdicts[self.calls.min(self.verdicts.len() - 1)].clone();
            self.calls += 1;
            verdict
        }
    }

    fn loud_frame(windows: usize) -> Vec<i16> {
        vec![8000i16; SUB_WINDOW_SAMPLES * windows]
    }

    #[test]
    fn quiet_frame_skips_detector() {
        let detector = StubDetector::always(true);
        let mut classifier =
            VoiceActivityClassifier::new(ClassifierConfig::default(), detector);

        let quiet = vec![10i16; SUB_WINDOW_SAMPLES * 4];
        assert!(!classifier.classify(&quiet));
        assert_eq!(classifier.detector.calls, 0);
    }

    #[test]
    fn empty_frame_is_silence_without_detector() {
        let detector = StubDetector::always(true);
        let mut classifier =
            VoiceActivityClassifier::new(ClassifierConfig::default(), detector);

        assert!(!classifier.classify(&[]));
        assert_eq!(classifier.detector.calls, 0);
    }

    #[test]
    fn unanimous_votes_declare_speech() {
        let detector = StubDetector::always(true);
        let mut classifier =
            VoiceActivityClassifier::new(ClassifierConfig::default(), detector);

        assert!(classifier.classify(&loud_frame(4)));
        assert_eq!(classifier.detector.calls, 4);
    }

    #[test]
    fn lone_vote_below_threshold_is_silence() {
        // 1 of 10 votes with confidence 0.2 -> 1 > 2.0 is false
        let mut verdicts = vec![Ok(false); 10];
        verdicts[0] = Ok(true);
        let detector = StubDetector::scripted(verdicts);
        let config = ClassifierConfig {
            confidence_threshold: 0.2,
            ..Default::default()
        };
        let mut classifier = VoiceActivityClassifier::new(config, detector);

        assert!(!classifier.classify(&loud_frame(10)));
    }

    #[test]
    fn detector_errors_count_as_abstentions() {
        // 2 yes, 2 errors over 4 windows at confidence 0.4: 2 > 1.6 -> speech
        let detector = StubDetector::scripted(vec![
            Ok(true),
            Err(VadError::InvalidWindow {
                got: 1,
                sample_rate_hz: SAMPLE_RATE_HZ,
            }),
            Ok(true),
            Err(VadError::Detector("boom".into())),
        ]);
        let config = ClassifierConfig {
            confidence_threshold: 0.4,
            ..Default::default()
        };
        let mut classifier = VoiceActivityClassifier::new(config, detector);

        assert!(classifier.classify(&loud_frame(4)));
        assert_eq!(classifier.detector.calls, 4);
    }

    #[test]
    fn trailing_partial_window_is_not_judged() {
        let detector = StubDetector::always(true);
        let mut classifier =
            VoiceActivityClassifier::new(ClassifierConfig::default(), detector);

        let mut frame = loud_frame(3);
        frame.extend_from_slice(&vec![8000i16; SUB_WINDOW_SAMPLES / 2]);
        assert!(classifier.classify(&frame));
        assert_eq!(classifier.detector.calls, 3);
    }
}
