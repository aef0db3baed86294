//! End-to-end classification + endpointing over synthetic PCM.
//!
//! Frames go through the real two-stage classifier (energy gate + energy
//! detector voting) and the resulting decisions drive the endpointer, the
//! same composition the recorder uses.

use std::time::{Duration, Instant};

use vocalis_vad::{
    ClassifierConfig, EndpointConfig, EnergyDetector, Endpointer, FrameClassifier,
    SpeechRun, VoiceActivityClassifier,
};

const FRAME_SAMPLES: usize = 1024; // 64ms at 16kHz
const FRAME_MS: u64 = 64;

fn speech_frame() -> Vec<i16> {
    // Loud square-ish wave, well above both the RMS gate and the detector
    // threshold in every sub-window.
    (0..FRAME_SAMPLES)
        .map(|i| if i % 8 < 4 { 12000 } else { -12000 })
        .collect()
}

fn silence_frame() -> Vec<i16> {
    vec![3i16; FRAME_SAMPLES]
}

fn run_pipeline(frames: &[Vec<i16>]) -> Vec<SpeechRun> {
    let mut classifier = VoiceActivityClassifier::new(
        ClassifierConfig::default(),
        EnergyDetector::default(),
    );
    let mut endpointer = Endpointer::new(EndpointConfig::default());

    let t0 = Instant::now();
    let mut runs = Vec::new();
    for (i, frame) in frames.iter().enumerate() {
        let now = t0 + Duration::from_millis(i as u64 * FRAME_MS);
        let is_speech = classifier.classify(frame);
        if let Some(run) = endpointer.process(is_speech, now) {
            runs.push(run);
        }
    }
    runs
}

#[test]
fn one_utterance_one_run() {
    let mut frames: Vec<Vec<i16>> = (0..16).map(|_| speech_frame()).collect();
    frames.extend((0..40).map(|_| silence_frame()));

    let runs = run_pipeline(&frames);
    assert_eq!(runs.len(), 1);

    // ~1s of speech; the trailing 2.5s of silence is not part of the run.
    let span = runs[0].end.duration_since(runs[0].start);
    assert_eq!(span, Duration::from_millis(15 * FRAME_MS));
}

#[test]
fn pure_silence_produces_no_runs() {
    let frames: Vec<Vec<i16>> = (0..80).map(|_| silence_frame()).collect();
    assert!(run_pipeline(&frames).is_empty());
}

#[test]
fn brief_pause_keeps_utterance_whole() {
    let mut frames: Vec<Vec<i16>> = (0..10).map(|_| speech_frame()).collect();
    frames.extend((0..15).map(|_| silence_frame())); // 960ms, under the 2s timeout
    frames.extend((0..10).map(|_| speech_frame()));
    frames.extend((0..40).map(|_| silence_frame()));

    let runs = run_pipeline(&frames);
    assert_eq!(runs.len(), 1);
    assert_eq!(
        runs[0].end.duration_since(runs[0].start),
        Duration::from_millis(34 * FRAME_MS)
    );
}

#[test]
fn loud_frames_with_dissenting_detector_stay_silence() {
    // The frame clears the RMS gate, but a detector threshold of 0 dBFS means
    // no sub-window votes speech, so the vote fraction decides silence.
    let config = ClassifierConfig::default();
    let mut classifier =
        VoiceActivityClassifier::new(config, EnergyDetector::new(0.0));
    let loud = speech_frame();
    assert!(!classifier.classify(&loud));
}
