use crate::config::EndpointConfig;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    NoSpeech,
    InSpeech,
    TrailingSilence,
}

/// A closed speech run. `end` is the last frame that was classified speech,
/// not the moment the timeout fired, so trailing silence is excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechRun {
    pub start: Instant,
    pub end: Instant,
}

/// Endpointing state machine.
///
/// Driven by (is_speech, timestamp) pairs in frame-arrival order. A run is
/// closed only after `silence_timeout` of uninterrupted trailing silence;
/// speech during that window cancels the timer and the run continues.
pub struct Endpointer {
    config: EndpointConfig,
    state: EndpointState,
    run_start: Option<Instant>,
    last_speech: Option<Instant>,
    silence_start: Option<Instant>,
}

impl Endpointer {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            state: EndpointState::NoSpeech,
            run_start: None,
            last_speech: None,
            silence_start: None,
        }
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Feed one classified frame. Returns the closed run once the trailing
    /// silence timeout elapses.
    pub fn process(&mut self, is_speech: bool, now: Instant) -> Option<SpeechRun> {
        match (self.state, is_speech) {
            (EndpointState::NoSpeech, true) => {
                self.state = EndpointState::InSpeech;
                self.run_start = Some(now);
                self.last_speech = Some(now);
                None
            }
            (EndpointState::NoSpeech, false) => None,
            (EndpointState::InSpeech, true) => {
                self.last_speech = Some(now);
                None
            }
            (EndpointState::InSpeech, false) => {
                self.state = EndpointState::TrailingSilence;
                self.silence_start = Some(now);
                None
            }
            (EndpointState::TrailingSilence, true) => {
                self.state = EndpointState::InSpeech;
                self.last_speech = Some(now);
                self.silence_start = None;
                None
            }
            (EndpointState::TrailingSilence, false) => {
                let silence_start = self.silence_start?;
                if now.duration_since(silence_start) < self.config.silence_timeout {
                    return None;
                }

                self.state = EndpointState::NoSpeech;
                self.silence_start = None;
                match (self.run_start.take(), self.last_speech.take()) {
                    (Some(start), Some(end)) => Some(SpeechRun { start, end }),
                    _ => None,
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = EndpointState::NoSpeech;
        self.run_start = None;
        self.last_speech = None;
        self.silence_start = None;
    }
}
