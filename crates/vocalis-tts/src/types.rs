use serde::{Deserialize, Serialize};

/// Per-request synthesis parameters. The payload fields the pipeline depends
/// on are the WAV format, the sample rate, and streaming delivery; the rest
/// belong to the remote voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOptions {
    pub sample_rate: u32,
    pub speed: f32,
    pub gain: f32,
    pub voice: Option<String>,
    pub model: Option<String>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            speed: 1.0,
            gain: 0.0,
            voice: None,
            model: None,
        }
    }
}
