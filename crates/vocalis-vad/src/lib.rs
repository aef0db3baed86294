pub mod classifier;
pub mod config;
pub mod constants;
pub mod detector;
pub mod endpoint;
pub mod energy;
pub mod error;

pub use classifier::VoiceActivityClassifier;
pub use config::{ClassifierConfig, EndpointConfig};
pub use constants::{CHANNELS_MONO, SAMPLE_RATE_HZ, SUB_WINDOW_MS};
pub use detector::{EnergyDetector, SpeechDetector};
pub use endpoint::{Endpointer, EndpointState, SpeechRun};
pub use energy::EnergyCalculator;
pub use error::VadError;

/// Per-frame binary speech decision, the capability the recorder consumes.
pub trait FrameClassifier: Send {
    fn classify(&mut self, frame: &[i16]) -> bool;
}
