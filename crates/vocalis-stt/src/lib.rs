pub mod error;
pub mod http;
pub mod wav;

pub use error::SttError;
pub use http::{HttpTranscriber, HttpTranscriberConfig};

use async_trait::async_trait;
use vocalis_audio::SpeechSegment;

/// Transcription collaborator: takes one finished speech segment, returns
/// plain text or an explicit failure. Retry policy belongs to the caller.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, segment: &SpeechSegment) -> Result<String, SttError>;
}
