pub mod error;
pub mod http;
pub mod pump;
pub mod types;

pub use error::TtsError;
pub use http::{HttpSynthesizer, HttpSynthesizerConfig};
pub use pump::pump_stream;
pub use types::SynthesisOptions;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Chunked response body from the synthesis collaborator.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TtsError>> + Send>>;

/// Synthesis collaborator: turns text into a streaming WAV byte body. The
/// core consumes the raw bytes incrementally and is agnostic to everything
/// else about the request.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<ByteStream, TtsError>;
}
