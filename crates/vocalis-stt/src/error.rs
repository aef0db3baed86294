use thiserror::Error;

#[derive(Error, Debug)]
pub enum SttError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transcription API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}
