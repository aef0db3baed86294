use thiserror::Error;
use vocalis_foundation::{AudioError, DecodeError};

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("synthesis API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("response stream is not decodable WAV: {0}")]
    Decode(#[from] DecodeError),

    #[error("playback rejected synthesized audio: {0}")]
    Audio(#[from] AudioError),
}
