use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use vocalis_audio::SpeechSegment;

use crate::error::SttError;
use crate::wav::encode_wav_mono16;
use crate::Transcriber;

#[derive(Debug, Clone)]
pub struct HttpTranscriberConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Transcription over an OpenAI-style `/audio/transcriptions` endpoint.
/// The segment is shipped as an in-memory WAV; the core never touches disk.
pub struct HttpTranscriber {
    client: reqwest::Client,
    config: HttpTranscriberConfig,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HttpTranscriber {
    pub fn new(config: HttpTranscriberConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, segment: &SpeechSegment) -> Result<String, SttError> {
        let wav = encode_wav_mono16(&segment.samples, segment.sample_rate)?;
        tracing::debug!(
            "uploading {:?} segment ({} bytes) for transcription",
            segment.duration(),
            wav.len()
        );

        let part = Part::bytes(wav)
            .file_name("segment.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SttError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| SttError::InvalidResponse(e.to_string()))?;
        Ok(parsed.text)
    }
}
