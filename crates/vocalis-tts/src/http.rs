use async_trait::async_trait;
use futures::StreamExt;

use crate::error::TtsError;
use crate::types::SynthesisOptions;
use crate::{ByteStream, Synthesizer};

#[derive(Debug, Clone)]
pub struct HttpSynthesizerConfig {
    pub base_url: String,
    pub api_key: String,
    pub default_model: String,
    pub default_voice: String,
}

/// Streaming synthesis over an OpenAI-style `/audio/speech` endpoint with
/// `stream: true`; the response body is surfaced chunk by chunk.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    config: HttpSynthesizerConfig,
}

impl HttpSynthesizer {
    pub fn new(config: HttpSynthesizerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<ByteStream, TtsError> {
        let payload = serde_json::json!({
            "input": text,
            "response_format": "wav",
            "sample_rate": options.sample_rate,
            "stream": true,
            "speed": options.speed,
            "gain": options.gain,
            "model": options.model.as_deref().unwrap_or(&self.config.default_model),
            "voice": options.voice.as_deref().unwrap_or(&self.config.default_voice),
        });

        let response = self
            .client
            .post(format!("{}/audio/speech", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!("synthesis stream opened for {} chars", text.len());
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(TtsError::from));
        Ok(Box::pin(stream))
    }
}
