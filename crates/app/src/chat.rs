use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}

/// Chat collaborator: the pipeline only hands it transcribed text and
/// consumes the reply text.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    async fn reply(&self, user_text: &str) -> Result<String, ChatError>;
}

#[derive(Debug, Clone)]
pub struct ChatEngineConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Turns of history kept beyond the system prompt.
    pub max_history_messages: usize,
}

impl Default for ChatEngineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            api_key: String::new(),
            model: "Qwen/Qwen3-30B-A3B".to_string(),
            system_prompt: "You are a helpful voice assistant. Keep answers short enough to \
                            listen to."
                .to_string(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 4096,
            max_history_messages: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageContent,
}

#[derive(Deserialize)]
struct ChatMessageContent {
    content: String,
}

/// OpenAI-style chat client with rolling conversation history.
pub struct HttpChatEngine {
    client: reqwest::Client,
    config: ChatEngineConfig,
    history: Mutex<Vec<ChatMessage>>,
}

impl HttpChatEngine {
    pub fn new(config: ChatEngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    fn messages_for(&self, user_text: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: self.config.system_prompt.clone(),
        }];
        messages.extend(self.history.lock().iter().cloned());
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_text.to_string(),
        });
        messages
    }

    fn remember_turn(&self, user_text: &str, reply: &str) {
        let mut history = self.history.lock();
        history.push(ChatMessage {
            role: "user".to_string(),
            content: user_text.to_string(),
        });
        history.push(ChatMessage {
            role: "assistant".to_string(),
            content: reply.to_string(),
        });
        let excess = history.len().saturating_sub(self.config.max_history_messages);
        if excess > 0 {
            history.drain(..excess);
        }
    }
}

#[async_trait]
impl ChatEngine for HttpChatEngine {
    async fn reply(&self, user_text: &str) -> Result<String, ChatError> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "stream": false,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "messages": self.messages_for(user_text),
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(e.to_string()))?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ChatError::InvalidResponse("no choices in response".to_string()))?;

        self.remember_turn(user_text, &reply);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let engine = HttpChatEngine::new(ChatEngineConfig {
            max_history_messages: 4,
            ..Default::default()
        });

        for i in 0..10 {
            engine.remember_turn(&format!("q{i}"), &format!("a{i}"));
        }

        let history = engine.history.lock();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "q8");
        assert_eq!(history[3].content, "a9");
    }

    #[test]
    fn request_messages_lead_with_system_prompt() {
        let engine = HttpChatEngine::new(ChatEngineConfig::default());
        engine.remember_turn("hello", "hi");

        let messages = engine.messages_for("how are you");
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages.last().unwrap().content, "how are you");
        assert_eq!(messages.len(), 4);
    }
}
