use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use vocalis_foundation::AppError;
use vocalis_vad::EndpointConfig;

/// Application settings: TOML file, overridden by environment, overridden by
/// CLI flags. Every value ends up inside a constructor argument somewhere;
/// nothing is read from the environment after startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub audio: AudioSettings,
    pub vad: VadSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub asr_model: String,
    pub tts_model: String,
    pub tts_voice: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub capture_rate_hz: u32,
    pub capture_frame_samples: usize,
    pub capture_device: Option<String>,
    pub playback_rate_hz: u32,
    pub playback_frame_samples: usize,
    pub playback_device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VadSettings {
    pub volume_threshold: f32,
    pub confidence_threshold: f32,
    pub silence_timeout_secs: f32,
    pub padding_secs: f32,
    pub retention_secs: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            audio: AudioSettings::default(),
            vad: VadSettings::default(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            api_key: String::new(),
            chat_model: "Qwen/Qwen3-30B-A3B".to_string(),
            asr_model: "FunAudioLLM/SenseVoiceSmall".to_string(),
            tts_model: "FunAudioLLM/CosyVoice2-0.5B".to_string(),
            tts_voice: "FunAudioLLM/CosyVoice2-0.5B:anna".to_string(),
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            capture_rate_hz: 16_000,
            capture_frame_samples: 1024,
            capture_device: None,
            playback_rate_hz: 44_100,
            playback_frame_samples: 2048,
            playback_device: None,
        }
    }
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            volume_threshold: 2000.0 / 32768.0,
            confidence_threshold: 0.1,
            silence_timeout_secs: 2.0,
            padding_secs: 1.0,
            retention_secs: 10.0,
        }
    }
}

impl Settings {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                toml::from_str(&raw)
                    .map_err(|e| AppError::Config(format!("invalid {}: {e}", path.display())))?
            }
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        for key in ["VOCALIS_API_KEY", "SILICONFLOW_API_KEY"] {
            if let Ok(value) = std::env::var(key) {
                if !value.is_empty() {
                    self.api.api_key = value;
                    break;
                }
            }
        }
        if let Ok(value) = std::env::var("VOCALIS_BASE_URL") {
            if !value.is_empty() {
                self.api.base_url = value;
            }
        }
    }

    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            silence_timeout: Duration::from_secs_f32(self.vad.silence_timeout_secs),
            padding: Duration::from_secs_f32(self.vad.padding_secs),
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs_f32(self.vad.retention_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_tuning() {
        let settings = Settings::default();
        assert_eq!(settings.audio.capture_rate_hz, 16_000);
        assert_eq!(settings.audio.playback_rate_hz, 44_100);
        assert_eq!(
            settings.endpoint_config().silence_timeout,
            Duration::from_secs(2)
        );
        assert_eq!(settings.retention(), Duration::from_secs(10));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[audio]\ncapture_rate_hz = 8000\n\n[vad]\nsilence_timeout_secs = 1.5\n"
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.audio.capture_rate_hz, 8000);
        assert_eq!(settings.audio.playback_rate_hz, 44_100);
        assert_eq!(
            settings.endpoint_config().silence_timeout,
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "audio = \"not a table\"").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }
}
