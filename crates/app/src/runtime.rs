use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use vocalis_audio::playback::SinkFactory;
use vocalis_audio::{
    AudioCaptureThread, AudioRingBuffer, CaptureConfig, CpalOutputSink, FrameReader,
    OutputSink, PlaybackConfig, PlaybackEngine, RecorderConfig, SegmentRecorder, SpeechSegment,
};
use vocalis_foundation::{AppError, AppState, StateManager};
use vocalis_stt::{HttpTranscriber, HttpTranscriberConfig, Transcriber};
use vocalis_telemetry::PipelineMetrics;
use vocalis_tts::{
    pump_stream, HttpSynthesizer, HttpSynthesizerConfig, SynthesisOptions, Synthesizer,
};
use vocalis_vad::{ClassifierConfig, EnergyDetector, VoiceActivityClassifier};

use crate::chat::{ChatEngine, ChatEngineConfig, HttpChatEngine};
use crate::config::Settings;

const SEGMENT_CHANNEL_CAPACITY: usize = 8;

/// The three remote collaborators, injected so the pipeline can run against
/// stubs in tests.
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub chat: Arc<dyn ChatEngine>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Collaborators {
    pub fn from_settings(settings: &Settings) -> Self {
        let transcriber = HttpTranscriber::new(HttpTranscriberConfig {
            base_url: settings.api.base_url.clone(),
            api_key: settings.api.api_key.clone(),
            model: settings.api.asr_model.clone(),
        });
        let chat = HttpChatEngine::new(ChatEngineConfig {
            base_url: settings.api.base_url.clone(),
            api_key: settings.api.api_key.clone(),
            model: settings.api.chat_model.clone(),
            ..Default::default()
        });
        let synthesizer = HttpSynthesizer::new(HttpSynthesizerConfig {
            base_url: settings.api.base_url.clone(),
            api_key: settings.api.api_key.clone(),
            default_model: settings.api.tts_model.clone(),
            default_voice: settings.api.tts_voice.clone(),
        });

        Self {
            transcriber: Arc::new(transcriber),
            chat: Arc::new(chat),
            synthesizer: Arc::new(synthesizer),
        }
    }
}

/// Handle to the running pipeline: capture thread, recorder task, playback
/// worker, and the conversation loop.
pub struct AppHandle {
    pub metrics: Arc<PipelineMetrics>,
    state: StateManager,
    playback: Arc<PlaybackEngine>,
    capture: AudioCaptureThread,
    recorder_handle: JoinHandle<()>,
    conversation_handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    barge_in: Arc<AtomicBool>,
    chat: Arc<dyn ChatEngine>,
    synthesizer: Arc<dyn Synthesizer>,
    synthesis_options: SynthesisOptions,
    frame_bytes: usize,
}

impl AppHandle {
    /// Build and start the full pipeline with HTTP collaborators.
    pub async fn start(settings: Settings) -> Result<Self, AppError> {
        let collaborators = Collaborators::from_settings(&settings);
        Self::start_with(settings, collaborators).await
    }

    /// Start with caller-provided collaborators.
    pub async fn start_with(
        settings: Settings,
        collaborators: Collaborators,
    ) -> Result<Self, AppError> {
        let metrics = Arc::new(PipelineMetrics::default());
        let state = StateManager::new();

        // Playback side: the cpal sink opens on the worker thread.
        let playback_config = PlaybackConfig {
            sample_rate_hz: settings.audio.playback_rate_hz,
            channels: 1,
            frame_samples: settings.audio.playback_frame_samples,
            device: settings.audio.playback_device.clone(),
            ..Default::default()
        };
        let frame_bytes = playback_config.frame_bytes();
        let sink_config = playback_config.clone();
        let factory: SinkFactory = Box::new(move || {
            Ok(Box::new(CpalOutputSink::open(&sink_config)?) as Box<dyn OutputSink>)
        });
        let playback = Arc::new(PlaybackEngine::start(
            factory,
            playback_config,
            Some(metrics.clone()),
        )?);

        // Capture side: device callback -> ring -> frame reader.
        let ring = AudioRingBuffer::new(settings.audio.capture_rate_hz as usize * 4);
        let (producer, consumer) = ring.split();
        let capture = AudioCaptureThread::spawn(
            CaptureConfig {
                sample_rate_hz: settings.audio.capture_rate_hz,
                channels: 1,
                device: settings.audio.capture_device.clone(),
            },
            producer,
            Some(metrics.clone()),
        )?;
        let reader = FrameReader::new(
            consumer,
            settings.audio.capture_frame_samples,
            settings.audio.capture_rate_hz,
            Instant::now(),
        );

        // Recorder: classifier and segment sink are injected capabilities.
        let classifier = VoiceActivityClassifier::new(
            ClassifierConfig {
                sample_rate_hz: settings.audio.capture_rate_hz,
                volume_threshold: settings.vad.volume_threshold,
                confidence_threshold: settings.vad.confidence_threshold,
                ..Default::default()
            },
            EnergyDetector::default(),
        );
        let (segment_tx, segment_rx) = mpsc::channel(SEGMENT_CHANNEL_CAPACITY);
        let recorder = SegmentRecorder::new(
            Box::new(classifier),
            segment_tx,
            RecorderConfig {
                retention: settings.retention(),
                endpoint: settings.endpoint_config(),
                ..Default::default()
            },
            settings.audio.capture_rate_hz,
        )
        .with_metrics(metrics.clone());

        let running = Arc::new(AtomicBool::new(true));
        let recorder_handle = recorder.spawn(reader, running.clone());

        let barge_in = Arc::new(AtomicBool::new(false));
        let synthesis_options = SynthesisOptions {
            sample_rate: settings.audio.playback_rate_hz,
            ..Default::default()
        };
        let chat = collaborators.chat.clone();
        let synthesizer = collaborators.synthesizer.clone();
        let conversation_handle = spawn_conversation_loop(
            segment_rx,
            collaborators,
            playback.clone(),
            synthesis_options.clone(),
            frame_bytes,
            barge_in.clone(),
            metrics.clone(),
        );

        state.transition(AppState::Running)?;
        tracing::info!("voice pipeline running");

        Ok(Self {
            metrics,
            state,
            playback,
            capture,
            recorder_handle,
            conversation_handle,
            running,
            barge_in,
            chat,
            synthesizer,
            synthesis_options,
            frame_bytes,
        })
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Barge-in: discard the assistant's queued audio. The utterance that
    /// caused the interrupt is still transcribed, but gets no reply.
    pub fn interrupt_playback(&self) -> bool {
        if !self.playback.is_playing() {
            return false;
        }
        self.playback.interrupt();
        self.barge_in.store(true, Ordering::SeqCst);
        tracing::info!("playback interrupted");
        true
    }

    pub fn pause_playback(&self) {
        self.playback.pause();
    }

    pub fn resume_playback(&self) {
        self.playback.resume();
    }

    /// Text turn from the console: interrupts any active playback, then
    /// chat -> synthesis -> streaming playback.
    pub async fn send_text(&self, text: &str) -> Result<(), AppError> {
        self.interrupt_playback();
        tracing::info!("user (text): {}", text);

        let reply = self
            .chat
            .reply(text)
            .await
            .map_err(|e| AppError::Transient(format!("chat failed: {e}")))?;
        tracing::info!("assistant: {}", reply);

        speak(
            self.synthesizer.as_ref(),
            &self.synthesis_options,
            &self.playback,
            self.frame_bytes,
            &self.metrics,
            &reply,
        )
        .await
        .map_err(|e| AppError::Transient(format!("synthesis failed: {e}")))
    }

    /// Stop everything: capture first to quiesce the source, then the
    /// recorder, conversation loop, and playback worker.
    pub async fn shutdown(self) {
        tracing::info!("shutting down voice pipeline");
        let _ = self.state.transition(AppState::Stopping);

        // Cut any assistant audio so the conversation loop is not waiting on
        // a long utterance to drain.
        self.playback.interrupt();

        self.running.store(false, Ordering::SeqCst);
        let capture = self.capture;
        let _ = tokio::task::spawn_blocking(move || capture.stop()).await;

        let _ = self.recorder_handle.await;
        // The recorder owned the segment sender; the conversation loop ends
        // once the channel drains.
        let _ = self.conversation_handle.await;

        let playback = self.playback.clone();
        let _ = tokio::task::spawn_blocking(move || playback.close()).await;

        let _ = self.state.transition(AppState::Stopped);
        tracing::info!("voice pipeline stopped");
    }
}

/// One conversation turn per segment, strictly sequential: transcribe, then
/// (unless the segment barged in on playback) chat, synthesize, and wait for
/// the audio to drain.
pub fn spawn_conversation_loop(
    mut segment_rx: mpsc::Receiver<SpeechSegment>,
    collaborators: Collaborators,
    playback: Arc<PlaybackEngine>,
    synthesis_options: SynthesisOptions,
    frame_bytes: usize,
    barge_in: Arc<AtomicBool>,
    metrics: Arc<PipelineMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("conversation loop started");
        while let Some(segment) = segment_rx.recv().await {
            let interrupted = barge_in.swap(false, Ordering::SeqCst);

            metrics
                .transcription_requests
                .fetch_add(1, Ordering::Relaxed);
            let text = match collaborators.transcriber.transcribe(&segment).await {
                Ok(text) => text,
                Err(e) => {
                    metrics
                        .transcription_failures
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("transcription failed: {}", e);
                    continue;
                }
            };

            if text.trim().is_empty() {
                tracing::debug!("segment produced no recognizable speech");
                continue;
            }
            tracing::info!("user: {}", text);

            if interrupted {
                tracing::info!("barge-in utterance recorded; no reply generated");
                continue;
            }

            let reply = match collaborators.chat.reply(&text).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("chat failed: {}", e);
                    continue;
                }
            };
            tracing::info!("assistant: {}", reply);

            if let Err(e) = speak(
                collaborators.synthesizer.as_ref(),
                &synthesis_options,
                &playback,
                frame_bytes,
                &metrics,
                &reply,
            )
            .await
            {
                tracing::warn!("synthesis failed: {}", e);
                continue;
            }

            // Keep turns sequential: wait for the queued audio to play out
            // (or be interrupted) before taking the next segment.
            let queue = playback.queue().clone();
            let _ = tokio::task::spawn_blocking(move || queue.wait_idle()).await;
        }
        tracing::info!("conversation loop ended");
    })
}

/// Synthesize `text` and stream the WAV body into the playback queue.
async fn speak(
    synthesizer: &dyn Synthesizer,
    options: &SynthesisOptions,
    playback: &Arc<PlaybackEngine>,
    frame_bytes: usize,
    metrics: &Arc<PipelineMetrics>,
    text: &str,
) -> Result<(), vocalis_tts::TtsError> {
    metrics.synthesis_requests.fetch_add(1, Ordering::Relaxed);

    let stream = match synthesizer.synthesize(text, options).await {
        Ok(stream) => stream,
        Err(e) => {
            metrics.synthesis_failures.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
    };

    match pump_stream(stream, playback.queue(), frame_bytes).await {
        Ok(frames) => {
            tracing::debug!("queued {} frames of synthesized audio", frames);
            Ok(())
        }
        Err(e) => {
            metrics.synthesis_failures.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}
