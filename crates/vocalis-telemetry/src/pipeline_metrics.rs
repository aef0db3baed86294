use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Pipeline stages that report liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Capture,
    Recorder,
    Playback,
}

/// Shared metrics for cross-thread pipeline monitoring.
///
/// Every field is an `Arc`ed atomic so the struct can be cloned freely into
/// capture threads, async workers, and the playback worker without locks on
/// the hot path.
#[derive(Clone)]
pub struct PipelineMetrics {
    // Audio level monitoring
    pub current_peak: Arc<AtomicI16>,
    pub audio_level_db: Arc<AtomicI16>, // dB * 10

    // Stage liveness
    pub stage_capture: Arc<AtomicBool>,
    pub stage_recorder: Arc<AtomicBool>,
    pub stage_playback: Arc<AtomicBool>,

    // Frame counters
    pub capture_frames: Arc<AtomicU64>,
    pub recorder_frames: Arc<AtomicU64>,
    pub playback_frames: Arc<AtomicU64>,

    // Endpointing
    pub segments_emitted: Arc<AtomicU64>,
    pub segments_dropped: Arc<AtomicU64>,
    pub is_speaking: Arc<AtomicBool>,
    pub last_speech_time: Arc<RwLock<Option<Instant>>>,

    // Playback control
    pub playback_interrupts: Arc<AtomicU64>,
    pub playback_write_errors: Arc<AtomicU64>,

    // Collaborator counters
    pub transcription_requests: Arc<AtomicU64>,
    pub transcription_failures: Arc<AtomicU64>,
    pub synthesis_requests: Arc<AtomicU64>,
    pub synthesis_failures: Arc<AtomicU64>,

    // Error counters
    pub capture_errors: Arc<AtomicU64>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            current_peak: Arc::new(AtomicI16::new(0)),
            audio_level_db: Arc::new(AtomicI16::new(-900)),

            stage_capture: Arc::new(AtomicBool::new(false)),
            stage_recorder: Arc::new(AtomicBool::new(false)),
            stage_playback: Arc::new(AtomicBool::new(false)),

            capture_frames: Arc::new(AtomicU64::new(0)),
            recorder_frames: Arc::new(AtomicU64::new(0)),
            playback_frames: Arc::new(AtomicU64::new(0)),

            segments_emitted: Arc::new(AtomicU64::new(0)),
            segments_dropped: Arc::new(AtomicU64::new(0)),
            is_speaking: Arc::new(AtomicBool::new(false)),
            last_speech_time: Arc::new(RwLock::new(None)),

            playback_interrupts: Arc::new(AtomicU64::new(0)),
            playback_write_errors: Arc::new(AtomicU64::new(0)),

            transcription_requests: Arc::new(AtomicU64::new(0)),
            transcription_failures: Arc::new(AtomicU64::new(0)),
            synthesis_requests: Arc::new(AtomicU64::new(0)),
            synthesis_failures: Arc::new(AtomicU64::new(0)),

            capture_errors: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl PipelineMetrics {
    pub fn mark_stage_active(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Capture => self.stage_capture.store(true, Ordering::Relaxed),
            PipelineStage::Recorder => self.stage_recorder.store(true, Ordering::Relaxed),
            PipelineStage::Playback => self.stage_playback.store(true, Ordering::Relaxed),
        }
    }

    pub fn increment_capture_frames(&self) {
        self.capture_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_recorder_frames(&self) {
        self.recorder_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_playback_frames(&self) {
        self.playback_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_segment_emitted(&self) {
        self.segments_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_segment_dropped(&self) {
        self.segments_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_speaking(&self, speaking: bool) {
        self.is_speaking.store(speaking, Ordering::Relaxed);
        if speaking {
            *self.last_speech_time.write() = Some(Instant::now());
        }
    }

    /// Update peak/level indicators from a frame of samples.
    pub fn update_audio_level(&self, samples: &[i16]) {
        let peak = samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
            .min(i16::MAX as u16);
        self.current_peak.store(peak as i16, Ordering::Relaxed);

        let db = if peak == 0 {
            -900
        } else {
            let normalized = peak as f32 / i16::MAX as f32;
            (20.0 * normalized.log10() * 10.0) as i16
        };
        self.audio_level_db.store(db, Ordering::Relaxed);
    }
}
