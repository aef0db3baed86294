use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use vocalis_telemetry::{PipelineMetrics, PipelineStage};
use vocalis_vad::{EndpointConfig, Endpointer, FrameClassifier, SpeechRun};

use crate::frame_reader::FrameReader;
use crate::CaptureFrame;

/// A finished utterance, ready for transcription. `start`/`end` describe the
/// padded extraction window; `samples` are mono 16-bit PCM at `sample_rate`.
#[derive(Debug, Clone)]
pub struct SpeechSegment {
    pub start: Instant,
    pub end: Instant,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl SpeechSegment {
    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.samples.len() as u64 * 1_000_000 / self.sample_rate as u64)
    }
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Trailing history kept for extraction, evicted every iteration.
    pub retention: Duration,
    pub endpoint: EndpointConfig,
    /// Idle sleep between ring-buffer polls.
    pub poll_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(10),
            endpoint: EndpointConfig::default(),
            poll_interval: Duration::from_millis(25),
        }
    }
}

/// Bounded trailing history of capture frames, ordered by timestamp.
pub struct RollingBuffer {
    frames: VecDeque<CaptureFrame>,
    retention: Duration,
}

impl RollingBuffer {
    pub fn new(retention: Duration) -> Self {
        Self {
            frames: VecDeque::new(),
            retention,
        }
    }

    pub fn push(&mut self, frame: CaptureFrame) {
        self.frames.push_back(frame);
    }

    /// Drop frames older than the retention window, measured against the
    /// newest frame's own clock so eviction is deterministic.
    pub fn evict(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.retention) else {
            return;
        };
        while self
            .frames
            .front()
            .map(|f| f.timestamp < cutoff)
            .unwrap_or(false)
        {
            self.frames.pop_front();
        }
    }

    /// Concatenated samples of every frame whose timestamp lies in
    /// `[from, to]`.
    pub fn extract(&self, from: Instant, to: Instant) -> Vec<i16> {
        let mut samples = Vec::new();
        for frame in &self.frames {
            if frame.timestamp >= from && frame.timestamp <= to {
                samples.extend_from_slice(&frame.samples);
            }
        }
        samples
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Continuous-capture recorder: classifies each frame, runs the endpointing
/// machine, and hands closed runs to detached extraction workers.
///
/// Both collaborators are injected: the classifier decides speech/silence,
/// the sender receives finished segments. The rolling buffer is shared with
/// extraction workers, which snapshot it under the lock while this loop keeps
/// pruning.
pub struct SegmentRecorder {
    classifier: Box<dyn FrameClassifier>,
    endpointer: Endpointer,
    buffer: Arc<RwLock<RollingBuffer>>,
    segment_tx: mpsc::Sender<SpeechSegment>,
    config: RecorderConfig,
    session_start: Option<Instant>,
    sample_rate: u32,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl SegmentRecorder {
    pub fn new(
        classifier: Box<dyn FrameClassifier>,
        segment_tx: mpsc::Sender<SpeechSegment>,
        config: RecorderConfig,
        sample_rate: u32,
    ) -> Self {
        Self {
            classifier,
            endpointer: Endpointer::new(config.endpoint),
            buffer: Arc::new(RwLock::new(RollingBuffer::new(config.retention))),
            segment_tx,
            config,
            session_start: None,
            sample_rate,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.read().len()
    }

    /// Feed one capture frame through classify → endpoint → evict.
    pub fn process_frame(&mut self, frame: CaptureFrame) {
        let now = frame.timestamp;
        if self.session_start.is_none() {
            self.session_start = Some(now);
            tracing::info!("recording session started");
        }

        let is_speech = self.classifier.classify(&frame.samples);
        self.buffer.write().push(frame);

        if let Some(m) = &self.metrics {
            m.increment_recorder_frames();
            m.mark_stage_active(PipelineStage::Recorder);
            m.set_speaking(is_speech);
        }

        if let Some(run) = self.endpointer.process(is_speech, now) {
            self.spawn_extraction(run);
        }

        // Bound memory regardless of endpointing state.
        self.buffer.write().evict(now);
    }

    fn spawn_extraction(&self, run: SpeechRun) {
        let buffer = self.buffer.clone();
        let segment_tx = self.segment_tx.clone();
        let padding = self.config.endpoint.padding;
        let session_start = self.session_start.unwrap_or(run.start);
        let sample_rate = self.sample_rate;
        let metrics = self.metrics.clone();

        // Detached: segment N+1 can be captured while N is still in flight.
        let spawned = std::thread::Builder::new()
            .name("segment-extract".to_string())
            .spawn(move || {
                let segment = {
                    let buffer = buffer.read();
                    extract_segment(&buffer, run, padding, session_start, sample_rate)
                };

                match segment {
                    Some(segment) => {
                        tracing::debug!(
                            "extracted segment: {:?} of audio",
                            segment.duration()
                        );
                        if let Some(m) = &metrics {
                            m.record_segment_emitted();
                        }
                        if segment_tx.blocking_send(segment).is_err() {
                            tracing::warn!("segment receiver dropped; discarding segment");
                        }
                    }
                    None => {
                        tracing::warn!(
                            "speech run fell outside the retained buffer; segment dropped"
                        );
                        if let Some(m) = &metrics {
                            m.record_segment_dropped();
                        }
                    }
                }
            });

        if let Err(e) = spawned {
            tracing::error!("failed to spawn extraction worker: {}", e);
        }
    }

    /// Drive the recorder from the capture ring until `running` clears.
    pub fn spawn(mut self, mut frames: FrameReader, running: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("segment recorder started");
            while running.load(Ordering::SeqCst) {
                match frames.next_frame() {
                    Some(frame) => self.process_frame(frame),
                    None => tokio::time::sleep(self.config.poll_interval).await,
                }
            }
            tracing::info!("segment recorder stopped");
        })
    }
}

/// Widen the run by the pre/post padding, clip to session start, and collect
/// the buffered frames inside the window. Frames already evicted are gone:
/// an empty selection means the segment is dropped, not clipped.
pub fn extract_segment(
    buffer: &RollingBuffer,
    run: SpeechRun,
    padding: Duration,
    session_start: Instant,
    sample_rate: u32,
) -> Option<SpeechSegment> {
    let from = run
        .start
        .checked_sub(padding)
        .map(|t| t.max(session_start))
        .unwrap_or(session_start);
    let to = run.end + padding;

    let samples = buffer.extract(from, to);
    if samples.is_empty() {
        return None;
    }

    Some(SpeechSegment {
        start: from,
        end: to,
        samples,
        sample_rate,
    })
}
