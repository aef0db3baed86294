use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use vocalis_foundation::AudioError;
use vocalis_telemetry::{PipelineMetrics, PipelineStage};

use crate::device::{negotiate_output_config, DeviceManager};
use crate::queue::{Dequeued, PlaybackQueue};
use crate::ring_buffer::AudioRingBuffer;

const READY_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Synchronous sink for 16-bit LE PCM. A write blocks for roughly one
/// frame's real-time duration, which is the pipeline's backpressure point.
pub trait OutputSink {
    fn write(&mut self, pcm: &[u8]) -> Result<(), AudioError>;
}

/// Sinks own device handles that are not `Send`, so the engine constructs
/// them on the worker thread via a factory.
pub type SinkFactory = Box<dyn FnOnce() -> Result<Box<dyn OutputSink>, AudioError> + Send>;

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub sample_rate_hz: u32,
    pub channels: u16,
    /// Samples per frame per channel.
    pub frame_samples: usize,
    pub dequeue_timeout: Duration,
    pub device: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            channels: 1,
            frame_samples: 2048,
            dequeue_timeout: Duration::from_secs(1),
            device: None,
        }
    }
}

impl PlaybackConfig {
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * 2 * self.frame_samples
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Closed,
}

/// Streaming playback engine: one worker thread pulls frames off the queue
/// and writes them to the sink. Control operations are callable from any
/// thread.
pub struct PlaybackEngine {
    queue: Arc<PlaybackQueue>,
    worker: Mutex<Option<JoinHandle<()>>>,
    done_rx: crossbeam_channel::Receiver<()>,
    closed: AtomicBool,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl PlaybackEngine {
    /// Start the worker. The sink is built on the worker thread; a failure to
    /// open the device is returned to this caller.
    pub fn start(
        make_sink: SinkFactory,
        config: PlaybackConfig,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Result<Self, AudioError> {
        let queue = Arc::new(PlaybackQueue::new());
        let worker_queue = queue.clone();
        let worker_metrics = metrics.clone();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                let sink = match make_sink() {
                    Ok(sink) => {
                        let _ = ready_tx.send(Ok(()));
                        sink
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                worker_loop(worker_queue, sink, worker_metrics, config.dequeue_timeout);
                let _ = done_tx.send(());
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn playback thread: {e}")))?;

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(Ok(())) => Ok(Self {
                queue,
                worker: Mutex::new(Some(handle)),
                done_rx,
                closed: AtomicBool::new(false),
                metrics,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(AudioError::NoDataTimeout {
                duration: READY_TIMEOUT,
            }),
        }
    }

    pub fn enqueue(&self, frame: crate::PcmFrame) -> Result<(), AudioError> {
        self.queue.enqueue(frame)
    }

    pub fn queue(&self) -> &Arc<PlaybackQueue> {
        &self.queue
    }

    /// Busy includes backlog, not just the frame mid-write.
    pub fn is_playing(&self) -> bool {
        self.queue.is_busy()
    }

    /// Pausing retains buffered frames; only `interrupt` discards them.
    pub fn pause(&self) {
        self.queue.pause();
    }

    pub fn resume(&self) {
        self.queue.resume();
    }

    /// Discard queued frames. The frame already handed to the sink finishes,
    /// so silence arrives within one frame duration, not instantly.
    pub fn interrupt(&self) {
        self.queue.interrupt();
        if let Some(m) = &self.metrics {
            m.playback_interrupts.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Block until every queued frame has been written.
    pub fn wait_for_completion(&self) {
        self.queue.wait_idle();
    }

    pub fn state(&self) -> PlaybackState {
        if self.closed.load(Ordering::Acquire) {
            PlaybackState::Closed
        } else if self.queue.is_paused() {
            PlaybackState::Paused
        } else if self.queue.is_busy() {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    /// Idempotent, callable from any thread, including mid-playback. Wakes a
    /// blocked dequeue via the close marker, then joins the worker with a
    /// bounded timeout; the sink (and its device handle) drops with the
    /// worker.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.close();

        if let Some(handle) = self.worker.lock().take() {
            match self.done_rx.recv_timeout(SHUTDOWN_TIMEOUT) {
                Ok(()) => {
                    let _ = handle.join();
                }
                Err(_) => {
                    tracing::warn!(
                        "playback worker did not stop within {:?}; detaching",
                        SHUTDOWN_TIMEOUT
                    );
                }
            }
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(
    queue: Arc<PlaybackQueue>,
    mut sink: Box<dyn OutputSink>,
    metrics: Option<Arc<PipelineMetrics>>,
    dequeue_timeout: Duration,
) {
    tracing::debug!("playback worker started");
    loop {
        match queue.dequeue(dequeue_timeout) {
            Dequeued::Frame(frame) => {
                let result = sink.write(&frame.bytes);
                queue.mark_played();
                match result {
                    Ok(()) => {
                        if let Some(m) = &metrics {
                            m.increment_playback_frames();
                            m.mark_stage_active(PipelineStage::Playback);
                        }
                    }
                    Err(e) => {
                        // The session aborts; the engine stays usable for the
                        // next one. No automatic retry.
                        tracing::error!("output write failed, aborting playback session: {}", e);
                        if let Some(m) = &metrics {
                            m.playback_write_errors.fetch_add(1, Ordering::Relaxed);
                        }
                        queue.interrupt();
                    }
                }
            }
            Dequeued::TimedOut => continue,
            Dequeued::Closed => break,
        }
    }
    tracing::debug!("playback worker exited");
}

/// Real output: a mono sample ring drained by the cpal device callback,
/// fanned out across however many channels the device wants. `write` pushes
/// into the ring and blocks while it is full.
pub struct CpalOutputSink {
    _stream: cpal::Stream,
    producer: crate::ring_buffer::AudioProducer,
}

impl CpalOutputSink {
    pub fn open(config: &PlaybackConfig) -> Result<Self, AudioError> {
        let manager = DeviceManager::new();
        let device = manager.output_device(config.device.as_deref())?;
        let (stream_config, format) =
            negotiate_output_config(&device, config.sample_rate_hz, config.channels)?;
        let device_channels = stream_config.channels as usize;

        // Four frames of headroom keeps the callback fed while still making
        // `write` block for about a frame once the pipeline is ahead.
        let ring = AudioRingBuffer::new(config.frame_samples * 4);
        let (producer, mut consumer) = ring.split();

        let error_callback = |err: cpal::StreamError| {
            tracing::error!("output stream error: {}", err);
        };

        let mut mono = vec![0i16; 8192];
        let stream = match format {
            SampleFormat::I16 => device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let needed = (data.len() / device_channels).min(mono.len());
                    let n = consumer.read(&mut mono[..needed]);
                    for (i, frame) in data.chunks_mut(device_channels).enumerate() {
                        let sample = if i < n { mono[i] } else { 0 };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                error_callback,
                None,
            )?,
            SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let needed = (data.len() / device_channels).min(mono.len());
                    let n = consumer.read(&mut mono[..needed]);
                    for (i, frame) in data.chunks_mut(device_channels).enumerate() {
                        let sample = if i < n {
                            mono[i] as f32 / i16::MAX as f32
                        } else {
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                error_callback,
                None,
            )?,
            other => {
                return Err(AudioError::FormatNotSupported {
                    format: format!("{other:?} output samples"),
                })
            }
        };

        stream.play()?;
        Ok(Self {
            _stream: stream,
            producer,
        })
    }
}

impl OutputSink for CpalOutputSink {
    fn write(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        if pcm.len() % 2 != 0 {
            tracing::warn!("dropping dangling byte from odd-length PCM frame");
        }
        let samples: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let mut offset = 0;
        while offset < samples.len() {
            let written = self.producer.write_partial(&samples[offset..]);
            offset += written;
            if written == 0 {
                // Ring full: the device callback drains it in real time.
                thread::sleep(Duration::from_millis(5));
            }
        }
        Ok(())
    }
}
