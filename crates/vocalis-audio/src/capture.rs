use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use vocalis_foundation::AudioError;
use vocalis_telemetry::{PipelineMetrics, PipelineStage};

use crate::device::{negotiate_input_config, DeviceManager};
use crate::ring_buffer::AudioProducer;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            channels: 1,
            device: None,
        }
    }
}

/// Dedicated capture thread. The cpal stream lives entirely on this thread;
/// the callback pushes samples into the ring producer and never blocks.
pub struct AudioCaptureThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl AudioCaptureThread {
    pub fn spawn(
        config: CaptureConfig,
        producer: AudioProducer,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = running.clone();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match open_stream(&config, producer, metrics) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                tracing::info!(
                    "capture started at {}Hz, {} channel(s)",
                    config.sample_rate_hz,
                    config.channels
                );

                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(100));
                }

                drop(stream);
                tracing::info!("capture stopped");
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(Ok(())) => Ok(Self { handle, shutdown }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(false, Ordering::Relaxed);
                Err(AudioError::NoDataTimeout {
                    duration: READY_TIMEOUT,
                })
            }
        }
    }

    pub fn stop(self) {
        self.shutdown.store(false, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

fn open_stream(
    config: &CaptureConfig,
    mut producer: AudioProducer,
    metrics: Option<Arc<PipelineMetrics>>,
) -> Result<cpal::Stream, AudioError> {
    let manager = DeviceManager::new();
    let device = manager.input_device(config.device.as_deref())?;
    let (stream_config, format) =
        negotiate_input_config(&device, config.sample_rate_hz, config.channels)?;

    let err_metrics = metrics.clone();
    let error_callback = move |err: cpal::StreamError| {
        tracing::error!("input stream error: {}", err);
        if let Some(m) = &err_metrics {
            m.capture_errors
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };

    let mut push = move |samples: &[i16]| {
        if let Some(m) = &metrics {
            m.increment_capture_frames();
            m.update_audio_level(samples);
            m.mark_stage_active(PipelineStage::Capture);
            if producer.write(samples).is_err() {
                m.capture_errors
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        } else {
            let _ = producer.write(samples);
        }
    };

    let stream = match format {
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| push(data),
            error_callback,
            None,
        )?,
        SampleFormat::F32 => {
            let mut scratch: Vec<i16> = Vec::new();
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    scratch.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                    );
                    push(&scratch);
                },
                error_callback,
                None,
            )?
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{other:?} input samples"),
            })
        }
    };

    stream.play()?;
    Ok(stream)
}
