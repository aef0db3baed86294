pub mod capture;
pub mod device;
pub mod frame_reader;
pub mod playback;
pub mod queue;
pub mod recorder;
pub mod ring_buffer;
pub mod wav_stream;

pub use capture::{AudioCaptureThread, CaptureConfig};
pub use device::{DeviceInfo, DeviceManager};
pub use frame_reader::FrameReader;
pub use playback::{
    CpalOutputSink, OutputSink, PlaybackConfig, PlaybackEngine, PlaybackState, SinkFactory,
};
pub use queue::{Dequeued, PlaybackQueue};
pub use recorder::{RecorderConfig, RollingBuffer, SegmentRecorder, SpeechSegment};
pub use ring_buffer::AudioRingBuffer;
pub use wav_stream::WavStreamDecoder;

use std::time::Instant;

/// Fixed-size chunk of 16-bit little-endian PCM bytes on the playback path.
///
/// Sequence numbers increase monotonically within one decoder or capture
/// session; whichever queue holds the frame owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    pub bytes: Vec<u8>,
    pub seq: u64,
}

/// Capture-side frame: mono i16 samples with a sample-count-derived timestamp.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub samples: Vec<i16>,
    pub timestamp: Instant,
    pub sample_rate: u32,
    pub seq: u64,
}

impl CaptureFrame {
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_micros(
            self.samples.len() as u64 * 1_000_000 / self.sample_rate as u64,
        )
    }
}
