use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::ring_buffer::AudioConsumer;
use crate::CaptureFrame;

const READ_CHUNK_SAMPLES: usize = 4096;

/// Assembles fixed-size capture frames from the ring buffer.
///
/// Timestamps are reconstructed from the running sample count rather than
/// read at the wall clock, so frame timing is immune to scheduler jitter and
/// is reproducible in tests.
pub struct FrameReader {
    consumer: AudioConsumer,
    pending: VecDeque<i16>,
    frame_size: usize,
    sample_rate: u32,
    samples_emitted: u64,
    start_time: Instant,
    next_seq: u64,
}

impl FrameReader {
    pub fn new(
        consumer: AudioConsumer,
        frame_size: usize,
        sample_rate: u32,
        start_time: Instant,
    ) -> Self {
        Self {
            consumer,
            pending: VecDeque::with_capacity(frame_size * 4),
            frame_size,
            sample_rate,
            samples_emitted: 0,
            start_time,
            next_seq: 0,
        }
    }

    /// Pull whatever the ring currently holds and return the next complete
    /// frame, or None until enough samples have accumulated.
    pub fn next_frame(&mut self) -> Option<CaptureFrame> {
        if self.pending.len() < self.frame_size {
            let mut buffer = vec![0i16; READ_CHUNK_SAMPLES];
            let n = self.consumer.read(&mut buffer);
            self.pending.extend(buffer[..n].iter().copied());
        }

        if self.pending.len() < self.frame_size {
            return None;
        }

        let samples: Vec<i16> = self.pending.drain(..self.frame_size).collect();
        let elapsed_ms = self.samples_emitted * 1000 / self.sample_rate as u64;
        let timestamp = self.start_time + Duration::from_millis(elapsed_ms);
        self.samples_emitted += self.frame_size as u64;

        let seq = self.next_seq;
        self.next_seq += 1;

        Some(CaptureFrame {
            samples,
            timestamp,
            sample_rate: self.sample_rate,
            seq,
        })
    }
}
