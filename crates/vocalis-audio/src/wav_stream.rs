use vocalis_foundation::DecodeError;

use crate::PcmFrame;

/// WAV header is at minimum RIFF descriptor + fmt chunk + data chunk header.
const MIN_HEADER_BYTES: usize = 44;

enum HeaderState {
    Pending,
    Parsed,
    Failed(DecodeError),
}

/// Incremental decoder for a chunked WAV byte stream.
///
/// Bytes arrive in arbitrary slices; once the `data` chunk is located the
/// payload is re-chunked into fixed-size PCM frames, preserving order and
/// byte content exactly. One decoder serves one stream; a malformed header
/// poisons the decoder and a new response requires a new instance.
pub struct WavStreamDecoder {
    frame_bytes: usize,
    accumulator: Vec<u8>,
    header: HeaderState,
    next_seq: u64,
}

impl WavStreamDecoder {
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            frame_bytes,
            accumulator: Vec::new(),
            header: HeaderState::Pending,
            next_seq: 0,
        }
    }

    pub fn header_parsed(&self) -> bool {
        matches!(self.header, HeaderState::Parsed)
    }

    /// Feed the next slice of the stream. Returns every complete frame the
    /// accumulated payload now covers; a sub-frame remainder is retained for
    /// the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<PcmFrame>, DecodeError> {
        if let HeaderState::Failed(e) = &self.header {
            return Err(e.clone());
        }

        self.accumulator.extend_from_slice(bytes);

        if matches!(self.header, HeaderState::Pending) {
            self.try_parse_header()?;
        }

        if self.header_parsed() {
            Ok(self.drain_complete_frames())
        } else {
            Ok(Vec::new())
        }
    }

    /// Signal end of stream. Emits the remaining partial frame, if any.
    /// A stream that ended before its header could be located is an error.
    pub fn finish(&mut self) -> Result<Option<PcmFrame>, DecodeError> {
        match &self.header {
            HeaderState::Failed(e) => Err(e.clone()),
            HeaderState::Pending => {
                let scanned = self.accumulator.len();
                Err(self.poison(DecodeError::DataChunkNotFound { scanned }))
            }
            HeaderState::Parsed => {
                if self.accumulator.is_empty() {
                    return Ok(None);
                }
                let bytes = std::mem::take(&mut self.accumulator);
                let seq = self.next_seq;
                self.next_seq += 1;
                Ok(Some(PcmFrame { bytes, seq }))
            }
        }
    }

    fn poison(&mut self, error: DecodeError) -> DecodeError {
        self.header = HeaderState::Failed(error.clone());
        error
    }

    fn try_parse_header(&mut self) -> Result<(), DecodeError> {
        if self.accumulator.len() < MIN_HEADER_BYTES {
            return Ok(());
        }

        if &self.accumulator[0..4] != b"RIFF" {
            return Err(self.poison(DecodeError::NotRiff));
        }
        if &self.accumulator[8..12] != b"WAVE" {
            return Err(self.poison(DecodeError::NotWave));
        }

        // Walk chunk headers (4-byte tag + LE u32 length) looking for `data`.
        // A walk that runs off the accumulated bytes is incomplete, not
        // malformed: the next feed may bring the rest of the header.
        let mut pos = 12usize;
        while pos + 8 <= self.accumulator.len() {
            let tag = &self.accumulator[pos..pos + 4];
            let size = u32::from_le_bytes([
                self.accumulator[pos + 4],
                self.accumulator[pos + 5],
                self.accumulator[pos + 6],
                self.accumulator[pos + 7],
            ]) as usize;

            if tag == b"data" {
                self.accumulator.drain(..pos + 8);
                self.header = HeaderState::Parsed;
                return Ok(());
            }

            pos += 8 + size;
        }

        Ok(())
    }

    fn drain_complete_frames(&mut self) -> Vec<PcmFrame> {
        let mut frames = Vec::new();
        while self.accumulator.len() >= self.frame_bytes {
            let rest = self.accumulator.split_off(self.frame_bytes);
            let bytes = std::mem::replace(&mut self.accumulator, rest);
            let seq = self.next_seq;
            self.next_seq += 1;
            frames.push(PcmFrame { bytes, seq });
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_BYTES: usize = 64;

    fn wav_bytes(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&((36 + payload.len()) as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&16000u32.to_le_bytes());
        out.extend_from_slice(&32000u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn collect_all(decoder: &mut WavStreamDecoder, stream: &[u8], chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for piece in stream.chunks(chunk) {
            for frame in decoder.feed(piece).unwrap() {
                out.extend_from_slice(&frame.bytes);
            }
        }
        if let Some(frame) = decoder.finish().unwrap() {
            out.extend_from_slice(&frame.bytes);
        }
        out
    }

    #[test]
    fn rechunking_is_lossless_when_divisible() {
        let data = payload(FRAME_BYTES * 5);
        let mut decoder = WavStreamDecoder::new(FRAME_BYTES);
        let out = collect_all(&mut decoder, &wav_bytes(&data), 173);
        assert_eq!(out, data);
    }

    #[test]
    fn remainder_is_emitted_as_final_short_frame() {
        let data = payload(FRAME_BYTES * 3 + 17);
        let mut decoder = WavStreamDecoder::new(FRAME_BYTES);

        let mut frames = Vec::new();
        for piece in wav_bytes(&data).chunks(200) {
            frames.extend(decoder.feed(piece).unwrap());
        }
        let tail = decoder.finish().unwrap().unwrap();
        assert_eq!(tail.bytes.len(), 17);

        let mut out: Vec<u8> = frames.iter().flat_map(|f| f.bytes.clone()).collect();
        out.extend_from_slice(&tail.bytes);
        assert_eq!(out, data);
    }

    #[test]
    fn byte_at_a_time_matches_single_feed() {
        let data = payload(FRAME_BYTES * 2 + 5);
        let stream = wav_bytes(&data);

        let mut one_shot = WavStreamDecoder::new(FRAME_BYTES);
        let mut trickled = WavStreamDecoder::new(FRAME_BYTES);

        let a = collect_all(&mut one_shot, &stream, stream.len());
        let b = collect_all(&mut trickled, &stream, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn frames_are_sequentially_numbered() {
        let data = payload(FRAME_BYTES * 4);
        let mut decoder = WavStreamDecoder::new(FRAME_BYTES);
        let frames = decoder.feed(&wav_bytes(&data)).unwrap();
        let seqs: Vec<u64> = frames.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn extra_chunks_before_data_are_skipped() {
        let data = payload(FRAME_BYTES);
        let mut stream = Vec::new();
        stream.extend_from_slice(b"RIFF");
        stream.extend_from_slice(&0u32.to_le_bytes());
        stream.extend_from_slice(b"WAVE");
        stream.extend_from_slice(b"fmt ");
        stream.extend_from_slice(&16u32.to_le_bytes());
        stream.extend_from_slice(&[0u8; 16]);
        stream.extend_from_slice(b"LIST");
        stream.extend_from_slice(&8u32.to_le_bytes());
        stream.extend_from_slice(&[0u8; 8]);
        stream.extend_from_slice(b"data");
        stream.extend_from_slice(&(data.len() as u32).to_le_bytes());
        stream.extend_from_slice(&data);

        let mut decoder = WavStreamDecoder::new(FRAME_BYTES);
        let out = collect_all(&mut decoder, &stream, 7);
        assert_eq!(out, data);
    }

    #[test]
    fn bad_signature_fails_permanently() {
        let mut decoder = WavStreamDecoder::new(FRAME_BYTES);
        let garbage = vec![0xABu8; 64];
        assert_eq!(decoder.feed(&garbage), Err(DecodeError::NotRiff));

        // Even valid bytes afterwards cannot revive the stream.
        let good = wav_bytes(&payload(FRAME_BYTES));
        assert_eq!(decoder.feed(&good), Err(DecodeError::NotRiff));
    }

    #[test]
    fn riff_without_wave_fails() {
        let mut stream = wav_bytes(&payload(FRAME_BYTES));
        stream[8..12].copy_from_slice(b"AVI ");
        let mut decoder = WavStreamDecoder::new(FRAME_BYTES);
        assert_eq!(decoder.feed(&stream), Err(DecodeError::NotWave));
    }

    #[test]
    fn truncated_stream_without_data_chunk_errors_on_finish() {
        let mut decoder = WavStreamDecoder::new(FRAME_BYTES);
        let stream = wav_bytes(&payload(FRAME_BYTES));
        // Stop before the data tag is reachable.
        decoder.feed(&stream[..40]).unwrap();
        assert!(matches!(
            decoder.finish(),
            Err(DecodeError::DataChunkNotFound { .. })
        ));
    }

    #[test]
    fn short_feeds_before_header_emit_nothing() {
        let data = payload(FRAME_BYTES);
        let stream = wav_bytes(&data);
        let mut decoder = WavStreamDecoder::new(FRAME_BYTES);

        assert!(decoder.feed(&stream[..20]).unwrap().is_empty());
        assert!(!decoder.header_parsed());
        let frames = decoder.feed(&stream[20..]).unwrap();
        assert!(decoder.header_parsed());
        assert_eq!(frames.len(), 1);
    }
}
