use futures::StreamExt;
use std::sync::Arc;

use vocalis_audio::{PlaybackQueue, WavStreamDecoder};

use crate::error::TtsError;
use crate::ByteStream;

/// Drive one synthesis response body through the WAV decoder into the
/// playback queue. Returns the number of frames enqueued.
///
/// A decode failure ends the stream permanently; the caller issues a new
/// synthesis request rather than resuming mid-body. Frames removed by an
/// interrupt are not an error here: the pump keeps feeding and the queue
/// keeps accepting, so a barge-in can land while the network stream is
/// still arriving.
pub async fn pump_stream(
    mut stream: ByteStream,
    queue: &Arc<PlaybackQueue>,
    frame_bytes: usize,
) -> Result<u64, TtsError> {
    let mut decoder = WavStreamDecoder::new(frame_bytes);
    let mut frames_enqueued = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for frame in decoder.feed(&chunk)? {
            queue.enqueue(frame)?;
            frames_enqueued += 1;
        }
    }

    if let Some(tail) = decoder.finish()? {
        queue.enqueue(tail)?;
        frames_enqueued += 1;
    }

    tracing::debug!("synthesis stream finished: {} frames enqueued", frames_enqueued);
    Ok(frames_enqueued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use vocalis_audio::Dequeued;
    use vocalis_foundation::DecodeError;

    const FRAME_BYTES: usize = 64;

    fn wav_stream_bytes(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&((36 + payload.len()) as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn chunked(bytes: Vec<u8>, size: usize) -> ByteStream {
        let chunks: Vec<Result<Vec<u8>, TtsError>> =
            bytes.chunks(size).map(|c| Ok(c.to_vec())).collect();
        Box::pin(stream::iter(chunks))
    }

    #[tokio::test]
    async fn pumps_payload_into_queue_losslessly() {
        let payload: Vec<u8> = (0..FRAME_BYTES * 3 + 10).map(|i| (i % 256) as u8).collect();
        let queue = Arc::new(PlaybackQueue::new());

        let n = pump_stream(
            chunked(wav_stream_bytes(&payload), 37),
            &queue,
            FRAME_BYTES,
        )
        .await
        .unwrap();
        assert_eq!(n, 4); // 3 full frames + the short tail

        let mut out = Vec::new();
        for _ in 0..n {
            match queue.dequeue(std::time::Duration::from_millis(10)) {
                Dequeued::Frame(frame) => {
                    out.extend_from_slice(&frame.bytes);
                    queue.mark_played();
                }
                other => panic!("expected frame, got {other:?}"),
            }
        }
        assert_eq!(out, payload);
    }

    #[tokio::test]
    async fn malformed_stream_fails_without_enqueueing() {
        let queue = Arc::new(PlaybackQueue::new());
        let garbage = vec![0x55u8; 256];

        let result = pump_stream(chunked(garbage, 64), &queue, FRAME_BYTES).await;
        assert!(matches!(result, Err(TtsError::Decode(DecodeError::NotRiff))));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn closed_queue_surfaces_audio_error() {
        let payload = vec![1u8; FRAME_BYTES * 2];
        let queue = Arc::new(PlaybackQueue::new());
        queue.close();

        let result = pump_stream(
            chunked(wav_stream_bytes(&payload), 512),
            &queue,
            FRAME_BYTES,
        )
        .await;
        assert!(matches!(result, Err(TtsError::Audio(_))));
    }
}
