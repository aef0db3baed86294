use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::SttError;

/// Encode mono 16-bit PCM into an in-memory WAV file for upload.
pub fn encode_wav_mono16(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, SttError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}
