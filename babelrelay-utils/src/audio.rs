use babelrelay_core::{AudioFormat, RelayError, Result};
use bytes::{Bytes, BytesMut};

pub fn detect_audio_format(data: &[u8]) -> Result<AudioFormat> {
    if data.len() < 12 {
        return Err(RelayError::AudioFormat(
            "Not enough data to detect format".to_string(),
        ));
    }

    // WAV detection (RIFF header)
    if &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
        if data.len() >= 28 {
            let sample_rate = u32::from_le_bytes([data[24], data[25], data[26], data[27]]);
            return Ok(AudioFormat::wav(sample_rate));
        }
        return Ok(AudioFormat::wav(16000));
    }

    // MP3 detection (ID3 tag or frame sync)
    if &data[0..3] == b"ID3" || (data[0] == 0xFF && (data[1] & 0xE0) == 0xE0) {
        return Ok(AudioFormat::mp3(16000));
    }

    if &data[0..4] == b"OggS" {
        return Ok(AudioFormat::opus(48000));
    }

    // WebM / Matroska EBML magic, what browser MediaRecorder chunks start with
    if data[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return Ok(AudioFormat::webm(48000));
    }

    if &data[0..4] == b"fLaC" {
        return Ok(AudioFormat {
            format: "flac".to_string(),
            sample_rate: 16000,
            channels: 1,
            bit_depth: Some(16),
        });
    }

    Err(RelayError::AudioFormat(
        "Unknown audio format".to_string(),
    ))
}

/// Format label for an accumulated streaming buffer; headerless data gets `fallback`.
pub fn label_buffer(data: &[u8], fallback: &AudioFormat) -> AudioFormat {
    detect_audio_format(data).unwrap_or_else(|_| fallback.clone())
}

/// Joins buffered chunks into one contiguous buffer without copying a lone chunk.
pub fn concat_chunks(chunks: &[Bytes]) -> Bytes {
    match chunks {
        [] => Bytes::new(),
        [single] => single.clone(),
        many => {
            let total = many.iter().map(Bytes::len).sum();
            let mut combined = BytesMut::with_capacity(total);
            for chunk in many {
                combined.extend_from_slice(chunk);
            }
            combined.freeze()
        }
    }
}

/// Keeps only the most recent `ceiling` bytes. Returns the retained buffer and how many
/// leading bytes were dropped.
pub fn retain_tail(buffer: Bytes, ceiling: usize) -> (Bytes, usize) {
    if buffer.len() <= ceiling {
        return (buffer, 0);
    }
    let dropped = buffer.len() - ceiling;
    (buffer.slice(dropped..), dropped)
}
