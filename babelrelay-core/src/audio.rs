use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub format: String,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: Option<u16>,
}

impl AudioFormat {
    pub fn wav(sample_rate: u32) -> Self {
        Self {
            format: "wav".to_string(),
            sample_rate,
            channels: 1,
            bit_depth: Some(16),
        }
    }

    /// Headerless little-endian 16-bit PCM, the usual shape of streamed microphone chunks.
    pub fn pcm16(sample_rate: u32) -> Self {
        Self {
            format: "pcm".to_string(),
            sample_rate,
            channels: 1,
            bit_depth: Some(16),
        }
    }

    pub fn mp3(sample_rate: u32) -> Self {
        Self {
            format: "mp3".to_string(),
            sample_rate,
            channels: 1,
            bit_depth: None,
        }
    }

    pub fn opus(sample_rate: u32) -> Self {
        Self {
            format: "opus".to_string(),
            sample_rate,
            channels: 1,
            bit_depth: None,
        }
    }

    pub fn webm(sample_rate: u32) -> Self {
        Self {
            format: "webm".to_string(),
            sample_rate,
            channels: 1,
            bit_depth: None,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::wav(16000)
    }
}

#[derive(Debug, Clone)]
pub struct AudioData {
    pub data: Bytes,
    pub format: AudioFormat,
}

impl AudioData {
    pub fn new(data: impl Into<Bytes>, format: AudioFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    pub fn from_wav(data: impl Into<Bytes>, sample_rate: u32) -> Self {
        Self::new(data, AudioFormat::wav(sample_rate))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
