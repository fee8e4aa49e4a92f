use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{AudioFormat, RelayError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisOptions {
    pub language: Option<String>,
    pub voice: Option<String>,
    pub model: Option<String>,
    pub speed: Option<f32>,
    pub format: AudioFormat,
}

impl SynthesisOptions {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            ..Self::default()
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

/// Why a synthesis attempt produced no audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl SynthesisFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<&RelayError> for SynthesisFailure {
    fn from(error: &RelayError) -> Self {
        Self::new(error.status_code(), error.to_string())
    }
}

impl std::fmt::Display for SynthesisFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of a synthesis call. Synthesis never fails with an error value: a failed
/// attempt comes back with `error` set and no audio, so callers can skip playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    #[serde(skip)]
    pub audio_data: Bytes,
    pub audio_url: Option<String>,
    pub format: AudioFormat,
    pub duration: Option<f32>,
    pub size_bytes: usize,
    pub provider: Option<String>,
    pub error: Option<SynthesisFailure>,
}

impl SynthesisResult {
    pub fn new(audio_data: impl Into<Bytes>, format: AudioFormat) -> Self {
        let audio_data = audio_data.into();
        let size_bytes = audio_data.len();
        Self {
            audio_data,
            audio_url: None,
            format,
            duration: None,
            size_bytes,
            provider: None,
            error: None,
        }
    }

    pub fn from_url(url: impl Into<String>, format: AudioFormat) -> Self {
        Self {
            audio_url: Some(url.into()),
            ..Self::new(Bytes::new(), format)
        }
    }

    pub fn failed(failure: SynthesisFailure) -> Self {
        Self {
            error: Some(failure),
            ..Self::new(Bytes::new(), AudioFormat::default())
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_data.is_empty() || self.audio_url.is_some()
    }
}

/// Text-to-speech capability. Implementations report failures through
/// [`SynthesisResult::error`] instead of returning an error.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> SynthesisResult;

    fn supported_formats(&self) -> Vec<AudioFormat> {
        vec![AudioFormat::mp3(44100)]
    }
}
