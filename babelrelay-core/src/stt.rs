use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AudioData, AudioFormat, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub confidence: f32,
    pub language_detected: Option<String>,
    pub duration: Option<f32>,
    pub words: Option<Vec<WordTiming>>,
    pub metadata: Option<serde_json::Value>,
}

impl TranscriptionResult {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f32,
    pub end: f32,
    pub confidence: f32,
}

/// Speech-to-text capability.
///
/// Failures are reported as classifiable [`crate::RelayError`]s so a caller can decide
/// whether to try another provider.
#[async_trait]
pub trait SttProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(&self, audio: AudioData, language: Option<&str>) -> Result<TranscriptionResult>;

    fn supported_formats(&self) -> Vec<AudioFormat> {
        vec![AudioFormat::default()]
    }
}
