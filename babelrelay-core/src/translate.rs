use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
    pub source_language: Option<String>,
    pub target_language: String,
}

impl TranslationResult {
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_language: None,
            target_language: target_language.into(),
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    /// `source` of `None` asks the provider to detect the input language.
    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<TranslationResult>;
}
