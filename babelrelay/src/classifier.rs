//! Decides whether a provider failure should advance the chain to the next tier.

use std::collections::BTreeSet;

use babelrelay_core::RelayError;

use crate::config::ClassifierSettings;

pub const DEFAULT_FALLBACK_STATUSES: [u16; 8] = [401, 402, 403, 429, 500, 502, 503, 504];

pub const DEFAULT_FALLBACK_MESSAGES: [&str; 8] = [
    "rate limit",
    "quota",
    "unauthorized",
    "billing",
    "timeout",
    "server error",
    "bad gateway",
    "service unavailable",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    statuses: BTreeSet<u16>,
    /// Stored lowercase.
    needles: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_STATUSES, DEFAULT_FALLBACK_MESSAGES)
    }
}

impl ErrorClassifier {
    pub fn new<S, M>(statuses: impl IntoIterator<Item = u16>, needles: M) -> Self
    where
        M: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            statuses: statuses.into_iter().collect(),
            needles: needles
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        let mut classifier = Self::default();
        for status in &settings.extra_statuses {
            classifier = classifier.with_status(*status);
        }
        for message in &settings.extra_messages {
            classifier = classifier.with_message(message);
        }
        classifier
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.statuses.insert(status);
        self
    }

    pub fn with_message(mut self, needle: impl AsRef<str>) -> Self {
        let needle = needle.as_ref().to_lowercase();
        if !needle.is_empty() && !self.needles.contains(&needle) {
            self.needles.push(needle);
        }
        self
    }

    pub fn is_fallback_worthy(&self, status: Option<u16>, message: &str) -> bool {
        if status.is_some_and(|s| self.statuses.contains(&s)) {
            return true;
        }
        let message = message.to_lowercase();
        self.needles.iter().any(|needle| message.contains(needle.as_str()))
    }

    pub fn classify(&self, error: &RelayError) -> bool {
        self.is_fallback_worthy(error.status_code(), &error.to_string())
    }
}
