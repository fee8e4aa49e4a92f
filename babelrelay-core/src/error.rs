use thiserror::Error;

use crate::Capability;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Every tier and the final fallback failed; `source` is the last observed failure.
    #[error("All {capability} providers exhausted after {attempts} attempt(s): {source}")]
    Exhausted {
        capability: Capability,
        attempts: usize,
        #[source]
        source: Box<RelayError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// HTTP status carried by the underlying provider failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Provider(e) => e.status_code(),
            Self::Exhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// The failure that ended an exhausted chain, or `self` for every other variant.
    pub fn last_failure(&self) -> &RelayError {
        match self {
            Self::Exhausted { source, .. } => source.last_failure(),
            other => other,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Timeout")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Provider-specific error: {0}")]
    ProviderSpecific(String),
}

impl ProviderError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication(_) => Some(401),
            Self::PaymentRequired(_) => Some(402),
            Self::RateLimit => Some(429),
            Self::InvalidRequest(_) => Some(400),
            Self::Unavailable(_) => Some(503),
            Self::Http { status, .. } => Some(*status),
            Self::Network(_) | Self::UnsupportedFeature(_) | Self::Timeout | Self::ProviderSpecific(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
