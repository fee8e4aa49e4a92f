//! Resilient routing for speech and translation providers
//!
//! babelrelay sends transcription, synthesis and translation calls down an ordered chain
//! of interchangeable providers. Each tier has its own circuit breaker, failures are
//! classified to decide whether the next tier should be tried, and a mandatory final
//! fallback answers when every tier is down or unconfigured. A separate session registry
//! buffers streamed audio and runs transcription passes over it.

pub mod breaker;
pub mod classifier;
pub mod config;
pub mod orchestrator;
pub mod processor;
pub mod providers;
pub mod session;

#[cfg(test)]
mod error_tests;


// Re-export core types
pub use babelrelay_core::{
    AudioData, AudioFormat, Capability, ProviderError, RelayError, Result, SttProvider, SynthesisFailure,
    SynthesisOptions, SynthesisResult, TranscriptionResult, TranslationResult, Translator, TtsProvider, WordTiming,
};

// Re-export main types
pub use breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use classifier::ErrorClassifier;
pub use config::{OptimizationStrategy, RelayConfig};
pub use orchestrator::{ChainOutcome, SynthesisOrchestrator, Tier, TierChain, TranscriptionOrchestrator, TranslationOrchestrator};
pub use processor::{VoiceProcessor, VoiceProcessorBuilder};
pub use providers::{ChainReport, CostTier, ProviderId, ProviderRegistry, SlotStatus, TierSelection};
pub use session::{SessionEvent, SessionInfo, SessionRegistry, SessionStatus};

// Re-export utils
pub use babelrelay_utils as utils;
