use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::breaker::BreakerSnapshot;
use crate::classifier::ErrorClassifier;
use crate::config::RelayConfig;
use crate::orchestrator::{SynthesisOrchestrator, TierChain, TranscriptionOrchestrator, TranslationOrchestrator};
use crate::providers::{ChainReport, ProviderId, ProviderRegistry};
use crate::session::{SessionEvent, SessionRegistry};
use crate::Result;
use babelrelay_core::{
    AudioData, Capability, SttProvider, SynthesisOptions, SynthesisResult, TranscriptionResult, TranslationResult,
    Translator, TtsProvider,
};

/// Composition root: owns the three tiered chains, the streaming session registry and
/// the eviction timer.
pub struct VoiceProcessor {
    config: RelayConfig,
    transcription: Arc<TranscriptionOrchestrator>,
    synthesis: SynthesisOrchestrator,
    translation: TranslationOrchestrator,
    sessions: SessionRegistry,
    reports: Vec<ChainReport>,
    eviction_handle: Option<JoinHandle<()>>,
}

impl VoiceProcessor {
    pub fn builder() -> VoiceProcessorBuilder {
        VoiceProcessorBuilder::default()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub async fn transcribe(&self, audio: AudioData, language: Option<&str>) -> Result<TranscriptionResult> {
        self.transcription.transcribe(audio, language).await
    }

    /// Never fails; check [`SynthesisResult::error`].
    pub async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> SynthesisResult {
        self.synthesis.synthesize(text, options).await
    }

    pub async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<TranslationResult> {
        self.translation.translate(text, source, target).await
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Pipeline entry for one inbound chunk: creates the session on the first chunk,
    /// appends otherwise, then asks for a processing pass.
    pub async fn handle_chunk(&self, session_id: &str, language: &str, chunk: Bytes, is_first: bool) -> Option<JoinHandle<()>> {
        if is_first {
            self.sessions.create_session(session_id, language, chunk).await;
        } else if !self.sessions.append_chunk(session_id, chunk).await {
            return None;
        }
        self.sessions.trigger_processing(session_id).await
    }

    pub async fn finish_session(&self, session_id: &str) -> Option<String> {
        self.sessions.finalize_session(session_id).await
    }

    pub fn chain_report(&self, capability: Capability) -> Option<&ChainReport> {
        self.reports.iter().find(|report| report.capability == capability)
    }

    pub fn breaker_snapshot(&self, capability: Capability, id: ProviderId) -> Option<BreakerSnapshot> {
        match capability {
            Capability::Transcribe => self.transcription.chain().breaker_snapshot(id),
            Capability::Synthesize => self.synthesis.chain().breaker_snapshot(id),
            Capability::Translate => self.translation.chain().breaker_snapshot(id),
        }
    }

    pub fn transcription(&self) -> &Arc<TranscriptionOrchestrator> {
        &self.transcription
    }

    pub fn synthesis(&self) -> &SynthesisOrchestrator {
        &self.synthesis
    }

    pub fn translation(&self) -> &TranslationOrchestrator {
        &self.translation
    }

    pub fn is_evicting(&self) -> bool {
        self.eviction_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for VoiceProcessor {
    fn drop(&mut self) {
        if let Some(handle) = self.eviction_handle.take() {
            handle.abort();
        }
    }
}

pub struct VoiceProcessorBuilder {
    config: Option<RelayConfig>,
    registry: ProviderRegistry,
    final_stt: Option<Arc<dyn SttProvider>>,
    final_tts: Option<Arc<dyn TtsProvider>>,
    final_translator: Option<Arc<dyn Translator>>,
    classifier: Option<ErrorClassifier>,
    eviction: bool,
}

impl Default for VoiceProcessorBuilder {
    fn default() -> Self {
        Self {
            config: None,
            registry: ProviderRegistry::new(),
            final_stt: None,
            final_tts: None,
            final_translator: None,
            classifier: None,
            eviction: true,
        }
    }
}

impl VoiceProcessorBuilder {
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn final_stt(mut self, provider: Arc<dyn SttProvider>) -> Self {
        self.final_stt = Some(provider);
        self
    }

    pub fn final_tts(mut self, provider: Arc<dyn TtsProvider>) -> Self {
        self.final_tts = Some(provider);
        self
    }

    pub fn final_translator(mut self, provider: Arc<dyn Translator>) -> Self {
        self.final_translator = Some(provider);
        self
    }

    /// Replaces the classifier built from `resilience.classifier`.
    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Leaves eviction to the caller instead of starting the periodic sweep.
    pub fn without_eviction_task(mut self) -> Self {
        self.eviction = false;
        self
    }

    /// The returned receiver carries every session event and must be drained by the
    /// transport; see [`SessionRegistry::new`].
    pub fn build(self) -> Result<(VoiceProcessor, UnboundedReceiver<SessionEvent>)> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let classifier = self
            .classifier
            .unwrap_or_else(|| ErrorClassifier::from_settings(&config.resilience.classifier));

        let (stt_tiers, stt_report) = self.registry.stt_chain(&config)?;
        let (tts_tiers, tts_report) = self.registry.tts_chain(&config)?;
        let (translation_tiers, translation_report) = self.registry.translation_chain(&config)?;

        let transcription = Arc::new(TranscriptionOrchestrator::new(TierChain::new(
            Capability::Transcribe,
            stt_tiers,
            self.final_stt,
            classifier.clone(),
        )?));
        let synthesis = SynthesisOrchestrator::new(TierChain::new(
            Capability::Synthesize,
            tts_tiers,
            self.final_tts,
            classifier.clone(),
        )?);
        let translation = TranslationOrchestrator::new(TierChain::new(
            Capability::Translate,
            translation_tiers,
            self.final_translator,
            classifier,
        )?);

        let reports = vec![stt_report, tts_report, translation_report];
        for report in &reports {
            report.log();
        }

        let streaming = config.resilience.streaming.clone();
        let (sessions, events) = SessionRegistry::new(transcription.clone() as Arc<dyn SttProvider>, streaming.clone());

        // Start the sweep only if we're in an async context
        let eviction_handle = if self.eviction && tokio::runtime::Handle::try_current().is_ok() {
            debug!(
                interval_ms = streaming.eviction_interval_ms,
                max_inactivity_ms = streaming.max_inactivity_ms,
                "Starting session eviction task"
            );
            Some(sessions.spawn_eviction_task(streaming.eviction_interval(), streaming.max_inactivity()))
        } else {
            None
        };

        info!(strategy = %config.get_optimization_strategy(), "Voice processor ready");

        let processor = VoiceProcessor {
            config,
            transcription,
            synthesis,
            translation,
            sessions,
            reports,
            eviction_handle,
        };
        Ok((processor, events))
    }
}
