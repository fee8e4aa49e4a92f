//! Tiered fallback across interchangeable providers.
//!
//! A [`TierChain`] walks its tiers in priority order. Absent tiers and tiers whose breaker
//! refuses an attempt are skipped without touching the breaker. A success closes the
//! tier's breaker and ends the walk. A fallback-worthy failure records a breaker failure
//! and advances; any other failure is returned at once. When every tier has been skipped
//! or has failed, the mandatory final fallback is invoked.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker};
use crate::classifier::ErrorClassifier;
use crate::providers::{ProviderId, ProviderSlot};
use crate::Result;
use babelrelay_core::{
    AudioData, AudioFormat, Capability, ProviderError, RelayError, SttProvider, SynthesisFailure, SynthesisOptions,
    SynthesisResult, TranscriptionResult, TranslationResult, Translator, TtsProvider,
};

/// One position in a chain. The breaker lives as long as the tier, whether or not the
/// slot is configured.
pub struct Tier<P: ?Sized> {
    id: ProviderId,
    slot: Option<ProviderSlot<P>>,
    breaker: CircuitBreaker,
}

impl<P: ?Sized> Tier<P> {
    pub fn new(id: ProviderId, slot: Option<ProviderSlot<P>>, breaker: BreakerConfig) -> Self {
        Self {
            id,
            slot,
            breaker: CircuitBreaker::new(id.as_str(), breaker),
        }
    }

    pub fn ready(id: ProviderId, provider: Arc<P>, breaker: BreakerConfig) -> Self {
        Self::new(id, Some(ProviderSlot::ready(provider)), breaker)
    }

    pub fn absent(id: ProviderId, breaker: BreakerConfig) -> Self {
        Self::new(id, None, breaker)
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn slot(&self) -> Option<&ProviderSlot<P>> {
        self.slot.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.slot.is_some()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

/// How a walk over the chain ended.
#[derive(Debug)]
pub enum ChainOutcome<T> {
    /// A configured tier produced the value.
    Served { provider: ProviderId, value: T },
    /// A tier failed in a way that must not be retried elsewhere.
    Fatal { provider: ProviderId, error: RelayError },
    /// Every tier was skipped or failed over; this is the final fallback's outcome.
    /// `attempts` counts every provider invocation, the final fallback included.
    FinalFallback { result: Result<T>, attempts: usize },
}

pub struct TierChain<P: ?Sized> {
    capability: Capability,
    tiers: Vec<Tier<P>>,
    final_fallback: Arc<P>,
    classifier: ErrorClassifier,
}

impl<P: ?Sized + Send + Sync> TierChain<P> {
    pub fn new(
        capability: Capability,
        tiers: Vec<Tier<P>>,
        final_fallback: Option<Arc<P>>,
        classifier: ErrorClassifier,
    ) -> Result<Self> {
        let final_fallback = final_fallback.ok_or_else(|| {
            RelayError::Configuration(format!("a final fallback {} provider is required", capability))
        })?;

        Ok(Self {
            capability,
            tiers,
            final_fallback,
            classifier,
        })
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn tiers(&self) -> &[Tier<P>] {
        &self.tiers
    }

    pub fn final_fallback(&self) -> &Arc<P> {
        &self.final_fallback
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn breaker_snapshot(&self, id: ProviderId) -> Option<BreakerSnapshot> {
        self.tiers
            .iter()
            .find(|tier| tier.id == id)
            .map(|tier| tier.breaker.snapshot())
    }

    /// Configured tiers the next call would try, in order. Read-only: unlike
    /// [`CircuitBreaker::should_attempt`] this never flips an elapsed breaker.
    pub fn attempted_tiers(&self) -> Vec<ProviderId> {
        let now = Instant::now();
        self.tiers
            .iter()
            .filter(|tier| tier.is_configured())
            .filter(|tier| {
                let snapshot = tier.breaker.snapshot();
                !snapshot.is_open || snapshot.next_retry.map_or(true, |retry| now >= retry)
            })
            .map(|tier| tier.id)
            .collect()
    }

    pub async fn run<T, F, Fut>(&self, mut call: F) -> ChainOutcome<T>
    where
        F: FnMut(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0usize;

        for tier in &self.tiers {
            let Some(slot) = tier.slot() else {
                debug!(capability = %self.capability, provider = %tier.id, "Tier not configured, skipping");
                continue;
            };

            if !tier.breaker.should_attempt() {
                debug!(capability = %self.capability, provider = %tier.id, "Breaker open, skipping tier");
                continue;
            }

            let provider = match slot.get().await {
                Ok(provider) => provider,
                Err(e) => {
                    // A tier that cannot be built behaves like one that is down.
                    warn!(
                        capability = %self.capability,
                        provider = %tier.id,
                        error = %e,
                        "Provider construction failed, advancing"
                    );
                    tier.breaker.record_failure();
                    continue;
                }
            };

            attempts += 1;
            match call(provider).await {
                Ok(value) => {
                    tier.breaker.record_success();
                    debug!(capability = %self.capability, provider = %tier.id, "Tier served request");
                    return ChainOutcome::Served { provider: tier.id, value };
                }
                Err(error) if self.classifier.classify(&error) => {
                    tier.breaker.record_failure();
                    warn!(
                        capability = %self.capability,
                        provider = %tier.id,
                        failure_count = tier.breaker.failure_count(),
                        error = %error,
                        "Fallback-worthy failure, advancing to next tier"
                    );
                }
                Err(error) => {
                    warn!(
                        capability = %self.capability,
                        provider = %tier.id,
                        error = %error,
                        "Non-fallback-worthy failure, propagating"
                    );
                    return ChainOutcome::Fatal { provider: tier.id, error };
                }
            }
        }

        attempts += 1;
        info!(capability = %self.capability, attempts, "Invoking final fallback");
        let result = call(self.final_fallback.clone()).await;
        if let Err(e) = &result {
            warn!(capability = %self.capability, error = %e, "Final fallback failed");
        }
        ChainOutcome::FinalFallback { result, attempts }
    }

    /// Runs the chain for an error-returning capability. A final fallback failure comes
    /// back as [`RelayError::Exhausted`].
    async fn execute<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: FnMut(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.run(call).await {
            ChainOutcome::Served { value, .. } => Ok(value),
            ChainOutcome::Fatal { error, .. } => Err(error),
            ChainOutcome::FinalFallback { result, attempts } => result.map_err(|source| RelayError::Exhausted {
                capability: self.capability,
                attempts,
                source: Box::new(source),
            }),
        }
    }
}

pub struct TranscriptionOrchestrator {
    chain: TierChain<dyn SttProvider>,
}

impl TranscriptionOrchestrator {
    pub fn new(chain: TierChain<dyn SttProvider>) -> Self {
        Self { chain }
    }

    pub fn from_tiers(
        tiers: Vec<Tier<dyn SttProvider>>,
        final_fallback: Option<Arc<dyn SttProvider>>,
        classifier: ErrorClassifier,
    ) -> Result<Self> {
        TierChain::new(Capability::Transcribe, tiers, final_fallback, classifier).map(Self::new)
    }

    pub fn chain(&self) -> &TierChain<dyn SttProvider> {
        &self.chain
    }
}

#[async_trait]
impl SttProvider for TranscriptionOrchestrator {
    fn name(&self) -> &str {
        "tiered-transcription"
    }

    async fn transcribe(&self, audio: AudioData, language: Option<&str>) -> Result<TranscriptionResult> {
        self.chain
            .execute(|provider| {
                let audio = audio.clone();
                async move { provider.transcribe(audio, language).await }
            })
            .await
    }

    fn supported_formats(&self) -> Vec<AudioFormat> {
        self.chain.final_fallback().supported_formats()
    }
}

pub struct TranslationOrchestrator {
    chain: TierChain<dyn Translator>,
}

impl TranslationOrchestrator {
    pub fn new(chain: TierChain<dyn Translator>) -> Self {
        Self { chain }
    }

    pub fn from_tiers(
        tiers: Vec<Tier<dyn Translator>>,
        final_fallback: Option<Arc<dyn Translator>>,
        classifier: ErrorClassifier,
    ) -> Result<Self> {
        TierChain::new(Capability::Translate, tiers, final_fallback, classifier).map(Self::new)
    }

    pub fn chain(&self) -> &TierChain<dyn Translator> {
        &self.chain
    }
}

#[async_trait]
impl Translator for TranslationOrchestrator {
    fn name(&self) -> &str {
        "tiered-translation"
    }

    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<TranslationResult> {
        self.chain
            .execute(|provider| async move { provider.translate(text, source, target).await })
            .await
    }
}

pub struct SynthesisOrchestrator {
    chain: TierChain<dyn TtsProvider>,
}

impl SynthesisOrchestrator {
    pub fn new(chain: TierChain<dyn TtsProvider>) -> Self {
        Self { chain }
    }

    pub fn from_tiers(
        tiers: Vec<Tier<dyn TtsProvider>>,
        final_fallback: Option<Arc<dyn TtsProvider>>,
        classifier: ErrorClassifier,
    ) -> Result<Self> {
        TierChain::new(Capability::Synthesize, tiers, final_fallback, classifier).map(Self::new)
    }

    pub fn chain(&self) -> &TierChain<dyn TtsProvider> {
        &self.chain
    }
}

// Error-bearing results become errors so the chain can classify them.
fn result_to_error(result: SynthesisResult) -> Result<SynthesisResult> {
    match result.error {
        None => Ok(result),
        Some(SynthesisFailure { status: Some(status), message }) => Err(ProviderError::http(status, message).into()),
        Some(SynthesisFailure { status: None, message }) => Err(ProviderError::ProviderSpecific(message).into()),
    }
}

fn error_to_failure(error: &RelayError) -> SynthesisFailure {
    match error.last_failure() {
        RelayError::Provider(ProviderError::Http { status, message }) => SynthesisFailure::new(Some(*status), message.clone()),
        RelayError::Provider(ProviderError::ProviderSpecific(message)) => SynthesisFailure::new(None, message.clone()),
        other => SynthesisFailure::from(other),
    }
}

#[async_trait]
impl TtsProvider for SynthesisOrchestrator {
    fn name(&self) -> &str {
        "tiered-synthesis"
    }

    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> SynthesisResult {
        let outcome = self
            .chain
            .run(|provider| async move {
                let name = provider.name().to_string();
                result_to_error(provider.synthesize(text, options).await).map(|result| match result.provider {
                    Some(_) => result,
                    None => result.with_provider(name),
                })
            })
            .await;

        match outcome {
            ChainOutcome::Served { value, .. } => value,
            ChainOutcome::Fatal { provider, error } => {
                SynthesisResult::failed(error_to_failure(&error)).with_provider(provider.as_str())
            }
            ChainOutcome::FinalFallback { result: Ok(value), .. } => value,
            ChainOutcome::FinalFallback { result: Err(error), attempts } => {
                warn!(attempts, "Synthesis exhausted, returning error-bearing result");
                SynthesisResult::failed(error_to_failure(&error))
                    .with_provider(self.chain.final_fallback().name().to_string())
            }
        }
    }

    fn supported_formats(&self) -> Vec<AudioFormat> {
        self.chain.final_fallback().supported_formats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Behaviour {
        Succeed(&'static str),
        Fail(fn() -> RelayError),
    }

    struct MockStt {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl MockStt {
        fn ok(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour: Behaviour::Succeed(name),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str, error: fn() -> RelayError) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour: Behaviour::Fail(error),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SttProvider for MockStt {
        fn name(&self) -> &str {
            self.name
        }

        async fn transcribe(&self, _audio: AudioData, _language: Option<&str>) -> Result<TranscriptionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Succeed(text) => Ok(TranscriptionResult::new(*text, 0.9)),
                Behaviour::Fail(error) => Err(error()),
            }
        }
    }

    fn rate_limited() -> RelayError {
        ProviderError::RateLimit.into()
    }

    fn bad_request() -> RelayError {
        ProviderError::InvalidRequest("unsupported language".into()).into()
    }

    fn breaker(threshold: u32) -> BreakerConfig {
        BreakerConfig {
            open_threshold: threshold,
            base_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
        }
    }

    fn audio() -> AudioData {
        AudioData::new(Bytes::from_static(&[0u8; 16]), AudioFormat::pcm16(16000))
    }

    fn stt_chain(tiers: Vec<Tier<dyn SttProvider>>, fallback: Arc<MockStt>) -> TranscriptionOrchestrator {
        TranscriptionOrchestrator::from_tiers(tiers, Some(fallback as Arc<dyn SttProvider>), ErrorClassifier::default())
            .unwrap()
    }

    #[test]
    fn test_missing_final_fallback_is_config_error() {
        let result = TranscriptionOrchestrator::from_tiers(Vec::new(), None, ErrorClassifier::default());
        assert!(matches!(result, Err(RelayError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_worthy_failure_advances_to_next_tier() {
        let a = MockStt::failing("a", rate_limited);
        let b = MockStt::ok("b");
        let fallback = MockStt::ok("fallback");
        let orchestrator = stt_chain(
            vec![
                Tier::ready(ProviderId::Deepgram, a.clone() as Arc<dyn SttProvider>, breaker(3)),
                Tier::ready(ProviderId::OpenAi, b.clone() as Arc<dyn SttProvider>, breaker(3)),
            ],
            fallback.clone(),
        );

        let result = orchestrator.transcribe(audio(), Some("en")).await.unwrap();
        assert_eq!(result.text, "b");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(fallback.calls(), 0);

        let chain = orchestrator.chain();
        assert_eq!(chain.breaker_snapshot(ProviderId::Deepgram).unwrap().failure_count, 1);
        let b_state = chain.breaker_snapshot(ProviderId::OpenAi).unwrap();
        assert_eq!(b_state.state, crate::breaker::CircuitState::Closed);
        assert_eq!(b_state.failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_fallback_worthy_failure_propagates_immediately() {
        let a = MockStt::failing("a", bad_request);
        let b = MockStt::ok("b");
        let fallback = MockStt::ok("fallback");
        let orchestrator = stt_chain(
            vec![
                Tier::ready(ProviderId::Deepgram, a.clone() as Arc<dyn SttProvider>, breaker(1)),
                Tier::ready(ProviderId::OpenAi, b.clone() as Arc<dyn SttProvider>, breaker(1)),
            ],
            fallback.clone(),
        );

        let err = orchestrator.transcribe(audio(), None).await.unwrap_err();
        assert!(matches!(err, RelayError::Provider(ProviderError::InvalidRequest(_))));
        assert_eq!(b.calls(), 0);
        assert_eq!(fallback.calls(), 0);
        // Client errors say nothing about provider health.
        assert_eq!(orchestrator.chain().breaker_snapshot(ProviderId::Deepgram).unwrap().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_is_never_invoked() {
        let a = MockStt::failing("a", rate_limited);
        let fallback = MockStt::ok("fallback");
        let orchestrator = stt_chain(
            vec![Tier::ready(ProviderId::Deepgram, a.clone() as Arc<dyn SttProvider>, breaker(1))],
            fallback.clone(),
        );

        orchestrator.transcribe(audio(), None).await.unwrap();
        assert_eq!(a.calls(), 1);
        assert!(orchestrator.chain().attempted_tiers().is_empty());

        for _ in 0..5 {
            let result = orchestrator.transcribe(audio(), None).await.unwrap();
            assert_eq!(result.text, "fallback");
        }
        assert_eq!(a.calls(), 1);
        assert_eq!(fallback.calls(), 6);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(orchestrator.chain().attempted_tiers(), vec![ProviderId::Deepgram]);
        orchestrator.transcribe(audio(), None).await.unwrap();
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_tiers_reach_final_fallback_without_touching_breakers() {
        let fallback = MockStt::ok("fallback");
        let orchestrator = stt_chain(
            vec![
                Tier::absent(ProviderId::Deepgram, breaker(1)),
                Tier::absent(ProviderId::Google, breaker(1)),
            ],
            fallback.clone(),
        );

        for _ in 0..3 {
            assert_eq!(orchestrator.transcribe(audio(), None).await.unwrap().text, "fallback");
        }
        assert_eq!(fallback.calls(), 3);
        for id in [ProviderId::Deepgram, ProviderId::Google] {
            let snapshot = orchestrator.chain().breaker_snapshot(id).unwrap();
            assert_eq!(snapshot.failure_count, 0);
            assert!(snapshot.last_failure.is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_final_fallback_failure() {
        let a = MockStt::failing("a", rate_limited);
        let fallback = MockStt::failing("fallback", || -> RelayError { ProviderError::http(500, "internal").into() });
        let orchestrator = stt_chain(
            vec![Tier::ready(ProviderId::Deepgram, a.clone() as Arc<dyn SttProvider>, breaker(3))],
            fallback.clone(),
        );

        let err = orchestrator.transcribe(audio(), None).await.unwrap_err();
        match &err {
            RelayError::Exhausted { capability, attempts, .. } => {
                assert_eq!(*capability, Capability::Transcribe);
                assert_eq!(*attempts, 2);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(err.status_code(), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_construction_failure_advances() {
        let fallback = MockStt::ok("fallback");
        let broken: crate::providers::Constructor<dyn SttProvider> =
            Arc::new(|_: &ProviderConfig| -> Result<Arc<dyn SttProvider>> {
                Err(RelayError::Configuration("no key".into()))
            });
        let orchestrator = stt_chain(
            vec![Tier::new(
                ProviderId::Google,
                Some(ProviderSlot::lazy(Default::default(), broken)),
                breaker(1),
            )],
            fallback.clone(),
        );

        assert_eq!(orchestrator.transcribe(audio(), None).await.unwrap().text, "fallback");
        assert!(orchestrator.chain().breaker_snapshot(ProviderId::Google).unwrap().is_open);
    }

    struct MockTts {
        name: &'static str,
        failure: Option<SynthesisFailure>,
        calls: AtomicUsize,
    }

    impl MockTts {
        fn new(name: &'static str, failure: Option<SynthesisFailure>) -> Arc<Self> {
            Arc::new(Self {
                name,
                failure,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TtsProvider for MockTts {
        fn name(&self) -> &str {
            self.name
        }

        async fn synthesize(&self, _text: &str, _options: &SynthesisOptions) -> SynthesisResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Some(failure) => SynthesisResult::failed(failure.clone()),
                None => SynthesisResult::new(vec![1u8; 32], AudioFormat::mp3(44100)),
            }
        }
    }

    fn tts_chain(tiers: Vec<Tier<dyn TtsProvider>>, fallback: Arc<MockTts>) -> SynthesisOrchestrator {
        SynthesisOrchestrator::from_tiers(tiers, Some(fallback as Arc<dyn TtsProvider>), ErrorClassifier::default())
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_error_result_counts_as_failure() {
        let a = MockTts::new("a", Some(SynthesisFailure::new(Some(429), "too many requests")));
        let b = MockTts::new("b", None);
        let orchestrator = tts_chain(
            vec![
                Tier::ready(ProviderId::ElevenLabs, a.clone() as Arc<dyn TtsProvider>, breaker(1)),
                Tier::ready(ProviderId::OpenAi, b.clone() as Arc<dyn TtsProvider>, breaker(1)),
            ],
            MockTts::new("fallback", None),
        );

        let result = orchestrator.synthesize("hello", &SynthesisOptions::new("en")).await;
        assert!(result.is_ok());
        assert!(result.has_audio());
        assert_eq!(result.provider.as_deref(), Some("b"));
        assert!(orchestrator.chain().breaker_snapshot(ProviderId::ElevenLabs).unwrap().is_open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_exhaustion_returns_error_bearing_result() {
        let a = MockTts::new("a", Some(SynthesisFailure::new(Some(503), "down")));
        let fallback = MockTts::new("fallback", Some(SynthesisFailure::new(Some(500), "boom")));
        let orchestrator = tts_chain(
            vec![Tier::ready(ProviderId::ElevenLabs, a.clone() as Arc<dyn TtsProvider>, breaker(3))],
            fallback.clone(),
        );

        let result = orchestrator.synthesize("hello", &SynthesisOptions::new("en")).await;
        assert!(!result.has_audio());
        let failure = result.error.unwrap();
        assert_eq!(failure.status, Some(500));
        assert_eq!(failure.message, "boom");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_fatal_error_does_not_panic_or_throw() {
        let a = MockTts::new("a", Some(SynthesisFailure::new(Some(400), "voice not found")));
        let fallback = MockTts::new("fallback", None);
        let orchestrator = tts_chain(
            vec![Tier::ready(ProviderId::ElevenLabs, a.clone() as Arc<dyn TtsProvider>, breaker(1))],
            fallback.clone(),
        );

        let result = orchestrator.synthesize("hello", &SynthesisOptions::new("en")).await;
        assert_eq!(result.error.as_ref().and_then(|f| f.status), Some(400));
        assert!(result.audio_data.is_empty());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    struct MockTranslator {
        outcome: fn() -> Result<TranslationResult>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for MockTranslator {
        fn name(&self) -> &str {
            "mock"
        }

        async fn translate(&self, _text: &str, _source: Option<&str>, _target: &str) -> Result<TranslationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_translation_quota_failure_falls_back() {
        let a = Arc::new(MockTranslator {
            outcome: || -> Result<TranslationResult> {
                Err(ProviderError::ProviderSpecific("Quota exceeded for this month".into()).into())
            },
            calls: AtomicUsize::new(0),
        });
        let fallback = Arc::new(MockTranslator {
            outcome: || -> Result<TranslationResult> { Ok(TranslationResult::new("hola", "es")) },
            calls: AtomicUsize::new(0),
        });
        let orchestrator = TranslationOrchestrator::from_tiers(
            vec![Tier::ready(ProviderId::DeepL, a.clone() as Arc<dyn Translator>, breaker(3))],
            Some(fallback.clone() as Arc<dyn Translator>),
            ErrorClassifier::default(),
        )
        .unwrap();

        let result = orchestrator.translate("hello", Some("en"), "es").await.unwrap();
        assert_eq!(result.text, "hola");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }
}
