//! Error handling and edge case tests that cut across modules

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::ProviderConfig;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct FailingStt(fn() -> RelayError);

    #[async_trait]
    impl SttProvider for FailingStt {
        fn name(&self) -> &str {
            "failing"
        }

        async fn transcribe(&self, _audio: AudioData, _language: Option<&str>) -> Result<TranscriptionResult> {
            Err((self.0)())
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn translate(&self, _text: &str, _source: Option<&str>, _target: &str) -> Result<TranslationResult> {
            Err(ProviderError::Unavailable("translation backend offline".to_string()).into())
        }
    }

    fn quick_breaker() -> BreakerConfig {
        BreakerConfig {
            open_threshold: 2,
            base_cooldown: Duration::from_secs(1),
            max_cooldown: Duration::from_secs(4),
        }
    }

    #[test]
    fn test_relay_error_types() {
        let config_error = RelayError::Configuration("Invalid API key".to_string());
        assert!(matches!(config_error, RelayError::Configuration(_)));
        assert!(config_error.to_string().contains("Invalid API key"));

        let provider_error = RelayError::Provider(ProviderError::Network("Connection failed".to_string()));
        assert!(provider_error.to_string().contains("Connection failed"));

        let session_error = RelayError::Session("Session not found".to_string());
        assert!(matches!(session_error, RelayError::Session(_)));
    }

    #[test]
    fn test_exhausted_error_is_not_fallback_worthy_by_status_alone() {
        let classifier = ErrorClassifier::default();
        let inner = RelayError::Provider(ProviderError::InvalidRequest("bad sample rate".to_string()));
        let exhausted = RelayError::Exhausted {
            capability: Capability::Transcribe,
            attempts: 1,
            source: Box::new(inner),
        };
        assert_eq!(exhausted.status_code(), Some(400));
        assert!(!classifier.classify(&exhausted));
    }

    #[test]
    fn test_configuration_errors_propagate() {
        let classifier = ErrorClassifier::default();
        assert!(!classifier.classify(&RelayError::Configuration("missing region".to_string())));
    }

    #[test]
    fn test_synthesis_failure_keeps_status_and_message() {
        let error = RelayError::Provider(ProviderError::http(402, "billing hard limit reached"));
        let failure = SynthesisFailure::from(&error);
        assert_eq!(failure.status, Some(402));
        assert!(failure.to_string().starts_with("HTTP 402"));

        let untyped = RelayError::Other("socket closed".to_string());
        let failure = SynthesisFailure::from(&untyped);
        assert_eq!(failure.status, None);
        assert_eq!(failure.to_string(), "socket closed");
    }

    #[test]
    fn test_audio_data_edge_cases() {
        let audio = AudioData::new(Vec::<u8>::new(), AudioFormat::wav(16000));
        assert!(audio.is_empty());

        let audio = AudioData::new(vec![0u8; 1_000_000], AudioFormat::pcm16(16000));
        assert_eq!(audio.len(), 1_000_000);
    }

    #[test]
    fn test_synthesis_result_edge_cases() {
        let empty = SynthesisResult::new(Vec::<u8>::new(), AudioFormat::wav(8000));
        assert!(empty.is_ok());
        assert!(!empty.has_audio());
        assert_eq!(empty.size_bytes, 0);

        let large = SynthesisResult::new(vec![0u8; 10_000_000], AudioFormat::wav(48000));
        assert_eq!(large.size_bytes, 10_000_000);
    }

    #[test]
    fn test_invalid_provider_table_fails_build() {
        let mut config = RelayConfig::default();
        config.providers.insert(
            "invalid".to_string(),
            ProviderConfig::Simple({
                let mut map = std::collections::HashMap::new();
                map.insert("api_key".to_string(), serde_json::json!("invalid_value"));
                map
            }),
        );

        let result = VoiceProcessor::builder()
            .config(config)
            .final_stt(Arc::new(FailingStt(|| RelayError::Other("unused".to_string()))))
            .build();
        assert!(matches!(result, Err(RelayError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chain_reports_every_attempt() {
        let tiers: Vec<Tier<dyn SttProvider>> = vec![
            Tier::ready(
                ProviderId::Deepgram,
                Arc::new(FailingStt(|| ProviderError::RateLimit.into())) as Arc<dyn SttProvider>,
                quick_breaker(),
            ),
            Tier::ready(
                ProviderId::OpenAi,
                Arc::new(FailingStt(|| ProviderError::Timeout.into())) as Arc<dyn SttProvider>,
                quick_breaker(),
            ),
            Tier::absent(ProviderId::Google, quick_breaker()),
        ];
        let orchestrator = TranscriptionOrchestrator::from_tiers(
            tiers,
            Some(Arc::new(FailingStt(|| ProviderError::http(503, "overloaded").into()))),
            ErrorClassifier::default(),
        )
        .unwrap();

        let audio = AudioData::new(vec![0u8; 8], AudioFormat::pcm16(16000));
        let err = orchestrator.transcribe(audio, Some("en")).await.unwrap_err();
        match &err {
            RelayError::Exhausted { attempts, .. } => assert_eq!(*attempts, 3),
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert!(matches!(
            err.last_failure(),
            RelayError::Provider(ProviderError::Http { status: 503, .. })
        ));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_translation_exhaustion_carries_capability() {
        let orchestrator = TranslationOrchestrator::from_tiers(
            vec![Tier::absent(ProviderId::DeepL, quick_breaker())],
            Some(Arc::new(FailingTranslator)),
            ErrorClassifier::default(),
        )
        .unwrap();

        let err = orchestrator.translate("hello", None, "de").await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::Exhausted {
                capability: Capability::Translate,
                attempts: 1,
                ..
            }
        ));
        assert!(err.to_string().contains("translation backend offline"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_cooldown_resets_after_success_through_chain() {
        struct Flaky {
            healthy: std::sync::atomic::AtomicBool,
        }

        #[async_trait]
        impl SttProvider for Flaky {
            fn name(&self) -> &str {
                "flaky"
            }

            async fn transcribe(&self, _audio: AudioData, _language: Option<&str>) -> Result<TranscriptionResult> {
                if self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
                    Ok(TranscriptionResult::new("ok", 1.0))
                } else {
                    Err(ProviderError::http(500, "server error").into())
                }
            }
        }

        let flaky = Arc::new(Flaky {
            healthy: std::sync::atomic::AtomicBool::new(false),
        });
        let orchestrator = TranscriptionOrchestrator::from_tiers(
            vec![Tier::ready(ProviderId::Soniox, flaky.clone() as Arc<dyn SttProvider>, quick_breaker())],
            Some(Arc::new(FailingStt(|| RelayError::Other("fallback".to_string())))),
            ErrorClassifier::default(),
        )
        .unwrap();
        let audio = || AudioData::new(vec![0u8; 8], AudioFormat::pcm16(16000));

        for _ in 0..3 {
            let _ = orchestrator.transcribe(audio(), None).await;
            tokio::time::advance(Duration::from_secs(4)).await;
        }
        let snapshot = orchestrator.chain().breaker_snapshot(ProviderId::Soniox).unwrap();
        assert_eq!(snapshot.failure_count, 3);

        flaky.healthy.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(orchestrator.transcribe(audio(), None).await.unwrap().text, "ok");

        flaky.healthy.store(false, std::sync::atomic::Ordering::SeqCst);
        let _ = orchestrator.transcribe(audio(), None).await;
        let _ = orchestrator.transcribe(audio(), None).await;
        let snapshot = orchestrator.chain().breaker_snapshot(ProviderId::Soniox).unwrap();
        assert_eq!(snapshot.failure_count, 2);
        assert_eq!(snapshot.next_retry, snapshot.last_failure.map(|t| t + Duration::from_secs(1)));
    }

    #[test]
    fn test_result_type_alias() {
        let success: Result<String> = Ok("success".to_string());
        assert_eq!(success.unwrap(), "success");

        let failure: Result<String> = Err(RelayError::Configuration("failed".to_string()));
        assert!(failure.is_err());
    }
}
