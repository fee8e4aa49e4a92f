use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use babelrelay_core::{AudioFormat, Capability, RelayError};

use crate::breaker::BreakerConfig;
use crate::providers::{ProviderId, TierSelection};
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub preferences: Preferences,

    #[serde(default)]
    pub resilience: ResilienceConfig,

    #[serde(flatten)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Tier-selection overrides and chain ordering.
///
/// Each `*_provider` value is `"auto"`, a provider identifier (only that tier is tried
/// before the final fallback) or `"max:<free|paid|expensive>"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub stt_provider: Option<String>,
    pub tts_provider: Option<String>,
    pub translation_provider: Option<String>,
    #[serde(default)]
    pub optimize_for: OptimizationStrategy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationStrategy {
    Cost,
    Latency,
    Quality,
    #[default]
    Balanced,
}

impl std::fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cost => write!(f, "cost"),
            Self::Latency => write!(f, "latency"),
            Self::Quality => write!(f, "quality"),
            Self::Balanced => write!(f, "balanced"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub streaming: StreamingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub open_threshold: u32,
    pub base_cooldown_ms: u64,
    pub max_cooldown_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            open_threshold: 3,
            base_cooldown_ms: 30_000,
            max_cooldown_ms: 300_000,
        }
    }
}

impl BreakerSettings {
    pub fn to_breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            open_threshold: self.open_threshold,
            base_cooldown: Duration::from_millis(self.base_cooldown_ms),
            max_cooldown: Duration::from_millis(self.max_cooldown_ms),
        }
    }
}

/// Additions to the built-in fallback-worthy status codes and message needles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub extra_statuses: Vec<u16>,
    pub extra_messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Below this many buffered bytes a processing pass is skipped.
    pub min_chunk_bytes: usize,
    /// Above this many buffered bytes only the most recent bytes are kept.
    pub max_buffer_bytes: usize,
    pub max_inactivity_ms: u64,
    pub eviction_interval_ms: u64,
    /// Label for buffers whose container cannot be sniffed.
    pub default_format: AudioFormat,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            min_chunk_bytes: 8_000,
            // 30 seconds of 16 kHz mono 16-bit PCM
            max_buffer_bytes: 960_000,
            max_inactivity_ms: 60_000,
            eviction_interval_ms: 30_000,
            default_format: AudioFormat::pcm16(16000),
        }
    }
}

impl StreamingSettings {
    pub fn max_inactivity(&self) -> Duration {
        Duration::from_millis(self.max_inactivity_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Simple(HashMap<String, serde_json::Value>),
    Detailed {
        api_key: Option<String>,
        #[serde(flatten)]
        extra: HashMap<String, serde_json::Value>,
    },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::Simple(HashMap::new())
    }
}

impl ProviderConfig {
    pub fn get_api_key(&self) -> Option<String> {
        match self {
            Self::Simple(map) => map
                .get("api_key")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            Self::Detailed { api_key, .. } => api_key.clone(),
        }
    }

    pub fn get_value(&self, key: &str) -> Option<&serde_json::Value> {
        match self {
            Self::Simple(map) => map.get(key),
            Self::Detailed { extra, .. } => extra.get(key),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.get_api_key()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }

    /// Per-provider override of the breaker open threshold.
    pub fn open_threshold(&self) -> Option<u32> {
        self.get_value("open_threshold")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
    }
}

impl RelayConfig {
    pub fn new() -> std::result::Result<Self, ConfigError> {
        let mut config = Config::builder();

        // Check for config file in standard locations
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("babelrelay").join("config");
            for ext in &["toml", "json", "yaml", "yml"] {
                let file_path = config_path.with_extension(ext);
                if file_path.exists() {
                    config = config.add_source(File::from(file_path));
                }
            }
        }

        // Check current directory
        for filename in &[".babelrelay", "babelrelay"] {
            for ext in &["toml", "json", "yaml", "yml"] {
                let file_path = PathBuf::from(format!("{}.{}", filename, ext));
                if file_path.exists() {
                    config = config.add_source(File::from(file_path));
                }
            }
        }

        config = add_env_sources(config)?;

        config.build()?.try_deserialize()
    }

    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::new()
    }

    pub fn from_map(map: HashMap<String, serde_json::Value>) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(map.into_iter().collect()))
    }

    pub fn get_provider_config(&self, provider: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(provider.as_str())
    }

    pub fn has_credentials(&self, provider: ProviderId) -> bool {
        self.get_provider_config(provider)
            .map(ProviderConfig::has_credentials)
            .unwrap_or(false)
    }

    pub fn set_api_key(&mut self, provider: ProviderId, api_key: impl Into<String>) {
        self.providers.insert(
            provider.as_str().to_string(),
            ProviderConfig::Detailed {
                api_key: Some(api_key.into()),
                extra: HashMap::new(),
            },
        );
    }

    pub fn get_optimization_strategy(&self) -> OptimizationStrategy {
        self.preferences.optimize_for
    }

    /// The parsed tier-selection override for `capability`; unset means `Auto`.
    pub fn tier_selection(&self, capability: Capability) -> Result<TierSelection> {
        let raw = match capability {
            Capability::Transcribe => self.preferences.stt_provider.as_deref(),
            Capability::Synthesize => self.preferences.tts_provider.as_deref(),
            Capability::Translate => self.preferences.translation_provider.as_deref(),
        };
        let selection = match raw {
            Some(value) => value.parse::<TierSelection>()?,
            None => TierSelection::Auto,
        };
        if let TierSelection::Only(id) = selection {
            if !id.supports(capability) {
                return Err(RelayError::Configuration(format!(
                    "provider '{}' cannot {}",
                    id, capability
                )));
            }
        }
        Ok(selection)
    }

    /// Breaker settings for one provider, honouring its `open_threshold` override.
    pub fn breaker_config_for(&self, provider: ProviderId) -> BreakerConfig {
        let mut breaker = self.resilience.breaker.to_breaker_config();
        if let Some(threshold) = self
            .get_provider_config(provider)
            .and_then(ProviderConfig::open_threshold)
        {
            breaker.open_threshold = threshold;
        }
        breaker
    }

    /// Rejects unknown identifiers and inconsistent tunables before anything is built.
    pub fn validate(&self) -> Result<()> {
        for capability in Capability::ALL {
            self.tier_selection(capability)?;
        }

        for name in self.providers.keys() {
            let id: ProviderId = name.parse()?;
            if let Some(threshold) = self.get_provider_config(id).and_then(ProviderConfig::open_threshold) {
                if threshold == 0 {
                    return Err(RelayError::Configuration(format!(
                        "{}.open_threshold must be at least 1",
                        id
                    )));
                }
            }
        }

        let breaker = &self.resilience.breaker;
        if breaker.open_threshold == 0 {
            return Err(RelayError::Configuration(
                "resilience.breaker.open_threshold must be at least 1".to_string(),
            ));
        }
        if breaker.base_cooldown_ms > breaker.max_cooldown_ms {
            return Err(RelayError::Configuration(format!(
                "resilience.breaker.base_cooldown_ms ({}) exceeds max_cooldown_ms ({})",
                breaker.base_cooldown_ms, breaker.max_cooldown_ms
            )));
        }

        let streaming = &self.resilience.streaming;
        if streaming.max_buffer_bytes == 0 {
            return Err(RelayError::Configuration(
                "resilience.streaming.max_buffer_bytes must be positive".to_string(),
            ));
        }
        if streaming.eviction_interval_ms == 0 {
            return Err(RelayError::Configuration(
                "resilience.streaming.eviction_interval_ms must be positive".to_string(),
            ));
        }
        if streaming.max_inactivity_ms == 0 {
            return Err(RelayError::Configuration(
                "resilience.streaming.max_inactivity_ms must be positive".to_string(),
            ));
        }
        if streaming.min_chunk_bytes > streaming.max_buffer_bytes {
            return Err(RelayError::Configuration(format!(
                "resilience.streaming.min_chunk_bytes ({}) exceeds max_buffer_bytes ({})",
                streaming.min_chunk_bytes, streaming.max_buffer_bytes
            )));
        }

        Ok(())
    }
}

const CREDENTIAL_ENV_VARS: [(&str, ProviderId); 7] = [
    ("OPENAI_API_KEY", ProviderId::OpenAi),
    ("DEEPGRAM_API_KEY", ProviderId::Deepgram),
    ("SONIOX_API_KEY", ProviderId::Soniox),
    ("ELEVENLABS_API_KEY", ProviderId::ElevenLabs),
    ("GOOGLE_API_KEY", ProviderId::Google),
    ("AZURE_SPEECH_KEY", ProviderId::Azure),
    ("DEEPL_API_KEY", ProviderId::DeepL),
];

fn add_env_sources(
    mut config: config::ConfigBuilder<config::builder::DefaultState>,
) -> std::result::Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    config = config.add_source(
        Environment::with_prefix("BABELRELAY")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    for (var, provider) in CREDENTIAL_ENV_VARS {
        if let Ok(api_key) = env::var(var) {
            config = config.set_override(format!("{}.api_key", provider.as_str()), api_key)?;
        }
    }

    if let Ok(region) = env::var("AZURE_SPEECH_REGION") {
        config = config.set_override("azure.region", region)?;
    }

    Ok(config)
}

// Standalone builder so callers can layer their own sources on top
pub fn config_from_env() -> std::result::Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    add_env_sources(Config::builder())
}
