use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{OptimizationStrategy, ProviderConfig, RelayConfig};
use crate::orchestrator::Tier;
use crate::Result;
use babelrelay_core::{Capability, RelayError, SttProvider, Translator, TtsProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Free,
    Paid,
    Expensive,
}

impl std::fmt::Display for CostTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Paid => write!(f, "paid"),
            Self::Expensive => write!(f, "expensive"),
        }
    }
}

impl FromStr for CostTier {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "paid" => Ok(Self::Paid),
            "expensive" => Ok(Self::Expensive),
            other => Err(RelayError::Configuration(format!("unknown cost tier '{}'", other))),
        }
    }
}

/// Every backend the relay knows how to slot into a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "deepgram")]
    Deepgram,
    #[serde(rename = "soniox")]
    Soniox,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "azure")]
    Azure,
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
    #[serde(rename = "whisper")]
    Whisper,
    #[serde(rename = "deepl")]
    DeepL,
}

impl ProviderId {
    pub const ALL: [ProviderId; 8] = [
        Self::OpenAi,
        Self::Deepgram,
        Self::Soniox,
        Self::Google,
        Self::Azure,
        Self::ElevenLabs,
        Self::Whisper,
        Self::DeepL,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Deepgram => "deepgram",
            Self::Soniox => "soniox",
            Self::Google => "google",
            Self::Azure => "azure",
            Self::ElevenLabs => "elevenlabs",
            Self::Whisper => "whisper",
            Self::DeepL => "deepl",
        }
    }

    pub fn cost_tier(&self) -> CostTier {
        match self {
            Self::Whisper => CostTier::Free,
            Self::OpenAi | Self::Deepgram | Self::Soniox | Self::DeepL => CostTier::Paid,
            Self::Google | Self::Azure | Self::ElevenLabs => CostTier::Expensive,
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Self::OpenAi | Self::Google | Self::Azure => &[Transcribe, Synthesize, Translate],
            Self::Deepgram => &[Transcribe, Synthesize],
            Self::Soniox | Self::Whisper => &[Transcribe],
            Self::ElevenLabs => &[Synthesize],
            Self::DeepL => &[Translate],
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Local engines run without an API key.
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, Self::Whisper)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| RelayError::Configuration(format!("unknown provider '{}'", s.trim())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierSelection {
    /// Every configured tier in strategy order.
    Auto,
    /// Only this tier, then the final fallback.
    Only(ProviderId),
    /// Every configured tier whose cost does not exceed the bound.
    MaxCost(CostTier),
}

impl TierSelection {
    pub fn admits(&self, id: ProviderId) -> bool {
        match self {
            Self::Auto => true,
            Self::Only(only) => *only == id,
            Self::MaxCost(max) => id.cost_tier() <= *max,
        }
    }
}

impl FromStr for TierSelection {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        if let Some(tier) = value.strip_prefix("max:") {
            return Ok(Self::MaxCost(tier.parse()?));
        }
        Ok(Self::Only(value.parse()?))
    }
}

/// Chain order for `capability` under `strategy`, before selection and configuration.
pub fn default_order(capability: Capability, strategy: OptimizationStrategy) -> Vec<ProviderId> {
    use ProviderId::*;
    let preferred: &[ProviderId] = match (capability, strategy) {
        (_, OptimizationStrategy::Cost) => {
            let mut ids: Vec<ProviderId> = ProviderId::ALL
                .into_iter()
                .filter(|id| id.supports(capability))
                .collect();
            ids.sort_by_key(|id| id.cost_tier());
            return ids;
        }
        (Capability::Transcribe, OptimizationStrategy::Latency) => &[Deepgram, Soniox, OpenAi, Google, Azure, Whisper],
        (Capability::Transcribe, OptimizationStrategy::Quality) => &[Google, Azure, Deepgram, OpenAi, Soniox, Whisper],
        (Capability::Transcribe, OptimizationStrategy::Balanced) => &[Deepgram, OpenAi, Google, Soniox, Azure, Whisper],
        (Capability::Synthesize, OptimizationStrategy::Latency) => &[OpenAi, Deepgram, ElevenLabs, Google, Azure],
        (Capability::Synthesize, OptimizationStrategy::Quality) => &[ElevenLabs, Azure, Google, OpenAi, Deepgram],
        (Capability::Synthesize, OptimizationStrategy::Balanced) => &[OpenAi, Google, ElevenLabs, Azure, Deepgram],
        (Capability::Translate, OptimizationStrategy::Latency) => &[DeepL, OpenAi, Google, Azure],
        (Capability::Translate, OptimizationStrategy::Quality) => &[DeepL, Google, Azure, OpenAi],
        (Capability::Translate, OptimizationStrategy::Balanced) => &[DeepL, Google, OpenAi, Azure],
    };
    preferred.to_vec()
}

pub type Constructor<P> = Arc<dyn Fn(&ProviderConfig) -> Result<Arc<P>> + Send + Sync>;

enum Registration<P: ?Sized> {
    Handle(Arc<P>),
    Constructor(Constructor<P>),
}

impl<P: ?Sized> Clone for Registration<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Handle(handle) => Self::Handle(handle.clone()),
            Self::Constructor(init) => Self::Constructor(init.clone()),
        }
    }
}

/// A configured tier's provider, either built up front or on first use.
pub enum ProviderSlot<P: ?Sized> {
    Ready(Arc<P>),
    Lazy {
        config: ProviderConfig,
        init: Constructor<P>,
        cell: OnceCell<Arc<P>>,
    },
}

impl<P: ?Sized> ProviderSlot<P> {
    pub fn ready(provider: Arc<P>) -> Self {
        Self::Ready(provider)
    }

    pub fn lazy(config: ProviderConfig, init: Constructor<P>) -> Self {
        Self::Lazy {
            config,
            init,
            cell: OnceCell::new(),
        }
    }

    /// The provider handle; a lazy slot runs its constructor the first time only.
    /// A failed construction is retried on the next call.
    pub async fn get(&self) -> Result<Arc<P>> {
        match self {
            Self::Ready(provider) => Ok(provider.clone()),
            Self::Lazy { config, init, cell } => cell
                .get_or_try_init(|| async { init(config) })
                .await
                .cloned(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        match self {
            Self::Ready(_) => true,
            Self::Lazy { cell, .. } => cell.initialized(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Ready,
    Lazy,
    MissingCredentials,
    NotRegistered,
    /// Filtered out by the tier-selection override.
    Excluded,
}

impl SlotStatus {
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Ready | Self::Lazy)
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Lazy => write!(f, "lazy"),
            Self::MissingCredentials => write!(f, "missing credentials"),
            Self::NotRegistered => write!(f, "not registered"),
            Self::Excluded => write!(f, "excluded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub id: ProviderId,
    pub cost: CostTier,
    pub status: SlotStatus,
}

/// What a chain looked like when it was built: one entry per candidate provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub capability: Capability,
    pub selection: TierSelection,
    pub entries: Vec<ChainEntry>,
}

impl ChainReport {
    pub fn configured(&self) -> Vec<ProviderId> {
        self.entries
            .iter()
            .filter(|e| e.status.is_configured())
            .map(|e| e.id)
            .collect()
    }

    pub fn status_of(&self, id: ProviderId) -> Option<SlotStatus> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.status)
    }

    pub fn log(&self) {
        let configured = self.configured();
        if configured.is_empty() {
            warn!(
                capability = %self.capability,
                "No {} tiers configured; every call goes to the final fallback",
                self.capability
            );
        } else {
            info!(
                capability = %self.capability,
                tiers = ?configured,
                "Built {} chain",
                self.capability
            );
        }
        for entry in &self.entries {
            debug!(
                capability = %self.capability,
                provider = %entry.id,
                cost = %entry.cost,
                status = %entry.status,
                "Chain slot"
            );
        }
    }
}

/// Provider handles and constructors, owned by the composition root and consulted once
/// when chains are built.
#[derive(Default)]
pub struct ProviderRegistry {
    stt: HashMap<ProviderId, Registration<dyn SttProvider>>,
    tts: HashMap<ProviderId, Registration<dyn TtsProvider>>,
    translators: HashMap<ProviderId, Registration<dyn Translator>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_stt(&mut self, id: ProviderId, provider: Arc<dyn SttProvider>) -> &mut Self {
        self.stt.insert(id, Registration::Handle(provider));
        self
    }

    pub fn register_stt_lazy<F>(&mut self, id: ProviderId, init: F) -> &mut Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn SttProvider>> + Send + Sync + 'static,
    {
        let init: Constructor<dyn SttProvider> = Arc::new(init);
        self.stt.insert(id, Registration::Constructor(init));
        self
    }

    pub fn register_tts(&mut self, id: ProviderId, provider: Arc<dyn TtsProvider>) -> &mut Self {
        self.tts.insert(id, Registration::Handle(provider));
        self
    }

    pub fn register_tts_lazy<F>(&mut self, id: ProviderId, init: F) -> &mut Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn TtsProvider>> + Send + Sync + 'static,
    {
        let init: Constructor<dyn TtsProvider> = Arc::new(init);
        self.tts.insert(id, Registration::Constructor(init));
        self
    }

    pub fn register_translator(&mut self, id: ProviderId, provider: Arc<dyn Translator>) -> &mut Self {
        self.translators.insert(id, Registration::Handle(provider));
        self
    }

    pub fn register_translator_lazy<F>(&mut self, id: ProviderId, init: F) -> &mut Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn Translator>> + Send + Sync + 'static,
    {
        let init: Constructor<dyn Translator> = Arc::new(init);
        self.translators.insert(id, Registration::Constructor(init));
        self
    }

    pub fn list_providers(&self, capability: Capability) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = match capability {
            Capability::Transcribe => self.stt.keys().copied().collect(),
            Capability::Synthesize => self.tts.keys().copied().collect(),
            Capability::Translate => self.translators.keys().copied().collect(),
        };
        ids.sort_by_key(|id| id.as_str());
        ids
    }

    pub fn stt_chain(&self, config: &RelayConfig) -> Result<(Vec<Tier<dyn SttProvider>>, ChainReport)> {
        build_chain(&self.stt, Capability::Transcribe, config)
    }

    pub fn tts_chain(&self, config: &RelayConfig) -> Result<(Vec<Tier<dyn TtsProvider>>, ChainReport)> {
        build_chain(&self.tts, Capability::Synthesize, config)
    }

    pub fn translation_chain(&self, config: &RelayConfig) -> Result<(Vec<Tier<dyn Translator>>, ChainReport)> {
        build_chain(&self.translators, Capability::Translate, config)
    }
}

fn build_chain<P: ?Sized>(
    registrations: &HashMap<ProviderId, Registration<P>>,
    capability: Capability,
    config: &RelayConfig,
) -> Result<(Vec<Tier<P>>, ChainReport)> {
    let selection = config.tier_selection(capability)?;
    let order = match selection {
        // An explicit pick may sit outside the strategy's usual order.
        TierSelection::Only(id) => vec![id],
        _ => default_order(capability, config.get_optimization_strategy()),
    };

    for id in registrations.keys() {
        if !id.supports(capability) {
            return Err(RelayError::Configuration(format!(
                "provider '{}' registered for {} but cannot {}",
                id, capability, capability
            )));
        }
    }

    let mut tiers = Vec::new();
    let mut entries = Vec::new();

    for id in order {
        if !selection.admits(id) {
            entries.push(ChainEntry { id, cost: id.cost_tier(), status: SlotStatus::Excluded });
            continue;
        }

        let provider_config = config.get_provider_config(id).cloned().unwrap_or_default();
        let (slot, status) = match registrations.get(&id) {
            None => (None, SlotStatus::NotRegistered),
            Some(_) if id.requires_credentials() && !provider_config.has_credentials() => {
                (None, SlotStatus::MissingCredentials)
            }
            Some(Registration::Handle(provider)) => (Some(ProviderSlot::ready(provider.clone())), SlotStatus::Ready),
            Some(Registration::Constructor(init)) => {
                (Some(ProviderSlot::lazy(provider_config, init.clone())), SlotStatus::Lazy)
            }
        };

        tiers.push(Tier::new(id, slot, config.breaker_config_for(id)));
        entries.push(ChainEntry { id, cost: id.cost_tier(), status });
    }

    let report = ChainReport {
        capability,
        selection,
        entries,
    };
    Ok((tiers, report))
}
