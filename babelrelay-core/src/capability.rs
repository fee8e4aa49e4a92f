use serde::{Deserialize, Serialize};

/// The kind of work a provider performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Transcribe,
    Synthesize,
    Translate,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Self::Transcribe, Self::Synthesize, Self::Translate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Synthesize => "synthesize",
            Self::Translate => "translate",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
