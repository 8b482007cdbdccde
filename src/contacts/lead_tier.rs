use serde::{Deserialize, Serialize};

pub const HOT_THRESHOLD: i32 = 80;
pub const WARM_THRESHOLD: i32 = 50;
pub const COLD_THRESHOLD: i32 = 20;

/// Coarse bucket derived from a contact's lead score.
///
/// This is the only place the thresholds live; the dashboard histogram, the
/// contact responses and the AI scoring endpoint all go through
/// [`LeadTier::from_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadTier {
    Hot,
    Warm,
    Cold,
    New,
}

impl LeadTier {
    pub fn from_score(score: i32) -> Self {
        if score >= HOT_THRESHOLD {
            Self::Hot
        } else if score >= WARM_THRESHOLD {
            Self::Warm
        } else if score >= COLD_THRESHOLD {
            Self::Cold
        } else {
            Self::New
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::Warm => "Warm",
            Self::Cold => "Cold",
            Self::New => "New",
        }
    }
}

impl std::fmt::Display for LeadTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
