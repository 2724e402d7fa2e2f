//! Research sources and their reliability tier

use serde::{Deserialize, Serialize};

/// Reliability tier of a research source, as assigned by the tool server
/// that produced it (spec §3/§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Authoritative, first-party material.
    Official,
    /// Reputable secondary coverage.
    Primary,
    /// Community/fan-produced or otherwise unverified material.
    Tertiary,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Official => write!(f, "official"),
            Self::Primary => write!(f, "primary"),
            Self::Tertiary => write!(f, "tertiary"),
        }
    }
}

/// A single citation accumulated during research.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub tier: Tier,
}

impl Source {
    pub fn new(uri: impl Into<String>, tier: Tier) -> Self {
        Self {
            uri: uri.into(),
            tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering_prefers_official() {
        assert!(Tier::Official < Tier::Primary);
        assert!(Tier::Primary < Tier::Tertiary);
    }

    #[test]
    fn test_tier_merge_keeps_highest() {
        let seen = [Tier::Tertiary, Tier::Official, Tier::Primary];
        let best = seen.iter().min().copied().unwrap();
        assert_eq!(best, Tier::Official);
    }
}
