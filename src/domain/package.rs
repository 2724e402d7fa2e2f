//! Package — the final artifact handed to `package_and_send` (spec §4.10).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::checkpoint::{Checkpoint, ErrorEntry};
use super::source::Tier;

/// The assembled output of a completed job: every category's extraction,
/// the sources that backed it, a tier breakdown for quick confidence
/// assessment, and any non-fatal errors accumulated along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub job_id: String,
    pub target_entity_name: String,
    pub extractions: HashMap<String, serde_json::Value>,
    pub cross_reference: Option<serde_json::Value>,
    pub sources_by_tier: HashMap<Tier, usize>,
    pub confidence_by_category: HashMap<String, f64>,
    pub errors: Vec<ErrorEntry>,
    pub tokens_used: u64,
}

impl Package {
    /// Builds a package from a completed checkpoint. `cross_reference` is
    /// pulled out of `partial_extractions` under the `cross_reference` key
    /// produced by the step of the same name (spec §4.1's step sequence).
    pub fn from_checkpoint(job_id: impl Into<String>, target_entity_name: impl Into<String>, checkpoint: &Checkpoint) -> Self {
        let mut extractions = checkpoint.partial_extractions.clone();
        let cross_reference = extractions.remove("cross_reference");

        let mut sources_by_tier: HashMap<Tier, usize> = HashMap::new();
        for category_sources in checkpoint.accumulated_sources.values() {
            for tier in category_sources.values() {
                *sources_by_tier.entry(*tier).or_insert(0) += 1;
            }
        }

        let confidence_by_category = extractions
            .keys()
            .map(|category| {
                let confidence = confidence_for_category(checkpoint, category);
                (category.clone(), confidence)
            })
            .collect();

        Self {
            job_id: job_id.into(),
            target_entity_name: target_entity_name.into(),
            extractions,
            cross_reference,
            sources_by_tier,
            confidence_by_category,
            errors: checkpoint.errors.clone(),
            tokens_used: checkpoint.tokens_used,
        }
    }
}

/// A simple confidence heuristic: categories backed by official/primary
/// sources score higher than those backed only by tertiary material. This is
/// diagnostic metadata, never a gate (spec §4.10 treats it as informational).
fn confidence_for_category(checkpoint: &Checkpoint, category: &str) -> f64 {
    let Some(sources) = checkpoint.accumulated_sources.get(category) else {
        return 0.0;
    };
    if sources.is_empty() {
        return 0.0;
    }
    let weighted: f64 = sources
        .values()
        .map(|tier| match tier {
            Tier::Official => 1.0,
            Tier::Primary => 0.7,
            Tier::Tertiary => 0.3,
        })
        .sum();
    (weighted / sources.len() as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::checkpoint::{ErrorKind};

    #[test]
    fn test_package_pulls_cross_reference_out_of_extractions() {
        let mut cp = Checkpoint::new();
        cp.record_extraction("npc_research", serde_json::json!({"npcs": []}));
        cp.record_extraction("cross_reference", serde_json::json!({"links": []}));

        let pkg = Package::from_checkpoint("job-1", "Waterdeep", &cp);
        assert!(pkg.cross_reference.is_some());
        assert!(!pkg.extractions.contains_key("cross_reference"));
        assert!(pkg.extractions.contains_key("npc_research"));
    }

    #[test]
    fn test_package_tallies_sources_by_tier() {
        let mut cp = Checkpoint::new();
        cp.merge_source("npc_research", "https://a", Tier::Official);
        cp.merge_source("npc_research", "https://b", Tier::Tertiary);
        cp.merge_source("lore_research", "https://c", Tier::Official);

        let pkg = Package::from_checkpoint("job-1", "Waterdeep", &cp);
        assert_eq!(pkg.sources_by_tier[&Tier::Official], 2);
        assert_eq!(pkg.sources_by_tier[&Tier::Tertiary], 1);
    }

    #[test]
    fn test_package_carries_errors_and_tokens() {
        let mut cp = Checkpoint::new();
        cp.record_error(ErrorEntry::new("npc_research", ErrorKind::TransientTimeout, "timed out"));
        cp.add_tokens(123);

        let pkg = Package::from_checkpoint("job-1", "Waterdeep", &cp);
        assert_eq!(pkg.errors.len(), 1);
        assert_eq!(pkg.tokens_used, 123);
    }

    #[test]
    fn test_confidence_prefers_official_sources() {
        let mut official_only = Checkpoint::new();
        official_only.record_extraction("lore_research", serde_json::json!({}));
        official_only.merge_source("lore_research", "https://a", Tier::Official);

        let mut tertiary_only = Checkpoint::new();
        tertiary_only.record_extraction("lore_research", serde_json::json!({}));
        tertiary_only.merge_source("lore_research", "https://a", Tier::Tertiary);

        let official_pkg = Package::from_checkpoint("job-1", "x", &official_only);
        let tertiary_pkg = Package::from_checkpoint("job-2", "x", &tertiary_only);
        assert!(official_pkg.confidence_by_category["lore_research"] > tertiary_pkg.confidence_by_category["lore_research"]);
    }
}
