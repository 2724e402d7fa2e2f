//! The concrete lore-research step sequence (spec §4.1): five agent-driven
//! research steps, a schema-guided extraction, a cross-reference check, a
//! depth-gated zone-discovery step, and terminal package assembly.
//!
//! The engine itself is domain-agnostic (`crate::engine`); this module is
//! the one place that names the reference sequence and wires concrete
//! handlers to it, per spec §4.1's "parameterize the step list so alternate
//! domains can substitute steps without modifying the engine".

mod cross_reference;
mod discover;
mod extract;
mod package_and_send;
mod research;
pub mod sink;

use std::sync::Arc;
use std::time::Duration;

use crate::agent::{AgentRuntime, Field, FieldType, Schema};
use crate::engine::{StepClassification, StepDefinition};
use crate::prompts::PromptLoader;
use crate::summarizer::Summarizer;

use cross_reference::CrossReferenceStep;
use discover::DiscoverConnectedZonesStep;
use extract::ExtractAllStep;
use package_and_send::PackageAndSendStep;
use research::ResearchStep;
use sink::{JobEnqueuer, PackageSink};

const RESEARCH_CATEGORIES: &[(&str, &str)] = &[
    ("zone_overview_research", "research_zone_overview"),
    ("npc_research", "research_npc"),
    ("faction_research", "research_faction"),
    ("lore_research", "research_lore"),
    ("narrative_items_research", "research_narrative_items"),
];

/// The schema `extract_all` guides and validates against: one object per
/// research category, each carrying a confidence score (spec §4.5).
pub fn reference_extraction_schema() -> Schema {
    let category_fields = RESEARCH_CATEGORIES
        .iter()
        .map(|(category, _)| {
            Field::new(
                *category,
                FieldType::Object {
                    schema: Schema::new(vec![
                        Field::new("summary", FieldType::String, "concise synthesis of this category's findings"),
                        Field::new(
                            "entities",
                            FieldType::SequenceOf { item: Box::new(FieldType::String) },
                            "named entities identified in this category",
                        ),
                        Field::new("confidence", FieldType::Float, "extraction confidence in [0, 1]"),
                    ]),
                },
                "research category extraction",
            )
        })
        .collect();
    Schema::new(category_fields)
}

/// Tunables for building the reference step sequence, gathered from
/// [`crate::config::PipelineConfig`] at startup.
pub struct StepsConfig {
    pub research_step_timeout: Duration,
    pub transform_step_timeout: Duration,
    pub research_max_tokens: u32,
    pub extraction_max_tokens: u32,
    pub summarization_target_tokens: usize,
    pub child_budget_tokens: u64,
}

/// Builds the reference 9-step lore-research sequence (spec §4.1).
pub fn build_default_steps(
    agent: Arc<AgentRuntime>,
    summarizer: Arc<Summarizer>,
    prompts: Arc<PromptLoader>,
    package_sink: Arc<dyn PackageSink>,
    job_enqueuer: Arc<dyn JobEnqueuer>,
    config: StepsConfig,
) -> Vec<StepDefinition> {
    let mut steps = Vec::with_capacity(9);

    for (category, prompt_name) in RESEARCH_CATEGORIES {
        let handler = Arc::new(ResearchStep::new(category, prompt_name, agent.clone(), prompts.clone(), config.research_max_tokens));
        steps.push(StepDefinition::new(*category, StepClassification::Research, config.research_step_timeout, handler));
    }

    steps.push(StepDefinition::new(
        "extract_all",
        StepClassification::Extraction,
        config.research_step_timeout,
        Arc::new(ExtractAllStep::new(
            agent.clone(),
            summarizer,
            prompts.clone(),
            reference_extraction_schema(),
            config.extraction_max_tokens,
            config.summarization_target_tokens,
        )),
    ));

    steps.push(StepDefinition::new(
        "cross_reference",
        StepClassification::Extraction,
        config.transform_step_timeout,
        Arc::new(CrossReferenceStep::new(agent.clone(), prompts.clone(), config.extraction_max_tokens)),
    ));

    steps.push(
        StepDefinition::new(
            "discover_connected_zones",
            StepClassification::Research,
            config.research_step_timeout,
            Arc::new(DiscoverConnectedZonesStep::new(
                agent,
                prompts,
                job_enqueuer,
                config.extraction_max_tokens,
                config.child_budget_tokens,
            )),
        )
        .with_guard(discover::guard),
    );

    steps.push(StepDefinition::new(
        "package_and_send",
        StepClassification::Transform,
        config.transform_step_timeout,
        Arc::new(PackageAndSendStep::new(package_sink)),
    ));

    steps
}
