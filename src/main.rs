//! Research Pipeline Core
//!
//! CLI entry point: loads configuration, wires the Agent Runtime, Tool
//! Clients, Summarizer and Checkpoint Store into the reference step
//! sequence, and drives a single job through the Pipeline Engine.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use research_pipeline_core::agent::{self, AgentRuntime, LlmClient};
use research_pipeline_core::cli::{Cli, Command, OutputFormat};
use research_pipeline_core::config::PipelineConfig;
use research_pipeline_core::domain::{Job, Package};
use research_pipeline_core::engine::Engine;
use research_pipeline_core::prompts::PromptLoader;
use research_pipeline_core::status::StatusPublisher;
use research_pipeline_core::steps::sink::LoggingSink;
use research_pipeline_core::steps::{build_default_steps, StepsConfig};
use research_pipeline_core::store::CheckpointStore;
use research_pipeline_core::summarizer::Summarizer;
use research_pipeline_core::toolclient::ToolClient;

fn setup_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    info!(provider = %config.engine.llm.provider, model = %config.engine.llm.model, "research-pipeline: starting");

    match cli.command {
        Some(Command::Run {
            job_id,
            target,
            depth,
            budget,
            format,
        }) => run_job(&config, job_id, target, depth, budget, format).await,
        Some(Command::Status { job_id, format }) => show_status(&config, job_id, format).await,
        None => {
            println!("research-pipeline v{}", env!("CARGO_PKG_VERSION"));
            println!("  LLM: {} ({})", config.engine.llm.provider, config.engine.llm.model);
            println!("  Default budget: {} tokens", config.budget.default_budget_tokens);
            Ok(())
        }
    }
}

fn build_agent_runtime(config: &PipelineConfig, llm: Arc<dyn LlmClient>) -> AgentRuntime {
    let mut runtime = AgentRuntime::new(llm, config.engine.llm.model.clone());

    for (name, tool_set) in &config.tools.sets {
        if tool_set.endpoint.is_empty() {
            continue;
        }
        let prefix = tool_set.tool_prefix.clone().unwrap_or_else(|| name.clone());
        let client = Arc::new(ToolClient::new(tool_set.endpoint.clone(), prefix.clone()));
        let timeout = Duration::from_secs(tool_set.timeout_secs);
        // Tool manifests are fetched from each server's `list_tools` endpoint
        // in a full deployment; registering with an empty definition set here
        // still lets already-known tool names resolve through the prefix map.
        runtime.register_tool_set(prefix, client, timeout, timeout, Vec::new());
    }

    runtime
}

async fn run_job(
    config: &PipelineConfig,
    job_id: String,
    target: String,
    depth: Option<u32>,
    budget: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let llm = agent::create_client(&config.engine.llm).context("constructing LLM client")?;
    let agent = Arc::new(build_agent_runtime(config, llm.clone()));
    let prompts = Arc::new(PromptLoader::new("."));
    let summarizer = Arc::new(Summarizer::new(
        llm,
        config.engine.llm.model.clone(),
        prompts.clone(),
        config.summarizer.max_concurrent_llm_calls,
        config.summarizer.chunk_size,
        config.summarizer.overlap,
        config.summarizer.max_reduce_passes,
    ));

    let steps_config = StepsConfig {
        research_step_timeout: Duration::from_secs(config.engine.research_step_timeout_secs),
        transform_step_timeout: Duration::from_secs(config.engine.transform_step_timeout_secs),
        research_max_tokens: config.engine.llm.max_tokens,
        extraction_max_tokens: config.engine.llm.max_tokens,
        summarization_target_tokens: config.summarizer.target_tokens,
        child_budget_tokens: config.engine.child_budget_tokens,
    };

    let sink = Arc::new(LoggingSink);
    let steps = build_default_steps(agent, summarizer, prompts, sink.clone(), sink, steps_config);

    let store = CheckpointStore::spawn(&config.engine.checkpoint_db_path).context("opening checkpoint store")?;
    let engine = Engine::new(
        steps,
        store,
        StatusPublisher::noop(),
        config.engine.minimum_headroom_tokens,
        config.engine.retain_checkpoints_after_completion,
    );

    let mut job = Job::new(job_id, target, budget.unwrap_or(config.budget.default_budget_tokens));
    if let Some(depth) = depth {
        job = job.with_depth(depth);
    }

    let package = engine.run(&job).await.context("running job")?;
    print_package(&package, &format);
    Ok(())
}

async fn show_status(config: &PipelineConfig, job_id: String, format: OutputFormat) -> Result<()> {
    let store = CheckpointStore::spawn(&config.engine.checkpoint_db_path).context("opening checkpoint store")?;
    match store.load(&job_id).await.context("loading checkpoint")? {
        Some(checkpoint) => {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&checkpoint)?),
                _ => {
                    println!("job:            {job_id}");
                    println!("status:         {:?}", checkpoint.status);
                    println!("step index:     {}", checkpoint.current_step_index);
                    println!("tokens used:    {}", checkpoint.tokens_used);
                    println!("errors logged:  {}", checkpoint.errors.len());
                }
            }
            Ok(())
        }
        None => {
            println!("no checkpoint found for job '{job_id}'");
            Ok(())
        }
    }
}

fn print_package(package: &Package, format: &OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(package) {
                println!("{json}");
            }
        }
        _ => {
            println!("job:             {}", package.job_id);
            println!("target:          {}", package.target_entity_name);
            println!("tokens used:     {}", package.tokens_used);
            println!("categories:      {}", package.extractions.len());
            println!("errors:          {}", package.errors.len());
            for (category, confidence) in &package.confidence_by_category {
                println!("  {category}: confidence {confidence:.2}");
            }
        }
    }
}
