//! Declarative configuration (SPEC_FULL.md §C).
//!
//! `PipelineConfig` is loaded from YAML with a fallback chain: an explicit
//! `--config` path, then `./.research-pipeline.yml`, then
//! `$XDG_CONFIG_HOME/research-pipeline/config.yml`, then built-in defaults —
//! matching the teacher's `Config::load` shape.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// LLM provider/model binding (spec §4.2: "a single free-form string
/// identifies the model and provider").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}
fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_timeout_ms() -> u64 {
    120_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl LlmConfig {
    /// Parses a `provider:model-id` string (the `LLM_MODEL` env var shape,
    /// spec §6) into provider + model, leaving other fields at default.
    pub fn from_provider_model(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((provider, model)) => Self {
                provider: provider.to_string(),
                model: model.to_string(),
                ..Self::default()
            },
            None => Self {
                model: spec.to_string(),
                ..Self::default()
            },
        }
    }
}

/// One tool-set endpoint (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSetConfig {
    pub endpoint: String,
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub tool_prefix: Option<String>,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// Declarative tool-set mapping, resolved with `${VAR}` / `${VAR:-default}`
/// substitution at load time (spec §6, §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(flatten)]
    pub sets: HashMap<String, ToolSetConfig>,
}

impl ToolsConfig {
    fn resolve_env(&mut self) {
        for set in self.sets.values_mut() {
            set.endpoint = substitute_env(&set.endpoint);
        }
    }
}

fn default_tools() -> ToolsConfig {
    let mut sets = HashMap::new();
    sets.insert(
        "search".to_string(),
        ToolSetConfig {
            endpoint: "${TOOL_SEARCH_URL}".to_string(),
            timeout_secs: 30,
            tool_prefix: Some("search".to_string()),
        },
    );
    sets.insert(
        "crawler".to_string(),
        ToolSetConfig {
            endpoint: "${TOOL_CRAWLER_URL}".to_string(),
            timeout_secs: 60,
            tool_prefix: Some("crawler".to_string()),
        },
    );
    sets.insert(
        "summarizer".to_string(),
        ToolSetConfig {
            endpoint: "${TOOL_SUMMARIZER_URL}".to_string(),
            timeout_secs: 120,
            tool_prefix: Some("summarizer".to_string()),
        },
    );
    sets.insert(
        "storage".to_string(),
        ToolSetConfig {
            endpoint: "${TOOL_STORAGE_URL}".to_string(),
            timeout_secs: 30,
            tool_prefix: Some("storage".to_string()),
        },
    );
    ToolsConfig { sets }
}

/// Per-job token accounting defaults (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_budget_tokens")]
    pub default_budget_tokens: u64,
}

fn default_budget_tokens() -> u64 {
    500_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_budget_tokens: default_budget_tokens(),
        }
    }
}

/// Map-reduce summarization tuning (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_max_concurrent_llm_calls")]
    pub max_concurrent_llm_calls: usize,
    #[serde(default = "default_max_reduce_passes")]
    pub max_reduce_passes: usize,
}

fn default_target_tokens() -> usize {
    4_000
}
fn default_chunk_size() -> usize {
    2_000
}
fn default_overlap() -> usize {
    100
}
fn default_max_concurrent_llm_calls() -> usize {
    5
}
fn default_max_reduce_passes() -> usize {
    3
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            target_tokens: default_target_tokens(),
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            max_concurrent_llm_calls: default_max_concurrent_llm_calls(),
            max_reduce_passes: default_max_reduce_passes(),
        }
    }
}

/// Pipeline Engine tuning (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default = "default_minimum_headroom_tokens")]
    pub minimum_headroom_tokens: u64,
    #[serde(default = "default_max_content_blocks")]
    pub max_content_blocks: usize,
    #[serde(default = "default_research_step_timeout_secs")]
    pub research_step_timeout_secs: u64,
    #[serde(default = "default_transform_step_timeout_secs")]
    pub transform_step_timeout_secs: u64,
    #[serde(default = "default_checkpoint_db_path")]
    pub checkpoint_db_path: PathBuf,
    #[serde(default)]
    pub retain_checkpoints_after_completion: bool,
    #[serde(default = "default_child_budget_tokens")]
    pub child_budget_tokens: u64,
}

fn default_minimum_headroom_tokens() -> u64 {
    2_000
}
fn default_max_content_blocks() -> usize {
    10
}
fn default_research_step_timeout_secs() -> u64 {
    300
}
fn default_transform_step_timeout_secs() -> u64 {
    30
}
fn default_checkpoint_db_path() -> PathBuf {
    PathBuf::from("research-pipeline-checkpoints.sqlite3")
}
fn default_child_budget_tokens() -> u64 {
    100_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            minimum_headroom_tokens: default_minimum_headroom_tokens(),
            max_content_blocks: default_max_content_blocks(),
            research_step_timeout_secs: default_research_step_timeout_secs(),
            transform_step_timeout_secs: default_transform_step_timeout_secs(),
            checkpoint_db_path: default_checkpoint_db_path(),
            retain_checkpoints_after_completion: true,
            child_budget_tokens: default_child_budget_tokens(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_tools")]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PipelineConfig {
    /// Loads config from, in order: `explicit_path` if given,
    /// `./.research-pipeline.yml`, `$XDG_CONFIG_HOME/research-pipeline/config.yml`,
    /// or built-in defaults if none exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            info!(path = %path.display(), "PipelineConfig::load: loading from explicit path");
            return Self::load_from_file(path);
        }

        let local = PathBuf::from(".research-pipeline.yml");
        if local.exists() {
            info!("PipelineConfig::load: loading from ./.research-pipeline.yml");
            return Self::load_from_file(&local);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_path = config_dir.join("research-pipeline").join("config.yml");
            if xdg_path.exists() {
                info!(path = %xdg_path.display(), "PipelineConfig::load: loading from XDG config dir");
                return Self::load_from_file(&xdg_path);
            }
        }

        info!("PipelineConfig::load: no config file found, using defaults");
        let mut config = Self::default();
        config.resolve_env();
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Self =
            serde_yaml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))?;
        config.resolve_env();
        Ok(config)
    }

    fn resolve_env(&mut self) {
        debug!("PipelineConfig::resolve_env: called");
        self.tools.resolve_env();

        if let Ok(model_spec) = std::env::var("LLM_MODEL") {
            self.engine.llm = LlmConfig::from_provider_model(&model_spec);
        }
        if let Ok(budget) = std::env::var("DAILY_TOKEN_BUDGET")
            && let Ok(parsed) = budget.parse()
        {
            self.budget.default_budget_tokens = parsed;
        }
    }
}

/// Resolves `${VAR}` and `${VAR:-default}` references against the process
/// environment (spec §6).
fn substitute_env(value: &str) -> String {
    static RE: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").unwrap());

    RE.replace_all(value, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .into_owned()
}

use std::fs;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_env_uses_set_variable() {
        std::env::set_var("RP_TEST_VAR_A", "resolved-value");
        assert_eq!(substitute_env("${RP_TEST_VAR_A}"), "resolved-value");
        std::env::remove_var("RP_TEST_VAR_A");
    }

    #[test]
    fn test_substitute_env_falls_back_to_default() {
        std::env::remove_var("RP_TEST_VAR_B");
        assert_eq!(substitute_env("${RP_TEST_VAR_B:-fallback}"), "fallback");
    }

    #[test]
    fn test_substitute_env_missing_without_default_is_empty() {
        std::env::remove_var("RP_TEST_VAR_C");
        assert_eq!(substitute_env("${RP_TEST_VAR_C}"), "");
    }

    #[test]
    fn test_llm_config_from_provider_model() {
        let config = LlmConfig::from_provider_model("anthropic:claude-sonnet-4-5");
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.model, "claude-sonnet-4-5");
    }

    #[test]
    fn test_resolved_tools_config_substitutes_env() {
        std::env::set_var("TOOL_SEARCH_URL", "https://search.example.com");
        let config = PipelineConfig::load(None).unwrap();
        assert_eq!(config.tools.sets["search"].endpoint, "https://search.example.com");
        std::env::remove_var("TOOL_SEARCH_URL");
    }

    #[test]
    fn test_load_with_missing_file_path_errors() {
        let result = PipelineConfig::load(Some(Path::new("/nonexistent/path.yml")));
        assert!(result.is_err());
    }
}
