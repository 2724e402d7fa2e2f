//! Checkpoint — the durable, resumable state of a single job (spec §3, §6).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::source::Tier;

/// Caps how many accumulated content blocks are kept per category so a
/// long-running job's checkpoint doesn't grow without bound (spec §4.1
/// "accumulated content ... bounded").
const MAX_CONTENT_BLOCKS_PER_CATEGORY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

/// Classification used both for checkpoint error entries and for deciding
/// whether an engine failure is retryable (spec §7, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransientTransport,
    TransientRateLimit,
    TransientTimeout,
    PermanentSchema,
    PermanentBudget,
    PermanentInternal,
}

impl ErrorKind {
    /// Whether a step that failed with this error kind may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientTransport | Self::TransientRateLimit | Self::TransientTimeout
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub step_name: String,
    pub error_kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEntry {
    pub fn new(step_name: impl Into<String>, error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            error_kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The per-job state document the engine loads, mutates between steps, and
/// persists atomically (spec §4.7). Everything here must be reconstructible
/// from a single load — there is no hidden in-memory state the engine keeps
/// about a job across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub current_step_index: usize,
    pub completed_step_names: Vec<String>,
    pub accumulated_content: HashMap<String, VecDeque<String>>,
    pub accumulated_sources: HashMap<String, HashMap<String, Tier>>,
    pub partial_extractions: HashMap<String, serde_json::Value>,
    pub errors: Vec<ErrorEntry>,
    pub tokens_used: u64,
    pub status: CheckpointStatus,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self {
            current_step_index: 0,
            completed_step_names: Vec::new(),
            accumulated_content: HashMap::new(),
            accumulated_sources: HashMap::new(),
            partial_extractions: HashMap::new(),
            errors: Vec::new(),
            tokens_used: 0,
            status: CheckpointStatus::Running,
        }
    }

    /// Records a step as complete. Maintains the
    /// `current_step_index == completed_step_names.len()` invariant (spec §6).
    pub fn mark_step_completed(&mut self, step_name: impl Into<String>) {
        self.completed_step_names.push(step_name.into());
        self.current_step_index = self.completed_step_names.len();
        debug_assert_eq!(self.current_step_index, self.completed_step_names.len());
    }

    pub fn has_completed(&self, step_name: &str) -> bool {
        self.completed_step_names.iter().any(|s| s == step_name)
    }

    /// Appends a content block for `category`, evicting the oldest block if
    /// the per-category cap is exceeded.
    pub fn push_content(&mut self, category: impl Into<String>, text: impl Into<String>) {
        let blocks = self.accumulated_content.entry(category.into()).or_default();
        blocks.push_back(text.into());
        while blocks.len() > MAX_CONTENT_BLOCKS_PER_CATEGORY {
            blocks.pop_front();
        }
    }

    /// Merges a discovered source into a category, keeping the highest tier
    /// seen for a given URI (spec §4.1).
    pub fn merge_source(&mut self, category: impl Into<String>, uri: impl Into<String>, tier: Tier) {
        let sources = self.accumulated_sources.entry(category.into()).or_default();
        sources
            .entry(uri.into())
            .and_modify(|existing| {
                if tier < *existing {
                    *existing = tier;
                }
            })
            .or_insert(tier);
    }

    pub fn record_extraction(&mut self, category: impl Into<String>, value: serde_json::Value) {
        self.partial_extractions.insert(category.into(), value);
    }

    pub fn record_error(&mut self, entry: ErrorEntry) {
        self.errors.push(entry);
    }

    pub fn add_tokens(&mut self, tokens: u64) {
        self.tokens_used = self.tokens_used.saturating_add(tokens);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, CheckpointStatus::Completed | CheckpointStatus::Failed)
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}
