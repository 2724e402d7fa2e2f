//! Job requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of research work submitted by an external dispatcher (spec §3).
///
/// `job_id` is assigned by the caller, not generated here — the engine treats
/// it as an opaque idempotency key: running the same `job_id` twice resumes
/// from its checkpoint rather than starting over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub target_entity_name: String,
    #[serde(default)]
    pub depth: Option<u32>,
    pub budget_tokens: u64,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, target_entity_name: impl Into<String>, budget_tokens: u64) -> Self {
        Self {
            job_id: job_id.into(),
            target_entity_name: target_entity_name.into(),
            depth: None,
            budget_tokens,
            created_at: Utc::now(),
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_defaults_to_no_depth() {
        let job = Job::new("job-1", "Waterdeep", 50_000);
        assert_eq!(job.depth, None);
        assert_eq!(job.budget_tokens, 50_000);
    }

    #[test]
    fn test_job_with_depth() {
        let job = Job::new("job-1", "Waterdeep", 50_000).with_depth(2);
        assert_eq!(job.depth, Some(2));
    }

    #[test]
    fn test_job_roundtrips_through_json() {
        let job = Job::new("job-1", "Waterdeep", 50_000);
        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: Job = serde_json::from_str(&encoded).unwrap();
        assert_eq!(job, decoded);
    }
}
