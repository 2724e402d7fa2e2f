//! Declarative prompt templates (spec §4.3): research-step system prompts,
//! summarizer map/reduce prompts, and the extraction/repair/cross-reference
//! prompts, loaded with a user-override → repo-default → embedded fallback
//! chain.

mod embedded;
mod loader;

pub use loader::PromptLoader;
