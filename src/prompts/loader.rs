//! Prompt Loader.
//!
//! Loads declarative Handlebars prompt templates from files, falling back to
//! embedded defaults compiled into the binary (spec §4.3 "declarative
//! markdown templates with named placeholders ... never embedded as string
//! literals in code").

use std::path::{Path, PathBuf};

use eyre::{eyre, Result};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Loads and renders prompt templates, checking a user override directory,
/// then a repo-default directory, then embedded fallbacks.
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    user_dir: Option<PathBuf>,
    repo_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// `root` is the working directory used to locate
    /// `.research-pipeline/prompts/` (user overrides) and `prompts/` (repo
    /// defaults).
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let user_dir = root.join(".research-pipeline/prompts");
        let repo_dir = root.join("prompts");

        Self {
            hbs: Handlebars::new(),
            user_dir: if user_dir.exists() { Some(user_dir) } else { None },
            repo_dir: if repo_dir.exists() { Some(repo_dir) } else { None },
        }
    }

    /// A loader that only uses embedded prompts (for tests and for a
    /// minimal deployment with no prompt directory on disk).
    pub fn embedded_only() -> Self {
        Self {
            hbs: Handlebars::new(),
            user_dir: None,
            repo_dir: None,
        }
    }

    fn load_template(&self, name: &str) -> Result<String> {
        if let Some(user_dir) = &self.user_dir {
            let path = user_dir.join(format!("{name}.pmt"));
            if path.exists() {
                debug!(path = %path.display(), "PromptLoader::load_template: loading user override");
                return std::fs::read_to_string(&path).map_err(|e| eyre!("reading user prompt {}: {e}", path.display()));
            }
        }

        if let Some(repo_dir) = &self.repo_dir {
            let path = repo_dir.join(format!("{name}.pmt"));
            if path.exists() {
                debug!(path = %path.display(), "PromptLoader::load_template: loading repo default");
                return std::fs::read_to_string(&path).map_err(|e| eyre!("reading repo prompt {}: {e}", path.display()));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("prompt template not found: {name}"))
    }

    /// Renders template `name` against any serializable context.
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        let template = self.load_template(name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("rendering template {name}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Ctx {
        target_entity_name: String,
    }

    #[test]
    fn test_embedded_only_renders_research_system_prompt() {
        let loader = PromptLoader::embedded_only();
        let rendered = loader
            .render(
                "research_npc",
                &Ctx {
                    target_entity_name: "Waterdeep".to_string(),
                },
            )
            .unwrap();
        assert!(rendered.contains("Waterdeep"));
    }

    #[test]
    fn test_unknown_template_errors() {
        let loader = PromptLoader::embedded_only();
        let result = loader.load_template("nonexistent-template");
        assert!(result.is_err());
    }
}
