//! CLI command handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use devin_config::LoadedConfig;

pub mod ask;
pub mod config;
pub mod parse;
pub mod run;
pub mod tools;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Overrides the user config directory.
    pub config_dir: Option<PathBuf>,
}

impl Context {
    /// Load and validate config layers for `project_dir` (default: cwd).
    pub fn load_config(&self, project_dir: Option<&Path>) -> Result<LoadedConfig> {
        let loaded = devin_config::load_config_with_options(project_dir, self.config_dir.as_deref())
            .context("Failed to load configuration")?;
        for warning in &loaded.warnings {
            tracing::warn!("{}", warning);
        }
        loaded.config.validate().context("Invalid configuration")?;
        Ok(loaded)
    }
}
