//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use turbo_head::HeadConfig;

use crate::output::Output;

/// Config files picked up from the working directory tree.
const CONFIG_NAMES: [&str; 3] = ["head.toml", ".head.toml", "head.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// Head configuration shared by all commands.
    pub config: HeadConfig,
    /// Output handler.
    pub output: Output,
}

impl Context {
    /// Load context from an explicit config file or the nearest one found.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let config = match config_path {
            Some(path) => HeadConfig::load(path)
                .with_context(|| format!("Failed to load config file: {}", path))?,
            None => {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                match Self::find_config(&cwd) {
                    Some(path) => {
                        output.debug(&format!("Using config {}", path.display()));
                        HeadConfig::load(&path).with_context(|| {
                            format!("Failed to load config file: {}", path.display())
                        })?
                    }
                    None => HeadConfig::default(),
                }
            }
        };

        Ok(Self { config, output })
    }

    /// Find a config file in the directory tree.
    fn find_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let candidate = current.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }

            if !current.pop() {
                return None;
            }
        }
    }
}
