//! Fixture and script files.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use turbo_head::{HeadConfig, HeadDescriptor};

/// Server render input: a list of contributions in registration order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    /// Overrides the CLI config when present.
    #[serde(default)]
    pub config: Option<HeadConfig>,
    /// Contributions in registration order.
    #[serde(default)]
    pub contributions: Vec<HeadDescriptor>,
    /// Body markup for `--format document`.
    #[serde(default)]
    pub body: Option<String>,
}

impl Fixture {
    pub fn load(path: &str) -> Result<Self> {
        load_file(path)
    }
}

/// Client lifecycle script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Overrides the CLI config when present.
    #[serde(default)]
    pub config: Option<HeadConfig>,
    /// Server-rendered head the document starts with.
    #[serde(default)]
    pub hydrate: Option<Vec<HeadDescriptor>>,
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &str) -> Result<Self> {
        load_file(path)
    }
}

/// One scripted lifecycle event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Step {
    /// Register a contribution under a script-local id.
    Register {
        id: String,
        #[serde(default)]
        owner: Option<String>,
        head: HeadDescriptor,
    },
    /// Replace a contribution's descriptor.
    Update { id: String, head: HeadDescriptor },
    /// Withdraw a contribution.
    Withdraw { id: String },
    /// Tear down an owner and everything registered under it.
    Teardown { owner: String },
    /// The component tree mounted.
    Mount,
    /// End of tick for batched sync.
    Flush,
    /// A new render pass begins.
    Pass,
}

impl Step {
    /// Short description for progress output.
    pub fn describe(&self) -> String {
        match self {
            Self::Register { id, owner: Some(owner), .. } => {
                format!("register {} (owner {})", id, owner)
            }
            Self::Register { id, owner: None, .. } => format!("register {}", id),
            Self::Update { id, .. } => format!("update {}", id),
            Self::Withdraw { id } => format!("withdraw {}", id),
            Self::Teardown { owner } => format!("teardown {}", owner),
            Self::Mount => "mount".to_string(),
            Self::Flush => "flush".to_string(),
            Self::Pass => "pass".to_string(),
        }
    }
}

fn load_file<T: DeserializeOwned>(path: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))?;
    parse(&content, Path::new(path))
}

fn parse<T: DeserializeOwned>(content: &str, path: &Path) -> Result<T> {
    if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(content)
            .with_context(|| format!("Failed to parse JSON: {}", path.display()))
    } else {
        toml::from_str(content).with_context(|| format!("Failed to parse TOML: {}", path.display()))
    }
}
