//! Head configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::binder::SyncPolicy;
use crate::descriptor::{HeadDescriptor, TitleTemplate};
use crate::error::{HeadError, HeadResult};

/// Viewport used by [`HeadConfig::recommended`].
pub const DEFAULT_VIEWPORT: &str = "width=device-width, initial-scale=1";

/// Application-wide head defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    /// Template seeded into the store before any component declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_template: Option<String>,
    /// Title used when no component provides one. Never templated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_title: Option<String>,
    /// Default charset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Default viewport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<String>,
    /// How changes reach a live document.
    pub sync: SyncPolicy,
}

impl HeadConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// UTF-8 charset and a responsive viewport.
    pub fn recommended() -> Self {
        Self::new()
            .with_charset("utf-8")
            .with_viewport(DEFAULT_VIEWPORT)
    }

    /// Load a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> HeadResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HeadError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Parse TOML.
    pub fn from_toml_str(content: &str) -> HeadResult<Self> {
        toml::from_str(content).map_err(|e| HeadError::Config(format!("invalid TOML: {}", e)))
    }

    /// Parse JSON.
    pub fn from_json_str(content: &str) -> HeadResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| HeadError::Config(format!("invalid JSON: {}", e)))
    }

    /// Set the seed title template.
    pub fn with_title_template(mut self, template: impl Into<String>) -> Self {
        self.title_template = Some(template.into());
        self
    }

    /// Set the fallback title.
    pub fn with_fallback_title(mut self, title: impl Into<String>) -> Self {
        self.fallback_title = Some(title.into());
        self
    }

    /// Set the default charset.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Set the default viewport.
    pub fn with_viewport(mut self, viewport: impl Into<String>) -> Self {
        self.viewport = Some(viewport.into());
        self
    }

    /// Set the sync policy.
    pub fn with_sync(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }

    /// Seed template, if configured.
    pub fn template(&self) -> Option<TitleTemplate> {
        self.title_template.as_deref().map(TitleTemplate::new)
    }

    /// Charset and viewport defaults as a contribution, or `None` when
    /// there are none.
    ///
    /// Registered ahead of every component, so both win under
    /// first-declared precedence. The fallback title is not part of it; the
    /// store applies that only when no contribution has a title.
    pub fn base_descriptor(&self) -> Option<HeadDescriptor> {
        let descriptor = HeadDescriptor {
            charset: self.charset.clone(),
            viewport: self.viewport.clone(),
            ..HeadDescriptor::default()
        };
        (!descriptor.is_empty()).then_some(descriptor)
    }
}
