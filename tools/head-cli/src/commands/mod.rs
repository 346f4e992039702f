//! CLI command implementations.

pub mod render;
pub mod replay;

use clap::{Args, ValueEnum};

/// Output shape for the render command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    /// Markup for inside `<head>`.
    Html,
    /// Serialized head plus the resolved head as JSON.
    Json,
    /// A complete HTML document.
    Document,
}

/// Arguments for the render command.
#[derive(Args)]
pub struct RenderArgs {
    /// Fixture file (.toml or .json).
    pub fixture: String,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "html")]
    pub format: RenderFormat,
}

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Script file (.toml or .json).
    pub script: String,

    /// Print the final document after the last step.
    #[arg(long)]
    pub show_document: bool,
}
