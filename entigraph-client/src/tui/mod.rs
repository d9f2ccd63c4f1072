pub mod entities;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Renders `value` for the structured output formats. `None` for `Table`,
/// which each command prints itself.
pub fn render<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<Option<String>> {
    let rendered = match format {
        OutputFormat::Table => return Ok(None),
        OutputFormat::Json => serde_json::to_string_pretty(value).context("Failed to encode JSON")?,
        OutputFormat::Yaml => serde_yaml::to_string(value).context("Failed to encode YAML")?,
    };
    Ok(Some(rendered))
}
