//! TOML parser for deliter.toml with helpful error messages

use super::Registry;
use super::schema::RegistryConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Load the registry from a deliter.toml file
pub fn load_registry(path: &Path) -> Result<Registry> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry file: {}", path.display()))?;

    parse_registry_str(&content)
        .with_context(|| format!("Failed to parse registry file: {}", path.display()))
}

/// Parse deliter.toml content from string
pub fn parse_registry_str(content: &str) -> Result<Registry> {
    let config: RegistryConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(Registry::new(config))
}

/// Enhance TOML parsing errors with the offending line and its neighbours
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.message().to_string();

    let line_num = error
        .span()
        .map(|span| content[..span.start.min(content.len())].matches('\n').count() + 1);

    match line_num {
        Some(line_num) => anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            error_msg
        ),
        None => anyhow::anyhow!("TOML parsing error: {}", error_msg),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2).min(lines.len());
    let end = (line_num + 1).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
