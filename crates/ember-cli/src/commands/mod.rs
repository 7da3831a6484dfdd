//! CLI command implementations

pub mod gallery;
pub mod generate;
pub mod parse;
pub mod providers;
pub mod vault;

use anyhow::Result;
use ember_gen::EmberConfig;

/// Layered config, falling back to defaults when no file can be read
pub(crate) fn load_config() -> EmberConfig {
    match EmberConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "config not loaded, using defaults");
            EmberConfig::default()
        }
    }
}

pub(crate) fn check_format(format: &str) -> Result<()> {
    match format {
        "json" | "text" => Ok(()),
        _ => anyhow::bail!("Unknown format '{}'. Use: json, text", format),
    }
}
