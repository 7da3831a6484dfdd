//! Provider registry
//!
//! Maps provider names to concrete implementations.

pub mod http;
pub mod mock;

use crate::config::EmberConfig;
use crate::provider::MediaProvider;
use ember_core::{EmberError, Result};
use std::sync::Arc;

/// Create a provider by name with configuration
pub fn create_provider(name: &str, config: &EmberConfig) -> Result<Arc<dyn MediaProvider>> {
    if !config.is_enabled(name) {
        return Err(EmberError::ConfigError(format!(
            "Provider '{}' is disabled in config",
            name
        )));
    }
    match name {
        "mock" => Ok(Arc::new(mock::MockProvider::new())),
        http::PROVIDER_NAME => Ok(Arc::new(http::HttpMediaProvider::from_config(config)?)),
        _ => Err(EmberError::ConfigError(format!(
            "Unknown provider '{}'. Available: {}",
            name,
            available_providers().join(", ")
        ))),
    }
}

/// List all available provider names
pub fn available_providers() -> Vec<&'static str> {
    vec!["mock", http::PROVIDER_NAME]
}
