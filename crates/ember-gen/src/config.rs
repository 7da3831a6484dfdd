//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `EMBER_{PROVIDER}_API_KEY`, `EMBER_{PROVIDER}_API_URL`
//! 2. Project-local: `.ember/config.toml`
//! 3. Global: `~/.ember/config.toml`

use crate::poller::PollPolicy;
use ember_core::{EmberError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const KNOWN_PROVIDERS: &[&str] = &["mock", "http"];

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub submit_path: Option<String>,
    #[serde(default)]
    pub status_path: Option<String>,
    #[serde(default)]
    pub legacy_status_path: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            model: None,
            enabled: true,
            submit_path: None,
            status_path: None,
            legacy_status_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Generation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
        }
    }
}

fn default_provider() -> String {
    "mock".to_string()
}
fn default_model() -> String {
    "V4".to_string()
}

/// Polling schedule, as written in config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_not_found_grace")]
    pub not_found_grace_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            growth_factor: default_growth_factor(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
            not_found_grace_attempts: default_not_found_grace(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    2000
}
fn default_growth_factor() -> f64 {
    1.5
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_timeout_secs() -> u64 {
    180
}
fn default_not_found_grace() -> u32 {
    5
}

impl PollConfig {
    pub fn to_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            growth_factor: self.growth_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            not_found_grace: self.not_found_grace_attempts,
        }
    }
}

/// Where the gallery cache and asset vault live on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_gallery_path")]
    pub gallery_path: PathBuf,
    #[serde(default = "default_vault_path")]
    pub vault_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            gallery_path: default_gallery_path(),
            vault_path: default_vault_path(),
        }
    }
}

fn default_gallery_path() -> PathBuf {
    PathBuf::from(".ember/gallery.json")
}
fn default_vault_path() -> PathBuf {
    PathBuf::from(".ember/vault.json")
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmberConfigFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct EmberConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub generation: GenerationConfig,
    pub poll: PollConfig,
    pub storage: StorageConfig,
}

impl From<EmberConfigFile> for EmberConfig {
    fn from(file: EmberConfigFile) -> Self {
        Self {
            providers: file.providers,
            generation: file.generation,
            poll: file.poll,
            storage: file.storage,
        }
    }
}

impl EmberConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = EmberConfigFile::default();

        // Layer 1: Global config (~/.ember/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        // Layer 2: Project-local config (.ember/config.toml)
        let local_path = PathBuf::from(".ember/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        // Layer 3: Environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(config.into())
    }

    /// Load config from a specific file path only, plus env overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config.into())
    }

    pub fn provider(&self, provider_name: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider_name)
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider_name: &str) -> Option<&str> {
        self.provider(provider_name)
            .and_then(|p| p.api_key.as_deref())
    }

    /// Get API URL for a provider
    pub fn api_url(&self, provider_name: &str) -> Option<&str> {
        self.provider(provider_name)
            .and_then(|p| p.api_url.as_deref())
    }

    /// Model for a provider, falling back to the generation default
    pub fn model(&self, provider_name: &str) -> &str {
        self.provider(provider_name)
            .and_then(|p| p.model.as_deref())
            .unwrap_or(&self.generation.default_model)
    }

    /// Check if a provider is enabled
    pub fn is_enabled(&self, provider_name: &str) -> bool {
        self.provider(provider_name)
            .map(|p| p.enabled)
            .unwrap_or(true)
    }

    pub fn default_provider(&self) -> &str {
        &self.generation.default_provider
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll.to_policy()
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".ember").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<EmberConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let config: EmberConfigFile = toml::from_str(&content).map_err(|e| {
            EmberError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    fn merge_into(base: &mut EmberConfigFile, overlay: EmberConfigFile) {
        for (name, provider) in overlay.providers {
            let entry = base.providers.entry(name).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            if provider.model.is_some() {
                entry.model = provider.model;
            }
            if provider.submit_path.is_some() {
                entry.submit_path = provider.submit_path;
            }
            if provider.status_path.is_some() {
                entry.status_path = provider.status_path;
            }
            if provider.legacy_status_path.is_some() {
                entry.legacy_status_path = provider.legacy_status_path;
            }
            entry.enabled = provider.enabled;
        }

        if overlay.generation.default_provider != default_provider() {
            base.generation.default_provider = overlay.generation.default_provider;
        }
        if overlay.generation.default_model != default_model() {
            base.generation.default_model = overlay.generation.default_model;
        }

        // Whole-section replacement once the overlay departs from defaults
        if overlay.poll != PollConfig::default() {
            base.poll = overlay.poll;
        }
        if overlay.storage.gallery_path != default_gallery_path() {
            base.storage.gallery_path = overlay.storage.gallery_path;
        }
        if overlay.storage.vault_path != default_vault_path() {
            base.storage.vault_path = overlay.storage.vault_path;
        }
    }

    fn apply_env_overrides(config: &mut EmberConfigFile) {
        let mut names: Vec<String> = KNOWN_PROVIDERS.iter().map(|n| n.to_string()).collect();
        for name in config.providers.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        for name in names {
            let prefix = format!("EMBER_{}", name.to_uppercase());
            if let Ok(key) = std::env::var(format!("{}_API_KEY", prefix)) {
                config.providers.entry(name.clone()).or_default().api_key = Some(key);
            }
            if let Ok(url) = std::env::var(format!("{}_API_URL", prefix)) {
                config.providers.entry(name.clone()).or_default().api_url = Some(url);
            }
        }
    }
}
