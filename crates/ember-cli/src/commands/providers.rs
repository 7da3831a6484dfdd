//! Provider listing

use super::load_config;
use anyhow::Result;
use ember_gen::providers::{available_providers, create_provider};
use ember_gen::ProviderStatus;

pub fn run() -> Result<()> {
    let config = load_config();
    let default = config.default_provider();

    println!("{} provider(s):\n", available_providers().len());
    for name in available_providers() {
        let status = match create_provider(name, &config) {
            Ok(provider) => match provider.health_check() {
                ProviderStatus::Available => "available".to_string(),
                ProviderStatus::NoApiKey => "no API key".to_string(),
                ProviderStatus::Unavailable(reason) => format!("unavailable: {}", reason),
            },
            Err(e) => format!("not configured: {}", e),
        };
        let marker = if name == default { " (default)" } else { "" };
        println!("  {}{} - {}", name, marker, status);
    }
    Ok(())
}
