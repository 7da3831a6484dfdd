//! Full generation cycle from the command line

use super::load_config;
use anyhow::{Context, Result};
use ember_asset::{AssetStore, GalleryCache};
use ember_core::{CancelToken, SystemClock};
use ember_gen::providers::create_provider;
use ember_gen::{CycleEvent, CycleRequest, Orchestrator};
use std::sync::Arc;

pub struct GenerateArgs {
    pub prompt: String,
    pub instrumental: bool,
    pub duration: Option<f64>,
    pub owner: Option<String>,
    pub cover: Option<String>,
    pub provider: Option<String>,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let config = load_config();
    let provider_name = args
        .provider
        .as_deref()
        .unwrap_or_else(|| config.default_provider())
        .to_string();
    let provider = create_provider(&provider_name, &config)?;

    let vault_path = config.storage.vault_path.clone();
    let vault = Arc::new(
        AssetStore::load_from_file(&vault_path)
            .with_context(|| format!("Failed to load vault {}", vault_path.display()))?,
    );
    let gallery = Arc::new(GalleryCache::new(&config.storage.gallery_path));

    let orchestrator = Orchestrator::new(
        provider,
        Arc::new(SystemClock::new()),
        config.poll_policy(),
        vault.clone(),
        gallery,
    )
    .with_model(config.model(&provider_name));

    let _progress = orchestrator.subscribe(print_progress);

    let request = CycleRequest {
        prompt: args.prompt,
        instrumental: args.instrumental,
        owner_id: args.owner,
        cover_override: args.cover,
        duration: args.duration,
    };

    println!("Generating via {}...", provider_name);
    let urls = orchestrator.run_full_cycle(&request, &CancelToken::new())?;

    vault
        .save_to_file(&vault_path)
        .with_context(|| format!("Failed to save vault {}", vault_path.display()))?;

    println!("{} clip(s):", urls.len());
    for url in &urls {
        println!("  {}", url);
    }
    Ok(())
}

fn print_progress(event: &CycleEvent) {
    match event {
        CycleEvent::Submitted { task_id, .. } => println!("  Submitted: task {}", task_id),
        CycleEvent::Polling { attempt } => println!("  Waiting... (check {})", attempt),
        CycleEvent::Parsed { count } => println!("  Found {} clip(s)", count),
        CycleEvent::Persisting { index, url } => println!("  Saving #{}: {}", index + 1, url),
        CycleEvent::Done { .. } | CycleEvent::Failed { .. } => {}
    }
}
