//! Asset vault commands

use super::{check_format, load_config};
use anyhow::{Context, Result};
use clap::Subcommand;
use ember_asset::{AssetRecord, AssetStore, AssetType};
use std::path::Path;

#[derive(Subcommand)]
pub enum VaultCommands {
    /// List saved assets
    List {
        /// Filter by asset type (text, image, video, audio)
        #[arg(long, rename_all = "lowercase")]
        r#type: Option<String>,

        /// Filter by owner id
        #[arg(long)]
        owner: Option<String>,

        /// Output format (json or text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Delete one asset by id
    Delete {
        /// Asset id
        id: String,
    },

    /// Remove every asset
    Clear,

    /// Write the vault to a JSON file
    Export {
        /// Output path
        path: String,
    },

    /// Append assets from a JSON file
    Import {
        /// Input path
        path: String,
    },
}

pub fn run(cmd: VaultCommands) -> Result<()> {
    let config = load_config();
    let vault_path = config.storage.vault_path.as_path();
    let store = AssetStore::load_from_file(vault_path)
        .with_context(|| format!("Failed to load vault {}", vault_path.display()))?;

    match cmd {
        VaultCommands::List {
            r#type,
            owner,
            format,
        } => run_list(&store, r#type, owner, &format),
        VaultCommands::Delete { id } => {
            if store.delete(&id) {
                persist(&store, vault_path)?;
                println!("Deleted {}", id);
            } else {
                println!("No asset with id {}", id);
            }
            Ok(())
        }
        VaultCommands::Clear => {
            let count = store.len();
            store.clear();
            persist(&store, vault_path)?;
            println!("Removed {} asset(s).", count);
            Ok(())
        }
        VaultCommands::Export { path } => {
            std::fs::write(&path, store.export_json()?)
                .with_context(|| format!("Failed to write {}", path))?;
            println!("Exported {} asset(s) to {}", store.len(), path);
            Ok(())
        }
        VaultCommands::Import { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path))?;
            let added = store.import_json(&content)?;
            persist(&store, vault_path)?;
            println!("Imported {} asset(s) from {}", added, path);
            Ok(())
        }
    }
}

fn persist(store: &AssetStore, path: &Path) -> Result<()> {
    store
        .save_to_file(path)
        .with_context(|| format!("Failed to save vault {}", path.display()))
}

fn run_list(
    store: &AssetStore,
    type_filter: Option<String>,
    owner: Option<String>,
    format: &str,
) -> Result<()> {
    check_format(format)?;
    let type_filter = type_filter.as_deref().map(str::parse::<AssetType>).transpose()?;

    let records: Vec<AssetRecord> = store
        .list()
        .into_iter()
        .filter(|r| type_filter.map_or(true, |t| r.asset_type == t))
        .filter(|r| owner.as_deref().map_or(true, |o| r.owner_id.as_deref() == Some(o)))
        .collect();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No assets found.");
        return Ok(());
    }

    println!("{} asset(s):\n", records.len());
    for record in &records {
        println!("  {} ({}) {}", record.id, record.asset_type, record.title);
        println!("    {}", record.payload);
    }
    Ok(())
}
