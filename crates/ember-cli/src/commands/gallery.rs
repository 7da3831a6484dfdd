//! Gallery cache commands

use super::{check_format, load_config};
use anyhow::Result;
use clap::Subcommand;
use ember_asset::GalleryCache;

#[derive(Subcommand)]
pub enum GalleryCommands {
    /// List cached tracks, newest first
    List {
        /// Output format (json or text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Remove every cached track
    Clear,
}

pub fn run(cmd: GalleryCommands) -> Result<()> {
    let config = load_config();
    let cache = GalleryCache::new(&config.storage.gallery_path);

    match cmd {
        GalleryCommands::List { format } => run_list(&cache, &format),
        GalleryCommands::Clear => {
            cache.clear()?;
            println!("Gallery cleared ({}).", cache.path().display());
            Ok(())
        }
    }
}

fn run_list(cache: &GalleryCache, format: &str) -> Result<()> {
    check_format(format)?;
    let tracks = cache.read();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&tracks)?);
        return Ok(());
    }

    if tracks.is_empty() {
        println!("No tracks in {}", cache.path().display());
        return Ok(());
    }

    println!("{} track(s):\n", tracks.len());
    for track in &tracks {
        let duration = track
            .duration
            .map(|d| format!(" {:.0}s", d))
            .unwrap_or_default();
        println!(
            "  {} [{}]{}{}",
            track.title,
            track.prompt_signature,
            duration,
            if track.instrumental { " (instrumental)" } else { "" }
        );
        println!("    {}  {}", track.created_at.format("%Y-%m-%d %H:%M"), track.url);
    }
    Ok(())
}
