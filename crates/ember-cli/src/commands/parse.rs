//! Run the clip extractor over a saved payload

use super::check_format;
use anyhow::{Context, Result};
use ember_gen::parse_clips;

pub fn run(path: &str, format: &str) -> Result<()> {
    check_format(format)?;
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let payload: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path))?;

    let clips = parse_clips(&payload)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&clips)?);
    } else {
        println!("{} clip(s):\n", clips.len());
        for clip in &clips {
            println!("  {}", clip.url);
            if let Some(title) = &clip.title {
                println!("    Title: {}", title);
            }
            if let Some(duration) = clip.duration {
                println!("    Duration: {:.1}s", duration);
            }
            if let Some(cover) = &clip.cover_url {
                println!("    Cover: {}", cover);
            }
        }
    }
    Ok(())
}
