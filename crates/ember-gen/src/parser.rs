//! Result artifact extraction
//!
//! Completed-job payloads vary by provider and version: clips may sit at the
//! top level, inside arrays, under wrapper keys, or inside JSON that was
//! encoded into a string field (sometimes more than once). Rather than
//! matching a fixed schema, the parser walks the whole tree and collects
//! every object that carries a result URL.

use ember_core::{truncate_snapshot, EmberError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Maximum nesting depth visited
const MAX_DEPTH: usize = 30;
/// Maximum rounds of string-to-JSON decoding per node
const MAX_DECODE_ROUNDS: usize = 3;
const SNAPSHOT_LIMIT: usize = 4096;

const AUDIO_URL_KEYS: &[&str] = &[
    "audio_url",
    "audioUrl",
    "stream_audio_url",
    "streamAudioUrl",
    "source_audio_url",
    "sourceAudioUrl",
];
const VIDEO_URL_KEYS: &[&str] = &["video_url", "videoUrl"];
const ID_KEYS: &[&str] = &["id", "clip_id", "clipId", "audio_id", "audioId"];
const COVER_KEYS: &[&str] = &[
    "image_url",
    "imageUrl",
    "cover_url",
    "coverUrl",
    "image_large_url",
    "imageLargeUrl",
    "source_image_url",
    "sourceImageUrl",
];
const DURATION_KEYS: &[&str] = &["duration", "duration_seconds", "durationSeconds"];
const TITLE_KEYS: &[&str] = &["title", "name"];
/// Keys whose string values are decoded before the generic walk
const WRAPPER_KEYS: &[&str] = &["result", "output", "payload", "data", "response"];

/// Media kind of a clip, decided by which URL alias carried it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    #[default]
    Audio,
    Video,
}

/// One generated result extracted from a job payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    #[serde(default)]
    pub id: Option<String>,
    /// Canonical result URL; two clips with the same URL are the same clip
    pub url: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: ClipKind,
}

/// Extract every clip from `root`, deduplicated by URL (first seen wins).
///
/// Fails with `NoArtifactsFound` if no URL-bearing object exists anywhere
/// in the tree.
pub fn parse_clips(root: &Value) -> Result<Vec<Clip>> {
    let mut collector = ClipCollector::default();
    collector.visit(root, 0);

    if collector.clips.is_empty() {
        let text = serde_json::to_string(root).unwrap_or_default();
        return Err(EmberError::NoArtifactsFound {
            snapshot: truncate_snapshot(&text, SNAPSHOT_LIMIT),
        });
    }
    Ok(collector.clips)
}

#[derive(Default)]
struct ClipCollector {
    seen: HashSet<String>,
    clips: Vec<Clip>,
}

impl ClipCollector {
    fn visit(&mut self, node: &Value, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }

        let decoded = decode_embedded(node);
        let node = decoded.as_ref().unwrap_or(node);

        match node {
            Value::Object(map) => {
                self.collect(map);

                let mut handled: Vec<&str> = Vec::new();
                for key in WRAPPER_KEYS.iter().copied() {
                    if let Some(wrapped) = map.get(key).filter(|v| v.is_string()) {
                        self.visit(wrapped, depth + 1);
                        handled.push(key);
                    }
                }
                for (key, value) in map {
                    if !handled.contains(&key.as_str()) {
                        self.visit(value, depth + 1);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.visit(item, depth + 1);
                }
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {}
        }
    }

    fn collect(&mut self, map: &Map<String, Value>) {
        let (url, kind) = match first_url(map, AUDIO_URL_KEYS) {
            Some(url) => (url, ClipKind::Audio),
            None => match first_url(map, VIDEO_URL_KEYS) {
                Some(url) => (url, ClipKind::Video),
                None => return,
            },
        };
        if !self.seen.insert(url.clone()) {
            return;
        }
        self.clips.push(Clip {
            id: first_string(map, ID_KEYS),
            url,
            cover_url: first_string(map, COVER_KEYS),
            duration: first_number(map, DURATION_KEYS),
            title: first_string(map, TITLE_KEYS),
            kind,
        });
    }
}

/// Decode a string node that holds JSON, up to `MAX_DECODE_ROUNDS` times.
///
/// Returns `None` when the node is not a string, does not look like JSON, or
/// the first decode fails.
fn decode_embedded(node: &Value) -> Option<Value> {
    let Value::String(text) = node else {
        return None;
    };
    if !looks_like_json(text) {
        return None;
    }

    let mut current: Value = serde_json::from_str(text.trim()).ok()?;
    for _ in 1..MAX_DECODE_ROUNDS {
        let Value::String(inner) = &current else {
            break;
        };
        match serde_json::from_str::<Value>(inner.trim()) {
            Ok(next) => current = next,
            Err(_) => break,
        }
    }
    Some(current)
}

/// `{...}` or `[...]`, optionally wrapped once more in quotes
fn looks_like_json(text: &str) -> bool {
    let t = text.trim();
    let bracketed = |s: &str| {
        (s.starts_with('{') && s.ends_with('}')) || (s.starts_with('[') && s.ends_with(']'))
    };
    if bracketed(t) {
        return true;
    }
    t.len() >= 2 && t.starts_with('"') && t.ends_with('"') && bracketed(t[1..t.len() - 1].trim())
}

/// URLs must be non-empty strings; numbers and other scalars never count
fn first_url(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn first_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
