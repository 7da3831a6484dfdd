//! Durable gallery cache of generated audio tracks
//!
//! The cache is a single JSON file holding an array of [`PersistedTrack`]s,
//! deduplicated by URL and sorted newest-first. It is a browsing aid, not a
//! source of truth: a missing or corrupt file reads as an empty gallery.

use chrono::{DateTime, Utc};
use ember_core::{Listeners, Result, Subscription};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// On-disk shape of one cached audio track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTrack {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
    /// Short human-readable prefix of the originating prompt
    #[serde(default)]
    pub prompt_signature: String,
    #[serde(default)]
    pub instrumental: bool,
    /// Fields written by other versions, kept so a rewrite never drops them
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// File-backed gallery cache with a process-local change event
pub struct GalleryCache {
    path: PathBuf,
    write_lock: Mutex<()>,
    listeners: Listeners<[PersistedTrack]>,
}

impl GalleryCache {
    /// Create a cache backed by the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            listeners: Listeners::new(),
        }
    }

    /// Default cache location
    pub fn default_cache() -> Self {
        Self::new(".ember/gallery.json")
    }

    /// Path of the durable slot
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all cached tracks. Missing or unreadable data yields an empty list.
    ///
    /// Individual entries that do not match the track shape are skipped.
    pub fn read(&self) -> Vec<PersistedTrack> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "gallery cache unreadable");
                return Vec::new();
            }
        };

        let entries: Vec<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "gallery cache corrupt, ignoring");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<PersistedTrack>(entry) {
                Ok(track) => Some(track),
                Err(e) => {
                    debug!(error = %e, "skipping malformed gallery entry");
                    None
                }
            })
            .collect()
    }

    /// Merge `tracks` into the cache and write it back in one step.
    ///
    /// Entries are keyed by URL; incoming tracks replace existing ones with
    /// the same URL. Returns the merged collection, newest first.
    pub fn upsert(&self, tracks: &[PersistedTrack]) -> Result<Vec<PersistedTrack>> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut by_url: HashMap<String, PersistedTrack> = self
            .read()
            .into_iter()
            .map(|t| (t.url.clone(), t))
            .collect();
        for track in tracks {
            by_url.insert(track.url.clone(), track.clone());
        }

        let mut merged: Vec<PersistedTrack> = by_url.into_values().collect();
        sort_newest_first(&mut merged);
        self.write_all(&merged)?;

        debug!(
            path = %self.path.display(),
            incoming = tracks.len(),
            total = merged.len(),
            "gallery cache updated"
        );
        // Still under the write lock so observers see writes in order
        self.listeners.emit(&merged);
        Ok(merged)
    }

    /// Remove every cached track
    pub fn clear(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.write_all(&[])?;
        let empty: Vec<PersistedTrack> = Vec::new();
        self.listeners.emit(&empty);
        Ok(())
    }

    /// Find a cached track by its exact URL
    pub fn find_by_url(&self, url: &str) -> Option<PersistedTrack> {
        self.read().into_iter().find(|t| t.url == url)
    }

    /// Number of cached tracks
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a listener fired after every successful write.
    ///
    /// Listeners run while the cache is locked for writing; they may read
    /// it but must not write to it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[PersistedTrack]) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Write the whole collection to a sibling temp file, then rename it over the slot
    fn write_all(&self, tracks: &[PersistedTrack]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "gallery.json".to_string());
        let tmp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        let content = serde_json::to_string_pretty(tracks)?;
        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            std::fs::remove_file(&tmp).ok();
            return Err(e.into());
        }
        Ok(())
    }
}

fn sort_newest_first(tracks: &mut [PersistedTrack]) {
    tracks.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.url.cmp(&b.url))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ember_gallery_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn track(url: &str, title: &str, secs: i64) -> PersistedTrack {
        PersistedTrack {
            id: format!("clip-{}", secs),
            url: url.to_string(),
            title: title.to_string(),
            cover_url: None,
            duration: Some(30.0),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            prompt_signature: "Lo-fi café ambience".to_string(),
            instrumental: true,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = temp_dir();
        let cache = GalleryCache::new(dir.join("gallery.json"));
        assert!(cache.read().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_read_corrupt_file_is_empty() {
        let dir = temp_dir();
        let path = dir.join("gallery.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cache = GalleryCache::new(&path);
        assert!(cache.read().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_upsert_dedups_by_url_and_sorts_newest_first() {
        let dir = temp_dir();
        let cache = GalleryCache::new(dir.join("gallery.json"));

        cache
            .upsert(&[track("https://cdn.example/a.mp3", "old title", 1), track("https://cdn.example/b.mp3", "b", 2)])
            .unwrap();
        let merged = cache
            .upsert(&[track("https://cdn.example/a.mp3", "new title", 3)])
            .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url, "https://cdn.example/a.mp3");
        assert_eq!(merged[0].title, "new title");
        assert_eq!(merged[1].url, "https://cdn.example/b.mp3");
        assert_eq!(cache.read(), merged);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let dir = temp_dir();
        let cache = GalleryCache::new(dir.join("gallery.json"));
        let batch = vec![track("https://cdn.example/a.mp3", "a", 1), track("https://cdn.example/b.mp3", "b", 1)];

        let once = cache.upsert(&batch).unwrap();
        let twice = cache.upsert(&batch).unwrap();
        assert_eq!(once, twice);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_upsert_order_independent_for_disjoint_batches() {
        let dir = temp_dir();
        let a = vec![track("https://cdn.example/a.mp3", "a", 5)];
        let b = vec![track("https://cdn.example/b.mp3", "b", 9), track("https://cdn.example/c.mp3", "c", 1)];

        let first = GalleryCache::new(dir.join("ab.json"));
        first.upsert(&a).unwrap();
        let ab = first.upsert(&b).unwrap();

        let second = GalleryCache::new(dir.join("ba.json"));
        second.upsert(&b).unwrap();
        let ba = second.upsert(&a).unwrap();

        assert_eq!(ab, ba);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let dir = temp_dir();
        let path = dir.join("gallery.json");
        std::fs::write(
            &path,
            r#"[{"id":"x","url":"https://cdn.example/x.mp3","title":"x","createdAt":"2024-01-01T00:00:00Z","promptSignature":"p","instrumental":false,"lyrics":"la la"}]"#,
        )
        .unwrap();

        let cache = GalleryCache::new(&path);
        cache.upsert(&[track("https://cdn.example/a.mp3", "a", 1)]).unwrap();

        let kept = cache.find_by_url("https://cdn.example/x.mp3").unwrap();
        assert_eq!(kept.extra.get("lyrics").and_then(|v| v.as_str()), Some("la la"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let dir = temp_dir();
        let path = dir.join("gallery.json");
        std::fs::write(
            &path,
            r#"[{"id":"x","url":"https://cdn.example/x.mp3","createdAt":"2024-01-01T00:00:00Z"},{"title":"no url"}]"#,
        )
        .unwrap();

        let cache = GalleryCache::new(&path);
        assert_eq!(cache.len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_change_event_fires_after_write() {
        let dir = temp_dir();
        let cache = GalleryCache::new(dir.join("gallery.json"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = cache.subscribe(move |tracks| sink.lock().unwrap().push(tracks.len()));

        cache.upsert(&[track("https://cdn.example/a.mp3", "a", 1)]).unwrap();
        cache.clear().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 0]);
        assert!(cache.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_concurrent_upserts_lose_nothing() {
        let dir = temp_dir();
        let cache = Arc::new(GalleryCache::new(dir.join("gallery.json")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let url = format!("https://cdn.example/{}.mp3", i);
                    cache.upsert(&[track(&url, "t", i)]).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 8);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_slow_observer_ends_on_latest_write() {
        let dir = temp_dir();
        let cache = Arc::new(GalleryCache::new(dir.join("gallery.json")));

        let last_len = Arc::new(Mutex::new(0usize));
        let seen = Arc::clone(&last_len);
        let _sub = cache.subscribe(move |tracks| {
            if tracks.len() == 1 {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            *seen.lock().unwrap() = tracks.len();
        });

        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                cache.upsert(&[track("https://cdn.example/a.mp3", "a", 1)]).unwrap();
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        cache.upsert(&[track("https://cdn.example/b.mp3", "b", 2)]).unwrap();
        writer.join().unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(*last_len.lock().unwrap(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
