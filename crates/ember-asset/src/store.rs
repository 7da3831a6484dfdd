//! Observable in-memory asset vault
//!
//! The store owns an ordered collection of [`AssetRecord`]s. Every mutation
//! happens under a single lock and is followed by a synchronous notification
//! carrying a full snapshot of the collection. Notifications are delivered in
//! mutation order: a mutation does not start until the previous one's
//! listeners have returned, so listeners may read the store but must not
//! mutate it.

use crate::types::{AssetDraft, AssetRecord, AssetType};
use ember_core::{now_utc, prefixed_id, EmberError, Listeners, Result, Subscription};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Something that can persist a generated asset
pub trait AssetSink: Send + Sync {
    fn persist(&self, draft: AssetDraft) -> Result<AssetRecord>;
}

/// The authoritative collection of generated assets
pub struct AssetStore {
    records: Mutex<Vec<AssetRecord>>,
    /// Held from the start of a mutation until its listeners return
    notify_lock: Mutex<()>,
    listeners: Listeners<[AssetRecord]>,
}

impl AssetStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            notify_lock: Mutex::new(()),
            listeners: Listeners::new(),
        }
    }

    /// Create a store from an exported JSON file. A missing file yields an empty store.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self::new();
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let added = store.import_json(&content)?;
            debug!(path = %path.display(), added, "loaded asset vault");
        }
        Ok(store)
    }

    /// Write the full collection to `path` as a JSON array
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.export_json()?)?;
        Ok(())
    }

    /// Create a record from `draft`, append it, and notify subscribers
    pub fn save(&self, draft: AssetDraft) -> AssetRecord {
        let record = AssetRecord {
            id: prefixed_id("ASSET"),
            asset_type: draft.asset_type,
            title: draft.title,
            payload: draft.payload,
            created_at: now_utc(),
            module: draft.module,
            owner_id: draft.owner_id,
            metadata: draft.metadata,
        };

        let _order = self.order();
        let snapshot = {
            let mut records = self.lock();
            records.push(record.clone());
            records.clone()
        };
        debug!(id = %record.id, asset_type = %record.asset_type, "saved asset");
        self.listeners.emit(&snapshot);
        record
    }

    /// Remove the record with `id`. Returns `false` (and does nothing) if absent.
    pub fn delete(&self, id: &str) -> bool {
        let _order = self.order();
        let snapshot = {
            let mut records = self.lock();
            match records.iter().position(|r| r.id == id) {
                Some(index) => {
                    records.remove(index);
                    records.clone()
                }
                None => return false,
            }
        };
        debug!(id, "deleted asset");
        self.listeners.emit(&snapshot);
        true
    }

    /// Remove every record
    pub fn clear(&self) {
        let _order = self.order();
        let snapshot = {
            let mut records = self.lock();
            records.clear();
            records.clone()
        };
        info!("cleared asset vault");
        self.listeners.emit(&snapshot);
    }

    /// Append externally supplied records.
    ///
    /// Records whose id is already present (or repeated within `incoming`)
    /// are skipped. Returns the number of records added.
    pub fn import(&self, incoming: Vec<AssetRecord>) -> usize {
        let _order = self.order();
        let (added, snapshot) = {
            let mut records = self.lock();
            let mut known: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
            let mut added = 0;
            for record in incoming {
                if known.insert(record.id.clone()) {
                    records.push(record);
                    added += 1;
                } else {
                    debug!(id = %record.id, "skipping duplicate asset id on import");
                }
            }
            (added, records.clone())
        };
        info!(added, total = snapshot.len(), "imported assets");
        self.listeners.emit(&snapshot);
        added
    }

    /// Import a JSON array of records (the shape produced by [`AssetStore::export_json`])
    pub fn import_json(&self, json: &str) -> Result<usize> {
        let records: Vec<AssetRecord> = serde_json::from_str(json).map_err(|e| {
            EmberError::AssetError(format!("Invalid asset import: {}", e))
        })?;
        Ok(self.import(records))
    }

    /// Serialize the full collection as a JSON array
    pub fn export_json(&self) -> Result<String> {
        let records = self.list();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Register a listener. It is called immediately with the current
    /// snapshot, then after every mutation.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[AssetRecord]) + Send + Sync + 'static,
    {
        let _order = self.order();
        let current = self.list();
        listener(&current);
        self.listeners.subscribe(listener)
    }

    /// Snapshot of all records in insertion order
    pub fn list(&self) -> Vec<AssetRecord> {
        self.lock().clone()
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Option<AssetRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    /// All records of a given type
    pub fn by_type(&self, asset_type: AssetType) -> Vec<AssetRecord> {
        self.lock()
            .iter()
            .filter(|r| r.asset_type == asset_type)
            .cloned()
            .collect()
    }

    /// All records attached to an owner
    pub fn by_owner(&self, owner_id: &str) -> Vec<AssetRecord> {
        self.lock()
            .iter()
            .filter(|r| r.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn order(&self) -> MutexGuard<'_, ()> {
        self.notify_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AssetRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetSink for AssetStore {
    fn persist(&self, draft: AssetDraft) -> Result<AssetRecord> {
        Ok(self.save(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn audio_draft(title: &str) -> AssetDraft {
        AssetDraft::new(
            AssetType::Audio,
            title,
            format!("https://cdn.example/{}.mp3", title),
            "music-studio",
        )
    }

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ember_store_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_save_assigns_unique_ids() {
        let store = AssetStore::new();
        let a = store.save(audio_draft("a"));
        let b = store.save(audio_draft("b"));

        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("ASSET-"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&a.id).unwrap().title, "a");
    }

    #[test]
    fn test_delete_removes_only_target() {
        let store = AssetStore::new();
        let a = store.save(audio_draft("a"));
        let b = store.save(audio_draft("b"));
        let c = store.save(audio_draft("c"));

        assert!(store.delete(&b.id));
        let ids: Vec<String> = store.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = AssetStore::new();
        store.save(audio_draft("a"));

        let notified = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&notified);
        let _sub = store.subscribe(move |_| *counter.lock().unwrap() += 1);
        assert_eq!(*notified.lock().unwrap(), 1);

        assert!(!store.delete("ASSET-0-missing"));
        assert_eq!(store.len(), 1);
        assert_eq!(*notified.lock().unwrap(), 1);
    }

    #[test]
    fn test_clear_empties_and_notifies() {
        let store = AssetStore::new();
        store.save(audio_draft("a"));

        let last_len = Arc::new(Mutex::new(usize::MAX));
        let seen = Arc::clone(&last_len);
        let _sub = store.subscribe(move |records| *seen.lock().unwrap() = records.len());
        assert_eq!(*last_len.lock().unwrap(), 1);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(*last_len.lock().unwrap(), 0);
    }

    #[test]
    fn test_subscribe_receives_current_snapshot_and_updates() {
        let store = AssetStore::new();
        store.save(audio_draft("first"));

        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&snapshots);
        let sub = store.subscribe(move |records| {
            sink.lock()
                .unwrap()
                .push(records.iter().map(|r| r.title.clone()).collect::<Vec<_>>());
        });

        store.save(audio_draft("second"));
        sub.unsubscribe();
        store.save(audio_draft("third"));

        let snapshots = snapshots.lock().unwrap();
        assert_eq!(
            *snapshots,
            vec![
                vec!["first".to_string()],
                vec!["first".to_string(), "second".to_string()],
            ]
        );
    }

    #[test]
    fn test_import_skips_existing_ids() {
        let source = AssetStore::new();
        source.save(audio_draft("a"));
        source.save(audio_draft("b"));
        let exported = source.export_json().unwrap();

        let target = AssetStore::new();
        assert_eq!(target.import_json(&exported).unwrap(), 2);
        assert_eq!(target.import_json(&exported).unwrap(), 0);
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_import_rejects_wrong_shape() {
        let store = AssetStore::new();
        assert!(store.import_json(r#"{"not": "an array"}"#).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_queries_by_type_and_owner() {
        let store = AssetStore::new();
        store.save(audio_draft("song").with_owner(Some("LEAD-1".to_string())));
        store.save(AssetDraft::new(AssetType::Text, "pitch", "Dear customer", "copywriter"));

        assert_eq!(store.by_type(AssetType::Audio).len(), 1);
        assert_eq!(store.by_type(AssetType::Video).len(), 0);
        assert_eq!(store.by_owner("LEAD-1")[0].title, "song");
        assert!(store.by_owner("LEAD-2").is_empty());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = temp_dir();
        let path = dir.join("vault.json");

        let store = AssetStore::new();
        let saved = store.save(audio_draft("keep").with_metadata(serde_json::json!({"taskId": "t-1"})));
        store.save_to_file(&path).unwrap();

        let reloaded = AssetStore::load_from_file(&path).unwrap();
        assert_eq!(reloaded.list(), vec![saved]);

        let missing = AssetStore::load_from_file(dir.join("absent.json")).unwrap();
        assert!(missing.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_concurrent_saves_are_not_lost() {
        let store = Arc::new(AssetStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.save(audio_draft(&format!("{}-{}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }

    #[test]
    fn test_slow_listener_ends_on_latest_snapshot() {
        let store = Arc::new(AssetStore::new());
        let last_len = Arc::new(Mutex::new(0usize));
        let seen = Arc::clone(&last_len);
        let _sub = store.subscribe(move |records| {
            if records.len() == 1 {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            *seen.lock().unwrap() = records.len();
        });

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store.save(audio_draft("a"));
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        store.save(audio_draft("b"));
        writer.join().unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(*last_len.lock().unwrap(), 2);
    }

    #[test]
    fn test_late_subscriber_sees_concurrent_save() {
        let store = Arc::new(AssetStore::new());
        let last_len = Arc::new(Mutex::new(usize::MAX));

        let subscriber = {
            let store = Arc::clone(&store);
            let seen = Arc::clone(&last_len);
            std::thread::spawn(move || {
                store.subscribe(move |records| {
                    if records.is_empty() {
                        std::thread::sleep(std::time::Duration::from_millis(100));
                    }
                    *seen.lock().unwrap() = records.len();
                })
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        store.save(audio_draft("x"));
        let _sub = subscriber.join().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(*last_len.lock().unwrap(), 1);
    }
}
