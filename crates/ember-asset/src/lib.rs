//! Ember Asset - Generated asset vault and gallery cache
//!
//! `AssetStore` is the authoritative, observable in-memory collection of
//! everything generated. `GalleryCache` is a durable, URL-deduplicated
//! projection of audio tracks kept for browsing across restarts.

mod gallery;
mod store;
mod types;

pub use gallery::{GalleryCache, PersistedTrack};
pub use store::{AssetSink, AssetStore};
pub use types::{AssetDraft, AssetRecord, AssetType};
