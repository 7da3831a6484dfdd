//! Asset record definitions

use chrono::{DateTime, Utc};
use ember_core::EmberError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Media kinds the vault can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Text,
    Image,
    Video,
    Audio,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Text => write!(f, "TEXT"),
            AssetType::Image => write!(f, "IMAGE"),
            AssetType::Video => write!(f, "VIDEO"),
            AssetType::Audio => write!(f, "AUDIO"),
        }
    }
}

impl FromStr for AssetType {
    type Err = EmberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TEXT" => Ok(AssetType::Text),
            "IMAGE" => Ok(AssetType::Image),
            "VIDEO" => Ok(AssetType::Video),
            "AUDIO" => Ok(AssetType::Audio),
            _ => Err(EmberError::AssetError(format!(
                "Unknown asset type '{}'. Use: text, image, video, audio",
                s
            ))),
        }
    }
}

/// A persisted, user-visible unit in the asset vault.
///
/// Records are immutable once created; they can only be deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Generated id (`ASSET-<millis>-<random>`)
    pub id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub title: String,
    /// URL or inline data
    pub payload: String,
    pub created_at: DateTime<Utc>,
    /// Name of the module that produced the record
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Free-form provider metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Everything needed to create an [`AssetRecord`] except its id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct AssetDraft {
    pub asset_type: AssetType,
    pub title: String,
    pub payload: String,
    pub module: String,
    pub owner_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AssetDraft {
    pub fn new(
        asset_type: AssetType,
        title: impl Into<String>,
        payload: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            asset_type,
            title: title.into(),
            payload: payload.into(),
            module: module.into(),
            owner_id: None,
            metadata: None,
        }
    }

    pub fn with_owner(mut self, owner_id: Option<String>) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
