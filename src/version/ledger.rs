//! On-disk version ledger document
//!
//! One ledger per project at `versions/versions.json`, mapping resource type
//! to resource id to its append-only history. The document shape is consumed
//! by the web UI as-is, so field names here are wire format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resource::ResourceKind;

/// One version of one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: u64,
    /// Path of this version's bytes, relative to the project root. The
    /// current version points at the stable path; archived versions point
    /// into `versions/<type>/`.
    pub file: String,
    /// Prompt that produced this version; empty for backfilled records.
    #[serde(default)]
    pub prompt: String,
    pub created_at: String,
    /// Set when this record was produced by restoring an older version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<u64>,
    /// Free-form extras such as aspect_ratio or duration_seconds.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Full history of one resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceHistory {
    pub current_version: u64,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
}

impl ResourceHistory {
    /// Next version number: one past the highest ever minted, never reused.
    pub fn next_version(&self) -> u64 {
        self.versions.last().map(|v| v.version).unwrap_or(0) + 1
    }

    pub fn record(&self, version: u64) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.version == version)
    }

    pub fn record_mut(&mut self, version: u64) -> Option<&mut VersionRecord> {
        self.versions.iter_mut().find(|v| v.version == version)
    }
}

/// Per-project ledger document: type -> id -> history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger(pub BTreeMap<String, BTreeMap<String, ResourceHistory>>);

impl Ledger {
    pub fn history(&self, kind: ResourceKind, resource_id: &str) -> Option<&ResourceHistory> {
        self.0.get(kind.as_str()).and_then(|m| m.get(resource_id))
    }

    pub fn history_mut(&mut self, kind: ResourceKind, resource_id: &str) -> &mut ResourceHistory {
        self.0
            .entry(kind.as_str().to_string())
            .or_default()
            .entry(resource_id.to_string())
            .or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_version_never_reuses() {
        let mut history = ResourceHistory::default();
        assert_eq!(history.next_version(), 1);

        history.versions.push(VersionRecord {
            version: 7,
            file: "storyboards/scene_E1S01.png".to_string(),
            prompt: "p".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            restored_from: None,
            metadata: Default::default(),
        });
        history.current_version = 7;
        assert_eq!(history.next_version(), 8);
    }

    #[test]
    fn test_ledger_round_trips_metadata() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("aspect_ratio".to_string(), serde_json::json!("9:16"));

        let mut ledger = Ledger::default();
        let history = ledger.history_mut(ResourceKind::Storyboards, "E1S01");
        history.versions.push(VersionRecord {
            version: 1,
            file: "storyboards/scene_E1S01.png".to_string(),
            prompt: "a dark alley".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            restored_from: None,
            metadata,
        });
        history.current_version = 1;

        let json = serde_json::to_string(&ledger).unwrap();
        let parsed: Ledger = serde_json::from_str(&json).unwrap();
        let record = parsed
            .history(ResourceKind::Storyboards, "E1S01")
            .unwrap()
            .record(1)
            .unwrap();
        assert_eq!(record.metadata.get("aspect_ratio").unwrap(), "9:16");
        assert_eq!(record.prompt, "a dark alley");
    }
}
