// ABOUTME: Defines the Entry types representing one logged world action.
// ABOUTME: Entries are append-only: created once, never mutated or deleted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Store-assigned integer identifier for an entry. Ids are unique and
/// monotonically increasing in creation order, which makes them the stable
/// tie-break for pagination.
pub type EntryId = i64;

/// Free-form string key/value metadata attached to an entry. Keys are unique
/// within one entry.
pub type Tags = BTreeMap<String, String>;

/// The header fields of a logged world action: where, what, and when.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHeader {
    pub id: EntryId,
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub action: String,
    /// Seconds since epoch, set by the caller at creation time.
    pub timestamp: i64,
}

/// A complete entry: header fields plus all tags stored for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub action: String,
    pub timestamp: i64,
    pub tags: Tags,
}

impl Entry {
    /// Assemble a full entry from a header and its fetched tags.
    pub fn from_header(header: EntryHeader, tags: Tags) -> Self {
        Self {
            id: header.id,
            world: header.world,
            x: header.x,
            y: header.y,
            z: header.z,
            action: header.action,
            timestamp: header.timestamp,
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_assembles_from_header_and_tags() {
        let header = EntryHeader {
            id: 7,
            world: "world".to_string(),
            x: 1,
            y: 64,
            z: -3,
            action: "wal:inventory_open".to_string(),
            timestamp: 1000,
        };
        let mut tags = Tags::new();
        tags.insert("player_gamertag".to_string(), "steve".to_string());

        let entry = Entry::from_header(header, tags);

        assert_eq!(entry.id, 7);
        assert_eq!(entry.world, "world");
        assert_eq!(entry.z, -3);
        assert_eq!(entry.tags.get("player_gamertag").map(String::as_str), Some("steve"));
    }

    #[test]
    fn entry_serde_round_trip() {
        let entry = Entry {
            id: 1,
            world: "nether".to_string(),
            x: 0,
            y: 64,
            z: 0,
            action: "wal:block_entity_break".to_string(),
            timestamp: 1000,
            tags: Tags::from([("player_xuid".to_string(), "x1".to_string())]),
        };

        let json = serde_json::to_string(&entry).expect("serialize");
        let back: Entry = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(entry, back);
    }
}
