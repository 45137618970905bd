//! Notion record-map data model.
//!
//! A snapshot is the JSON document Notion returns for a page: a `block` table
//! keyed by block ID plus a `signed_urls` table mapping asset IDs to
//! short-lived source URLs. Only the fields the mirroring pipeline touches are
//! typed; everything else round-trips through `serde(flatten)` untouched so a
//! cached page serializes back byte-compatible with what the origin sent.
//!
//! Block order matters: freshness comparison uses the version of the first
//! block in insertion order, so the block table is an `IndexMap`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Block type tag for image blocks.
pub const IMAGE_BLOCK_TYPE: &str = "image";

/// A fetched page snapshot (Notion record map).
///
/// Mutable by design: the image rewriter overwrites `signed_urls` values or
/// image block source fields in place before the snapshot is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Block table, keyed by block ID, in origin insertion order.
    #[serde(default)]
    pub block: IndexMap<String, BlockEnvelope>,

    /// Short-lived signed source URLs, keyed by asset (block) ID. May be empty.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub signed_urls: IndexMap<String, String>,

    /// Other record-map tables (collection, notion_user, space, ...), carried opaquely.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Wrapper Notion puts around every block (`role` + `value`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub value: Block,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One node of the document tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,

    /// Block type tag ("page", "text", "image", ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Monotonically increasing revision number, origin-assigned. This is the
    /// authority for freshness comparisons.
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_table: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<BlockFormat>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BlockProperties>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Block {
    /// Whether this block is an image reference.
    pub fn is_image(&self) -> bool {
        self.kind == IMAGE_BLOCK_TYPE
    }

    /// The display source URL of an image block, if present.
    pub fn display_source(&self) -> Option<&str> {
        self.format.as_ref()?.display_source.as_deref()
    }

    /// The first segment of `properties.source`, if present.
    pub fn source_url(&self) -> Option<&str> {
        self.properties
            .as_ref()?
            .source
            .as_ref()?
            .first()?
            .first()
            .map(String::as_str)
    }
}

/// Render hints for a block. Image blocks carry their source here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_source: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Block properties. `source` uses Notion's nested single-element
/// list-of-list form, which downstream renderers expect byte-for-byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec<Vec<String>>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Snapshot {
    /// Version of the first block in insertion order, used for the cached-vs-fresh
    /// freshness comparison. `None` for an empty block table.
    pub fn first_block_version(&self) -> Option<u64> {
        self.block.values().next().map(|env| env.value.version)
    }

    /// IDs of all blocks tagged as images, in insertion order.
    pub fn image_block_ids(&self) -> Vec<String> {
        self.block
            .values()
            .filter(|env| env.value.is_image())
            .map(|env| env.value.id.clone())
            .collect()
    }

    /// Look up a block's version by ID.
    pub fn block_version(&self, block_id: &str) -> Option<u64> {
        self.block.get(block_id).map(|env| env.value.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_map_json() -> &'static str {
        r#"{
            "block": {
                "page-1": {
                    "role": "reader",
                    "value": {
                        "id": "page-1",
                        "type": "page",
                        "version": 42,
                        "parent_table": "space",
                        "created_time": 1690000000000
                    }
                },
                "img-1": {
                    "role": "reader",
                    "value": {
                        "id": "img-1",
                        "type": "image",
                        "version": 3,
                        "parent_table": "block",
                        "format": { "display_source": "https://files.example/raw.png", "block_width": 640 },
                        "properties": { "source": [["https://files.example/raw.png"]] }
                    }
                }
            },
            "signed_urls": { "img-1": "https://origin.example/signed/a.png" },
            "notion_user": { "u-1": { "role": "reader" } }
        }"#
    }

    #[test]
    fn test_parse_record_map() {
        let snapshot: Snapshot = serde_json::from_str(record_map_json()).unwrap();
        assert_eq!(snapshot.block.len(), 2);
        assert_eq!(snapshot.signed_urls.len(), 1);
        assert_eq!(snapshot.first_block_version(), Some(42));
        assert_eq!(snapshot.block_version("img-1"), Some(3));
        assert_eq!(snapshot.image_block_ids(), vec!["img-1".to_string()]);
    }

    #[test]
    fn test_block_accessors() {
        let snapshot: Snapshot = serde_json::from_str(record_map_json()).unwrap();
        let img = &snapshot.block["img-1"].value;
        assert!(img.is_image());
        assert_eq!(img.display_source(), Some("https://files.example/raw.png"));
        assert_eq!(img.source_url(), Some("https://files.example/raw.png"));

        let page = &snapshot.block["page-1"].value;
        assert!(!page.is_image());
        assert_eq!(page.display_source(), None);
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let snapshot: Snapshot = serde_json::from_str(record_map_json()).unwrap();
        let back: Value = serde_json::to_value(&snapshot).unwrap();

        // Tables and block fields the pipeline never touches must survive.
        assert!(back.get("notion_user").is_some());
        assert_eq!(back["block"]["page-1"]["value"]["created_time"], 1690000000000u64);
        assert_eq!(back["block"]["img-1"]["value"]["format"]["block_width"], 640);
        assert_eq!(
            back["block"]["img-1"]["value"]["properties"]["source"][0][0],
            "https://files.example/raw.png"
        );
    }

    #[test]
    fn test_block_order_preserved() {
        let snapshot: Snapshot = serde_json::from_str(record_map_json()).unwrap();
        let ids: Vec<&String> = snapshot.block.keys().collect();
        assert_eq!(ids, vec!["page-1", "img-1"]);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.block.is_empty());
        assert!(snapshot.signed_urls.is_empty());
        assert_eq!(snapshot.first_block_version(), None);
    }
}
