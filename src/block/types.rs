//! Raw block record and the typed wrapper used for boards, views and cards.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{BLOCK_SCHEMA_VERSION, create_id, now_millis};
use crate::errors::{BoardsError, Result};

/// Type tag of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockType {
    Board,
    View,
    Card,
    Text,
    Image,
    Divider,
    Comment,
    /// Any tag this client does not know about; kept so sync payloads decode.
    #[serde(other)]
    Unknown,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Board => "board",
            BlockType::View => "view",
            BlockType::Card => "card",
            BlockType::Text => "text",
            BlockType::Image => "image",
            BlockType::Divider => "divider",
            BlockType::Comment => "comment",
            BlockType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_schema() -> i64 {
    BLOCK_SCHEMA_VERSION
}

/// The universal persisted unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    /// Owning block id (empty for root blocks)
    #[serde(default)]
    pub parent_id: String,
    #[serde(default = "default_schema")]
    pub schema: i64,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub title: String,
    /// Manual sequencing key
    #[serde(default)]
    pub order: i64,
    /// Type-specific fields
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    /// Soft-delete timestamp; 0 means alive
    #[serde(default)]
    pub delete_at: i64,
}

impl Block {
    /// Create a new block with a fresh id and current timestamps.
    pub fn new(block_type: BlockType, parent_id: &str, title: &str) -> Self {
        let now = now_millis();
        Self {
            id: create_id(),
            parent_id: parent_id.to_string(),
            schema: BLOCK_SCHEMA_VERSION,
            block_type,
            title: title.to_string(),
            order: 0,
            fields: Map::new(),
            create_at: now,
            update_at: now,
            delete_at: 0,
        }
    }

    /// Whether the block has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }

    /// Read a string field, if present.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Return a copy with `update_at` set to now.
    pub fn touched(&self) -> Self {
        let mut next = self.clone();
        next.update_at = now_millis();
        next
    }
}

/// Typed contents of a block's `fields` bag.
pub trait BlockFields: Serialize + DeserializeOwned + Clone + Default {
    /// The block type carrying these fields.
    const BLOCK_TYPE: BlockType;
}

/// A block whose `fields` have been decoded into `F`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedBlock<F> {
    pub id: String,
    pub parent_id: String,
    pub schema: i64,
    pub title: String,
    pub order: i64,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    pub fields: F,
}

impl<F: BlockFields> TypedBlock<F> {
    /// Create a new typed block with default fields.
    pub fn create(parent_id: &str, title: &str) -> Self {
        let now = now_millis();
        Self {
            id: create_id(),
            parent_id: parent_id.to_string(),
            schema: BLOCK_SCHEMA_VERSION,
            title: title.to_string(),
            order: 0,
            create_at: now,
            update_at: now,
            delete_at: 0,
            fields: F::default(),
        }
    }

    /// Decode a raw block. Fails if the type tag does not match or the
    /// fields do not decode.
    pub fn from_block(block: &Block) -> Result<Self> {
        if block.block_type != F::BLOCK_TYPE {
            return Err(BoardsError::InvalidBlock {
                id: block.id.clone(),
                reason: format!(
                    "expected a {} block, found {}",
                    F::BLOCK_TYPE,
                    block.block_type
                ),
            });
        }
        let fields: F = serde_json::from_value(Value::Object(block.fields.clone())).map_err(
            |e| BoardsError::InvalidBlock {
                id: block.id.clone(),
                reason: e.to_string(),
            },
        )?;
        Ok(Self {
            id: block.id.clone(),
            parent_id: block.parent_id.clone(),
            schema: block.schema,
            title: block.title.clone(),
            order: block.order,
            create_at: block.create_at,
            update_at: block.update_at,
            delete_at: block.delete_at,
            fields,
        })
    }

    /// Re-encode into a raw block.
    pub fn to_block(&self) -> Result<Block> {
        let fields = match serde_json::to_value(&self.fields) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(BoardsError::InvalidBlock {
                    id: self.id.clone(),
                    reason: format!("fields encoded to non-object {}", other),
                });
            }
            Err(e) => {
                return Err(BoardsError::InvalidBlock {
                    id: self.id.clone(),
                    reason: e.to_string(),
                });
            }
        };
        Ok(Block {
            id: self.id.clone(),
            parent_id: self.parent_id.clone(),
            schema: self.schema,
            block_type: F::BLOCK_TYPE,
            title: self.title.clone(),
            order: self.order,
            fields,
            create_at: self.create_at,
            update_at: self.update_at,
            delete_at: self.delete_at,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BoardFields, CardFields, PropertyValue};
    use serde_json::json;

    #[test]
    fn test_block_json_uses_camel_case() {
        let raw = json!({
            "id": "c1",
            "parentId": "b1",
            "type": "card",
            "title": "Hello",
            "fields": {"properties": {"p1": "x"}},
            "createAt": 10,
            "updateAt": 20,
            "deleteAt": 0
        });
        let block: Block = serde_json::from_value(raw).unwrap();
        assert_eq!(block.parent_id, "b1");
        assert_eq!(block.block_type, BlockType::Card);
        assert_eq!(block.schema, BLOCK_SCHEMA_VERSION);
        assert!(!block.is_deleted());

        let back = serde_json::to_value(&block).unwrap();
        assert_eq!(back["parentId"], "b1");
        assert_eq!(back["type"], "card");
    }

    #[test]
    fn test_unknown_block_type_decodes() {
        let raw = json!({"id": "x", "type": "checkbox"});
        let block: Block = serde_json::from_value(raw).unwrap();
        assert_eq!(block.block_type, BlockType::Unknown);
    }

    #[test]
    fn test_from_block_rejects_wrong_type() {
        let block = Block::new(BlockType::Text, "b1", "note");
        let err = TypedBlock::<CardFields>::from_block(&block).unwrap_err();
        match err {
            BoardsError::InvalidBlock { id, reason } => {
                assert_eq!(id, block.id);
                assert!(reason.contains("card"));
            }
            other => panic!("Expected InvalidBlock, got {other:?}"),
        }
    }

    #[test]
    fn test_from_block_rejects_malformed_fields() {
        let mut block = Block::new(BlockType::Board, "", "Board");
        block
            .fields
            .insert("cardProperties".into(), json!("not a list"));
        assert!(TypedBlock::<BoardFields>::from_block(&block).is_err());
    }

    #[test]
    fn test_unknown_fields_survive_typed_round_trip() {
        let mut block = Block::new(BlockType::Card, "b1", "Card");
        block.fields.insert("isTemplate".into(), json!(true));
        block
            .fields
            .insert("properties".into(), json!({"p1": ["a", "b"]}));

        let card = TypedBlock::<CardFields>::from_block(&block).unwrap();
        assert_eq!(
            card.fields.properties.get("p1"),
            Some(&PropertyValue::Multiple(vec!["a".into(), "b".into()]))
        );
        let back = card.to_block().unwrap();
        assert_eq!(back.fields.get("isTemplate"), Some(&json!(true)));
        assert_eq!(back.block_type, BlockType::Card);
    }

    #[test]
    fn test_touched_advances_update_at() {
        let mut block = Block::new(BlockType::Card, "b1", "Card");
        block.update_at = 0;
        let next = block.touched();
        assert!(next.update_at > 0);
        assert_eq!(block.update_at, 0);
    }
}
