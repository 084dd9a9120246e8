//! Card fields: property values keyed by template id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::types::{BlockFields, BlockType, TypedBlock};

/// Stored value of one card property.
///
/// Select and text-like properties hold a single string; multi-select holds
/// a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Single(String),
    Multiple(Vec<String>),
}

impl PropertyValue {
    /// Empty strings and empty lists count as "no value".
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Single(s) => s.is_empty(),
            PropertyValue::Multiple(list) => list.is_empty(),
        }
    }

    /// True if the value equals `candidate` (or, for lists, contains it).
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            PropertyValue::Single(s) => s == candidate,
            PropertyValue::Multiple(list) => list.iter().any(|v| v == candidate),
        }
    }

    /// The single value, or the first element of a list.
    pub fn first(&self) -> Option<&str> {
        match self {
            PropertyValue::Single(s) => Some(s.as_str()),
            PropertyValue::Multiple(list) => list.first().map(String::as_str),
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            PropertyValue::Single(s) => Some(s.as_str()),
            PropertyValue::Multiple(_) => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Single(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Single(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::Multiple(values)
    }
}

/// Typed fields of a card block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardFields {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockFields for CardFields {
    const BLOCK_TYPE: BlockType = BlockType::Card;
}

impl TypedBlock<CardFields> {
    /// Create a new card owned by `board_id`.
    pub fn new(board_id: &str, title: &str) -> Self {
        Self::create(board_id, title)
    }

    /// Builder-style property assignment.
    pub fn with_value(mut self, property_id: &str, value: impl Into<PropertyValue>) -> Self {
        self.fields
            .properties
            .insert(property_id.to_string(), value.into());
        self
    }

    /// Stored value for a property; empty values read as absent.
    pub fn value(&self, property_id: &str) -> Option<&PropertyValue> {
        self.fields
            .properties
            .get(property_id)
            .filter(|v| !v.is_empty())
    }
}
