//! Board fields: the property schema shared by a board's cards.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::types::{BlockFields, BlockType, TypedBlock};
use super::{Board, create_id};
use crate::errors::{BoardsError, Result};

/// Type of a card property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    #[default]
    Text,
    Number,
    Select,
    MultiSelect,
    Date,
    Person,
    Checkbox,
    Url,
    Email,
    Phone,
    CreatedTime,
    UpdatedTime,
    CreatedBy,
    UpdatedBy,
}

impl PropertyType {
    /// Types whose values are drawn from the template's option list.
    pub fn is_select_like(&self) -> bool {
        matches!(self, PropertyType::Select | PropertyType::MultiSelect)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Text => "text",
            PropertyType::Number => "number",
            PropertyType::Select => "select",
            PropertyType::MultiSelect => "multiSelect",
            PropertyType::Date => "date",
            PropertyType::Person => "person",
            PropertyType::Checkbox => "checkbox",
            PropertyType::Url => "url",
            PropertyType::Email => "email",
            PropertyType::Phone => "phone",
            PropertyType::CreatedTime => "createdTime",
            PropertyType::UpdatedTime => "updatedTime",
            PropertyType::CreatedBy => "createdBy",
            PropertyType::UpdatedBy => "updatedBy",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One choice of a select-like property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOption {
    pub id: String,
    pub value: String,
    #[serde(default = "default_option_color")]
    pub color: String,
}

fn default_option_color() -> String {
    "propColorDefault".to_string()
}

impl PropertyOption {
    pub fn new(value: &str) -> Self {
        Self {
            id: create_id(),
            value: value.to_string(),
            color: default_option_color(),
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = color.to_string();
        self
    }
}

/// Definition of one card property on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyTemplate {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub options: Vec<PropertyOption>,
}

impl PropertyTemplate {
    pub fn new(id: &str, name: &str, property_type: PropertyType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            property_type,
            options: Vec::new(),
        }
    }

    /// A select property with one option per value, in the given order.
    pub fn select(id: &str, name: &str, values: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            property_type: PropertyType::Select,
            options: values.iter().map(|v| PropertyOption::new(v)).collect(),
        }
    }

    pub fn option(&self, option_id: &str) -> Option<&PropertyOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn option_by_value(&self, value: &str) -> Option<&PropertyOption> {
        self.options.iter().find(|o| o.value == value)
    }

    /// Declared position of the option carrying `value`.
    pub fn option_position(&self, value: &str) -> Option<usize> {
        self.options.iter().position(|o| o.value == value)
    }
}

/// Typed fields of a board block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardFields {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub card_properties: Vec<PropertyTemplate>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockFields for BoardFields {
    const BLOCK_TYPE: BlockType = BlockType::Board;
}

impl TypedBlock<BoardFields> {
    /// Create a new root board.
    pub fn new(title: &str) -> Self {
        Self::create("", title)
    }

    pub fn property(&self, property_id: &str) -> Option<&PropertyTemplate> {
        self.fields
            .card_properties
            .iter()
            .find(|t| t.id == property_id)
    }

    pub fn property_mut(&mut self, property_id: &str) -> Option<&mut PropertyTemplate> {
        self.fields
            .card_properties
            .iter_mut()
            .find(|t| t.id == property_id)
    }

    /// First select-type property in declaration order.
    pub fn first_select_property(&self) -> Option<&PropertyTemplate> {
        self.fields
            .card_properties
            .iter()
            .find(|t| t.property_type == PropertyType::Select)
    }

    /// Check schema invariants: unique template ids, unique option values
    /// within each template.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for template in &self.fields.card_properties {
            if !ids.insert(template.id.as_str()) {
                return Err(invalid(self, format!("duplicate property id '{}'", template.id)));
            }
            let mut values = HashSet::new();
            for option in &template.options {
                if !values.insert(option.value.as_str()) {
                    return Err(invalid(
                        self,
                        format!(
                            "duplicate option value '{}' on property '{}'",
                            option.value, template.id
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn invalid(board: &Board, reason: String) -> BoardsError {
    BoardsError::InvalidBlock {
        id: board.id.clone(),
        reason,
    }
}
