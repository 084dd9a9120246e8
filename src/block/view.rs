//! View fields: presentation settings of a board.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::{BlockFields, BlockType, TypedBlock};
use crate::filter::FilterGroup;

/// How a view lays out its cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    /// Kanban columns, one per group-by option
    #[default]
    Board,
    Table,
    Calendar,
    List,
    Gallery,
}

impl ViewType {
    /// Whether cards are partitioned into group-by buckets.
    pub fn groups_cards(&self) -> bool {
        matches!(self, ViewType::Board)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::Board => "board",
            ViewType::Table => "table",
            ViewType::Calendar => "calendar",
            ViewType::List => "list",
            ViewType::Gallery => "gallery",
        }
    }
}

impl std::fmt::Display for ViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ViewType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "board" => Ok(ViewType::Board),
            "table" => Ok(ViewType::Table),
            "calendar" => Ok(ViewType::Calendar),
            "list" => Ok(ViewType::List),
            "gallery" => Ok(ViewType::Gallery),
            _ => anyhow::bail!(
                "Invalid view type '{}'. Valid values: board, table, calendar, list, gallery",
                s
            ),
        }
    }
}

/// One sort key of a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOption {
    pub property_id: String,
    #[serde(default)]
    pub reversed: bool,
}

impl SortOption {
    pub fn ascending(property_id: &str) -> Self {
        Self {
            property_id: property_id.to_string(),
            reversed: false,
        }
    }

    pub fn descending(property_id: &str) -> Self {
        Self {
            property_id: property_id.to_string(),
            reversed: true,
        }
    }
}

/// Typed fields of a view block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFields {
    #[serde(default)]
    pub view_type: ViewType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by_id: Option<String>,
    #[serde(default)]
    pub sort_options: Vec<SortOption>,
    #[serde(default)]
    pub visible_property_ids: Vec<String>,
    /// Group-by options collapsed into the hidden column list
    #[serde(default)]
    pub hidden_option_ids: Vec<String>,
    #[serde(default)]
    pub filter: FilterGroup,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockFields for ViewFields {
    const BLOCK_TYPE: BlockType = BlockType::View;
}

impl TypedBlock<ViewFields> {
    /// Create a new view on `board_id`.
    pub fn new(board_id: &str, title: &str, view_type: ViewType) -> Self {
        let mut view = Self::create(board_id, title);
        view.fields.view_type = view_type;
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BoardView};
    use crate::filter::{FilterCondition, FilterNode, FilterOperation};
    use serde_json::json;

    #[test]
    fn test_view_type_from_str() {
        assert_eq!("Table".parse::<ViewType>().unwrap(), ViewType::Table);
        assert!("kanban".parse::<ViewType>().is_err());
        assert!(ViewType::Board.groups_cards());
        assert!(!ViewType::Gallery.groups_cards());
    }

    #[test]
    fn test_view_fields_decode_with_nested_filter() {
        let raw = json!({
            "id": "v1",
            "parentId": "b1",
            "type": "view",
            "title": "Board view",
            "fields": {
                "viewType": "board",
                "groupById": "status",
                "sortOptions": [{"propertyId": "__name", "reversed": true}],
                "filter": {
                    "operation": "or",
                    "filters": [
                        {"propertyId": "status", "condition": "includes", "values": ["Todo"]},
                        {"operation": "and", "filters": []}
                    ]
                }
            }
        });
        let block: Block = serde_json::from_value(raw).unwrap();
        let view = BoardView::from_block(&block).unwrap();

        assert_eq!(view.fields.group_by_id.as_deref(), Some("status"));
        assert!(view.fields.sort_options[0].reversed);
        assert_eq!(view.fields.filter.operation, FilterOperation::Or);
        match &view.fields.filter.filters[0] {
            FilterNode::Clause(clause) => {
                assert_eq!(clause.condition, FilterCondition::Includes);
            }
            other => panic!("Expected clause, got {other:?}"),
        }
        assert!(matches!(view.fields.filter.filters[1], FilterNode::Group(_)));
    }

    #[test]
    fn test_view_fields_defaults() {
        let view = BoardView::new("b1", "Table", ViewType::Table);
        assert!(view.fields.group_by_id.is_none());
        assert!(view.fields.filter.filters.is_empty());
        assert_eq!(view.parent_id, "b1");
    }
}
