//! Card filtering.
//!
//! A view's filter is a tree: a [`FilterGroup`] combines children with
//! `and`/`or`, and each child is either a nested group or a leaf
//! [`FilterClause`]. Evaluation lives in [`card_filter`].

mod card_filter;

pub use card_filter::{
    is_clause_met, is_filter_group_met, properties_that_meet_filter_group, search_matches,
};

use serde::{Deserialize, Serialize};

use crate::errors::BoardsError;

/// Leaf comparison applied to one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterCondition {
    Includes,
    NotIncludes,
    IsEmpty,
    IsNotEmpty,
}

impl FilterCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterCondition::Includes => "includes",
            FilterCondition::NotIncludes => "notIncludes",
            FilterCondition::IsEmpty => "isEmpty",
            FilterCondition::IsNotEmpty => "isNotEmpty",
        }
    }
}

impl std::fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FilterCondition {
    type Err = BoardsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "includes" => Ok(FilterCondition::Includes),
            "notIncludes" => Ok(FilterCondition::NotIncludes),
            "isEmpty" => Ok(FilterCondition::IsEmpty),
            "isNotEmpty" => Ok(FilterCondition::IsNotEmpty),
            _ => Err(BoardsError::InvalidFilterCondition(s.to_string())),
        }
    }
}

/// Boolean combinator of a filter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperation {
    #[default]
    And,
    Or,
}

/// A property/condition/values triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterClause {
    pub property_id: String,
    pub condition: FilterCondition,
    #[serde(default)]
    pub values: Vec<String>,
}

impl FilterClause {
    pub fn new(property_id: &str, condition: FilterCondition, values: &[&str]) -> Self {
        Self {
            property_id: property_id.to_string(),
            condition,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// A child of a filter group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Group(FilterGroup),
    Clause(FilterClause),
}

/// A boolean combination of clauses and nested groups.
///
/// Both fields are required on the wire so that a clause never decodes as an
/// empty group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterGroup {
    pub operation: FilterOperation,
    pub filters: Vec<FilterNode>,
}

impl FilterGroup {
    pub fn and(filters: Vec<FilterNode>) -> Self {
        Self {
            operation: FilterOperation::And,
            filters,
        }
    }

    pub fn or(filters: Vec<FilterNode>) -> Self {
        Self {
            operation: FilterOperation::Or,
            filters,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Top-level clauses, ignoring nested groups.
    pub fn clauses(&self) -> impl Iterator<Item = &FilterClause> {
        self.filters.iter().filter_map(|node| match node {
            FilterNode::Clause(clause) => Some(clause),
            FilterNode::Group(_) => None,
        })
    }

    /// True if any clause anywhere in the tree references `property_id`.
    pub fn references_property(&self, property_id: &str) -> bool {
        self.filters.iter().any(|node| match node {
            FilterNode::Clause(clause) => clause.property_id == property_id,
            FilterNode::Group(group) => group.references_property(property_id),
        })
    }

    /// Copy of the tree with every clause on `property_id` removed.
    pub fn without_property(&self, property_id: &str) -> Self {
        let filters = self
            .filters
            .iter()
            .filter_map(|node| match node {
                FilterNode::Clause(clause) if clause.property_id == property_id => None,
                FilterNode::Clause(clause) => Some(FilterNode::Clause(clause.clone())),
                FilterNode::Group(group) => {
                    Some(FilterNode::Group(group.without_property(property_id)))
                }
            })
            .collect();
        Self {
            operation: self.operation,
            filters,
        }
    }
}

impl From<FilterClause> for FilterNode {
    fn from(clause: FilterClause) -> Self {
        FilterNode::Clause(clause)
    }
}

impl From<FilterGroup> for FilterNode {
    fn from(group: FilterGroup) -> Self {
        FilterNode::Group(group)
    }
}
