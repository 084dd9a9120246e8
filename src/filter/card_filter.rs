//! Filter evaluation and the inverse "what values satisfy this filter" query.

use std::collections::BTreeMap;

use super::{FilterClause, FilterCondition, FilterGroup, FilterNode, FilterOperation};
use crate::block::{Card, PropertyTemplate, PropertyType, PropertyValue, TITLE_PROPERTY_ID};

/// Whether `card` satisfies `group`. An empty group is met by every card.
pub fn is_filter_group_met(group: &FilterGroup, card: &Card) -> bool {
    if group.filters.is_empty() {
        return true;
    }

    let mut children = group.filters.iter().map(|node| match node {
        FilterNode::Group(nested) => is_filter_group_met(nested, card),
        FilterNode::Clause(clause) => is_clause_met(clause, card),
    });

    match group.operation {
        FilterOperation::Or => children.any(|met| met),
        FilterOperation::And => children.all(|met| met),
    }
}

/// Whether `card` satisfies a single clause.
pub fn is_clause_met(clause: &FilterClause, card: &Card) -> bool {
    let title;
    let value = if clause.property_id == TITLE_PROPERTY_ID {
        title = PropertyValue::Single(card.title.clone());
        Some(&title).filter(|v| !v.is_empty())
    } else {
        card.value(&clause.property_id)
    };

    match clause.condition {
        FilterCondition::Includes => {
            clause.values.is_empty()
                || value.is_some_and(|v| clause.values.iter().any(|c| v.matches(c)))
        }
        FilterCondition::NotIncludes => {
            clause.values.is_empty()
                || !value.is_some_and(|v| clause.values.iter().any(|c| v.matches(c)))
        }
        FilterCondition::IsEmpty => value.is_none(),
        FilterCondition::IsNotEmpty => value.is_some(),
    }
}

/// Property values that make a new card satisfy `group`.
///
/// Only top-level clauses are considered. For `or` groups only the first
/// clause contributes. Clauses that need no value (`isEmpty`, or a condition
/// with nothing to pick) contribute no entry.
pub fn properties_that_meet_filter_group(
    group: &FilterGroup,
    templates: &[PropertyTemplate],
) -> BTreeMap<String, PropertyValue> {
    let clauses: Vec<&FilterClause> = group.clauses().collect();
    let considered: &[&FilterClause] = match group.operation {
        FilterOperation::Or => &clauses[..clauses.len().min(1)],
        FilterOperation::And => &clauses,
    };

    let mut result = BTreeMap::new();
    for clause in considered {
        if let Some(value) = property_that_meets_clause(clause, templates) {
            result.insert(clause.property_id.clone(), value);
        }
    }
    result
}

fn property_that_meets_clause(
    clause: &FilterClause,
    templates: &[PropertyTemplate],
) -> Option<PropertyValue> {
    if clause.property_id == TITLE_PROPERTY_ID {
        return None;
    }
    let Some(template) = templates.iter().find(|t| t.id == clause.property_id) else {
        tracing::warn!(property_id = %clause.property_id, "filter references unknown property");
        return None;
    };

    match clause.condition {
        FilterCondition::Includes => {
            let first = clause.values.first()?;
            if template.property_type == PropertyType::MultiSelect {
                Some(PropertyValue::Multiple(vec![first.clone()]))
            } else {
                Some(PropertyValue::Single(first.clone()))
            }
        }
        FilterCondition::NotIncludes => {
            if clause.values.is_empty() || template.property_type != PropertyType::Select {
                return None;
            }
            template
                .options
                .iter()
                .find(|o| !clause.values.contains(&o.value))
                .map(|o| PropertyValue::Single(o.value.clone()))
        }
        FilterCondition::IsEmpty => None,
        FilterCondition::IsNotEmpty => {
            if template.property_type != PropertyType::Select {
                return None;
            }
            template
                .options
                .first()
                .map(|o| PropertyValue::Single(o.value.clone()))
        }
    }
}

/// Title search used by the board tree. Empty text matches every card.
pub fn search_matches(card: &Card, text: &str, case_sensitive: bool) -> bool {
    if text.is_empty() {
        return true;
    }
    if case_sensitive {
        card.title.contains(text)
    } else {
        card.title.to_lowercase().contains(&text.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::PropertyTemplate;

    fn clause(property: &str, condition: FilterCondition, values: &[&str]) -> FilterNode {
        FilterClause::new(property, condition, values).into()
    }

    fn status_template() -> PropertyTemplate {
        PropertyTemplate::select("status", "Status", &["Todo", "Doing", "Done"])
    }

    #[test]
    fn test_empty_group_is_vacuously_met() {
        let card = Card::new("b", "Anything");
        assert!(is_filter_group_met(&FilterGroup::and(vec![]), &card));
        assert!(is_filter_group_met(&FilterGroup::or(vec![]), &card));
    }

    #[test]
    fn test_or_accepts_card_meeting_only_second_clause() {
        let card = Card::new("b", "Card");
        let filters = vec![
            clause("a", FilterCondition::Includes, &["x"]),
            clause("b", FilterCondition::IsEmpty, &[]),
        ];
        assert!(is_filter_group_met(&FilterGroup::or(filters.clone()), &card));
        assert!(!is_filter_group_met(&FilterGroup::and(filters), &card));
    }

    #[test]
    fn test_includes_with_no_values_is_vacuous() {
        let card = Card::new("b", "Card");
        let c = FilterClause::new("a", FilterCondition::Includes, &[]);
        assert!(is_clause_met(&c, &card));
        let c = FilterClause::new("a", FilterCondition::NotIncludes, &[]);
        assert!(is_clause_met(&c, &card));
    }

    #[test]
    fn test_includes_and_not_includes() {
        let card = Card::new("b", "Card").with_value("status", "Todo");
        let inc = FilterClause::new("status", FilterCondition::Includes, &["Done", "Todo"]);
        let exc = FilterClause::new("status", FilterCondition::NotIncludes, &["Done", "Todo"]);
        assert!(is_clause_met(&inc, &card));
        assert!(!is_clause_met(&exc, &card));

        let other = Card::new("b", "Other").with_value("status", "Doing");
        assert!(!is_clause_met(&inc, &other));
        assert!(is_clause_met(&exc, &other));
    }

    #[test]
    fn test_not_includes_accepts_missing_value() {
        let card = Card::new("b", "Card");
        let exc = FilterClause::new("status", FilterCondition::NotIncludes, &["Done"]);
        assert!(is_clause_met(&exc, &card));
    }

    #[test]
    fn test_empty_conditions_treat_empty_string_as_absent() {
        let blank = Card::new("b", "Card").with_value("p", "");
        let set = Card::new("b", "Card").with_value("p", "v");
        let is_empty = FilterClause::new("p", FilterCondition::IsEmpty, &[]);
        let not_empty = FilterClause::new("p", FilterCondition::IsNotEmpty, &[]);
        assert!(is_clause_met(&is_empty, &blank));
        assert!(!is_clause_met(&not_empty, &blank));
        assert!(!is_clause_met(&is_empty, &set));
        assert!(is_clause_met(&not_empty, &set));
    }

    #[test]
    fn test_multi_select_includes_any_element() {
        let card =
            Card::new("b", "Card").with_value("tags", vec!["red".to_string(), "blue".to_string()]);
        let inc = FilterClause::new("tags", FilterCondition::Includes, &["blue"]);
        assert!(is_clause_met(&inc, &card));
        let exc = FilterClause::new("tags", FilterCondition::NotIncludes, &["red"]);
        assert!(!is_clause_met(&exc, &card));
    }

    #[test]
    fn test_title_pseudo_property() {
        let card = Card::new("b", "Launch");
        let untitled = Card::new("b", "");
        let c = FilterClause::new(TITLE_PROPERTY_ID, FilterCondition::IsNotEmpty, &[]);
        assert!(is_clause_met(&c, &card));
        assert!(!is_clause_met(&c, &untitled));
    }

    #[test]
    fn test_nested_groups() {
        let card = Card::new("b", "Card")
            .with_value("status", "Done")
            .with_value("owner", "ana");
        let group = FilterGroup::and(vec![
            clause("owner", FilterCondition::IsNotEmpty, &[]),
            FilterGroup::or(vec![
                clause("status", FilterCondition::Includes, &["Todo"]),
                clause("status", FilterCondition::Includes, &["Done"]),
            ])
            .into(),
        ]);
        assert!(is_filter_group_met(&group, &card));

        let stranger = Card::new("b", "Card").with_value("status", "Done");
        assert!(!is_filter_group_met(&group, &stranger));
    }

    #[test]
    fn test_inverse_and_collects_every_clause() {
        let templates = vec![
            status_template(),
            PropertyTemplate::new("owner", "Owner", PropertyType::Text),
        ];
        let group = FilterGroup::and(vec![
            clause("status", FilterCondition::Includes, &["Doing"]),
            clause("owner", FilterCondition::Includes, &["ana"]),
        ]);
        let values = properties_that_meet_filter_group(&group, &templates);
        assert_eq!(values.get("status"), Some(&PropertyValue::from("Doing")));
        assert_eq!(values.get("owner"), Some(&PropertyValue::from("ana")));
    }

    #[test]
    fn test_inverse_or_uses_first_clause_only() {
        let templates = vec![
            status_template(),
            PropertyTemplate::new("owner", "Owner", PropertyType::Text),
        ];
        let group = FilterGroup::or(vec![
            clause("status", FilterCondition::Includes, &["Done"]),
            clause("owner", FilterCondition::Includes, &["ana"]),
        ]);
        let values = properties_that_meet_filter_group(&group, &templates);
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("status"), Some(&PropertyValue::from("Done")));
    }

    #[test]
    fn test_inverse_not_includes_picks_first_allowed_option() {
        let templates = vec![status_template()];
        let group = FilterGroup::and(vec![clause(
            "status",
            FilterCondition::NotIncludes,
            &["Todo"],
        )]);
        let values = properties_that_meet_filter_group(&group, &templates);
        assert_eq!(values.get("status"), Some(&PropertyValue::from("Doing")));

        let card = Card::new("b", "New").with_value("status", "Doing");
        assert!(is_filter_group_met(&group, &card));
    }

    #[test]
    fn test_inverse_is_not_empty_picks_first_option() {
        let templates = vec![status_template()];
        let group = FilterGroup::and(vec![clause("status", FilterCondition::IsNotEmpty, &[])]);
        let values = properties_that_meet_filter_group(&group, &templates);
        assert_eq!(values.get("status"), Some(&PropertyValue::from("Todo")));
    }

    #[test]
    fn test_inverse_multi_select_includes_wraps_in_list() {
        let mut tags = PropertyTemplate::select("tags", "Tags", &["a", "b"]);
        tags.property_type = PropertyType::MultiSelect;
        let group = FilterGroup::and(vec![clause("tags", FilterCondition::Includes, &["b"])]);
        let values = properties_that_meet_filter_group(&group, &[tags]);
        assert_eq!(
            values.get("tags"),
            Some(&PropertyValue::Multiple(vec!["b".to_string()]))
        );
    }

    #[test]
    fn test_inverse_skips_unknown_properties_and_nested_groups() {
        let group = FilterGroup::and(vec![
            clause("ghost", FilterCondition::Includes, &["x"]),
            FilterGroup::and(vec![clause("status", FilterCondition::Includes, &["Todo"])]).into(),
        ]);
        let values = properties_that_meet_filter_group(&group, &[status_template()]);
        assert!(values.is_empty());
    }

    #[test]
    fn test_search_matches() {
        let card = Card::new("b", "Fix Login Bug");
        assert!(search_matches(&card, "", false));
        assert!(search_matches(&card, "login", false));
        assert!(!search_matches(&card, "login", true));
        assert!(search_matches(&card, "Login", true));
    }
}
