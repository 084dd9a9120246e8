//! Group-by bucketing for board views.

use std::collections::HashMap;

use crate::block::{Card, PropertyOption, PropertyTemplate, PropertyType};

/// Cards sharing one group-by option.
#[derive(Debug, Clone, PartialEq)]
pub struct CardGroup {
    pub option: PropertyOption,
    pub cards: Vec<Card>,
}

/// Result of partitioning cards by a select property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouping {
    /// Cards with no value, or a value matching no option
    pub empty_group_cards: Vec<Card>,
    /// One bucket per visible option, in declared order
    pub groups: Vec<CardGroup>,
    /// Buckets for options listed in the view's hidden option ids
    pub hidden_groups: Vec<CardGroup>,
}

impl Grouping {
    /// Total number of cards across all buckets.
    pub fn card_count(&self) -> usize {
        self.empty_group_cards.len()
            + self
                .groups
                .iter()
                .chain(&self.hidden_groups)
                .map(|g| g.cards.len())
                .sum::<usize>()
    }
}

/// Partition `cards` (already filtered and sorted) by `template`'s options.
///
/// Matching is an exact, case-sensitive comparison of the card's value with
/// the option value. Card order inside each bucket follows the input order.
/// Only single-select properties group; any other type puts every card in
/// the no-value bucket.
pub fn group_cards(
    cards: &[Card],
    template: &PropertyTemplate,
    hidden_option_ids: &[String],
) -> Grouping {
    if template.property_type != PropertyType::Select {
        tracing::warn!(
            property_id = %template.id,
            property_type = %template.property_type,
            "group-by requires a select property"
        );
        return Grouping {
            empty_group_cards: cards.to_vec(),
            ..Default::default()
        };
    }

    let index_by_value: HashMap<&str, usize> = template
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| (option.value.as_str(), i))
        .collect();

    let mut buckets: Vec<Vec<Card>> = vec![Vec::new(); template.options.len()];
    let mut empty_group_cards = Vec::new();

    for card in cards {
        let slot = card
            .value(&template.id)
            .and_then(|v| v.as_single())
            .and_then(|value| index_by_value.get(value).copied());
        match slot {
            Some(i) => buckets[i].push(card.clone()),
            None => empty_group_cards.push(card.clone()),
        }
    }

    let mut groups = Vec::new();
    let mut hidden_groups = Vec::new();
    for (option, cards) in template.options.iter().zip(buckets) {
        let group = CardGroup {
            option: option.clone(),
            cards,
        };
        if hidden_option_ids.contains(&option.id) {
            hidden_groups.push(group);
        } else {
            groups.push(group);
        }
    }

    Grouping {
        empty_group_cards,
        groups,
        hidden_groups,
    }
}
