//! Card ordering.
//!
//! Sort options are applied lexicographically: the first option is the
//! primary key and later options only break its ties. Whatever remains tied
//! falls back to the default order (title, then creation time).
//!
//! Emptiness is a gate, not a value: a card without a title always sorts
//! after a card with one, and for each sort key a card without a value sorts
//! after a card with one. `reversed` only flips the comparison of two
//! non-empty values.

use std::cmp::Ordering;

use crate::block::{Card, PropertyTemplate, PropertyType, SortOption, TITLE_PROPERTY_ID};

enum SortKey<'a> {
    Title,
    Property(&'a PropertyTemplate),
}

struct ResolvedSort<'a> {
    key: SortKey<'a>,
    reversed: bool,
}

/// Sort `cards` by `sort_options`, resolving property ids against `templates`.
///
/// Sort options naming an unknown property are skipped.
pub fn sort_cards(
    mut cards: Vec<Card>,
    sort_options: &[SortOption],
    templates: &[PropertyTemplate],
) -> Vec<Card> {
    let keys: Vec<ResolvedSort<'_>> = sort_options
        .iter()
        .filter_map(|option| {
            let key = if option.property_id == TITLE_PROPERTY_ID {
                SortKey::Title
            } else {
                match templates.iter().find(|t| t.id == option.property_id) {
                    Some(template) => SortKey::Property(template),
                    None => {
                        tracing::warn!(
                            property_id = %option.property_id,
                            "sort references unknown property, skipping"
                        );
                        return None;
                    }
                }
            };
            Some(ResolvedSort {
                key,
                reversed: option.reversed,
            })
        })
        .collect();

    cards.sort_by(|a, b| compare_cards(a, b, &keys));
    cards
}

fn compare_cards(a: &Card, b: &Card, keys: &[ResolvedSort<'_>]) -> Ordering {
    if let Some(gate) = empty_last(a.title.is_empty(), b.title.is_empty()) {
        return gate;
    }

    for sort in keys {
        let ordering = compare_by_key(a, b, sort);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    title_or_created_order(a, b)
}

/// Default order: title, then creation time. Empty titles go last.
pub fn title_or_created_order(a: &Card, b: &Card) -> Ordering {
    if let Some(gate) = empty_last(a.title.is_empty(), b.title.is_empty()) {
        return gate;
    }
    locale_compare(&a.title, &b.title).then_with(|| a.create_at.cmp(&b.create_at))
}

fn compare_by_key(a: &Card, b: &Card, sort: &ResolvedSort<'_>) -> Ordering {
    let template = match sort.key {
        SortKey::Title => {
            return directed(locale_compare(&a.title, &b.title), sort.reversed);
        }
        SortKey::Property(template) => template,
    };

    match template.property_type {
        PropertyType::CreatedTime => directed(a.create_at.cmp(&b.create_at), sort.reversed),
        PropertyType::UpdatedTime => directed(a.update_at.cmp(&b.update_at), sort.reversed),
        PropertyType::Number | PropertyType::Date => {
            let av = numeric_value(a, template);
            let bv = numeric_value(b, template);
            compare_present(av, bv, sort.reversed, |x, y| x.total_cmp(y))
        }
        PropertyType::Select | PropertyType::MultiSelect => {
            let av = option_rank(a, template);
            let bv = option_rank(b, template);
            compare_present(av, bv, sort.reversed, |x, y| x.cmp(y))
        }
        _ => {
            let av = a.value(&template.id).and_then(|v| v.first());
            let bv = b.value(&template.id).and_then(|v| v.first());
            compare_present(av, bv, sort.reversed, |x, y| locale_compare(x, y))
        }
    }
}

/// Apply the empty-last gate, then compare present values in the requested
/// direction. Two absent values tie.
fn compare_present<T>(
    a: Option<T>,
    b: Option<T>,
    reversed: bool,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => directed(cmp(&x, &y), reversed),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn empty_last(a_empty: bool, b_empty: bool) -> Option<Ordering> {
    match (a_empty, b_empty) {
        (false, true) => Some(Ordering::Less),
        (true, false) => Some(Ordering::Greater),
        _ => None,
    }
}

fn directed(ordering: Ordering, reversed: bool) -> Ordering {
    if reversed { ordering.reverse() } else { ordering }
}

/// Numeric reading of a number/date property. Dates may be stored either as
/// a bare number or as a JSON range object `{"from": <millis>, ...}`.
/// Non-finite readings (`NaN`, `inf`) count as empty.
fn numeric_value(card: &Card, template: &PropertyTemplate) -> Option<f64> {
    let raw = card.value(&template.id)?.first()?.trim();
    let number = match raw.parse::<f64>() {
        Ok(number) => Some(number),
        Err(_) if template.property_type == PropertyType::Date => {
            let parsed: serde_json::Value = serde_json::from_str(raw).ok()?;
            parsed.get("from").and_then(serde_json::Value::as_f64)
        }
        Err(_) => None,
    };
    number.filter(|n| n.is_finite())
}

/// Declared position of the card's option. Values that match no option rank
/// as absent.
fn option_rank(card: &Card, template: &PropertyTemplate) -> Option<usize> {
    let value = card.value(&template.id)?.first()?;
    template.option_position(value)
}

/// Case-insensitive comparison with a byte-order tie-break so the result is
/// a total order.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::PropertyValue;

    fn titles(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.title.as_str()).collect()
    }

    fn card(title: &str, create_at: i64) -> Card {
        let mut card = Card::new("b", title);
        card.create_at = create_at;
        card
    }

    fn priority() -> PropertyTemplate {
        PropertyTemplate::select("prio", "Priority", &["Low", "Medium", "High"])
    }

    #[test]
    fn test_default_sort_by_title_with_empty_last() {
        let cards = vec![card("", 1), card("beta", 2), card("Alpha", 3)];
        let sorted = sort_cards(cards, &[], &[]);
        assert_eq!(titles(&sorted), vec!["Alpha", "beta", ""]);
    }

    #[test]
    fn test_default_sort_ties_break_by_creation() {
        let mut late = card("Same", 20);
        late.fields.icon = "late".into();
        let mut early = card("Same", 10);
        early.fields.icon = "early".into();
        let sorted = sort_cards(vec![late, early], &[], &[]);
        assert_eq!(sorted[0].fields.icon, "early");
        assert_eq!(sorted[1].fields.icon, "late");
    }

    #[test]
    fn test_untitled_cards_order_by_creation() {
        let sorted = sort_cards(vec![card("", 5), card("", 1)], &[], &[]);
        assert_eq!(sorted[0].create_at, 1);
    }

    #[test]
    fn test_select_sort_uses_option_order() {
        let cards = vec![
            card("a", 1).with_value("prio", "High"),
            card("b", 2).with_value("prio", "Low"),
            card("c", 3).with_value("prio", "Medium"),
        ];
        let sorted = sort_cards(cards, &[SortOption::ascending("prio")], &[priority()]);
        let values: Vec<_> = sorted
            .iter()
            .map(|c| c.value("prio").and_then(PropertyValue::first).unwrap())
            .collect();
        assert_eq!(values, vec!["Low", "Medium", "High"]);
    }

    #[test]
    fn test_empty_value_last_regardless_of_direction() {
        let cards = vec![
            card("empty", 1),
            card("low", 2).with_value("prio", "Low"),
            card("high", 3).with_value("prio", "High"),
        ];
        let asc = sort_cards(cards.clone(), &[SortOption::ascending("prio")], &[priority()]);
        assert_eq!(titles(&asc), vec!["low", "high", "empty"]);

        let desc = sort_cards(cards, &[SortOption::descending("prio")], &[priority()]);
        assert_eq!(titles(&desc), vec!["high", "low", "empty"]);
    }

    #[test]
    fn test_empty_title_last_regardless_of_direction() {
        let cards = vec![card("", 1), card("a", 2), card("z", 3)];
        let desc = sort_cards(cards.clone(), &[SortOption::descending(TITLE_PROPERTY_ID)], &[]);
        assert_eq!(titles(&desc), vec!["z", "a", ""]);

        let by_prop = sort_cards(
            vec![
                card("", 1).with_value("prio", "Low"),
                card("titled", 2).with_value("prio", "High"),
            ],
            &[SortOption::ascending("prio")],
            &[priority()],
        );
        assert_eq!(titles(&by_prop), vec!["titled", ""]);
    }

    #[test]
    fn test_unknown_option_value_ranks_as_empty() {
        let cards = vec![
            card("stale", 1).with_value("prio", "Urgent"),
            card("known", 2).with_value("prio", "High"),
        ];
        let sorted = sort_cards(cards, &[SortOption::ascending("prio")], &[priority()]);
        assert_eq!(titles(&sorted), vec!["known", "stale"]);
    }

    #[test]
    fn test_number_sort_is_numeric() {
        let est = PropertyTemplate::new("est", "Estimate", PropertyType::Number);
        let cards = vec![
            card("ten", 1).with_value("est", "10"),
            card("nine", 2).with_value("est", "9"),
            card("none", 3),
            card("half", 4).with_value("est", "0.5"),
        ];
        let sorted = sort_cards(cards.clone(), &[SortOption::ascending("est")], &[est.clone()]);
        assert_eq!(titles(&sorted), vec!["half", "nine", "ten", "none"]);

        let sorted = sort_cards(cards, &[SortOption::descending("est")], &[est]);
        assert_eq!(titles(&sorted), vec!["ten", "nine", "half", "none"]);
    }

    #[test]
    fn test_non_finite_numbers_sort_as_empty() {
        let est = PropertyTemplate::new("est", "Estimate", PropertyType::Number);
        let cards = vec![
            card("three", 1).with_value("est", "3"),
            card("nan-a", 2).with_value("est", "NaN"),
            card("one", 3).with_value("est", "1"),
            card("nan-b", 4).with_value("est", "NaN"),
            card("two", 5).with_value("est", "2"),
            card("huge", 6).with_value("est", "inf"),
        ];
        let sorted = sort_cards(cards.clone(), &[SortOption::ascending("est")], &[est.clone()]);
        assert_eq!(titles(&sorted), vec!["one", "two", "three", "huge", "nan-a", "nan-b"]);

        let sorted = sort_cards(cards, &[SortOption::descending("est")], &[est]);
        assert_eq!(titles(&sorted), vec!["three", "two", "one", "huge", "nan-a", "nan-b"]);
    }

    #[test]
    fn test_date_sort_reads_range_objects() {
        let due = PropertyTemplate::new("due", "Due", PropertyType::Date);
        let cards = vec![
            card("later", 1).with_value("due", r#"{"from": 2000}"#),
            card("sooner", 2).with_value("due", "1000"),
        ];
        let sorted = sort_cards(cards, &[SortOption::ascending("due")], &[due]);
        assert_eq!(titles(&sorted), vec!["sooner", "later"]);
    }

    #[test]
    fn test_created_and_updated_time_sorts() {
        let created = PropertyTemplate::new("ct", "Created", PropertyType::CreatedTime);
        let updated = PropertyTemplate::new("ut", "Updated", PropertyType::UpdatedTime);
        let mut a = card("a", 2);
        a.update_at = 10;
        let mut b = card("b", 1);
        b.update_at = 20;

        let sorted = sort_cards(
            vec![a.clone(), b.clone()],
            &[SortOption::ascending("ct")],
            &[created],
        );
        assert_eq!(titles(&sorted), vec!["b", "a"]);

        let sorted = sort_cards(vec![b, a], &[SortOption::ascending("ut")], &[updated]);
        assert_eq!(titles(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_text_sort_is_case_insensitive() {
        let owner = PropertyTemplate::new("owner", "Owner", PropertyType::Text);
        let cards = vec![
            card("1", 1).with_value("owner", "bob"),
            card("2", 2).with_value("owner", "Alice"),
            card("3", 3).with_value("owner", "carol"),
        ];
        let sorted = sort_cards(cards, &[SortOption::ascending("owner")], &[owner]);
        assert_eq!(titles(&sorted), vec!["2", "1", "3"]);
    }

    #[test]
    fn test_multi_key_sort_is_lexicographic() {
        let owner = PropertyTemplate::new("owner", "Owner", PropertyType::Text);
        let cards = vec![
            card("a", 1).with_value("prio", "High").with_value("owner", "zed"),
            card("b", 2).with_value("prio", "Low").with_value("owner", "yan"),
            card("c", 3).with_value("prio", "High").with_value("owner", "amy"),
            card("d", 4).with_value("prio", "Low").with_value("owner", "bea"),
        ];
        let sorted = sort_cards(
            cards,
            &[SortOption::ascending("prio"), SortOption::ascending("owner")],
            &[priority(), owner],
        );
        // Primary key wins; the secondary key only orders within each priority.
        // Applying the keys one after another would leave owner order only.
        assert_eq!(titles(&sorted), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_unknown_sort_property_is_skipped() {
        let cards = vec![card("b", 1), card("a", 2)];
        let sorted = sort_cards(cards, &[SortOption::descending("ghost")], &[]);
        assert_eq!(titles(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_locale_compare_total_order() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("A", "a"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }
}
