//! Derived view computation.
//!
//! A [`DerivedView`] is recomputed from scratch every time the card set, the
//! active view or the view's configuration changes. The pipeline is:
//!
//! 1. drop deleted cards and apply the title search
//! 2. filter with the view's [`FilterGroup`](crate::filter::FilterGroup)
//! 3. sort with the view's sort options
//! 4. group by the view's select property (board views only)
//!
//! ## Example
//!
//! ```
//! use boards::block::{Board, BoardView, Card, PropertyTemplate, ViewType};
//! use boards::view::ViewEngine;
//!
//! let mut board = Board::new("Sprint");
//! board.fields.card_properties.push(PropertyTemplate::select(
//!     "status",
//!     "Status",
//!     &["Todo", "Doing", "Done"],
//! ));
//! let mut view = BoardView::new(&board.id, "Board", ViewType::Board);
//! view.fields.group_by_id = Some("status".to_string());
//!
//! let cards = vec![
//!     Card::new(&board.id, "A").with_value("status", "Todo"),
//!     Card::new(&board.id, "B").with_value("status", "Done"),
//!     Card::new(&board.id, "C"),
//! ];
//!
//! let derived = ViewEngine::new().compute(&board, &view, &cards);
//! assert_eq!(derived.empty_group_cards.len(), 1);
//! assert_eq!(derived.groups.len(), 3);
//! ```

mod group;
mod sort;

pub use group::{CardGroup, Grouping, group_cards};
pub use sort::{locale_compare, sort_cards, title_or_created_order};

use crate::block::{Board, BoardView, Card, PropertyTemplate, PropertyType};
use crate::filter::{is_filter_group_met, search_matches};

/// Filtered, sorted and (optionally) grouped cards of one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedView {
    /// All visible cards, filtered and sorted
    pub cards: Vec<Card>,
    /// The property the cards were grouped by, when grouped
    pub group_by_property: Option<PropertyTemplate>,
    pub empty_group_cards: Vec<Card>,
    pub groups: Vec<CardGroup>,
    pub hidden_groups: Vec<CardGroup>,
}

impl DerivedView {
    pub fn is_grouped(&self) -> bool {
        self.group_by_property.is_some()
    }

    /// The flat card list, for views that do not group.
    pub fn ungrouped_cards(&self) -> Option<&[Card]> {
        if self.is_grouped() {
            None
        } else {
            Some(&self.cards)
        }
    }
}

/// Computes derived views. Holds only the transient search state.
#[derive(Debug, Clone, Default)]
pub struct ViewEngine {
    search_text: String,
    search_case_sensitive: bool,
}

impl ViewEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results to cards whose title contains `text`.
    pub fn with_search(mut self, text: &str, case_sensitive: bool) -> Self {
        self.search_text = text.to_string();
        self.search_case_sensitive = case_sensitive;
        self
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    /// Compute the derived view of `cards` under `view`.
    pub fn compute(&self, board: &Board, view: &BoardView, cards: &[Card]) -> DerivedView {
        let templates = &board.fields.card_properties;

        let visible: Vec<Card> = cards
            .iter()
            .filter(|card| !card.is_deleted())
            .filter(|card| search_matches(card, &self.search_text, self.search_case_sensitive))
            .filter(|card| is_filter_group_met(&view.fields.filter, card))
            .cloned()
            .collect();

        let sorted = sort_cards(visible, &view.fields.sort_options, templates);

        let group_by = if view.fields.view_type.groups_cards() {
            resolve_group_by(board, view)
        } else {
            None
        };

        let Some(template) = group_by else {
            return DerivedView {
                cards: sorted,
                ..Default::default()
            };
        };

        let grouping = group_cards(&sorted, template, &view.fields.hidden_option_ids);
        tracing::debug!(
            view_id = %view.id,
            cards = sorted.len(),
            groups = grouping.groups.len(),
            "computed grouped view"
        );
        DerivedView {
            cards: sorted,
            group_by_property: Some(template.clone()),
            empty_group_cards: grouping.empty_group_cards,
            groups: grouping.groups,
            hidden_groups: grouping.hidden_groups,
        }
    }
}

/// The view's group-by template, if it names an existing select property.
pub fn resolve_group_by<'a>(board: &'a Board, view: &BoardView) -> Option<&'a PropertyTemplate> {
    let id = view.fields.group_by_id.as_deref()?;
    board
        .property(id)
        .filter(|t| t.property_type == PropertyType::Select)
}
