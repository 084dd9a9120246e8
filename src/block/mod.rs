//! Block entity model.
//!
//! Every persisted entity is a [`Block`]: a flat record with an untyped
//! `fields` bag. Boards, views and cards are typed specializations obtained
//! through [`TypedBlock`], which decodes `fields` into a concrete struct and
//! re-encodes it on the way back to the store.
//!
//! ## Example
//!
//! ```
//! use boards::block::{Block, Board, Card, PropertyTemplate, PropertyType};
//!
//! let mut board = Board::new("Roadmap");
//! board.fields.card_properties.push(PropertyTemplate::select(
//!     "status",
//!     "Status",
//!     &["Todo", "Doing", "Done"],
//! ));
//!
//! let card = Card::new(&board.id, "Write docs").with_value("status", "Todo");
//! let raw: Block = card.to_block().unwrap();
//! assert_eq!(raw.parent_id, board.id);
//! assert_eq!(Card::from_block(&raw).unwrap().title, "Write docs");
//! ```

mod board;
mod card;
mod types;
mod view;

pub use board::{BoardFields, PropertyOption, PropertyTemplate, PropertyType};
pub use card::{CardFields, PropertyValue};
pub use types::{Block, BlockFields, BlockType, TypedBlock};
pub use view::{SortOption, ViewFields, ViewType};

/// A board: a block holding the property schema for its cards.
pub type Board = TypedBlock<BoardFields>;

/// A view: a block describing how a board's cards are presented.
pub type BoardView = TypedBlock<ViewFields>;

/// A card: a block holding property values keyed by template id.
pub type Card = TypedBlock<CardFields>;

/// Pseudo property id that addresses a card's title in sorts and filters.
pub const TITLE_PROPERTY_ID: &str = "__name";

/// Current block schema version.
pub const BLOCK_SCHEMA_VERSION: i64 = 1;

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a fresh block id.
pub fn create_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
