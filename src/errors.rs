//! Typed error hierarchy for the boards engine.
//!
//! Two top-level enums cover the two layers:
//! - `StoreError`: failures reported by a `BlockStore` implementation
//! - `BoardsError`: lookup, decoding and persistence failures surfaced by the
//!   mutator, the undo manager and the board tree

use thiserror::Error;

/// Errors from the persistence client.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Block {id} not found")]
    NotFound { id: String },

    #[error("Store rejected the request: {0}")]
    Rejected(String),

    #[error("Failed to (de)serialize block payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the engine, mutator and board tree.
#[derive(Debug, Error)]
pub enum BoardsError {
    #[error("Board {id} not found")]
    BoardNotFound { id: String },

    #[error("View {id} not found")]
    ViewNotFound { id: String },

    #[error("Property {property_id} not found on board {board_id}")]
    PropertyNotFound {
        board_id: String,
        property_id: String,
    },

    #[error("Option {option_id} not found on property {property_id}")]
    OptionNotFound {
        property_id: String,
        option_id: String,
    },

    #[error("Block {id} is invalid: {reason}")]
    InvalidBlock { id: String, reason: String },

    #[error("Invalid filter condition '{0}'. Valid values: includes, notIncludes, isEmpty, isNotEmpty")]
    InvalidFilterCondition(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BoardsError>;
