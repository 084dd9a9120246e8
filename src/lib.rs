pub mod block;
pub mod board_tree;
pub mod config;
pub mod errors;
pub mod filter;
pub mod mutator;
pub mod store;
pub mod undo;
pub mod view;
