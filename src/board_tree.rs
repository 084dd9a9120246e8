//! In-memory snapshot of one board, its views and its cards.

use crate::block::{
    Block, BlockType, Board, BoardView, Card, PropertyTemplate, PropertyType, ViewType, create_id,
};
use crate::errors::{BoardsError, Result, StoreError};
use crate::mutator::Mutator;
use crate::store::BlockStore;
use crate::view::{DerivedView, ViewEngine, resolve_group_by};

/// Decoded board subtree plus the transient UI state (active view, search).
#[derive(Debug, Clone)]
pub struct BoardTree {
    pub board: Board,
    pub views: Vec<BoardView>,
    pub cards: Vec<Card>,
    active_view_id: Option<String>,
    engine: ViewEngine,
    search_case_sensitive: bool,
}

impl BoardTree {
    /// Fetch and decode the subtree rooted at `board_id`.
    pub async fn load(store: &dyn BlockStore, board_id: &str) -> Result<Self> {
        let blocks = store.get_subtree(board_id).await.map_err(|e| match e {
            StoreError::NotFound { .. } => BoardsError::BoardNotFound {
                id: board_id.to_string(),
            },
            other => other.into(),
        })?;
        Self::from_blocks(board_id, &blocks)
    }

    /// Build a tree from raw blocks. Deleted blocks are skipped, as are views
    /// and cards whose fields fail to decode.
    pub fn from_blocks(board_id: &str, blocks: &[Block]) -> Result<Self> {
        let root = blocks
            .iter()
            .find(|b| b.id == board_id && !b.is_deleted())
            .ok_or_else(|| BoardsError::BoardNotFound {
                id: board_id.to_string(),
            })?;
        let board = Board::from_block(root)?;

        let mut views = Vec::new();
        let mut cards = Vec::new();
        for block in blocks {
            if block.is_deleted() || block.parent_id != board_id {
                continue;
            }
            match block.block_type {
                BlockType::View => match BoardView::from_block(block) {
                    Ok(view) => views.push(view),
                    Err(e) => tracing::warn!(block_id = %block.id, error = %e, "skipping view"),
                },
                BlockType::Card => match Card::from_block(block) {
                    Ok(card) => cards.push(card),
                    Err(e) => tracing::warn!(block_id = %block.id, error = %e, "skipping card"),
                },
                _ => {}
            }
        }

        tracing::debug!(
            board_id,
            views = views.len(),
            cards = cards.len(),
            "loaded board tree"
        );
        let active_view_id = views.first().map(|v| v.id.clone());
        Ok(Self {
            board,
            views,
            cards,
            active_view_id,
            engine: ViewEngine::new(),
            search_case_sensitive: false,
        })
    }

    pub fn active_view(&self) -> Option<&BoardView> {
        let id = self.active_view_id.as_deref()?;
        self.views.iter().find(|v| v.id == id)
    }

    pub fn view(&self, view_id: &str) -> Option<&BoardView> {
        self.views.iter().find(|v| v.id == view_id)
    }

    pub fn set_active_view(&mut self, view_id: &str) -> Result<()> {
        if self.view(view_id).is_none() {
            return Err(BoardsError::ViewNotFound {
                id: view_id.to_string(),
            });
        }
        self.active_view_id = Some(view_id.to_string());
        Ok(())
    }

    pub fn set_search_text(&mut self, text: &str) {
        self.engine = ViewEngine::new().with_search(text, self.search_case_sensitive);
    }

    pub fn set_search_case_sensitive(&mut self, case_sensitive: bool) {
        self.search_case_sensitive = case_sensitive;
        let text = self.engine.search_text().to_string();
        self.set_search_text(&text);
    }

    pub fn search_text(&self) -> &str {
        self.engine.search_text()
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    /// Derived view of the active view, or `None` when the board has no views.
    pub fn derived_view(&self) -> Option<DerivedView> {
        let view = self.active_view()?;
        Some(self.engine.compute(&self.board, view, &self.cards))
    }

    /// Repair a board so it can be shown as a kanban board.
    ///
    /// Adds a `Status` select property when the board has no select
    /// property, creates a board view when there is none, and points every
    /// board view without a valid select group-by at the first select
    /// property. The returned [`SchemaRepair`] keeps the pre-repair snapshot
    /// of every existing block it changed so the write can be undone.
    pub fn ensure_minimum_schema(&mut self) -> Result<SchemaRepair> {
        let mut repair = SchemaRepair::default();

        if self.board.first_select_property().is_none() {
            let old = self.board.to_block()?;
            self.board.fields.card_properties.push(PropertyTemplate::new(
                &create_id(),
                "Status",
                PropertyType::Select,
            ));
            repair.record_update(old, self.board.to_block()?);
        }

        let mut created_view = None;
        if self.views.is_empty() {
            let view = BoardView::new(&self.board.id, "Board view", ViewType::Board);
            self.active_view_id = Some(view.id.clone());
            created_view = Some(view.id.clone());
            self.views.push(view);
        }

        let first_select = self.board.first_select_property().map(|t| t.id.clone());
        for view in self.views.iter_mut() {
            let created = created_view.as_deref() == Some(view.id.as_str());
            let needs_group_by = view.fields.view_type.groups_cards()
                && resolve_group_by(&self.board, view).is_none()
                && view.fields.group_by_id != first_select;
            if created {
                view.fields.group_by_id = first_select.clone();
                repair.created.push(view.to_block()?);
            } else if needs_group_by {
                let old = view.to_block()?;
                view.fields.group_by_id = first_select.clone();
                repair.record_update(old, view.to_block()?);
            }
        }

        if !repair.is_empty() {
            tracing::info!(board_id = %self.board.id, blocks = repair.len(), "repaired board schema");
        }
        Ok(repair)
    }
}

/// Blocks changed by [`BoardTree::ensure_minimum_schema`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaRepair {
    /// Blocks that did not exist before the repair.
    pub created: Vec<Block>,
    /// Existing blocks after the repair.
    pub updated: Vec<Block>,
    /// The same blocks before the repair, index-aligned with `updated`.
    pub previous: Vec<Block>,
}

impl SchemaRepair {
    fn record_update(&mut self, old: Block, new: Block) {
        self.previous.push(old);
        self.updated.push(new);
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len()
    }

    /// Write the repair as one undo step. Undo restores the previous
    /// snapshots and soft-deletes the created blocks.
    pub async fn persist(&self, mutator: &Mutator, description: &str) -> Result<()> {
        mutator
            .perform_as_undo_group(|| async {
                if !self.updated.is_empty() {
                    mutator
                        .update_blocks(&self.updated, &self.previous, description)
                        .await?;
                }
                if !self.created.is_empty() {
                    mutator.insert_blocks(&self.created, description).await?;
                }
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::undo::UndoManager;
    use std::sync::Arc;

    fn sample_blocks() -> (Board, BoardView, Vec<Block>) {
        let mut board = Board::new("Sprint");
        board.fields.card_properties.push(PropertyTemplate::select(
            "status",
            "Status",
            &["Todo", "Done"],
        ));
        let mut view = BoardView::new(&board.id, "Board", ViewType::Board);
        view.fields.group_by_id = Some("status".into());
        let table = BoardView::new(&board.id, "Table", ViewType::Table);

        let a = Card::new(&board.id, "A").with_value("status", "Todo");
        let mut gone = Card::new(&board.id, "Gone");
        gone.delete_at = 5;
        let note = Block::new(BlockType::Text, &a.id, "body");

        let blocks = vec![
            board.to_block().unwrap(),
            view.to_block().unwrap(),
            table.to_block().unwrap(),
            a.to_block().unwrap(),
            gone.to_block().unwrap(),
            note,
        ];
        (board, view, blocks)
    }

    #[tokio::test]
    async fn test_load_decodes_views_and_live_cards() {
        let (board, view, blocks) = sample_blocks();
        let store = InMemoryStore::with_blocks(blocks);
        let tree = BoardTree::load(&store, &board.id).await.unwrap();

        assert_eq!(tree.board.title, "Sprint");
        assert_eq!(tree.views.len(), 2);
        assert_eq!(tree.cards.len(), 1);
        assert!(tree.active_view().is_some());
        assert!(tree.view(&view.id).is_some());
    }

    #[tokio::test]
    async fn test_load_unknown_board() {
        let store = InMemoryStore::new();
        let err = BoardTree::load(&store, "nope").await.unwrap_err();
        assert!(matches!(err, BoardsError::BoardNotFound { ref id } if id == "nope"));
    }

    #[test]
    fn test_load_rejects_non_board_root() {
        let card = Card::new("b", "A").to_block().unwrap();
        let err = BoardTree::from_blocks(&card.id, &[card.clone()]).unwrap_err();
        assert!(matches!(err, BoardsError::InvalidBlock { .. }));
    }

    #[test]
    fn test_set_active_view_and_derive() {
        let (board, view, blocks) = sample_blocks();
        let mut tree = BoardTree::from_blocks(&board.id, &blocks).unwrap();
        tree.set_active_view(&view.id).unwrap();

        let derived = tree.derived_view().unwrap();
        assert!(derived.is_grouped());
        assert_eq!(derived.groups[0].cards.len(), 1);

        let err = tree.set_active_view("missing").unwrap_err();
        assert!(matches!(err, BoardsError::ViewNotFound { .. }));
        assert_eq!(tree.active_view().unwrap().id, view.id);
    }

    #[test]
    fn test_search_text_filters_derived_view() {
        let (board, _, blocks) = sample_blocks();
        let mut tree = BoardTree::from_blocks(&board.id, &blocks).unwrap();
        tree.set_search_text("zzz");
        assert!(tree.derived_view().unwrap().cards.is_empty());

        tree.set_search_text("a");
        assert_eq!(tree.derived_view().unwrap().cards.len(), 1);

        tree.set_search_case_sensitive(true);
        assert_eq!(tree.search_text(), "a");
        assert!(tree.derived_view().unwrap().cards.is_empty());
    }

    #[test]
    fn test_ensure_minimum_schema_on_empty_board() {
        let board = Board::new("Empty");
        let blocks = vec![board.to_block().unwrap()];
        let mut tree = BoardTree::from_blocks(&board.id, &blocks).unwrap();
        assert!(tree.derived_view().is_none());

        let repair = tree.ensure_minimum_schema().unwrap();
        assert_eq!(repair.updated.len(), 1);
        assert_eq!(repair.created.len(), 1);
        let status = &tree.board.fields.card_properties[0];
        assert_eq!(status.name, "Status");
        assert_eq!(status.property_type, PropertyType::Select);

        let view = tree.active_view().unwrap();
        assert_eq!(view.fields.group_by_id.as_deref(), Some(status.id.as_str()));
        assert!(tree.derived_view().unwrap().is_grouped());
    }

    #[test]
    fn test_ensure_minimum_schema_assigns_group_by() {
        let (board, view, mut blocks) = sample_blocks();
        let mut broken = BoardView::from_block(&blocks[1]).unwrap();
        broken.fields.group_by_id = Some("missing".into());
        blocks[1] = broken.to_block().unwrap();

        let mut tree = BoardTree::from_blocks(&board.id, &blocks).unwrap();
        let repair = tree.ensure_minimum_schema().unwrap();
        assert_eq!(repair.len(), 1);
        assert_eq!(repair.updated[0].id, view.id);
        assert_eq!(
            BoardView::from_block(&repair.previous[0]).unwrap().fields.group_by_id.as_deref(),
            Some("missing")
        );
        assert_eq!(
            tree.view(&view.id).unwrap().fields.group_by_id.as_deref(),
            Some("status")
        );

        assert!(tree.ensure_minimum_schema().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_minimum_schema_adds_select_beside_other_properties() {
        let mut board = Board::new("Notes");
        board
            .fields
            .card_properties
            .push(PropertyTemplate::new("notes", "Notes", PropertyType::Text));
        let view = BoardView::new(&board.id, "Board", ViewType::Board);
        let blocks = vec![board.to_block().unwrap(), view.to_block().unwrap()];
        let mut tree = BoardTree::from_blocks(&board.id, &blocks).unwrap();

        let repair = tree.ensure_minimum_schema().unwrap();
        assert_eq!(repair.updated.len(), 2);
        assert!(repair.created.is_empty());

        let properties = &tree.board.fields.card_properties;
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].id, "notes");
        let status = tree.board.first_select_property().unwrap();
        assert_eq!(status.name, "Status");
        assert_eq!(
            tree.view(&view.id).unwrap().fields.group_by_id.as_deref(),
            Some(status.id.as_str())
        );
        assert!(tree.derived_view().unwrap().is_grouped());
    }

    #[tokio::test]
    async fn test_persisted_repair_undoes_to_previous_board() {
        let board = Board::new("Fresh");
        let store = Arc::new(InMemoryStore::with_blocks(vec![board.to_block().unwrap()]));
        let undo = Arc::new(UndoManager::new(0));
        let mutator = Mutator::new(store.clone(), undo.clone());

        let mut tree = BoardTree::load(store.as_ref(), &board.id).await.unwrap();
        let repair = tree.ensure_minimum_schema().unwrap();
        let view_id = repair.created[0].id.clone();
        repair.persist(&mutator, "repair board").await.unwrap();

        let repaired = BoardTree::load(store.as_ref(), &board.id).await.unwrap();
        assert!(repaired.board.first_select_property().is_some());
        assert_eq!(repaired.views.len(), 1);

        assert_eq!(undo.undo().await.unwrap().as_deref(), Some("repair board"));
        assert!(!undo.can_undo());

        let stored = store.get(&board.id).await.unwrap();
        assert!(!stored.is_deleted());
        let restored = BoardTree::load(store.as_ref(), &board.id).await.unwrap();
        assert!(restored.board.fields.card_properties.is_empty());
        assert!(restored.views.is_empty());
        assert!(store.get(&view_id).await.unwrap().is_deleted());
    }
}
