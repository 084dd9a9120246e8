//! Undoable mutations of boards, views and cards.
//!
//! Every method snapshots the blocks it touches, builds the new versions and
//! hands both sets to the [`UndoManager`]: redo persists the new blocks, undo
//! persists the snapshots. Inputs are never modified; callers re-read the
//! authoritative state (for example through a
//! [`BoardTree`](crate::board_tree::BoardTree)) after a mutation completes.
//!
//! Lookups that fail (unknown property, option or block) are logged at error
//! level and returned as errors before anything reaches the store or the
//! undo history.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::block::{
    Block, BlockFields, BlockType, Board, BoardView, Card, PropertyOption, PropertyTemplate,
    PropertyType, PropertyValue, SortOption, TypedBlock, ViewType, create_id, now_millis,
};
use crate::errors::{BoardsError, Result, StoreError};
use crate::filter::FilterGroup;
use crate::store::BlockStore;
use crate::undo::{UndoAction, UndoManager, action};

/// A store write replayed by an undo or redo action.
#[derive(Debug, Clone)]
enum Write {
    Insert(Vec<Block>),
    Update(Vec<Block>),
    Delete(Vec<String>),
}

impl Write {
    async fn apply(&self, store: &dyn BlockStore) -> std::result::Result<(), StoreError> {
        match self {
            Write::Insert(blocks) => store.insert_blocks(blocks.clone()).await,
            Write::Update(blocks) => store.update_blocks(blocks.clone()).await,
            Write::Delete(ids) => {
                for id in ids {
                    store.delete_block(id).await?;
                }
                Ok(())
            }
        }
    }
}

fn write_action(store: &Arc<dyn BlockStore>, write: Write) -> UndoAction {
    let store = store.clone();
    action(move || {
        let store = store.clone();
        let write = write.clone();
        async move { write.apply(store.as_ref()).await.map_err(BoardsError::from) }
    })
}

fn encode<F: BlockFields>(block: &TypedBlock<F>) -> Result<Block> {
    block.to_block()
}

fn property_index(board: &Board, property_id: &str) -> Result<usize> {
    board
        .fields
        .card_properties
        .iter()
        .position(|t| t.id == property_id)
        .ok_or_else(|| {
            tracing::error!(board_id = %board.id, property_id, "property not found");
            BoardsError::PropertyNotFound {
                board_id: board.id.clone(),
                property_id: property_id.to_string(),
            }
        })
}

fn option_index(template: &PropertyTemplate, option_id: &str) -> Result<usize> {
    template
        .options
        .iter()
        .position(|o| o.id == option_id)
        .ok_or_else(|| {
            tracing::error!(property_id = %template.id, option_id, "option not found");
            BoardsError::OptionNotFound {
                property_id: template.id.clone(),
                option_id: option_id.to_string(),
            }
        })
}

fn duplicate_option_value(board: &Board, template: &PropertyTemplate, value: &str) -> BoardsError {
    tracing::error!(board_id = %board.id, property_id = %template.id, value, "option value already exists");
    BoardsError::InvalidBlock {
        id: board.id.clone(),
        reason: format!(
            "option value '{}' already exists on property '{}'",
            value, template.id
        ),
    }
}

/// Rewrite a card value after a select-like type change.
fn convert_value(value: &PropertyValue, to: PropertyType) -> PropertyValue {
    match (value, to) {
        (PropertyValue::Single(s), PropertyType::MultiSelect) => {
            PropertyValue::Multiple(vec![s.clone()])
        }
        (PropertyValue::Multiple(list), PropertyType::Select) => {
            PropertyValue::Single(list.first().cloned().unwrap_or_default())
        }
        (PropertyValue::Multiple(list), t) if !t.is_select_like() => {
            PropertyValue::Single(list.join(", "))
        }
        (other, _) => other.clone(),
    }
}

/// Applies undoable changes through a [`BlockStore`].
pub struct Mutator {
    store: Arc<dyn BlockStore>,
    undo_manager: Arc<UndoManager>,
    group_id: Mutex<Option<String>>,
    discardable: AtomicBool,
}

impl Mutator {
    pub fn new(store: Arc<dyn BlockStore>, undo_manager: Arc<UndoManager>) -> Self {
        Self {
            store,
            undo_manager,
            group_id: Mutex::new(None),
            discardable: AtomicBool::new(false),
        }
    }

    pub fn undo_manager(&self) -> &Arc<UndoManager> {
        &self.undo_manager
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    fn group(&self) -> MutexGuard<'_, Option<String>> {
        self.group_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn perform(&self, redo: Write, undo: Write, description: &str) -> Result<()> {
        let group_id = self.group().clone();
        self.undo_manager
            .perform_in_group(
                write_action(&self.store, redo),
                write_action(&self.store, undo),
                description,
                group_id.as_deref(),
                self.discardable.load(Ordering::SeqCst),
            )
            .await
    }

    async fn perform_update(
        &self,
        old: Vec<Block>,
        new: Vec<Block>,
        description: &str,
    ) -> Result<()> {
        let new = new.iter().map(Block::touched).collect();
        self.perform(Write::Update(new), Write::Update(old), description)
            .await
    }

    /// Run `f` so that every command it performs undoes and redoes as one
    /// step. Nested calls join the outer group.
    ///
    /// If `f` fails, commands it already performed stay registered as a group.
    pub async fn perform_as_undo_group<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let owns_group = {
            let mut group = self.group();
            if group.is_some() {
                false
            } else {
                *group = Some(create_id());
                true
            }
        };
        let result = f().await;
        if owns_group {
            *self.group() = None;
        }
        result
    }

    /// Run `f` with every command it performs registered as discardable.
    ///
    /// Use it for keystroke-style edits such as typing a title or a property
    /// value: the commands share the checkpoint of the command before them,
    /// so [`UndoManager::undo_to_checkpoint`] rewinds the whole burst at once.
    pub async fn perform_discardable<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outer = self.discardable.swap(true, Ordering::SeqCst);
        let result = f().await;
        self.discardable.store(outer, Ordering::SeqCst);
        result
    }

    // Generic blocks

    pub async fn update_block(&self, new: &Block, old: &Block, description: &str) -> Result<()> {
        self.perform_update(vec![old.clone()], vec![new.clone()], description)
            .await
    }

    pub async fn update_blocks(
        &self,
        new: &[Block],
        old: &[Block],
        description: &str,
    ) -> Result<()> {
        self.perform_update(old.to_vec(), new.to_vec(), description)
            .await
    }

    pub async fn insert_block(&self, block: &Block, description: &str) -> Result<()> {
        self.insert_blocks(std::slice::from_ref(block), description)
            .await
    }

    /// Insert blocks; undo soft-deletes them again.
    pub async fn insert_blocks(&self, blocks: &[Block], description: &str) -> Result<()> {
        let ids = blocks.iter().map(|b| b.id.clone()).collect();
        self.perform(
            Write::Insert(blocks.to_vec()),
            Write::Delete(ids),
            description,
        )
        .await
    }

    /// Soft-delete a block; undo restores the snapshot.
    pub async fn delete_block(&self, block: &Block, description: &str) -> Result<()> {
        self.perform(
            Write::Delete(vec![block.id.clone()]),
            Write::Insert(vec![block.clone()]),
            description,
        )
        .await
    }

    pub async fn change_title(&self, block: &Block, title: &str) -> Result<()> {
        let mut new = block.clone();
        new.title = title.to_string();
        self.update_block(&new, block, "change title").await
    }

    pub async fn change_icon(&self, block: &Block, icon: &str) -> Result<()> {
        let mut new = block.clone();
        new.fields.insert("icon".to_string(), icon.into());
        self.update_block(&new, block, "change icon").await
    }

    pub async fn change_description(&self, block: &Block, description: &str) -> Result<()> {
        let mut new = block.clone();
        new.fields
            .insert("description".to_string(), description.into());
        self.update_block(&new, block, "change description").await
    }

    // Cards

    /// Set (or with `None`, clear) one property value of a card.
    pub async fn change_property_value(
        &self,
        card: &Card,
        property_id: &str,
        value: Option<PropertyValue>,
    ) -> Result<()> {
        let mut new = card.clone();
        match value {
            Some(value) => {
                new.fields
                    .properties
                    .insert(property_id.to_string(), value);
            }
            None => {
                new.fields.properties.remove(property_id);
            }
        }
        self.perform_update(vec![encode(card)?], vec![encode(&new)?], "edit property")
            .await
    }

    /// Copy a card and its content blocks under fresh ids. Comments and
    /// deleted children are not copied.
    pub async fn duplicate_card(&self, card_id: &str) -> Result<Card> {
        let blocks = self.store.get_subtree(card_id).await.inspect_err(|e| {
            tracing::error!(card_id, error = %e, "cannot load card to duplicate");
        })?;
        let Some(root) = blocks.first() else {
            tracing::error!(card_id, "card not found");
            return Err(StoreError::NotFound {
                id: card_id.to_string(),
            }
            .into());
        };
        if root.block_type != BlockType::Card {
            tracing::error!(card_id, block_type = %root.block_type, "not a card");
            return Err(BoardsError::InvalidBlock {
                id: card_id.to_string(),
                reason: format!("expected a card block, found {}", root.block_type),
            });
        }

        let kept: Vec<&Block> = blocks
            .iter()
            .filter(|b| b.id == card_id || (!b.is_deleted() && b.block_type != BlockType::Comment))
            .collect();
        let ids: HashMap<&str, String> = kept.iter().map(|b| (b.id.as_str(), create_id())).collect();

        let now = now_millis();
        let copies: Vec<Block> = kept
            .iter()
            .map(|b| {
                let mut copy = (*b).clone();
                copy.id = ids.get(b.id.as_str()).cloned().unwrap_or_else(create_id);
                if let Some(parent) = ids.get(b.parent_id.as_str()) {
                    copy.parent_id = parent.clone();
                }
                if b.id == card_id {
                    copy.title = format!("Copy of {}", b.title);
                }
                copy.create_at = now;
                copy.update_at = now;
                copy.delete_at = 0;
                copy
            })
            .collect();

        let card = copies
            .first()
            .map(Card::from_block)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound {
                id: card_id.to_string(),
            })?;

        self.insert_blocks(&copies, "duplicate card").await?;
        tracing::debug!(source = card_id, copy = %card.id, blocks = copies.len(), "duplicated card");
        Ok(card)
    }

    // Property templates

    /// Insert a property template at `index` (default: end). When a view is
    /// given the new property is made visible in it at the same position.
    /// Returns the inserted template's id.
    pub async fn insert_property_template(
        &self,
        board: &Board,
        view: Option<&BoardView>,
        index: Option<usize>,
        template: Option<PropertyTemplate>,
    ) -> Result<String> {
        let template = template
            .unwrap_or_else(|| PropertyTemplate::new(&create_id(), "New Property", PropertyType::Text));
        let template_id = template.id.clone();

        let mut new_board = board.clone();
        let properties = &mut new_board.fields.card_properties;
        let at = index.unwrap_or(properties.len()).min(properties.len());
        properties.insert(at, template);

        let mut old = vec![encode(board)?];
        let mut new = vec![encode(&new_board)?];
        if let Some(view) = view {
            let mut new_view = view.clone();
            let visible = &mut new_view.fields.visible_property_ids;
            let at = index.unwrap_or(visible.len()).min(visible.len());
            visible.insert(at, template_id.clone());
            old.push(encode(view)?);
            new.push(encode(&new_view)?);
        }

        self.perform_update(old, new, "add property").await?;
        Ok(template_id)
    }

    /// Copy a property template right after the original. Returns the copy's id.
    pub async fn duplicate_property_template(
        &self,
        board: &Board,
        view: Option<&BoardView>,
        property_id: &str,
    ) -> Result<String> {
        let index = property_index(board, property_id)?;
        let source = &board.fields.card_properties[index];
        let mut copy = source.clone();
        copy.id = create_id();
        copy.name = format!("Copy of {}", source.name);
        let copy_id = copy.id.clone();

        let mut new_board = board.clone();
        new_board.fields.card_properties.insert(index + 1, copy);

        let mut old = vec![encode(board)?];
        let mut new = vec![encode(&new_board)?];
        if let Some(view) = view {
            let mut new_view = view.clone();
            let visible = &mut new_view.fields.visible_property_ids;
            let at = visible
                .iter()
                .position(|id| id == property_id)
                .map_or(visible.len(), |i| i + 1);
            visible.insert(at, copy_id.clone());
            old.push(encode(view)?);
            new.push(encode(&new_view)?);
        }

        self.perform_update(old, new, "duplicate property").await?;
        Ok(copy_id)
    }

    pub async fn change_property_template_order(
        &self,
        board: &Board,
        property_id: &str,
        dest_index: usize,
    ) -> Result<()> {
        let index = property_index(board, property_id)?;
        let mut new_board = board.clone();
        let properties = &mut new_board.fields.card_properties;
        let template = properties.remove(index);
        let at = dest_index.min(properties.len());
        properties.insert(at, template);
        self.perform_update(vec![encode(board)?], vec![encode(&new_board)?], "reorder property")
            .await
    }

    /// Remove a property from the board and every reference to it from the
    /// given views and cards. Unchanged views and cards are not written.
    pub async fn delete_property(
        &self,
        board: &Board,
        views: &[BoardView],
        cards: &[Card],
        property_id: &str,
    ) -> Result<()> {
        let index = property_index(board, property_id)?;
        let mut new_board = board.clone();
        new_board.fields.card_properties.remove(index);

        let mut old = vec![encode(board)?];
        let mut new = vec![encode(&new_board)?];

        for view in views {
            let fields = &view.fields;
            let references = fields.visible_property_ids.iter().any(|id| id == property_id)
                || fields.sort_options.iter().any(|s| s.property_id == property_id)
                || fields.group_by_id.as_deref() == Some(property_id)
                || fields.filter.references_property(property_id);
            if !references {
                continue;
            }
            let mut new_view = view.clone();
            let fields = &mut new_view.fields;
            fields.visible_property_ids.retain(|id| id != property_id);
            fields.sort_options.retain(|s| s.property_id != property_id);
            if fields.group_by_id.as_deref() == Some(property_id) {
                fields.group_by_id = None;
            }
            fields.filter = fields.filter.without_property(property_id);
            old.push(encode(view)?);
            new.push(encode(&new_view)?);
        }

        for card in cards {
            if !card.fields.properties.contains_key(property_id) {
                continue;
            }
            let mut new_card = card.clone();
            new_card.fields.properties.remove(property_id);
            old.push(encode(card)?);
            new.push(encode(&new_card)?);
        }

        self.perform_update(old, new, "delete property").await
    }

    pub async fn rename_property(&self, board: &Board, property_id: &str, name: &str) -> Result<()> {
        let index = property_index(board, property_id)?;
        let mut new_board = board.clone();
        new_board.fields.card_properties[index].name = name.to_string();
        self.perform_update(vec![encode(board)?], vec![encode(&new_board)?], "rename property")
            .await
    }

    /// Change a property's type.
    ///
    /// Switching to a select-like type builds one option per distinct card
    /// value, in card order. Switching away clears the options. Card values
    /// are converted between single and list form as needed.
    pub async fn change_property_type(
        &self,
        board: &Board,
        cards: &[Card],
        property_id: &str,
        new_type: PropertyType,
    ) -> Result<()> {
        let index = property_index(board, property_id)?;
        let old_template = &board.fields.card_properties[index];
        if old_template.property_type == new_type {
            return Ok(());
        }

        let mut template = old_template.clone();
        template.property_type = new_type;
        if new_type.is_select_like() && !old_template.property_type.is_select_like() {
            for card in cards {
                let Some(value) = card.value(property_id) else {
                    continue;
                };
                let values: Vec<&str> = match value {
                    PropertyValue::Single(s) => vec![s.as_str()],
                    PropertyValue::Multiple(list) => list.iter().map(String::as_str).collect(),
                };
                for value in values {
                    if !value.is_empty() && template.option_by_value(value).is_none() {
                        template.options.push(PropertyOption::new(value));
                    }
                }
            }
        } else if !new_type.is_select_like() {
            template.options.clear();
        }

        let mut new_board = board.clone();
        new_board.fields.card_properties[index] = template;

        let mut old = vec![encode(board)?];
        let mut new = vec![encode(&new_board)?];
        for card in cards {
            let Some(value) = card.fields.properties.get(property_id) else {
                continue;
            };
            let converted = convert_value(value, new_type);
            if &converted == value {
                continue;
            }
            let mut new_card = card.clone();
            new_card
                .fields
                .properties
                .insert(property_id.to_string(), converted);
            old.push(encode(card)?);
            new.push(encode(&new_card)?);
        }

        self.perform_update(old, new, "change property type").await
    }

    // Property options

    /// Append an option to a select-like property. Option values must be
    /// unique within the property.
    pub async fn insert_property_option(
        &self,
        board: &Board,
        property_id: &str,
        option: PropertyOption,
    ) -> Result<()> {
        let index = property_index(board, property_id)?;
        let template = &board.fields.card_properties[index];
        if template.option_by_value(&option.value).is_some() {
            return Err(duplicate_option_value(board, template, &option.value));
        }
        let mut new_board = board.clone();
        new_board.fields.card_properties[index].options.push(option);
        self.perform_update(vec![encode(board)?], vec![encode(&new_board)?], "add option")
            .await
    }

    pub async fn delete_property_option(
        &self,
        board: &Board,
        property_id: &str,
        option_id: &str,
    ) -> Result<()> {
        let index = property_index(board, property_id)?;
        let position = option_index(&board.fields.card_properties[index], option_id)?;
        let mut new_board = board.clone();
        new_board.fields.card_properties[index]
            .options
            .remove(position);
        self.perform_update(vec![encode(board)?], vec![encode(&new_board)?], "delete option")
            .await
    }

    pub async fn change_property_option_order(
        &self,
        board: &Board,
        property_id: &str,
        option_id: &str,
        dest_index: usize,
    ) -> Result<()> {
        let index = property_index(board, property_id)?;
        let position = option_index(&board.fields.card_properties[index], option_id)?;
        let mut new_board = board.clone();
        let options = &mut new_board.fields.card_properties[index].options;
        let option = options.remove(position);
        let at = dest_index.min(options.len());
        options.insert(at, option);
        self.perform_update(vec![encode(board)?], vec![encode(&new_board)?], "reorder options")
            .await
    }

    /// Rename an option and rewrite every card value that referenced the old
    /// value.
    pub async fn change_property_option_value(
        &self,
        board: &Board,
        cards: &[Card],
        property_id: &str,
        option_id: &str,
        value: &str,
    ) -> Result<()> {
        let index = property_index(board, property_id)?;
        let template = &board.fields.card_properties[index];
        let position = option_index(template, option_id)?;
        let old_value = template.options[position].value.clone();
        if old_value == value {
            return Ok(());
        }
        if template.option_by_value(value).is_some() {
            return Err(duplicate_option_value(board, template, value));
        }

        let mut new_board = board.clone();
        new_board.fields.card_properties[index].options[position].value = value.to_string();

        let mut old = vec![encode(board)?];
        let mut new = vec![encode(&new_board)?];
        for card in cards {
            let Some(current) = card.fields.properties.get(property_id) else {
                continue;
            };
            if !current.matches(&old_value) {
                continue;
            }
            let rewritten = match current {
                PropertyValue::Single(_) => PropertyValue::Single(value.to_string()),
                PropertyValue::Multiple(list) => PropertyValue::Multiple(
                    list.iter()
                        .map(|v| if *v == old_value { value.to_string() } else { v.clone() })
                        .collect(),
                ),
            };
            let mut new_card = card.clone();
            new_card
                .fields
                .properties
                .insert(property_id.to_string(), rewritten);
            old.push(encode(card)?);
            new.push(encode(&new_card)?);
        }

        self.perform_update(old, new, "rename option").await
    }

    pub async fn change_property_option_color(
        &self,
        board: &Board,
        property_id: &str,
        option_id: &str,
        color: &str,
    ) -> Result<()> {
        let index = property_index(board, property_id)?;
        let position = option_index(&board.fields.card_properties[index], option_id)?;
        let mut new_board = board.clone();
        new_board.fields.card_properties[index].options[position].color = color.to_string();
        self.perform_update(vec![encode(board)?], vec![encode(&new_board)?], "change option color")
            .await
    }

    // Views

    async fn update_view(
        &self,
        view: &BoardView,
        description: &str,
        change: impl FnOnce(&mut BoardView),
    ) -> Result<()> {
        let mut new_view = view.clone();
        change(&mut new_view);
        self.perform_update(vec![encode(view)?], vec![encode(&new_view)?], description)
            .await
    }

    pub async fn change_view_sort_options(
        &self,
        view: &BoardView,
        sort_options: Vec<SortOption>,
    ) -> Result<()> {
        self.update_view(view, "sort", |v| v.fields.sort_options = sort_options)
            .await
    }

    pub async fn change_view_filter(&self, view: &BoardView, filter: FilterGroup) -> Result<()> {
        self.update_view(view, "filter", |v| v.fields.filter = filter)
            .await
    }

    /// Set the group-by property of a view. A given id must name a select
    /// property of `board`.
    pub async fn change_view_group_by_id(
        &self,
        board: &Board,
        view: &BoardView,
        group_by_id: Option<&str>,
    ) -> Result<()> {
        if let Some(id) = group_by_id {
            let index = property_index(board, id)?;
            let template = &board.fields.card_properties[index];
            if template.property_type != PropertyType::Select {
                tracing::error!(property_id = id, property_type = %template.property_type, "group-by requires a select property");
                return Err(BoardsError::InvalidBlock {
                    id: view.id.clone(),
                    reason: format!("cannot group by {} property '{}'", template.property_type, id),
                });
            }
        }
        let group_by_id = group_by_id.map(str::to_string);
        self.update_view(view, "group by", |v| v.fields.group_by_id = group_by_id)
            .await
    }

    pub async fn change_view_visible_properties(
        &self,
        view: &BoardView,
        visible_property_ids: Vec<String>,
    ) -> Result<()> {
        self.update_view(view, "show / hide property", |v| {
            v.fields.visible_property_ids = visible_property_ids
        })
        .await
    }

    /// Hide a group-by column. Does nothing if it is already hidden.
    pub async fn hide_view_column(&self, view: &BoardView, option_id: &str) -> Result<()> {
        if view.fields.hidden_option_ids.iter().any(|id| id == option_id) {
            return Ok(());
        }
        self.update_view(view, "hide column", |v| {
            v.fields.hidden_option_ids.push(option_id.to_string())
        })
        .await
    }

    /// Show a hidden group-by column. Does nothing if it is not hidden.
    pub async fn unhide_view_column(&self, view: &BoardView, option_id: &str) -> Result<()> {
        if !view.fields.hidden_option_ids.iter().any(|id| id == option_id) {
            return Ok(());
        }
        self.update_view(view, "show column", |v| {
            v.fields.hidden_option_ids.retain(|id| id != option_id)
        })
        .await
    }

    pub async fn change_view_type(&self, view: &BoardView, view_type: ViewType) -> Result<()> {
        self.update_view(view, "change view type", |v| v.fields.view_type = view_type)
            .await
    }
}
