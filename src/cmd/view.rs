//! Snapshot inspection (`boards view`).

use anyhow::{Context, Result};
use console::style;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

use boards::block::{Block, BlockType, Card};
use boards::board_tree::BoardTree;
use boards::config::BoardsConfig;
use boards::mutator::Mutator;
use boards::store::InMemoryStore;
use boards::undo::UndoManager;
use boards::view::{CardGroup, DerivedView};

pub struct ViewArgs {
    pub snapshot: PathBuf,
    pub board: Option<String>,
    pub view: Option<String>,
    pub search: Option<String>,
    pub json: bool,
}

/// The only live root board of a snapshot.
fn find_root_board(blocks: &[Block]) -> Result<String> {
    let boards: Vec<&Block> = blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Board && b.parent_id.is_empty() && !b.is_deleted())
        .collect();
    match boards.as_slice() {
        [] => anyhow::bail!("No board found in snapshot"),
        [board] => Ok(board.id.clone()),
        many => anyhow::bail!(
            "Snapshot contains {} boards; pass --board with one of: {}",
            many.len(),
            many.iter().map(|b| b.id.as_str()).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn card_title(card: &Card) -> String {
    if card.title.is_empty() {
        "(untitled)".to_string()
    } else {
        card.title.clone()
    }
}

fn cards_json(cards: &[Card]) -> Vec<Value> {
    cards
        .iter()
        .map(|c| json!({ "id": c.id, "title": c.title }))
        .collect()
}

fn groups_json(groups: &[CardGroup]) -> Vec<Value> {
    groups
        .iter()
        .map(|g| {
            json!({
                "optionId": g.option.id,
                "value": g.option.value,
                "color": g.option.color,
                "cards": cards_json(&g.cards),
            })
        })
        .collect()
}

fn print_group(name: &str, cards: &[Card], hidden: bool) {
    let header = format!("{} ({})", name, cards.len());
    if hidden {
        println!("  {} {}", style(header).dim(), style("[hidden]").dim());
    } else {
        println!("  {}", style(header).bold());
    }
    for card in cards {
        println!("    - {}", card_title(card));
    }
}

pub async fn cmd_view(config: &BoardsConfig, args: ViewArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("Failed to read snapshot: {}", args.snapshot.display()))?;
    let blocks: Vec<Block> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot: {}", args.snapshot.display()))?;

    let board_id = match args.board {
        Some(id) => id,
        None => find_root_board(&blocks)?,
    };

    let store = Arc::new(InMemoryStore::with_blocks(blocks));
    let mut tree = BoardTree::load(store.as_ref(), &board_id)
        .await
        .with_context(|| format!("Failed to load board {}", board_id))?;

    let repair = tree.ensure_minimum_schema()?;
    if !repair.is_empty() {
        let mutator = Mutator::new(store.clone(), Arc::new(UndoManager::new(config.undo_limit())));
        repair.persist(&mutator, "repair board").await?;
        tree = BoardTree::load(store.as_ref(), &board_id).await?;
    }

    tree.set_search_case_sensitive(config.search_case_sensitive());
    if let Some(text) = &args.search {
        tree.set_search_text(text);
    }
    if let Some(view_id) = &args.view {
        tree.set_active_view(view_id)?;
    }

    let (Some(view), Some(derived)) = (tree.active_view(), tree.derived_view()) else {
        anyhow::bail!("Board {} has no views", board_id);
    };

    if args.json {
        print_json(&tree, view, &derived)?;
        return Ok(());
    }

    println!();
    println!("{}", style(&tree.board.title).bold().cyan());
    println!(
        "View: {} ({})  {} card(s)",
        view.title,
        view.fields.view_type,
        derived.cards.len()
    );
    if !tree.search_text().is_empty() {
        println!("Search: \"{}\"", tree.search_text());
    }
    println!();

    match (&derived.group_by_property, derived.ungrouped_cards()) {
        (Some(property), _) => {
            print_group(&format!("No {}", property.name), &derived.empty_group_cards, false);
            for group in &derived.groups {
                print_group(&group.option.value, &group.cards, false);
            }
            for group in &derived.hidden_groups {
                print_group(&group.option.value, &group.cards, true);
            }
        }
        (None, Some(cards)) => {
            for card in cards {
                println!("  - {}", card_title(card));
            }
        }
        (None, None) => {}
    }
    println!();

    Ok(())
}

fn print_json(tree: &BoardTree, view: &boards::block::BoardView, derived: &DerivedView) -> Result<()> {
    let output = json!({
        "board": { "id": tree.board.id, "title": tree.board.title },
        "view": {
            "id": view.id,
            "title": view.title,
            "viewType": view.fields.view_type,
        },
        "search": tree.search_text(),
        "grouped": derived.is_grouped(),
        "groupByProperty": derived.group_by_property.as_ref().map(|p| &p.id),
        "cards": cards_json(&derived.cards),
        "emptyGroupCards": cards_json(&derived.empty_group_cards),
        "groups": groups_json(&derived.groups),
        "hiddenGroups": groups_json(&derived.hidden_groups),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
