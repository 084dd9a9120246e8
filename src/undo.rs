//! Undo/redo command history.
//!
//! The [`UndoManager`] keeps an ordered list of reversible commands and a
//! position into it. Everything before the position has been applied; a new
//! command discards everything after it.
//!
//! The manager is an explicit context object: create one per editing session
//! and share it as `Arc<UndoManager>`. Calls to `perform`, `undo` and `redo`
//! are expected to be issued one at a time by the UI layer. Registration that
//! happens while a command is being replayed is ignored so that a replayed
//! action cannot corrupt the history.
//!
//! ## Example
//!
//! ```
//! use boards::undo::{UndoManager, action};
//! use std::sync::{Arc, Mutex};
//!
//! # #[tokio::main]
//! # async fn main() -> boards::errors::Result<()> {
//! let title = Arc::new(Mutex::new("old".to_string()));
//! let manager = UndoManager::new(0);
//!
//! let (t1, t2) = (title.clone(), title.clone());
//! manager
//!     .perform(
//!         action(move || { let t = t1.clone(); async move { *t.lock().unwrap() = "X".into(); Ok(()) } }),
//!         action(move || { let t = t2.clone(); async move { *t.lock().unwrap() = "old".into(); Ok(()) } }),
//!         "rename",
//!         false,
//!     )
//!     .await?;
//!
//! assert_eq!(manager.undo().await?.as_deref(), Some("rename"));
//! assert_eq!(*title.lock().unwrap(), "old");
//! # Ok(())
//! # }
//! ```

use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::block::now_millis;
use crate::errors::Result;

/// Future returned by an undo or redo action.
pub type ActionFuture = BoxFuture<'static, Result<()>>;

/// A zero-argument asynchronous action that can be invoked repeatedly.
pub type UndoAction = Arc<dyn Fn() -> ActionFuture + Send + Sync>;

/// Wrap an async closure as an [`UndoAction`].
pub fn action<F, Fut>(f: F) -> UndoAction
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// The reversible pair registered for one command.
#[derive(Clone)]
pub struct UndoRedo {
    pub undo: UndoAction,
    pub redo: UndoAction,
}

#[derive(Clone)]
struct Command {
    actions: UndoRedo,
    description: String,
    group_id: Option<String>,
    checkpoint: i64,
}

/// Snapshot of the history published to subscribers after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_description: Option<String>,
    pub redo_description: Option<String>,
    pub len: usize,
}

#[derive(Default)]
struct History {
    commands: Vec<Command>,
    /// Number of applied commands; the last applied one is at `position - 1`.
    position: usize,
    last_checkpoint: i64,
}

impl History {
    fn state(&self) -> UndoState {
        UndoState {
            can_undo: self.position > 0,
            can_redo: self.position < self.commands.len(),
            undo_description: self
                .position
                .checked_sub(1)
                .and_then(|i| described(&self.commands[i])),
            redo_description: self.commands.get(self.position).and_then(described),
            len: self.commands.len(),
        }
    }

    fn next_checkpoint(&mut self) -> i64 {
        let checkpoint = now_millis().max(self.last_checkpoint + 1);
        self.last_checkpoint = checkpoint;
        checkpoint
    }
}

fn described(command: &Command) -> Option<String> {
    if command.description.is_empty() {
        None
    } else {
        Some(command.description.clone())
    }
}

/// Sets the replay flag for its lifetime.
struct ReplayGuard<'a>(&'a AtomicBool);

impl<'a> ReplayGuard<'a> {
    /// Returns `None` if a replay is already running.
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum Direction {
    Undo,
    Redo,
}

/// Position-indexed history of reversible commands.
pub struct UndoManager {
    history: Mutex<History>,
    limit: usize,
    replaying: AtomicBool,
    state_tx: watch::Sender<UndoState>,
}

impl std::fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoManager")
            .field("limit", &self.limit)
            .field("state", &self.state())
            .finish()
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(0)
    }
}

impl UndoManager {
    /// Create a manager keeping at most `limit` commands (0 = unbounded).
    pub fn new(limit: usize) -> Self {
        let (state_tx, _) = watch::channel(UndoState::default());
        Self {
            history: Mutex::new(History::default()),
            limit,
            replaying: AtomicBool::new(false),
            state_tx,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        let state = self.history().state();
        self.state_tx.send_replace(state);
    }

    /// Receive a fresh [`UndoState`] after every history change.
    pub fn subscribe(&self) -> watch::Receiver<UndoState> {
        self.state_tx.subscribe()
    }

    /// Current history snapshot.
    pub fn state(&self) -> UndoState {
        self.history().state()
    }

    /// Run `redo`, then register the pair as one command.
    ///
    /// If `redo` fails the error is returned and nothing is registered.
    pub async fn perform(
        &self,
        redo: UndoAction,
        undo: UndoAction,
        description: &str,
        discardable: bool,
    ) -> Result<()> {
        self.perform_in_group(redo, undo, description, None, discardable)
            .await
    }

    /// Like [`perform`](Self::perform), tagging the command with `group_id`.
    /// Adjacent commands sharing a group id undo and redo together.
    pub async fn perform_in_group(
        &self,
        redo: UndoAction,
        undo: UndoAction,
        description: &str,
        group_id: Option<&str>,
        discardable: bool,
    ) -> Result<()> {
        redo().await?;
        self.register_undo(UndoRedo { undo, redo }, description, group_id, discardable);
        Ok(())
    }

    /// Append a command without running it.
    ///
    /// Ignored while an undo or redo is being replayed. Discards any redo
    /// branch. A discardable command reuses the previous command's checkpoint
    /// (0 when there is none) so that it coalesces with it; other commands
    /// get a fresh, strictly increasing checkpoint.
    pub fn register_undo(
        &self,
        actions: UndoRedo,
        description: &str,
        group_id: Option<&str>,
        discardable: bool,
    ) {
        if self.replaying.load(Ordering::SeqCst) {
            tracing::debug!(description, "ignoring registration during replay");
            return;
        }

        {
            let mut history = self.history();
            let position = history.position;
            history.commands.truncate(position);

            let checkpoint = if discardable {
                history.commands.last().map_or(0, |c| c.checkpoint)
            } else {
                history.next_checkpoint()
            };

            history.commands.push(Command {
                actions,
                description: description.to_string(),
                group_id: group_id.map(str::to_string),
                checkpoint,
            });

            if self.limit > 0 && history.commands.len() > self.limit {
                let excess = history.commands.len() - self.limit;
                history.commands.drain(..excess);
            }
            history.position = history.commands.len();
        }
        self.notify();
    }

    /// Undo the last applied command (or group).
    ///
    /// Returns the flash message for the UI: the command's description, or
    /// `"Undo"` when it has none. Returns `None` when there is nothing to
    /// undo or a replay is already running.
    pub async fn undo(&self) -> Result<Option<String>> {
        self.replay(Direction::Undo).await
    }

    /// Redo the next command (or group).
    ///
    /// Returns the flash message for the UI, or `None` when there is nothing
    /// to redo or a replay is already running.
    pub async fn redo(&self) -> Result<Option<String>> {
        self.replay(Direction::Redo).await
    }

    async fn replay(&self, direction: Direction) -> Result<Option<String>> {
        let Some(_guard) = ReplayGuard::acquire(&self.replaying) else {
            return Ok(None);
        };

        let result = self.replay_commands(&direction).await;
        drop(_guard);
        self.notify();

        let (verb, message) = match direction {
            Direction::Undo => ("undo", "Undo"),
            Direction::Redo => ("redo", "Redo"),
        };
        match result? {
            Some(description) => {
                let flash = if description.is_empty() {
                    message.to_string()
                } else {
                    description
                };
                tracing::info!(action = verb, description = %flash, "replayed command");
                Ok(Some(flash))
            }
            None => Ok(None),
        }
    }

    /// Replay one command, or every adjacent command of its group. Returns
    /// the description of the first replayed command.
    async fn replay_commands(&self, direction: &Direction) -> Result<Option<String>> {
        let mut first: Option<Command> = None;
        loop {
            let next = {
                let history = self.history();
                match direction {
                    Direction::Undo => history
                        .position
                        .checked_sub(1)
                        .map(|i| history.commands[i].clone()),
                    Direction::Redo => history.commands.get(history.position).cloned(),
                }
            };
            let Some(command) = next else { break };

            if let Some(head) = &first
                && (head.group_id.is_none() || head.group_id != command.group_id)
            {
                break;
            }

            match direction {
                Direction::Undo => (command.actions.undo)().await?,
                Direction::Redo => (command.actions.redo)().await?,
            }

            {
                let mut history = self.history();
                match direction {
                    Direction::Undo => history.position = history.position.saturating_sub(1),
                    Direction::Redo => {
                        history.position = (history.position + 1).min(history.commands.len())
                    }
                }
            }

            if first.is_none() {
                first = Some(command);
            }
        }
        Ok(first.map(|c| c.description))
    }

    /// Undo commands until the current checkpoint is at or below `checkpoint`.
    pub async fn undo_to_checkpoint(&self, checkpoint: i64) -> Result<()> {
        while self.can_undo() && self.current_checkpoint() > checkpoint {
            if self.undo().await?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Drop every command. Subscribers are only notified if there was any.
    pub fn clear(&self) {
        let had_commands = {
            let mut history = self.history();
            let had = !history.commands.is_empty();
            history.commands.clear();
            history.position = 0;
            had
        };
        if had_commands {
            self.notify();
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history().position > 0
    }

    pub fn can_redo(&self) -> bool {
        let history = self.history();
        history.position < history.commands.len()
    }

    /// Description of the command `undo` would revert.
    pub fn undo_description(&self) -> Option<String> {
        self.history().state().undo_description
    }

    /// Description of the command `redo` would re-apply.
    pub fn redo_description(&self) -> Option<String> {
        self.history().state().redo_description
    }

    /// Checkpoint of the last applied command, or 0.
    pub fn current_checkpoint(&self) -> i64 {
        let history = self.history();
        history
            .position
            .checked_sub(1)
            .map_or(0, |i| history.commands[i].checkpoint)
    }

    /// Index of the last applied command, `None` when nothing is applied.
    pub fn index(&self) -> Option<usize> {
        self.history().position.checked_sub(1)
    }

    /// Checkpoints of all stored commands, oldest first.
    pub fn checkpoints(&self) -> Vec<i64> {
        self.history().commands.iter().map(|c| c.checkpoint).collect()
    }

    pub fn len(&self) -> usize {
        self.history().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history().commands.is_empty()
    }
}
