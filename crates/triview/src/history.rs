//! Undo/redo history control.
//!
//! The application keeps a linear history: every accepted mutation truncates
//! the redo tail and appends. [`HistoryCursor`] models that expectation so
//! undo past the beginning or redo past the end is rejected before anything
//! is sent to the page, and so the enabled state of the undo/redo buttons
//! can be checked against it.

use crate::error::{ElementContext, TriviewError, TriviewResult};
use crate::interaction::Interactor;
use crate::model::{ItemProjection, ViewKind};
use crate::poll::{Check, Poller};
use crate::query::Role;
use crate::reader::StateReader;
use crate::view::View;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// How an undo or redo is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryChannel {
    /// "Annuler" / "Refaire" buttons
    Button,
    /// Keyboard shortcut
    Shortcut,
}

impl HistoryChannel {
    /// The other channel
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Button => Self::Shortcut,
            Self::Shortcut => Self::Button,
        }
    }
}

/// Expected position in the application's history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCursor {
    /// Entries currently applied
    pub position: usize,
    /// Entries recorded
    pub depth: usize,
}

impl HistoryCursor {
    /// Cursor of a fresh page
    #[must_use]
    pub const fn new() -> Self {
        Self {
            position: 0,
            depth: 0,
        }
    }

    /// An accepted mutation drops the redo tail and appends
    pub fn record_mutation(&mut self) {
        self.position += 1;
        self.depth = self.position;
    }

    /// Whether undo is possible
    #[must_use]
    pub const fn can_undo(&self) -> bool {
        self.position > 0
    }

    /// Whether redo is possible
    #[must_use]
    pub const fn can_redo(&self) -> bool {
        self.position < self.depth
    }

    /// Step back, or report the boundary
    pub fn undo(&mut self) -> TriviewResult<()> {
        if !self.can_undo() {
            return Err(self.boundary("undo"));
        }
        self.position -= 1;
        Ok(())
    }

    /// Step forward, or report the boundary
    pub fn redo(&mut self) -> TriviewResult<()> {
        if !self.can_redo() {
            return Err(self.boundary("redo"));
        }
        self.position += 1;
        Ok(())
    }

    const fn boundary(&self, op: &'static str) -> TriviewError {
        TriviewError::HistoryBoundary {
            op,
            position: self.position,
            depth: self.depth,
        }
    }
}

/// Drives undo/redo and checks the affordances
pub struct HistoryController {
    interactor: Interactor,
    reader: StateReader,
    cursor: Mutex<HistoryCursor>,
}

impl std::fmt::Debug for HistoryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryController")
            .field("cursor", &self.cursor())
            .finish_non_exhaustive()
    }
}

impl HistoryController {
    /// Controller for a fresh page
    #[must_use]
    pub fn new(interactor: Interactor, reader: StateReader) -> Self {
        Self {
            interactor,
            reader,
            cursor: Mutex::new(HistoryCursor::new()),
        }
    }

    /// Current expectation
    #[must_use]
    pub fn cursor(&self) -> HistoryCursor {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(&self, f: impl FnOnce(&mut HistoryCursor) -> T) -> T {
        let mut guard = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    /// Note a mutation the application accepted
    pub fn record_mutation(&self) {
        self.update(HistoryCursor::record_mutation);
    }

    /// Undo one step through `channel`.
    ///
    /// Fails with [`TriviewError::HistoryBoundary`] when either the cursor or
    /// the page's undo button says there is nothing to undo.
    pub async fn undo(&self, channel: HistoryChannel) -> TriviewResult<()> {
        self.cursor().undo()?;
        self.require_enabled("undo", Role::UndoControl).await?;
        self.deliver(channel, Role::UndoControl).await?;
        self.update(HistoryCursor::undo)
    }

    /// Redo one step through `channel`
    pub async fn redo(&self, channel: HistoryChannel) -> TriviewResult<()> {
        self.cursor().redo()?;
        self.require_enabled("redo", Role::RedoControl).await?;
        self.deliver(channel, Role::RedoControl).await?;
        self.update(HistoryCursor::redo)
    }

    /// A control still disabled after the actionability wait is the end of
    /// the page's history, whatever the cursor expects
    async fn require_enabled(&self, op: &'static str, role: Role) -> TriviewResult<()> {
        let reader = &self.reader;
        let outcome = Poller::actionability(self.interactor.config())
            .with_description(format!("{op} control enabled"))
            .attempt(move || async move {
                let enabled = reader.is_enabled(ViewKind::Main, role).await?;
                Ok(Check::from_bool(enabled, (), || format!("{op} control disabled")))
            })
            .await?;
        if outcome.is_ok() {
            return Ok(());
        }
        let cursor = self.cursor();
        warn!(op, ?cursor, "history control disabled on the page");
        Err(TriviewError::HistoryBoundary {
            op,
            position: cursor.position,
            depth: cursor.depth,
        })
    }

    async fn deliver(&self, channel: HistoryChannel, role: Role) -> TriviewResult<()> {
        debug!(?channel, %role, cursor = ?self.cursor(), "history step");
        match channel {
            HistoryChannel::Button => {
                let target = self.interactor.target(ViewKind::Main, role);
                self.interactor.click(&target).await
            }
            HistoryChannel::Shortcut => {
                let config = self.interactor.config();
                let chord = if role == Role::UndoControl {
                    &config.undo_shortcut
                } else {
                    &config.redo_shortcut
                };
                self.interactor
                    .press_keys(ElementContext::new(ViewKind::Main, role), chord)
                    .await
            }
        }
    }

    /// Poll until the buttons' enabled state matches the cursor.
    ///
    /// Returns `(undo_enabled, redo_enabled)`.
    pub async fn await_affordances(&self) -> TriviewResult<(bool, bool)> {
        let cursor = self.cursor();
        let want = (cursor.can_undo(), cursor.can_redo());
        let reader = &self.reader;
        let polled = Poller::consistency(self.interactor.config())
            .with_description(format!(
                "undo/redo enabled == {want:?} at {}/{}",
                cursor.position, cursor.depth
            ))
            .until(move || async move {
                let undo = reader.is_enabled(ViewKind::Main, Role::UndoControl).await?;
                let redo = reader.is_enabled(ViewKind::Main, Role::RedoControl).await?;
                let got = (undo, redo);
                Ok(Check::from_bool(got == want, got, || {
                    format!("undo enabled {undo}, redo enabled {redo}")
                }))
            })
            .await?;
        Ok(polled.value)
    }

    /// Check that both channels produce the same state for undo and redo.
    ///
    /// Undoes and redoes by button, then undoes and redoes by shortcut. Both
    /// undone states must match, and both redone states must match the state
    /// before the first undo. Leaves the history where it started and returns
    /// the undone state. `view` should already show the latest mutation.
    pub async fn assert_channel_equivalence(
        &self,
        view: &dyn View,
    ) -> TriviewResult<Vec<ItemProjection>> {
        self.cursor().undo()?;
        let before = view.items().await?;

        self.undo(HistoryChannel::Button).await?;
        let undone = self
            .await_items(view, "undo by button", |items| items != before.as_slice())
            .await?;

        self.redo(HistoryChannel::Button).await?;
        self.await_items(view, "redo by button restores", |items| {
            items == before.as_slice()
        })
        .await?;

        self.undo(HistoryChannel::Shortcut).await?;
        self.await_items(view, "undo by shortcut matches undo by button", |items| {
            items == undone.as_slice()
        })
        .await?;

        self.redo(HistoryChannel::Shortcut).await?;
        self.await_items(view, "redo by shortcut matches redo by button", |items| {
            items == before.as_slice()
        })
        .await?;
        Ok(undone)
    }

    async fn await_items<F>(
        &self,
        view: &dyn View,
        what: &str,
        accept: F,
    ) -> TriviewResult<Vec<ItemProjection>>
    where
        F: Fn(&[ItemProjection]) -> bool,
    {
        let accept = &accept;
        let kind = view.kind();
        let polled = Poller::consistency(self.interactor.config())
            .with_description(format!("{kind}: {what}"))
            .until(move || async move {
                let items = view.items().await?;
                Ok(if accept(&items) {
                    Check::Pass(items)
                } else {
                    Check::Fail(format!("{kind} shows {items:?}"))
                })
            })
            .await?;
        Ok(polled.value)
    }
}
