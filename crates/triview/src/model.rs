//! Item, view and filter types shared by every layer.
//!
//! The application under test owns all of these; the checker only observes
//! them. Nothing here is an authoritative copy of application state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of characters the application accepts in a label
pub const MAX_LABEL_CHARS: usize = 50;

/// A single task as the application stores it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TodoItem {
    /// Display text
    pub label: String,
    /// Completion flag
    pub done: bool,
    /// Stable identity assigned by the application
    pub uid: u64,
}

impl TodoItem {
    /// Create a new item
    #[must_use]
    pub fn new(label: impl Into<String>, done: bool, uid: u64) -> Self {
        Self {
            label: label.into(),
            done,
            uid,
        }
    }
}

/// What a view can read back about one item.
///
/// Views that do not render the uid leave it `None`; the oracle then joins on
/// label and position instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemProjection {
    /// Display text
    pub label: String,
    /// Completion flag
    pub done: bool,
    /// Stable identity, when the view exposes it
    pub uid: Option<u64>,
}

impl ItemProjection {
    /// Projection without identity
    #[must_use]
    pub fn anonymous(label: impl Into<String>, done: bool) -> Self {
        Self {
            label: label.into(),
            done,
            uid: None,
        }
    }

    /// `{label, done}` pair used for cross-view equality
    #[must_use]
    pub fn key(&self) -> (&str, bool) {
        (self.label.as_str(), self.done)
    }
}

impl From<TodoItem> for ItemProjection {
    fn from(item: TodoItem) -> Self {
        Self {
            label: item.label,
            done: item.done,
            uid: Some(item.uid),
        }
    }
}

/// The three independently rendered projections of the item collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    /// Primary TodoMVC list
    Main,
    /// Secondary editable list
    Step2,
    /// Raw JSON dump
    JsonDebug,
}

impl ViewKind {
    /// All views, in rendering order on the page
    pub const ALL: [Self; 3] = [Self::Main, Self::Step2, Self::JsonDebug];

    /// Stable short name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Step2 => "step2",
            Self::JsonDebug => "json-debug",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-wide list filter mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterState {
    /// Every item
    #[default]
    All,
    /// Items not done
    Active,
    /// Items done
    Completed,
}

impl FilterState {
    /// All filter modes
    pub const ALL: [Self; 3] = [Self::All, Self::Active, Self::Completed];

    /// Whether an item with the given completion flag passes the filter
    #[must_use]
    pub const fn accepts(&self, done: bool) -> bool {
        match self {
            Self::All => true,
            Self::Active => !done,
            Self::Completed => done,
        }
    }

    /// Class name the filter link carries in the markup
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::All => "filterAll",
            Self::Active => "filterActives",
            Self::Completed => "filterCompleted",
        }
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Apply the application's content rule to raw input.
///
/// Input is truncated to [`MAX_LABEL_CHARS`] (the input element's maxlength),
/// then trimmed. Empty results and results without a single alphanumeric
/// character are rejected.
#[must_use]
pub fn normalize_label(raw: &str) -> Option<String> {
    let truncated: String = raw.chars().take(MAX_LABEL_CHARS).collect();
    let trimmed = truncated.trim();
    if trimmed.is_empty() || !trimmed.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(trimmed.to_string())
}
