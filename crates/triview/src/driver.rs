//! Driver - Abstract Browser Capability Trait
//!
//! Triview never talks to a browser directly. Everything it does to the
//! page goes through [`Driver`], which keeps the interaction layer
//! independent of the automation substrate.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Driver (Abstract Trait)                                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐        ┌──────────────────────┐    │
//! │  │  CdpDriver           │        │  SimulatedApp        │    │
//! │  │  (feature "browser") │        │  (in-process, tests) │    │
//! │  │  chromiumoxide       │        │  three lagging views │    │
//! │  └──────────────────────┘        └──────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::query::Query;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors reported by a driver implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// Handle no longer refers to an attached element
    #[error("element {handle} is detached from the document")]
    Detached {
        /// Handle identifier
        handle: String,
    },

    /// Element exists but refused a non-forced action
    #[error("element {handle} is not actionable: {reason}")]
    NotActionable {
        /// Handle identifier
        handle: String,
        /// Why the action was refused
        reason: String,
    },

    /// Query could not be evaluated
    #[error("query {query} cannot be evaluated: {message}")]
    InvalidQuery {
        /// Rendered query
        query: String,
        /// Error message
        message: String,
    },

    /// Backend failure (CDP transport, evaluation error)
    #[error("driver backend failure: {message}")]
    Backend {
        /// Error message
        message: String,
    },
}

/// Element handle for DOM interactions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-specific identifier
    pub id: String,
    /// Element tag name
    pub tag_name: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
        }
    }
}

/// What to read from an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadKind {
    /// Rendered inner text
    Text,
    /// Form control value
    Value,
    /// Named attribute
    Attribute(String),
}

impl ReadKind {
    /// Attribute read
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }
}

/// Action performed against an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Click honoring actionability
    Click,
    /// Click bypassing actionability checks
    ForceClick,
    /// Double click
    DoubleClick,
    /// Move the pointer over the element
    Hover,
    /// Replace the element's content
    Fill(String),
    /// Press a key while the element has focus
    Press(String),
}

impl Action {
    /// Short name for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::ForceClick => "force_click",
            Self::DoubleClick => "double_click",
            Self::Hover => "hover",
            Self::Fill(_) => "fill",
            Self::Press(_) => "press",
        }
    }
}

/// Element condition a wait can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementState {
    /// Attached and rendered with a box
    Visible,
    /// Visible and enabled
    Enabled,
    /// Visible, enabled, and able to receive pointer events
    Actionable,
}

/// Abstract browser capability used by every layer above.
///
/// Implementations must treat zero matches as a normal `Ok(vec![])`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Locate all elements matching the query, in document order
    async fn locate(&self, query: &Query) -> DriverResult<Vec<ElementHandle>>;

    /// Read text, value or an attribute; `None` when absent
    async fn read(&self, handle: &ElementHandle, kind: ReadKind) -> DriverResult<Option<String>>;

    /// Whether the element is rendered and visible
    async fn is_visible(&self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Whether a checkbox is checked
    async fn is_checked(&self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Whether a control is enabled
    async fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Perform an action on the element
    async fn act(&self, handle: &ElementHandle, action: Action) -> DriverResult<()>;

    /// Wait until the element reaches `state`; `false` on timeout
    async fn wait_for(
        &self,
        handle: &ElementHandle,
        state: ElementState,
        timeout: Duration,
    ) -> DriverResult<bool>;

    /// Press a key chord at page level (e.g. `Control+z`)
    async fn press_keys(&self, chord: &str) -> DriverResult<()>;
}
