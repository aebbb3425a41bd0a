//! Result and error types for Triview.

use crate::driver::DriverError;
use crate::model::ViewKind;
use crate::query::Role;
use std::fmt;
use thiserror::Error;

/// Result type for Triview operations
pub type TriviewResult<T> = Result<T, TriviewError>;

/// The element an operation was aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementContext {
    /// View the element belongs to
    pub view: ViewKind,
    /// Role of the element
    pub role: Role,
    /// 0-based item index, for per-item roles
    pub index: Option<usize>,
}

impl ElementContext {
    /// Context for a page-level or view-level element
    #[must_use]
    pub const fn new(view: ViewKind, role: Role) -> Self {
        Self {
            view,
            role,
            index: None,
        }
    }

    /// Context for one item's element
    #[must_use]
    pub const fn item(view: ViewKind, role: Role, index: usize) -> Self {
        Self {
            view,
            role,
            index: Some(index),
        }
    }
}

impl fmt::Display for ElementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view={} role={}", self.view, self.role)?;
        match self.index {
            Some(i) => write!(f, " index={i}"),
            None => f.write_str(" index=-"),
        }
    }
}

/// Errors raised by the interaction, reader and oracle layers
#[derive(Debug, Error)]
pub enum TriviewError {
    /// Query matched zero elements where at least one was expected
    #[error("no element resolved for {ctx}")]
    Resolution {
        /// Target element
        ctx: ElementContext,
    },

    /// Element resolved but never became interactable
    #[error("element never became actionable within {waited_ms}ms for {ctx}")]
    ActionabilityTimeout {
        /// Target element
        ctx: ElementContext,
        /// Time spent waiting
        waited_ms: u64,
    },

    /// Item index beyond the rendered list
    #[error("index out of range (len {len}) for {ctx}")]
    IndexOutOfRange {
        /// Target element
        ctx: ElementContext,
        /// Number of rendered items
        len: usize,
    },

    /// Structured dump absent or malformed
    #[error("cannot parse {view} content: {message}")]
    Parse {
        /// View whose content failed to parse
        view: ViewKind,
        /// Parser message
        message: String,
    },

    /// Cross-view or counter assertion unmet within the bound
    #[error("{what} not reached within {waited_ms}ms; last observed: {last}")]
    ConsistencyTimeout {
        /// Description of the awaited condition
        what: String,
        /// Time spent polling
        waited_ms: u64,
        /// Last observed mismatch
        last: String,
    },

    /// Undo or redo requested at an end of the history
    #[error("cannot {op} at history position {position}/{depth}")]
    HistoryBoundary {
        /// `undo` or `redo`
        op: &'static str,
        /// Current position
        position: usize,
        /// Recorded depth
        depth: usize,
    },

    /// Operation the view does not offer
    #[error("{view} view does not support {op}")]
    Unsupported {
        /// View asked
        view: ViewKind,
        /// Operation name
        op: &'static str,
    },

    /// Driver failure while operating on an element
    #[error("driver failure for {ctx}: {source}")]
    Driver {
        /// Target element
        ctx: ElementContext,
        /// Underlying driver error
        #[source]
        source: DriverError,
    },

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl TriviewError {
    /// Element context, when the error concerns a single element
    #[must_use]
    pub const fn context(&self) -> Option<&ElementContext> {
        match self {
            Self::Resolution { ctx }
            | Self::ActionabilityTimeout { ctx, .. }
            | Self::IndexOutOfRange { ctx, .. }
            | Self::Driver { ctx, .. } => Some(ctx),
            _ => None,
        }
    }

    /// Wrap a driver error with element context
    #[must_use]
    pub const fn driver(ctx: ElementContext, source: DriverError) -> Self {
        Self::Driver { ctx, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_view_role_index() {
        let err = TriviewError::Resolution {
            ctx: ElementContext::item(ViewKind::Step2, Role::ItemDeleteControl, 4),
        };
        let msg = err.to_string();
        assert!(msg.contains("view=step2"));
        assert!(msg.contains("role=itemDeleteControl"));
        assert!(msg.contains("index=4"));
    }

    #[test]
    fn test_actionability_timeout_reports_wait() {
        let err = TriviewError::ActionabilityTimeout {
            ctx: ElementContext::item(ViewKind::Main, Role::ItemEditInput, 0),
            waited_ms: 2000,
        };
        assert!(err.to_string().contains("2000ms"));
        assert_eq!(err.context().unwrap().index, Some(0));
    }

    #[test]
    fn test_driver_error_keeps_source() {
        let err = TriviewError::driver(
            ElementContext::new(ViewKind::Main, Role::NewItemInput),
            DriverError::Detached {
                handle: "el-3".into(),
            },
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("el-3"));
    }

    #[test]
    fn test_page_level_context_has_no_index() {
        let ctx = ElementContext::new(ViewKind::Main, Role::Counter);
        assert!(ctx.to_string().ends_with("index=-"));
    }
}
