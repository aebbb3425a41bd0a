//! Activation gestures.
//!
//! Some controls only become interactable after a preceding gesture: Main's
//! delete button renders on row hover, Main's inline editor opens on a
//! double-click of the label, Step2's label input takes a plain click to
//! focus. These quirks live here as data, keyed by `(view, role)`, instead of
//! being branched on at every call site.

use crate::model::ViewKind;
use crate::query::Role;

/// Gesture that precedes an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// Pointer over the opener
    Hover,
    /// Single click on the opener
    Click,
    /// Double click on the opener
    DoubleClick,
}

/// One row of the activation table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// View the rule applies to
    pub view: ViewKind,
    /// Role being acted on
    pub target: Role,
    /// Gesture to perform first
    pub gesture: Gesture,
    /// Element receiving the gesture (same item index as the target)
    pub opener: Role,
}

/// Gestures required by the application's markup
pub const ACTIVATIONS: &[Activation] = &[
    Activation {
        view: ViewKind::Main,
        target: Role::ItemDeleteControl,
        gesture: Gesture::Hover,
        opener: Role::ItemRow,
    },
    Activation {
        view: ViewKind::Main,
        target: Role::ItemEditInput,
        gesture: Gesture::DoubleClick,
        opener: Role::ItemLabel,
    },
    Activation {
        view: ViewKind::Step2,
        target: Role::ItemEditInput,
        gesture: Gesture::Click,
        opener: Role::ItemEditInput,
    },
];

/// Gesture needed before acting on `target` in `view`, if any
#[must_use]
pub fn activation_for(view: ViewKind, target: Role) -> Option<&'static Activation> {
    ACTIVATIONS
        .iter()
        .find(|a| a.view == view && a.target == target)
}
