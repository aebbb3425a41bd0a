//! Semantic query resolution.
//!
//! Maps "the N-th checkbox of view V" to a structural driver query. The
//! resolver is pure: it never touches the driver, and a query matching zero
//! elements is an ordinary outcome that callers interpret.
//!
//! Per-item roles are always rooted under the requesting view's subtree so
//! the three views never cross-match each other's rows.

use crate::model::{FilterState, ViewKind};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAIN_ROOT: &str = "//section[contains(@class,'todoapp')]";
const STEP2_ROOT: &str = "//h2[text()='Étape 2']/following-sibling::ul[1]";
const JSON_ROOT: &str = "//h2[text()='Étape 1']/following-sibling::pre[1]";

/// What an element is for, independent of which view renders it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Text input creating a new item
    NewItemInput,
    /// One item row (hover container)
    ItemRow,
    /// Item display text
    ItemLabel,
    /// Item completion checkbox
    ItemCheckbox,
    /// Item delete affordance
    ItemDeleteControl,
    /// Inline editor for an item label
    ItemEditInput,
    /// Remaining-count container
    Counter,
    /// Emphasized number inside the counter
    CounterValue,
    /// "Clear completed" button
    ClearCompletedControl,
    /// Filter link for one mode
    FilterControl(FilterState),
    /// "Mark all as complete" chevron
    ToggleAllControl,
    /// Undo button
    UndoControl,
    /// Redo button
    RedoControl,
    /// Structured debug document
    DumpDocument,
}

impl Role {
    /// Whether the role addresses one element per item
    #[must_use]
    pub const fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::ItemRow
                | Self::ItemLabel
                | Self::ItemCheckbox
                | Self::ItemDeleteControl
                | Self::ItemEditInput
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewItemInput => f.write_str("newItemInput"),
            Self::ItemRow => f.write_str("itemRow"),
            Self::ItemLabel => f.write_str("itemLabel"),
            Self::ItemCheckbox => f.write_str("itemCheckbox"),
            Self::ItemDeleteControl => f.write_str("itemDeleteControl"),
            Self::ItemEditInput => f.write_str("itemEditInput"),
            Self::Counter => f.write_str("counter"),
            Self::CounterValue => f.write_str("counterValue"),
            Self::ClearCompletedControl => f.write_str("clearCompletedControl"),
            Self::FilterControl(kind) => write!(f, "filterControl({kind})"),
            Self::ToggleAllControl => f.write_str("toggleAllControl"),
            Self::UndoControl => f.write_str("undoControl"),
            Self::RedoControl => f.write_str("redoControl"),
            Self::DumpDocument => f.write_str("dumpDocument"),
        }
    }
}

/// A resolved, structural element query.
///
/// Carries the semantic triple it was resolved from so drivers that do not
/// speak XPath (the simulated application) can still interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    view: ViewKind,
    role: Role,
    index: Option<usize>,
    path: Option<String>,
}

impl Query {
    /// View the query is scoped to
    #[must_use]
    pub const fn view(&self) -> ViewKind {
        self.view
    }

    /// Role being queried
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// 1-based position, if the query selects a single match
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// True when the view does not render this role at all
    #[must_use]
    pub const fn is_void(&self) -> bool {
        self.path.is_none()
    }

    /// XPath expression, or `None` for a void query
    #[must_use]
    pub fn xpath(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        Some(match self.index {
            Some(n) => format!("({path})[{n}]"),
            None => path.clone(),
        })
    }

    /// Same query without the position filter
    #[must_use]
    pub fn all(&self) -> Self {
        Self {
            index: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.view, self.role)?;
        if let Some(n) = self.index {
            write!(f, "[{n}]")?;
        }
        Ok(())
    }
}

/// Stateless resolver from semantic intent to [`Query`]
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryResolver;

impl QueryResolver {
    /// Create a resolver
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolve, returning a void query when the view has no such element
    #[must_use]
    pub fn resolve(&self, view: ViewKind, role: Role, index: Option<usize>) -> Query {
        Query {
            view,
            role,
            index,
            path: Self::path_for(view, role),
        }
    }

    /// Resolve, returning `None` when the view has no such element
    #[must_use]
    pub fn try_resolve(&self, view: ViewKind, role: Role, index: Option<usize>) -> Option<Query> {
        let query = self.resolve(view, role, index);
        (!query.is_void()).then_some(query)
    }

    fn path_for(view: ViewKind, role: Role) -> Option<String> {
        match view {
            ViewKind::Main => Self::main_path(role),
            ViewKind::Step2 => Self::step2_path(role),
            ViewKind::JsonDebug => match role {
                Role::DumpDocument => Some(JSON_ROOT.to_string()),
                Role::UndoControl | Role::RedoControl => Self::history_path(role),
                _ => None,
            },
        }
    }

    fn main_path(role: Role) -> Option<String> {
        let rows = format!("{MAIN_ROOT}//ul[@class='todo-list']/li");
        let path = match role {
            Role::NewItemInput => format!("{MAIN_ROOT}//input[@class='new-todo']"),
            Role::ItemRow => rows,
            Role::ItemLabel => format!("{rows}//label[@class='texte']"),
            Role::ItemCheckbox => format!("{rows}//input[@type='checkbox']"),
            Role::ItemDeleteControl => format!("{rows}//button[@class='destroy']"),
            Role::ItemEditInput => format!("{rows}//input[@class='edit']"),
            Role::Counter => "//span[contains(@class,'todo-count')]".to_string(),
            Role::CounterValue => "//span[contains(@class,'todo-count')]//strong".to_string(),
            Role::ClearCompletedControl => {
                "//button[contains(@class,'clear-completed')]".to_string()
            }
            Role::FilterControl(kind) => format!(
                "//ul[contains(@class,'filters')]//a[contains(@class,'{}')]",
                kind.css_class()
            ),
            Role::ToggleAllControl => "//label[@for='toggleAll']".to_string(),
            Role::UndoControl | Role::RedoControl => return Self::history_path(role),
            Role::DumpDocument => return None,
        };
        Some(path)
    }

    fn step2_path(role: Role) -> Option<String> {
        let path = match role {
            Role::NewItemInput => {
                format!("{STEP2_ROOT}//input[@type='text' and not(@name='newLabel')]")
            }
            Role::ItemRow => format!("{STEP2_ROOT}/li[.//input[@name='newLabel']]"),
            Role::ItemLabel | Role::ItemEditInput => {
                format!("{STEP2_ROOT}//li//input[@name='newLabel']")
            }
            Role::ItemCheckbox => format!("{STEP2_ROOT}//li//input[@type='checkbox']"),
            Role::ItemDeleteControl => format!("{STEP2_ROOT}//li//button"),
            Role::UndoControl | Role::RedoControl => return Self::history_path(role),
            _ => return None,
        };
        Some(path)
    }

    fn history_path(role: Role) -> Option<String> {
        match role {
            Role::UndoControl => Some("//button[text()='Annuler']".to_string()),
            Role::RedoControl => Some("//button[text()='Refaire']".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod scoping_tests {
        use super::*;

        #[test]
        fn test_per_item_roles_rooted_in_view() {
            let resolver = QueryResolver::new();
            for role in [
                Role::ItemLabel,
                Role::ItemCheckbox,
                Role::ItemDeleteControl,
                Role::ItemEditInput,
            ] {
                let main = resolver.resolve(ViewKind::Main, role, None).xpath().unwrap();
                let step2 = resolver.resolve(ViewKind::Step2, role, None).xpath().unwrap();
                assert!(main.starts_with(MAIN_ROOT), "{role}: {main}");
                assert!(step2.starts_with(STEP2_ROOT), "{role}: {step2}");
                assert!(!main.contains("Étape 2"));
                assert!(!step2.contains("todoapp"));
            }
        }

        #[test]
        fn test_json_view_renders_no_items() {
            let resolver = QueryResolver::new();
            assert!(resolver
                .try_resolve(ViewKind::JsonDebug, Role::ItemCheckbox, Some(1))
                .is_none());
            assert!(resolver
                .resolve(ViewKind::JsonDebug, Role::ItemLabel, None)
                .is_void());
        }

        #[test]
        fn test_step2_has_no_counter() {
            let resolver = QueryResolver::new();
            assert!(resolver.resolve(ViewKind::Step2, Role::Counter, None).is_void());
        }
    }

    mod index_tests {
        use super::*;

        #[test]
        fn test_index_is_one_based_position_filter() {
            let q = QueryResolver::new().resolve(ViewKind::Main, Role::ItemCheckbox, Some(3));
            let xpath = q.xpath().unwrap();
            assert!(xpath.starts_with('('));
            assert!(xpath.ends_with(")[3]"));
            assert_eq!(q.index(), Some(3));
        }

        #[test]
        fn test_all_drops_index() {
            let q = QueryResolver::new().resolve(ViewKind::Step2, Role::ItemLabel, Some(2));
            let all = q.all();
            assert_eq!(all.index(), None);
            assert!(!all.xpath().unwrap().ends_with("[2]"));
        }

        #[test]
        fn test_resolution_is_deterministic() {
            let resolver = QueryResolver::new();
            let a = resolver.resolve(ViewKind::Main, Role::ItemLabel, Some(1));
            let b = resolver.resolve(ViewKind::Main, Role::ItemLabel, Some(1));
            assert_eq!(a, b);
        }
    }

    mod control_tests {
        use super::*;

        #[test]
        fn test_filter_controls_use_markup_classes() {
            let q = QueryResolver::new().resolve(
                ViewKind::Main,
                Role::FilterControl(FilterState::Completed),
                None,
            );
            assert!(q.xpath().unwrap().contains("filterCompleted"));
        }

        #[test]
        fn test_history_controls_by_text() {
            let resolver = QueryResolver::new();
            let undo = resolver.resolve(ViewKind::Main, Role::UndoControl, None);
            let redo = resolver.resolve(ViewKind::Main, Role::RedoControl, None);
            assert!(undo.xpath().unwrap().contains("Annuler"));
            assert!(redo.xpath().unwrap().contains("Refaire"));
        }

        #[test]
        fn test_display_names_view_role_index() {
            let q = QueryResolver::new().resolve(ViewKind::Main, Role::ItemDeleteControl, Some(2));
            assert_eq!(q.to_string(), "main/itemDeleteControl[2]");
        }
    }
}
