//! View adapters.
//!
//! Each of the three projections gets one [`View`] implementation exposing the
//! same vocabulary. Differences between views (where labels live, which
//! gesture opens an editor, whether a view is read-only) stay inside the
//! adapter and the activation table, so scenarios can be written once and
//! run against any view.

use crate::error::{ElementContext, TriviewError, TriviewResult};
use crate::interaction::{Interactor, Target};
use crate::model::{FilterState, ItemProjection, ViewKind};
use crate::query::Role;
use crate::reader::StateReader;
use async_trait::async_trait;

/// Uniform operations over one rendered projection.
///
/// Indices are 0-based positions in the view's current rendering.
#[async_trait]
pub trait View: Send + Sync {
    /// Which projection this adapter drives
    fn kind(&self) -> ViewKind;

    /// Whether the view hides items according to the page filter
    fn filtered_by_ui(&self) -> bool {
        false
    }

    /// Submit a new item through this view's input
    async fn add(&self, text: &str) -> TriviewResult<()>;

    /// Item labels in rendered order
    async fn list(&self) -> TriviewResult<Vec<String>>;

    /// Label and completion of every rendered item
    async fn items(&self) -> TriviewResult<Vec<ItemProjection>>;

    /// Flip an item's completion
    async fn toggle(&self, index: usize) -> TriviewResult<()>;

    /// Replace an item's label
    async fn edit(&self, index: usize, text: &str) -> TriviewResult<()>;

    /// Remove an item
    async fn delete(&self, index: usize) -> TriviewResult<()>;

    /// Number of items not done, as this view reports it
    async fn count_remaining(&self) -> TriviewResult<u32>;

    /// Whether the clear-completed control is shown
    async fn is_clear_completed_visible(&self) -> TriviewResult<bool>;
}

#[derive(Debug, Clone)]
struct Core {
    interactor: Interactor,
    reader: StateReader,
}

impl Core {
    /// Wait for the item's label to render; report the length when it never does
    async fn item(&self, view: ViewKind, role: Role, index: usize) -> TriviewResult<Target> {
        let label = self.interactor.item_target(view, Role::ItemLabel, index);
        match self.interactor.resolve(&label).await {
            Ok(_) => Ok(self.interactor.item_target(view, role, index)),
            Err(TriviewError::Resolution { .. }) => Err(TriviewError::IndexOutOfRange {
                ctx: ElementContext::item(view, role, index),
                len: self.reader.count(view, Role::ItemLabel).await?,
            }),
            Err(e) => Err(e),
        }
    }

    async fn add(&self, view: ViewKind, text: &str) -> TriviewResult<()> {
        let input = self.interactor.target(view, Role::NewItemInput);
        self.interactor.fill_and_submit(&input, text).await
    }

    async fn click_item(&self, view: ViewKind, role: Role, index: usize) -> TriviewResult<()> {
        let target = self.item(view, role, index).await?;
        self.interactor.resilient_click(&target).await.map(|_| ())
    }

    async fn edit(&self, view: ViewKind, index: usize, text: &str) -> TriviewResult<()> {
        let target = self.item(view, Role::ItemEditInput, index).await?;
        self.interactor.activate(&target).await?;
        self.interactor.fill_and_submit(&target, text).await
    }

    async fn click(&self, view: ViewKind, role: Role) -> TriviewResult<()> {
        let target = self.interactor.target(view, role);
        self.interactor.resilient_click(&target).await.map(|_| ())
    }
}

fn remaining(flags: &[bool]) -> u32 {
    flags.iter().filter(|done| !**done).count() as u32
}

/// The primary TodoMVC list
#[derive(Debug, Clone)]
pub struct MainView {
    core: Core,
}

impl MainView {
    /// Create the adapter
    #[must_use]
    pub fn new(interactor: Interactor, reader: StateReader) -> Self {
        Self {
            core: Core { interactor, reader },
        }
    }

    /// Click a filter link
    pub async fn select_filter(&self, filter: FilterState) -> TriviewResult<()> {
        self.core
            .click(ViewKind::Main, Role::FilterControl(filter))
            .await
    }

    /// Filter whose link carries the `selected` class
    pub async fn selected_filter(&self) -> TriviewResult<Option<FilterState>> {
        self.core.reader.read_selected_filter().await
    }

    /// Whether all three filter links are rendered
    pub async fn filters_present(&self) -> TriviewResult<bool> {
        for filter in FilterState::ALL {
            if self
                .core
                .reader
                .count(ViewKind::Main, Role::FilterControl(filter))
                .await?
                == 0
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Remove every done item
    pub async fn clear_completed(&self) -> TriviewResult<()> {
        self.core
            .click(ViewKind::Main, Role::ClearCompletedControl)
            .await
    }

    /// Mark everything done, or everything active when all are done
    pub async fn toggle_all(&self) -> TriviewResult<()> {
        self.core.click(ViewKind::Main, Role::ToggleAllControl).await
    }

    /// Whether the row carries the `completed` class
    pub async fn is_completed(&self, index: usize) -> TriviewResult<bool> {
        self.core
            .reader
            .has_class(ViewKind::Main, Role::ItemRow, Some(index), "completed")
            .await
    }

    /// Type into the new-item input without submitting; returns what it holds
    pub async fn draft(&self, text: &str) -> TriviewResult<String> {
        let input = self.core.interactor.target(ViewKind::Main, Role::NewItemInput);
        self.core.interactor.fill(&input, text).await?;
        Ok(self
            .core
            .reader
            .read_value(ViewKind::Main, Role::NewItemInput, None)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl View for MainView {
    fn kind(&self) -> ViewKind {
        ViewKind::Main
    }

    fn filtered_by_ui(&self) -> bool {
        true
    }

    async fn add(&self, text: &str) -> TriviewResult<()> {
        self.core.add(ViewKind::Main, text).await
    }

    async fn list(&self) -> TriviewResult<Vec<String>> {
        self.core.reader.read_ordered_labels(ViewKind::Main).await
    }

    async fn items(&self) -> TriviewResult<Vec<ItemProjection>> {
        self.core.reader.read_items(ViewKind::Main).await
    }

    async fn toggle(&self, index: usize) -> TriviewResult<()> {
        self.core
            .click_item(ViewKind::Main, Role::ItemCheckbox, index)
            .await
    }

    async fn edit(&self, index: usize, text: &str) -> TriviewResult<()> {
        self.core.edit(ViewKind::Main, index, text).await
    }

    async fn delete(&self, index: usize) -> TriviewResult<()> {
        self.core
            .click_item(ViewKind::Main, Role::ItemDeleteControl, index)
            .await
    }

    async fn count_remaining(&self) -> TriviewResult<u32> {
        Ok(self.core.reader.read_counter().await)
    }

    async fn is_clear_completed_visible(&self) -> TriviewResult<bool> {
        self.core
            .reader
            .is_visible(ViewKind::Main, Role::ClearCompletedControl, None)
            .await
    }
}

/// The "Étape 2" list of editable inputs
#[derive(Debug, Clone)]
pub struct Step2View {
    core: Core,
}

impl Step2View {
    /// Create the adapter
    #[must_use]
    pub fn new(interactor: Interactor, reader: StateReader) -> Self {
        Self {
            core: Core { interactor, reader },
        }
    }
}

#[async_trait]
impl View for Step2View {
    fn kind(&self) -> ViewKind {
        ViewKind::Step2
    }

    async fn add(&self, text: &str) -> TriviewResult<()> {
        self.core.add(ViewKind::Step2, text).await
    }

    async fn list(&self) -> TriviewResult<Vec<String>> {
        self.core.reader.read_ordered_labels(ViewKind::Step2).await
    }

    async fn items(&self) -> TriviewResult<Vec<ItemProjection>> {
        self.core.reader.read_items(ViewKind::Step2).await
    }

    async fn toggle(&self, index: usize) -> TriviewResult<()> {
        self.core
            .click_item(ViewKind::Step2, Role::ItemCheckbox, index)
            .await
    }

    async fn edit(&self, index: usize, text: &str) -> TriviewResult<()> {
        self.core.edit(ViewKind::Step2, index, text).await
    }

    async fn delete(&self, index: usize) -> TriviewResult<()> {
        self.core
            .click_item(ViewKind::Step2, Role::ItemDeleteControl, index)
            .await
    }

    async fn count_remaining(&self) -> TriviewResult<u32> {
        let flags = self.core.reader.read_done_flags(ViewKind::Step2).await?;
        Ok(remaining(&flags))
    }

    async fn is_clear_completed_visible(&self) -> TriviewResult<bool> {
        Err(TriviewError::Unsupported {
            view: ViewKind::Step2,
            op: "clear-completed visibility",
        })
    }
}

/// Read-only adapter over the JSON dump
#[derive(Debug, Clone)]
pub struct JsonDebugView {
    reader: StateReader,
}

impl JsonDebugView {
    /// Create the adapter
    #[must_use]
    pub const fn new(reader: StateReader) -> Self {
        Self { reader }
    }

    fn unsupported<T>(op: &'static str) -> TriviewResult<T> {
        Err(TriviewError::Unsupported {
            view: ViewKind::JsonDebug,
            op,
        })
    }
}

#[async_trait]
impl View for JsonDebugView {
    fn kind(&self) -> ViewKind {
        ViewKind::JsonDebug
    }

    async fn add(&self, _text: &str) -> TriviewResult<()> {
        Self::unsupported("add")
    }

    async fn list(&self) -> TriviewResult<Vec<String>> {
        self.reader.read_ordered_labels(ViewKind::JsonDebug).await
    }

    async fn items(&self) -> TriviewResult<Vec<ItemProjection>> {
        self.reader.read_items(ViewKind::JsonDebug).await
    }

    async fn toggle(&self, _index: usize) -> TriviewResult<()> {
        Self::unsupported("toggle")
    }

    async fn edit(&self, _index: usize, _text: &str) -> TriviewResult<()> {
        Self::unsupported("edit")
    }

    async fn delete(&self, _index: usize) -> TriviewResult<()> {
        Self::unsupported("delete")
    }

    async fn count_remaining(&self) -> TriviewResult<u32> {
        let flags = self.reader.read_done_flags(ViewKind::JsonDebug).await?;
        Ok(remaining(&flags))
    }

    async fn is_clear_completed_visible(&self) -> TriviewResult<bool> {
        Self::unsupported("clear-completed visibility")
    }
}
