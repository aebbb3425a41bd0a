//! Tolerant state readers.
//!
//! Each reader extracts typed state from one view's own rendering, never
//! from a shared model. Empty views read as empty collections. The counter
//! reader degrades instead of failing because it runs inside polling loops.

use crate::driver::{Driver, ElementHandle, ReadKind};
use crate::error::{ElementContext, TriviewError, TriviewResult};
use crate::model::{FilterState, ItemProjection, TodoItem, ViewKind};
use crate::query::{Query, QueryResolver, Role};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Dump {
    items: Vec<TodoItem>,
}

fn first_integer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid integer pattern"))
}

/// Parse a structured dump document.
///
/// `{"items": []}` is an empty list; anything that is not a dump is an error.
pub fn parse_dump(text: &str) -> TriviewResult<Vec<TodoItem>> {
    serde_json::from_str::<Dump>(text)
        .map(|dump| dump.items)
        .map_err(|e| TriviewError::Parse {
            view: ViewKind::JsonDebug,
            message: e.to_string(),
        })
}

/// Extract the first integer anywhere in `text`
#[must_use]
pub fn first_integer_in(text: &str) -> Option<u32> {
    first_integer()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Reads state back from the rendered views
#[derive(Clone)]
pub struct StateReader {
    driver: Arc<dyn Driver>,
    resolver: QueryResolver,
}

impl std::fmt::Debug for StateReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReader").finish_non_exhaustive()
    }
}

impl StateReader {
    /// Create a reader over a driver
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            resolver: QueryResolver::new(),
        }
    }

    async fn locate_all(&self, view: ViewKind, role: Role) -> TriviewResult<Vec<ElementHandle>> {
        let query = self.resolver.resolve(view, role, None);
        self.locate(&query, ElementContext::new(view, role)).await
    }

    async fn locate(&self, query: &Query, ctx: ElementContext) -> TriviewResult<Vec<ElementHandle>> {
        if query.is_void() {
            return Ok(Vec::new());
        }
        self.driver
            .locate(query)
            .await
            .map_err(|e| TriviewError::driver(ctx, e))
    }

    async fn locate_one(
        &self,
        view: ViewKind,
        role: Role,
        index: Option<usize>,
    ) -> TriviewResult<Option<(ElementHandle, ElementContext)>> {
        let ctx = ElementContext {
            view,
            role,
            index,
        };
        let query = self.resolver.resolve(view, role, index.map(|i| i + 1));
        let handles = self.locate(&query, ctx).await?;
        Ok(handles.into_iter().next().map(|h| (h, ctx)))
    }

    /// Item labels of a view, in rendered order
    pub async fn read_ordered_labels(&self, view: ViewKind) -> TriviewResult<Vec<String>> {
        let kind = match view {
            ViewKind::Main => ReadKind::Text,
            ViewKind::Step2 => ReadKind::Value,
            ViewKind::JsonDebug => {
                let items = self.read_structured_dump().await?;
                return Ok(items.into_iter().map(|item| item.label).collect());
            }
        };
        let handles = self.locate_all(view, Role::ItemLabel).await?;
        let mut labels = Vec::with_capacity(handles.len());
        for (i, handle) in handles.iter().enumerate() {
            let text = self
                .driver
                .read(handle, kind.clone())
                .await
                .map_err(|e| TriviewError::driver(ElementContext::item(view, Role::ItemLabel, i), e))?;
            labels.push(text.unwrap_or_default());
        }
        Ok(labels)
    }

    /// Checkbox state of each rendered item
    pub async fn read_done_flags(&self, view: ViewKind) -> TriviewResult<Vec<bool>> {
        if view == ViewKind::JsonDebug {
            let items = self.read_structured_dump().await?;
            return Ok(items.into_iter().map(|item| item.done).collect());
        }
        let handles = self.locate_all(view, Role::ItemCheckbox).await?;
        let mut flags = Vec::with_capacity(handles.len());
        for (i, handle) in handles.iter().enumerate() {
            let checked = self.driver.is_checked(handle).await.map_err(|e| {
                TriviewError::driver(ElementContext::item(view, Role::ItemCheckbox, i), e)
            })?;
            flags.push(checked);
        }
        Ok(flags)
    }

    /// Label and completion of every rendered item
    pub async fn read_items(&self, view: ViewKind) -> TriviewResult<Vec<ItemProjection>> {
        if view == ViewKind::JsonDebug {
            let items = self.read_structured_dump().await?;
            return Ok(items.into_iter().map(ItemProjection::from).collect());
        }
        let labels = self.read_ordered_labels(view).await?;
        let flags = self.read_done_flags(view).await?;
        if labels.len() != flags.len() {
            debug!(%view, labels = labels.len(), flags = flags.len(), "partial render");
        }
        Ok(labels
            .into_iter()
            .zip(flags)
            .map(|(label, done)| ItemProjection::anonymous(label, done))
            .collect())
    }

    /// Parse the JsonDebug view; absent or malformed content is an error
    pub async fn read_structured_dump(&self) -> TriviewResult<Vec<TodoItem>> {
        let Some((handle, ctx)) = self
            .locate_one(ViewKind::JsonDebug, Role::DumpDocument, None)
            .await?
        else {
            return Err(TriviewError::Parse {
                view: ViewKind::JsonDebug,
                message: "dump document not rendered".to_string(),
            });
        };
        let text = self
            .driver
            .read(&handle, ReadKind::Text)
            .await
            .map_err(|e| TriviewError::driver(ctx, e))?;
        match text {
            Some(text) => parse_dump(&text),
            None => Err(TriviewError::Parse {
                view: ViewKind::JsonDebug,
                message: "dump document has no text".to_string(),
            }),
        }
    }

    /// Remaining-count from the counter fragment; never fails.
    ///
    /// Tiers: the `<strong>` value, then the first integer in the container
    /// text, then 0 when the container is absent or holds no number.
    pub async fn read_counter(&self) -> u32 {
        if let Some(n) = self.read_counter_tier(Role::CounterValue).await {
            return n;
        }
        if let Some(n) = self.read_counter_tier(Role::Counter).await {
            return n;
        }
        0
    }

    async fn read_counter_tier(&self, role: Role) -> Option<u32> {
        let found = match self.locate_one(ViewKind::Main, role, None).await {
            Ok(found) => found?,
            Err(e) => {
                debug!(%role, error = %e, "counter lookup failed");
                return None;
            }
        };
        let text = match self.driver.read(&found.0, ReadKind::Text).await {
            Ok(text) => text?,
            Err(e) => {
                debug!(%role, error = %e, "counter read failed");
                return None;
            }
        };
        match role {
            Role::CounterValue => text.trim().parse().ok(),
            _ => first_integer_in(&text),
        }
    }

    /// Present and visible; absence reads as `false`
    pub async fn is_visible(
        &self,
        view: ViewKind,
        role: Role,
        index: Option<usize>,
    ) -> TriviewResult<bool> {
        match self.locate_one(view, role, index).await? {
            Some((handle, ctx)) => self
                .driver
                .is_visible(&handle)
                .await
                .map_err(|e| TriviewError::driver(ctx, e)),
            None => Ok(false),
        }
    }

    /// Present and enabled; absence reads as `false`
    pub async fn is_enabled(&self, view: ViewKind, role: Role) -> TriviewResult<bool> {
        match self.locate_one(view, role, None).await? {
            Some((handle, ctx)) => self
                .driver
                .is_enabled(&handle)
                .await
                .map_err(|e| TriviewError::driver(ctx, e)),
            None => Ok(false),
        }
    }

    /// Number of elements matching a role
    pub async fn count(&self, view: ViewKind, role: Role) -> TriviewResult<usize> {
        Ok(self.locate_all(view, role).await?.len())
    }

    /// Whether the element's class list contains `class`
    pub async fn has_class(
        &self,
        view: ViewKind,
        role: Role,
        index: Option<usize>,
        class: &str,
    ) -> TriviewResult<bool> {
        let Some((handle, ctx)) = self.locate_one(view, role, index).await? else {
            return Ok(false);
        };
        let classes = self
            .driver
            .read(&handle, ReadKind::attribute("class"))
            .await
            .map_err(|e| TriviewError::driver(ctx, e))?;
        Ok(classes.is_some_and(|c| c.split_whitespace().any(|c| c == class)))
    }

    /// Filter whose link carries the `selected` class; `None` while filters are absent
    pub async fn read_selected_filter(&self) -> TriviewResult<Option<FilterState>> {
        for filter in FilterState::ALL {
            if self
                .has_class(ViewKind::Main, Role::FilterControl(filter), None, "selected")
                .await?
            {
                return Ok(Some(filter));
            }
        }
        Ok(None)
    }

    /// Current value of a form control, `None` when absent
    pub async fn read_value(
        &self,
        view: ViewKind,
        role: Role,
        index: Option<usize>,
    ) -> TriviewResult<Option<String>> {
        let Some((handle, ctx)) = self.locate_one(view, role, index).await? else {
            return Ok(None);
        };
        self.driver
            .read(&handle, ReadKind::Value)
            .await
            .map_err(|e| TriviewError::driver(ctx, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimOptions, SimulatedApp};

    mod dump_tests {
        use super::*;

        #[test]
        fn test_parse_dump_items() {
            let items =
                parse_dump(r#"{"items":[{"label":"B","done":true,"uid":2},{"label":"A","done":false,"uid":1}]}"#)
                    .unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[0], TodoItem::new("B", true, 2));
        }

        #[test]
        fn test_empty_items_is_not_an_error() {
            assert!(parse_dump(r#"{"items":[]}"#).unwrap().is_empty());
        }

        #[test]
        fn test_malformed_dump_is_parse_error() {
            for text in ["", "{", "null", r#"{"todos":[]}"#, r#"{"items":[{"label":"A"}]}"#] {
                let err = parse_dump(text).unwrap_err();
                assert!(
                    matches!(err, TriviewError::Parse { view: ViewKind::JsonDebug, .. }),
                    "{text:?}"
                );
            }
        }
    }

    mod counter_text_tests {
        use super::*;

        #[test]
        fn test_first_integer() {
            assert_eq!(first_integer_in("3 tâches restantes"), Some(3));
            assert_eq!(first_integer_in("reste: 12 sur 40"), Some(12));
            assert_eq!(first_integer_in("aucune"), None);
        }
    }

    mod counter_tier_tests {
        use super::*;

        #[tokio::test]
        async fn test_strong_tier() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            app.seed(&["A", "B"]);
            let reader = StateReader::new(app.clone());
            assert_eq!(reader.read_counter().await, 2);
        }

        #[tokio::test]
        async fn test_container_text_tier() {
            let app = Arc::new(SimulatedApp::new(SimOptions {
                counter_emphasis: false,
                ..SimOptions::default()
            }));
            app.seed(&["A", "B", "C"]);
            let reader = StateReader::new(app.clone());
            assert_eq!(reader.read_counter().await, 3);
        }

        #[tokio::test]
        async fn test_non_numeric_strong_falls_through() {
            let app = Arc::new(SimulatedApp::new(SimOptions {
                counter_emphasis_spelled: true,
                ..SimOptions::default()
            }));
            app.seed(&["A", "B", "C", "D"]);
            let reader = StateReader::new(app.clone());
            assert_eq!(reader.read_counter().await, 4);
        }

        #[tokio::test]
        async fn test_absent_container_reads_zero() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            let reader = StateReader::new(app.clone());
            assert_eq!(reader.read_counter().await, 0);
        }
    }

    mod view_read_tests {
        use super::*;

        #[tokio::test]
        async fn test_empty_views_read_empty() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            let reader = StateReader::new(app.clone());
            assert!(reader.read_ordered_labels(ViewKind::Main).await.unwrap().is_empty());
            assert!(reader.read_ordered_labels(ViewKind::Step2).await.unwrap().is_empty());
            assert!(reader.read_structured_dump().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_broken_dump_propagates_parse_error() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            app.corrupt_dump("{ not json");
            let reader = StateReader::new(app.clone());
            let err = reader.read_structured_dump().await.unwrap_err();
            assert!(matches!(err, TriviewError::Parse { .. }));
        }

        #[tokio::test]
        async fn test_missing_control_reads_invisible() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            let reader = StateReader::new(app.clone());
            assert!(!reader
                .is_visible(ViewKind::Main, Role::ClearCompletedControl, None)
                .await
                .unwrap());
        }
    }
}
