//! Resilient interaction primitives.
//!
//! Two operations carry the whole write path: [`Interactor::fill_and_submit`]
//! and [`Interactor::resilient_click`]. Both block until the element resolves
//! and becomes actionable, or fail with the view, role and index attached.
//! The only fallback is the forced click, taken once and logged.

use crate::activation::{activation_for, Gesture};
use crate::config::TriviewConfig;
use crate::driver::{Action, Driver, DriverError, ElementHandle, ElementState};
use crate::error::{ElementContext, TriviewError, TriviewResult};
use crate::model::ViewKind;
use crate::poll::{Check, Poller};
use crate::query::{Query, QueryResolver, Role};
use std::sync::Arc;
use tracing::{debug, warn};

/// A resolved query together with the context reported on failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Semantic description
    pub ctx: ElementContext,
    /// Structural query
    pub query: Query,
}

/// How a click was finally delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Element became actionable and took a normal click
    Direct,
    /// Actionability wait timed out; the click was forced
    Forced,
}

/// Executes actions against resolved elements
#[derive(Clone)]
pub struct Interactor {
    driver: Arc<dyn Driver>,
    config: TriviewConfig,
    resolver: QueryResolver,
}

impl std::fmt::Debug for Interactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interactor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Interactor {
    /// Create an interactor over a driver
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, config: TriviewConfig) -> Self {
        Self {
            driver,
            config,
            resolver: QueryResolver::new(),
        }
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &TriviewConfig {
        &self.config
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Target a view-level element
    #[must_use]
    pub fn target(&self, view: ViewKind, role: Role) -> Target {
        Target {
            ctx: ElementContext::new(view, role),
            query: self.resolver.resolve(view, role, None),
        }
    }

    /// Target one item's element by 0-based index
    #[must_use]
    pub fn item_target(&self, view: ViewKind, role: Role, index: usize) -> Target {
        Target {
            ctx: ElementContext::item(view, role, index),
            query: self.resolver.resolve(view, role, Some(index + 1)),
        }
    }

    /// Resolve the first match, polling until one renders.
    ///
    /// A void query (the view has no such element) fails at once.
    pub async fn resolve(&self, target: &Target) -> TriviewResult<ElementHandle> {
        if target.query.is_void() {
            return Err(TriviewError::Resolution { ctx: target.ctx });
        }
        let driver = &self.driver;
        let query = &target.query;
        let ctx = target.ctx;
        let outcome = Poller::actionability(&self.config)
            .attempt(move || async move {
                let handles = driver
                    .locate(query)
                    .await
                    .map_err(|e| TriviewError::driver(ctx, e))?;
                Ok(match handles.into_iter().next() {
                    Some(handle) => Check::Pass(handle),
                    None => Check::Fail(format!("{query} matched nothing")),
                })
            })
            .await?;
        match outcome {
            Ok(polled) => Ok(polled.value),
            Err(exhausted) => {
                debug!(%ctx, waited_ms = exhausted.waited_ms(), "resolution failed");
                Err(TriviewError::Resolution { ctx })
            }
        }
    }

    async fn act(&self, target: &Target, handle: &ElementHandle, action: Action) -> TriviewResult<()> {
        debug!(ctx = %target.ctx, action = action.name(), "act");
        self.driver
            .act(handle, action)
            .await
            .map_err(|e| TriviewError::driver(target.ctx, e))
    }

    async fn wait_actionable(&self, target: &Target, handle: &ElementHandle) -> TriviewResult<bool> {
        self.driver
            .wait_for(
                handle,
                ElementState::Actionable,
                self.config.actionability_timeout(),
            )
            .await
            .map_err(|e| TriviewError::driver(target.ctx, e))
    }

    /// Replace the element's content with `text` and submit it.
    ///
    /// Content is never validated here; the application decides whether the
    /// input is acceptable and callers assert the outcome through readers.
    pub async fn fill_and_submit(&self, target: &Target, text: &str) -> TriviewResult<()> {
        let handle = self.fill_resolved(target, text).await?;
        self.act(target, &handle, Action::Press(self.config.submit_key.clone()))
            .await
    }

    /// Wait for the element to become actionable, then click it.
    ///
    /// Unlike [`Interactor::resilient_click`] there is no forced fallback.
    pub async fn click(&self, target: &Target) -> TriviewResult<()> {
        let handle = self.resolve(target).await?;
        if !self.wait_actionable(target, &handle).await? {
            return Err(TriviewError::ActionabilityTimeout {
                ctx: target.ctx,
                waited_ms: self.config.actionability_timeout_ms,
            });
        }
        self.act(target, &handle, Action::Click).await
    }

    /// Replace the element's content without submitting
    pub async fn fill(&self, target: &Target, text: &str) -> TriviewResult<()> {
        self.fill_resolved(target, text).await.map(|_| ())
    }

    async fn fill_resolved(&self, target: &Target, text: &str) -> TriviewResult<ElementHandle> {
        let handle = self.resolve(target).await?;
        if !self.wait_actionable(target, &handle).await? {
            return Err(TriviewError::ActionabilityTimeout {
                ctx: target.ctx,
                waited_ms: self.config.actionability_timeout_ms,
            });
        }
        self.act(target, &handle, Action::Fill(text.to_string()))
            .await?;
        Ok(handle)
    }

    /// Hover, wait for actionability, click; force the click on timeout.
    pub async fn resilient_click(&self, target: &Target) -> TriviewResult<ClickOutcome> {
        let handle = self.resolve(target).await?;
        self.hover_container(target, &handle).await?;

        if self.wait_actionable(target, &handle).await? {
            match self.driver.act(&handle, Action::Click).await {
                Ok(()) => return Ok(ClickOutcome::Direct),
                Err(DriverError::NotActionable { reason, .. }) => {
                    debug!(ctx = %target.ctx, %reason, "click refused after wait");
                }
                Err(e) => return Err(TriviewError::driver(target.ctx, e)),
            }
        }

        warn!(
            ctx = %target.ctx,
            timeout_ms = self.config.actionability_timeout_ms,
            "element not actionable, forcing click"
        );
        self.act(target, &handle, Action::ForceClick).await?;
        Ok(ClickOutcome::Forced)
    }

    /// Perform the activation gesture the table prescribes for `target`.
    ///
    /// Returns `false` when the target needs no gesture.
    pub async fn activate(&self, target: &Target) -> TriviewResult<bool> {
        let Some(rule) = activation_for(target.ctx.view, target.ctx.role) else {
            return Ok(false);
        };
        let opener = self.opener_target(target, rule.opener);
        let handle = self.resolve(&opener).await?;
        let action = match rule.gesture {
            Gesture::Hover => Action::Hover,
            Gesture::Click => Action::Click,
            Gesture::DoubleClick => Action::DoubleClick,
        };
        self.act(&opener, &handle, action).await?;
        Ok(true)
    }

    /// Press a page-level key chord
    pub async fn press_keys(&self, ctx: ElementContext, chord: &str) -> TriviewResult<()> {
        debug!(%ctx, chord, "press keys");
        self.driver
            .press_keys(chord)
            .await
            .map_err(|e| TriviewError::driver(ctx, e))
    }

    fn opener_target(&self, target: &Target, opener: Role) -> Target {
        match target.ctx.index {
            Some(i) => self.item_target(target.ctx.view, opener, i),
            None => self.target(target.ctx.view, opener),
        }
    }

    async fn hover_container(&self, target: &Target, handle: &ElementHandle) -> TriviewResult<()> {
        let container = match activation_for(target.ctx.view, target.ctx.role) {
            Some(rule) if rule.gesture == Gesture::Hover => {
                let opener = self.opener_target(target, rule.opener);
                Some((self.resolve(&opener).await?, opener))
            }
            _ => None,
        };
        let (hover_handle, hover_target) = match &container {
            Some((h, t)) => (h, t),
            None => (handle, target),
        };
        match self.driver.act(hover_handle, Action::Hover).await {
            Ok(()) => Ok(()),
            Err(DriverError::NotActionable { reason, .. }) => {
                debug!(ctx = %hover_target.ctx, %reason, "hover refused");
                Ok(())
            }
            Err(e) => Err(TriviewError::driver(hover_target.ctx, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimOptions, SimulatedApp};

    fn interactor(app: &Arc<SimulatedApp>) -> Interactor {
        let config = TriviewConfig::new()
            .with_actionability_timeout(100)
            .with_poll_interval(5);
        Interactor::new(app.clone(), config)
    }

    mod resolve_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_void_query_fails_immediately() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            let i = interactor(&app);
            let err = i
                .resolve(&i.target(ViewKind::JsonDebug, Role::NewItemInput))
                .await
                .unwrap_err();
            assert!(matches!(err, TriviewError::Resolution { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_item_is_resolution_error_with_index() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            let i = interactor(&app);
            let err = i
                .resolve(&i.item_target(ViewKind::Main, Role::ItemCheckbox, 3))
                .await
                .unwrap_err();
            assert_eq!(err.context().unwrap().index, Some(3));
        }
    }

    mod fill_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_fill_and_submit_adds_item() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            let i = interactor(&app);
            i.fill_and_submit(&i.target(ViewKind::Main, Role::NewItemInput), "A")
                .await
                .unwrap();
            assert_eq!(app.model_labels(), vec!["A".to_string()]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_fill_does_not_prevalidate() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            let i = interactor(&app);
            i.fill_and_submit(&i.target(ViewKind::Main, Role::NewItemInput), "   ")
                .await
                .unwrap();
            assert!(app.was_called("fill"));
            assert!(app.model_labels().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_hidden_edit_input_times_out() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            app.seed(&["A"]);
            let i = interactor(&app);
            let err = i
                .fill_and_submit(&i.item_target(ViewKind::Main, Role::ItemEditInput, 0), "B")
                .await
                .unwrap_err();
            assert!(matches!(err, TriviewError::ActionabilityTimeout { .. }));
        }
    }

    mod click_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_hover_reveals_delete() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            app.seed(&["A"]);
            let i = interactor(&app);
            let outcome = i
                .resilient_click(&i.item_target(ViewKind::Main, Role::ItemDeleteControl, 0))
                .await
                .unwrap();
            assert_eq!(outcome, ClickOutcome::Direct);
            assert!(app.model_labels().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_unreliable_hover_forces_click() {
            let app = Arc::new(SimulatedApp::new(SimOptions {
                hover_reveals_controls: false,
                ..SimOptions::default()
            }));
            app.seed(&["A"]);
            let i = interactor(&app);
            let outcome = i
                .resilient_click(&i.item_target(ViewKind::Main, Role::ItemDeleteControl, 0))
                .await
                .unwrap();
            assert_eq!(outcome, ClickOutcome::Forced);
            assert!(app.was_called("force_click"));
            assert!(app.model_labels().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_activate_without_rule_is_noop() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            app.seed(&["A"]);
            let i = interactor(&app);
            let activated = i
                .activate(&i.item_target(ViewKind::Main, Role::ItemCheckbox, 0))
                .await
                .unwrap();
            assert!(!activated);
        }

        #[tokio::test(start_paused = true)]
        async fn test_activate_opens_inline_editor() {
            let app = Arc::new(SimulatedApp::new(SimOptions::default()));
            app.seed(&["A"]);
            let i = interactor(&app);
            let edit = i.item_target(ViewKind::Main, Role::ItemEditInput, 0);
            assert!(i.activate(&edit).await.unwrap());
            i.fill_and_submit(&edit, "B").await.unwrap();
            assert_eq!(app.model_labels(), vec!["B".to_string()]);
        }
    }
}
