//! Scenario entry point.
//!
//! A [`Session`] owns one driver and one configuration and hands out the
//! view adapters, the consistency oracle and the history controller built
//! over them. Scenarios should need nothing else.

use crate::config::TriviewConfig;
use crate::driver::Driver;
use crate::error::TriviewResult;
use crate::history::HistoryController;
use crate::interaction::Interactor;
use crate::model::ViewKind;
use crate::oracle::ConsistencyOracle;
use crate::reader::StateReader;
use crate::view::{JsonDebugView, MainView, Step2View, View};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything a scenario drives, over one page
pub struct Session {
    driver: Arc<dyn Driver>,
    config: TriviewConfig,
    reader: StateReader,
    main: Arc<MainView>,
    step2: Arc<Step2View>,
    json: Arc<JsonDebugView>,
    oracle: ConsistencyOracle,
    history: HistoryController,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Validate the configuration and wire every component to `driver`
    pub fn new(driver: Arc<dyn Driver>, config: TriviewConfig) -> TriviewResult<Self> {
        config.validate()?;
        let interactor = Interactor::new(driver.clone(), config.clone());
        let reader = StateReader::new(driver.clone());

        let main = Arc::new(MainView::new(interactor.clone(), reader.clone()));
        let step2 = Arc::new(Step2View::new(interactor.clone(), reader.clone()));
        let json = Arc::new(JsonDebugView::new(reader.clone()));

        // The dump comes first: it is unfiltered and carries uids
        let views: Vec<Arc<dyn View>> = vec![json.clone(), step2.clone(), main.clone()];
        let oracle = ConsistencyOracle::new(views, reader.clone(), config.clone());
        let history = HistoryController::new(interactor, reader.clone());

        info!(
            actionability_ms = config.actionability_timeout_ms,
            consistency_ms = config.consistency_timeout_ms,
            poll_ms = config.poll_interval_ms,
            "session ready"
        );
        Ok(Self {
            driver,
            config,
            reader,
            main,
            step2,
            json,
            oracle,
            history,
        })
    }

    /// Session with configuration loaded from YAML, then the environment
    pub fn from_config_file(driver: Arc<dyn Driver>, path: impl AsRef<Path>) -> TriviewResult<Self> {
        let config = TriviewConfig::from_yaml_file(path)?.with_env_overrides()?;
        Self::new(driver, config)
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

    /// Raw state readers
    #[must_use]
    pub const fn reader(&self) -> &StateReader {
        &self.reader
    }

    /// Primary list
    #[must_use]
    pub fn main(&self) -> &MainView {
        &self.main
    }

    /// "Étape 2" list
    #[must_use]
    pub fn step2(&self) -> &Step2View {
        &self.step2
    }

    /// JSON dump
    #[must_use]
    pub fn json(&self) -> &JsonDebugView {
        &self.json
    }

    /// Adapter for a view kind
    #[must_use]
    pub fn view(&self, kind: ViewKind) -> Arc<dyn View> {
        match kind {
            ViewKind::Main => self.main.clone(),
            ViewKind::Step2 => self.step2.clone(),
            ViewKind::JsonDebug => self.json.clone(),
        }
    }

    /// Cross-view assertions
    #[must_use]
    pub const fn oracle(&self) -> &ConsistencyOracle {
        &self.oracle
    }

    /// Undo/redo control
    #[must_use]
    pub const fn history(&self) -> &HistoryController {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriviewError;
    use crate::sim::SimulatedApp;
    use std::io::Write;

    #[test]
    fn test_invalid_config_rejected() {
        let app = Arc::new(SimulatedApp::default());
        let config = TriviewConfig::new().with_poll_interval(0);
        let err = Session::new(app, config).unwrap_err();
        assert!(matches!(err, TriviewError::Config { .. }));
    }

    #[test]
    fn test_view_lookup() {
        let session = Session::new(Arc::new(SimulatedApp::default()), TriviewConfig::new()).unwrap();
        for kind in ViewKind::ALL {
            assert_eq!(session.view(kind).kind(), kind);
        }
        assert!(session.view(ViewKind::Main).filtered_by_ui());
    }

    #[test]
    fn test_from_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "actionability_timeout_ms: 750\nsettle_ms: 100").unwrap();
        let session =
            Session::from_config_file(Arc::new(SimulatedApp::default()), file.path()).unwrap();
        assert_eq!(session.config().settle_ms, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_reaches_every_view() {
        let app = Arc::new(SimulatedApp::default());
        let session = Session::new(app, TriviewConfig::new()).unwrap();
        session.main().add("A").await.unwrap();
        let snapshot = session.oracle().await_consistent().await.unwrap();
        for kind in ViewKind::ALL {
            assert_eq!(snapshot.labels(kind), vec!["A"]);
        }
    }
}
