//! Shared fixtures for the scenario suites.

#![allow(dead_code)]

use std::sync::Arc;
use triview::{TriviewConfig, Session, SimOptions, SimulatedApp};

/// Short bounds; tests run on paused tokio time
pub fn config() -> TriviewConfig {
    TriviewConfig::new()
        .with_actionability_timeout(200)
        .with_consistency_timeout(1_000)
        .with_poll_interval(10)
        .with_settle(100)
}

pub fn session_with(options: SimOptions) -> (Arc<SimulatedApp>, Session) {
    session_with_config(options, config())
}

pub fn session_with_config(
    options: SimOptions,
    config: TriviewConfig,
) -> (Arc<SimulatedApp>, Session) {
    triview::logging::init_test_tracing();
    let app = Arc::new(SimulatedApp::new(options));
    let session = Session::new(app.clone(), config).expect("valid test config");
    (app, session)
}

pub fn session() -> (Arc<SimulatedApp>, Session) {
    session_with(SimOptions::default())
}

/// Every view renders a few lookups behind the model
pub fn lagging_session() -> (Arc<SimulatedApp>, Session) {
    session_with(SimOptions::default().with_uniform_lag(3))
}
