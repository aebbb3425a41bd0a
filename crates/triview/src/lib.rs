//! Triview: Cross-View Consistency Checker for a Three-View Todo Page
//!
//! Drives a single-page todo application that renders the same item
//! collection three ways (the Main list, the "Étape 2" list and a JSON
//! dump) and asserts that the three stay consistent while they update
//! asynchronously.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    TRIVIEW Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   Session ──► MainView / Step2View / JsonDebugView  (View)      │
//! │      │              │ writes               │ reads               │
//! │      │        Interactor              StateReader                │
//! │      │              └────────┬─────────────┘                     │
//! │      │                 QueryResolver ──► Driver (trait)          │
//! │      ├──► ConsistencyOracle   (bounded polling over all views)   │
//! │      └──► HistoryController   (undo/redo, button + shortcut)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triview::{TriviewConfig, Session, SimulatedApp, View, ViewKind};
//!
//! # async fn run() -> triview::TriviewResult<()> {
//! let session = Session::new(Arc::new(SimulatedApp::default()), TriviewConfig::new())?;
//! session.main().add("Acheter du pain").await?;
//! session.history().record_mutation();
//! session.oracle().await_labels(ViewKind::Step2, &["Acheter du pain"]).await?;
//! session.oracle().await_consistent().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod activation;
#[cfg(feature = "browser")]
mod cdp;
pub mod config;
pub mod driver;
mod error;
pub mod history;
mod interaction;
pub mod logging;
mod model;
pub mod oracle;
mod poll;
mod query;
mod reader;
mod session;
pub mod sim;
pub mod view;

pub use activation::{activation_for, Activation, Gesture, ACTIVATIONS};
#[cfg(feature = "browser")]
pub use cdp::{CdpDriver, CdpOptions};
pub use config::{OrderContract, TriviewConfig};
pub use driver::{
    Action, Driver, DriverError, DriverResult, ElementHandle, ElementState, ReadKind,
};
pub use error::{ElementContext, TriviewError, TriviewResult};
pub use history::{HistoryChannel, HistoryController, HistoryCursor};
pub use interaction::{ClickOutcome, Interactor, Target};
pub use model::{
    normalize_label, FilterState, ItemProjection, TodoItem, ViewKind, MAX_LABEL_CHARS,
};
pub use oracle::{compare, ConsistencyOracle, Snapshot};
pub use poll::{Check, Exhausted, Polled, Poller};
pub use query::{Query, QueryResolver, Role};
pub use reader::{first_integer_in, parse_dump, StateReader};
pub use session::Session;
pub use sim::{SimOptions, SimulatedApp};
pub use view::{JsonDebugView, MainView, Step2View, View};
