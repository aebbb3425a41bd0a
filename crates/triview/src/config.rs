//! Checker configuration.
//!
//! Timeouts are per operation, never global. Values load from YAML and may be
//! overridden from the environment for slow CI machines.

use crate::error::{TriviewError, TriviewResult};
use crate::model::ViewKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default wait for an element to become actionable (2 seconds)
pub const DEFAULT_ACTIONABILITY_TIMEOUT_MS: u64 = 2000;

/// Default bound for cross-view convergence (5 seconds)
pub const DEFAULT_CONSISTENCY_TIMEOUT_MS: u64 = 5000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default window during which a "nothing changed" observation must hold
pub const DEFAULT_SETTLE_MS: u64 = 300;

/// Upper bound accepted for any timeout
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// Environment override for the actionability timeout
pub const ENV_ACTION_TIMEOUT: &str = "TRIVIEW_ACTION_TIMEOUT_MS";

/// Environment override for the consistency timeout
pub const ENV_CONSISTENCY_TIMEOUT: &str = "TRIVIEW_CONSISTENCY_TIMEOUT_MS";

/// Whether a view's item order takes part in equality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderContract {
    /// Same order as the reference view
    #[default]
    Exact,
    /// Same multiset of items, any order
    AnyOrder,
}

/// Configuration shared by every component of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriviewConfig {
    /// URL of the application under test
    pub base_url: Option<String>,
    /// Wait for an element to become actionable
    pub actionability_timeout_ms: u64,
    /// Bound for convergence assertions
    pub consistency_timeout_ms: u64,
    /// Interval between polls
    pub poll_interval_ms: u64,
    /// Window for stability assertions
    pub settle_ms: u64,
    /// Key signalling submission of an input
    pub submit_key: String,
    /// Undo keyboard shortcut
    pub undo_shortcut: String,
    /// Redo keyboard shortcut
    pub redo_shortcut: String,
    /// Order contract per view; missing views default to `Exact`
    pub order_contracts: BTreeMap<ViewKind, OrderContract>,
}

impl Default for TriviewConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            actionability_timeout_ms: DEFAULT_ACTIONABILITY_TIMEOUT_MS,
            consistency_timeout_ms: DEFAULT_CONSISTENCY_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            submit_key: "Enter".to_string(),
            undo_shortcut: "Control+z".to_string(),
            redo_shortcut: "Control+y".to_string(),
            order_contracts: BTreeMap::new(),
        }
    }
}

impl TriviewConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> TriviewResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> TriviewResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply `TRIVIEW_*` environment overrides
    pub fn with_env_overrides(self) -> TriviewResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> TriviewResult<Self> {
        let parse = |key: &str, raw: String| {
            raw.trim().parse::<u64>().map_err(|e| TriviewError::Config {
                message: format!("{key}={raw:?}: {e}"),
            })
        };
        if let Some(raw) = lookup(ENV_ACTION_TIMEOUT) {
            self.actionability_timeout_ms = parse(ENV_ACTION_TIMEOUT, raw)?;
        }
        if let Some(raw) = lookup(ENV_CONSISTENCY_TIMEOUT) {
            self.consistency_timeout_ms = parse(ENV_CONSISTENCY_TIMEOUT, raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check bounds and relations between fields
    pub fn validate(&self) -> TriviewResult<()> {
        for (name, value) in [
            ("actionability_timeout_ms", self.actionability_timeout_ms),
            ("consistency_timeout_ms", self.consistency_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 || value > MAX_TIMEOUT_MS {
                return Err(TriviewError::Config {
                    message: format!("{name} must be within 1..={MAX_TIMEOUT_MS}, got {value}"),
                });
            }
        }
        if self.poll_interval_ms > self.consistency_timeout_ms {
            return Err(TriviewError::Config {
                message: "poll_interval_ms exceeds consistency_timeout_ms".to_string(),
            });
        }
        if self.settle_ms > self.consistency_timeout_ms {
            return Err(TriviewError::Config {
                message: "settle_ms exceeds consistency_timeout_ms".to_string(),
            });
        }
        if self.undo_shortcut.is_empty() || self.redo_shortcut.is_empty() {
            return Err(TriviewError::Config {
                message: "history shortcuts must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Set the actionability timeout
    #[must_use]
    pub const fn with_actionability_timeout(mut self, ms: u64) -> Self {
        self.actionability_timeout_ms = ms;
        self
    }

    /// Set the consistency timeout
    #[must_use]
    pub const fn with_consistency_timeout(mut self, ms: u64) -> Self {
        self.consistency_timeout_ms = ms;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the settle window
    #[must_use]
    pub const fn with_settle(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set the application URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the order contract of one view
    #[must_use]
    pub fn with_order_contract(mut self, view: ViewKind, contract: OrderContract) -> Self {
        let _ = self.order_contracts.insert(view, contract);
        self
    }

    /// Order contract of a view
    #[must_use]
    pub fn order_contract(&self, view: ViewKind) -> OrderContract {
        self.order_contracts.get(&view).copied().unwrap_or_default()
    }

    /// Actionability timeout as Duration
    #[must_use]
    pub const fn actionability_timeout(&self) -> Duration {
        Duration::from_millis(self.actionability_timeout_ms)
    }

    /// Consistency timeout as Duration
    #[must_use]
    pub const fn consistency_timeout(&self) -> Duration {
        Duration::from_millis(self.consistency_timeout_ms)
    }

    /// Poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Settle window as Duration
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
