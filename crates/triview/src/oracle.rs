//! Cross-view consistency oracle.
//!
//! The three views update asynchronously, so nothing here compares a single
//! read. Every assertion is a bounded poll over fresh reads from each view's
//! own rendering, and a timeout reports the last mismatch it saw.
//!
//! Items are joined on `uid` when both sides expose one, otherwise on label
//! and position. Main hides items according to the page filter; it is
//! compared against the reference projected through the selected filter.

use crate::config::{OrderContract, TriviewConfig};
use crate::error::{TriviewError, TriviewResult};
use crate::model::{FilterState, ItemProjection, ViewKind};
use crate::poll::{Check, Poller};
use crate::reader::StateReader;
use crate::view::View;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Items observed in every view in one polling round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Filter selected when the round was read
    pub filter: FilterState,
    /// Items per view, in rendered order
    pub views: BTreeMap<ViewKind, Vec<ItemProjection>>,
}

impl Snapshot {
    /// Items a view showed
    #[must_use]
    pub fn items(&self, view: ViewKind) -> &[ItemProjection] {
        self.views.get(&view).map_or(&[][..], Vec::as_slice)
    }

    /// Labels a view showed
    #[must_use]
    pub fn labels(&self, view: ViewKind) -> Vec<&str> {
        self.items(view).iter().map(|i| i.label.as_str()).collect()
    }

    /// Items not done in a view
    #[must_use]
    pub fn remaining(&self, view: ViewKind) -> usize {
        self.items(view).iter().filter(|i| !i.done).count()
    }
}

fn keys(items: &[ItemProjection]) -> Vec<(&str, bool)> {
    items.iter().map(ItemProjection::key).collect()
}

/// Compare two projections of the item collection.
///
/// Returns a description of the first difference found.
pub fn compare(
    expected: &[ItemProjection],
    actual: &[ItemProjection],
    contract: OrderContract,
) -> Result<(), String> {
    if expected.len() != actual.len() {
        return Err(format!(
            "expected {} items {:?}, found {} {:?}",
            expected.len(),
            keys(expected),
            actual.len(),
            keys(actual)
        ));
    }

    let joinable = expected.iter().chain(actual).all(|i| i.uid.is_some());
    if joinable {
        let by_uid: HashMap<Option<u64>, &ItemProjection> =
            actual.iter().map(|i| (i.uid, i)).collect();
        for item in expected {
            match by_uid.get(&item.uid) {
                Some(found) if found.key() == item.key() => {}
                Some(found) => {
                    return Err(format!(
                        "uid {:?} is {:?}, expected {:?}",
                        item.uid,
                        found.key(),
                        item.key()
                    ));
                }
                None => return Err(format!("uid {:?} ({}) missing", item.uid, item.label)),
            }
        }
        if contract == OrderContract::Exact {
            let want: Vec<_> = expected.iter().map(|i| i.uid).collect();
            let got: Vec<_> = actual.iter().map(|i| i.uid).collect();
            if want != got {
                return Err(format!("uid order {got:?}, expected {want:?}"));
            }
        }
        return Ok(());
    }

    let mut want = keys(expected);
    let mut got = keys(actual);
    if contract == OrderContract::AnyOrder {
        want.sort_unstable();
        got.sort_unstable();
    }
    if want == got {
        Ok(())
    } else {
        Err(format!("found {got:?}, expected {want:?}"))
    }
}

/// Asserts that the views converge
#[derive(Clone)]
pub struct ConsistencyOracle {
    views: Vec<Arc<dyn View>>,
    reader: StateReader,
    config: TriviewConfig,
}

impl std::fmt::Debug for ConsistencyOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<ViewKind> = self.views.iter().map(|v| v.kind()).collect();
        f.debug_struct("ConsistencyOracle")
            .field("views", &kinds)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConsistencyOracle {
    /// Create an oracle over a set of views.
    ///
    /// The first view not filtered by the UI serves as the reference.
    #[must_use]
    pub fn new(views: Vec<Arc<dyn View>>, reader: StateReader, config: TriviewConfig) -> Self {
        Self {
            views,
            reader,
            config,
        }
    }

    fn view(&self, kind: ViewKind) -> TriviewResult<&Arc<dyn View>> {
        self.views
            .iter()
            .find(|v| v.kind() == kind)
            .ok_or(TriviewError::Unsupported {
                view: kind,
                op: "observation by this oracle",
            })
    }

    fn reference(&self) -> Option<&Arc<dyn View>> {
        self.views
            .iter()
            .find(|v| !v.filtered_by_ui())
            .or_else(|| self.views.first())
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.views.iter().map(|v| v.kind().as_str()).collect();
        format!("views {} consistent", names.join(", "))
    }

    /// Read every view once
    pub async fn snapshot(&self) -> TriviewResult<Snapshot> {
        let filter = self.reader.read_selected_filter().await?.unwrap_or_default();
        let mut views = BTreeMap::new();
        for view in &self.views {
            views.insert(view.kind(), view.items().await?);
        }
        Ok(Snapshot { filter, views })
    }

    /// First disagreement between a view and the reference, if any
    #[must_use]
    pub fn mismatch(&self, snapshot: &Snapshot) -> Option<String> {
        let reference = self.reference()?;
        let base = snapshot.items(reference.kind());
        for view in &self.views {
            if view.kind() == reference.kind() {
                continue;
            }
            let projected: Vec<ItemProjection>;
            let expected = if view.filtered_by_ui() && !reference.filtered_by_ui() {
                projected = base
                    .iter()
                    .filter(|i| snapshot.filter.accepts(i.done))
                    .cloned()
                    .collect();
                projected.as_slice()
            } else {
                base
            };
            let contract = self.config.order_contract(view.kind());
            if let Err(diff) = compare(expected, snapshot.items(view.kind()), contract) {
                return Some(format!(
                    "{} vs {}: {diff}",
                    view.kind(),
                    reference.kind()
                ));
            }
        }
        None
    }

    /// Poll until every view agrees with the reference
    pub async fn await_consistent(&self) -> TriviewResult<Snapshot> {
        let this = self;
        let polled = Poller::consistency(&self.config)
            .with_description(self.describe())
            .until(move || async move {
                let snapshot = this.snapshot().await?;
                Ok(match this.mismatch(&snapshot) {
                    None => Check::Pass(snapshot),
                    Some(diff) => Check::Fail(diff),
                })
            })
            .await?;
        debug!(attempts = polled.attempts, "views converged");
        Ok(polled.value)
    }

    async fn await_list<F>(&self, kind: ViewKind, what: String, accept: F) -> TriviewResult<Vec<String>>
    where
        F: Fn(&[String]) -> bool,
    {
        let view = self.view(kind)?;
        let accept = &accept;
        let polled = Poller::consistency(&self.config)
            .with_description(what)
            .until(move || async move {
                let labels = view.list().await?;
                Ok(if accept(&labels) {
                    Check::Pass(labels)
                } else {
                    Check::Fail(format!("{kind} shows {labels:?}"))
                })
            })
            .await?;
        Ok(polled.value)
    }

    /// Poll until a view shows exactly these labels in this order
    pub async fn await_labels(&self, kind: ViewKind, expected: &[&str]) -> TriviewResult<Vec<String>> {
        self.await_list(kind, format!("{kind} labels == {expected:?}"), |labels| {
            labels.iter().map(String::as_str).eq(expected.iter().copied())
        })
        .await
    }

    /// Poll until a view shows a label
    pub async fn await_contains(&self, kind: ViewKind, label: &str) -> TriviewResult<Vec<String>> {
        self.await_list(kind, format!("{kind} contains {label:?}"), |labels| {
            labels.iter().any(|l| l == label)
        })
        .await
    }

    /// Poll until a view no longer shows a label
    pub async fn await_absent(&self, kind: ViewKind, label: &str) -> TriviewResult<Vec<String>> {
        self.await_list(kind, format!("{kind} lacks {label:?}"), |labels| {
            labels.iter().all(|l| l != label)
        })
        .await
    }

    /// Poll until a view shows `len` items
    pub async fn await_len(&self, kind: ViewKind, len: usize) -> TriviewResult<Vec<String>> {
        self.await_list(kind, format!("{kind} has {len} items"), |labels| {
            labels.len() == len
        })
        .await
    }

    /// Poll until a view reports `expected` remaining items
    pub async fn await_remaining(&self, kind: ViewKind, expected: u32) -> TriviewResult<u32> {
        let view = self.view(kind)?;
        let polled = Poller::consistency(&self.config)
            .with_description(format!("{kind} remaining == {expected}"))
            .until(move || async move {
                let n = view.count_remaining().await?;
                Ok(Check::from_bool(n == expected, n, || {
                    format!("{kind} reports {n} remaining")
                }))
            })
            .await?;
        Ok(polled.value)
    }

    /// Poll until the counter fragment reads `expected`
    pub async fn await_counter(&self, expected: u32) -> TriviewResult<u32> {
        let reader = &self.reader;
        let polled = Poller::consistency(&self.config)
            .with_description(format!("counter == {expected}"))
            .until(move || async move {
                let n = reader.read_counter().await;
                Ok(Check::from_bool(n == expected, n, || format!("counter reads {n}")))
            })
            .await?;
        Ok(polled.value)
    }

    /// Poll until the counter equals the number of undone items in the dump
    pub async fn await_counter_matches_dump(&self) -> TriviewResult<u32> {
        let reader = &self.reader;
        let polled = Poller::consistency(&self.config)
            .with_description("counter == undone items in dump")
            .until(move || async move {
                let counter = reader.read_counter().await;
                let undone = reader
                    .read_structured_dump()
                    .await?
                    .iter()
                    .filter(|i| !i.done)
                    .count() as u32;
                Ok(Check::from_bool(counter == undone, counter, || {
                    format!("counter reads {counter}, dump has {undone} undone")
                }))
            })
            .await?;
        Ok(polled.value)
    }

    /// Require a view's length to stay at `len` for the settle window.
    ///
    /// For actions that must change nothing, such as submitting blank input.
    pub async fn assert_stable_len(&self, kind: ViewKind, len: usize) -> TriviewResult<()> {
        let view = self.view(kind)?;
        Poller::consistency(&self.config)
            .with_description(format!("{kind} has {len} items"))
            .holds(self.config.settle(), move || async move {
                let labels = view.list().await?;
                Ok(Check::from_bool(labels.len() == len, (), || {
                    format!("{kind} shows {labels:?}")
                }))
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(label: &str, done: bool, uid: u64) -> ItemProjection {
        ItemProjection {
            label: label.to_string(),
            done,
            uid: Some(uid),
        }
    }

    mod compare_tests {
        use super::*;

        #[test]
        fn test_equal_anonymous_lists() {
            let a = vec![ItemProjection::anonymous("B", false), ItemProjection::anonymous("A", true)];
            assert!(compare(&a, &a.clone(), OrderContract::Exact).is_ok());
        }

        #[test]
        fn test_order_matters_when_exact() {
            let a = vec![ItemProjection::anonymous("B", false), ItemProjection::anonymous("A", false)];
            let b = vec![ItemProjection::anonymous("A", false), ItemProjection::anonymous("B", false)];
            assert!(compare(&a, &b, OrderContract::Exact).is_err());
            assert!(compare(&a, &b, OrderContract::AnyOrder).is_ok());
        }

        #[test]
        fn test_done_flag_mismatch() {
            let a = vec![ItemProjection::anonymous("A", false)];
            let b = vec![ItemProjection::anonymous("A", true)];
            let diff = compare(&a, &b, OrderContract::AnyOrder).unwrap_err();
            assert!(diff.contains("\"A\""));
        }

        #[test]
        fn test_uid_join_detects_swapped_labels() {
            let a = vec![item("A", false, 1), item("B", false, 2)];
            let b = vec![item("B", false, 1), item("A", false, 2)];
            let diff = compare(&a, &b, OrderContract::AnyOrder).unwrap_err();
            assert!(diff.contains("uid Some(1)"));
        }

        #[test]
        fn test_uid_join_any_order() {
            let a = vec![item("A", false, 1), item("B", true, 2)];
            let b = vec![item("B", true, 2), item("A", false, 1)];
            assert!(compare(&a, &b, OrderContract::AnyOrder).is_ok());
            assert!(compare(&a, &b, OrderContract::Exact).is_err());
        }

        #[test]
        fn test_mixed_identity_falls_back_to_labels() {
            let a = vec![item("A", false, 1)];
            let b = vec![ItemProjection::anonymous("A", false)];
            assert!(compare(&a, &b, OrderContract::Exact).is_ok());
        }

        #[test]
        fn test_length_mismatch() {
            let a = vec![ItemProjection::anonymous("A", false)];
            assert!(compare(&a, &[], OrderContract::Exact)
                .unwrap_err()
                .starts_with("expected 1 items"));
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn test_snapshot_accessors() {
            let mut snapshot = Snapshot::default();
            snapshot
                .views
                .insert(ViewKind::Step2, vec![item("B", true, 2), item("A", false, 1)]);
            assert_eq!(snapshot.labels(ViewKind::Step2), vec!["B", "A"]);
            assert_eq!(snapshot.remaining(ViewKind::Step2), 1);
            assert!(snapshot.items(ViewKind::Main).is_empty());
        }
    }
}
