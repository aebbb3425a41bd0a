//! Order contracts when a view renders items in its own order.

mod common;

use triview::{OrderContract, SimOptions, TriviewError, View, ViewKind};

fn oldest_first() -> SimOptions {
    SimOptions {
        step2_oldest_first: true,
        ..SimOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_any_order_accepts_reversed_step2() {
    let config = common::config().with_order_contract(ViewKind::Step2, OrderContract::AnyOrder);
    let (_app, session) = common::session_with_config(oldest_first(), config);
    session.main().add("A").await.unwrap();
    session.main().add("B").await.unwrap();

    let snapshot = session.oracle().await_consistent().await.unwrap();
    assert_eq!(snapshot.labels(ViewKind::Step2), vec!["A", "B"]);
    assert_eq!(snapshot.labels(ViewKind::Main), vec!["B", "A"]);
}

#[tokio::test(start_paused = true)]
async fn test_exact_order_rejects_reversed_step2() {
    let (_app, session) = common::session_with(oldest_first());
    session.main().add("A").await.unwrap();
    session.main().add("B").await.unwrap();

    match session.oracle().await_consistent().await.unwrap_err() {
        TriviewError::ConsistencyTimeout { last, .. } => {
            assert!(last.starts_with("step2 vs json-debug"), "{last}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_any_order_still_catches_missing_items() {
    let config = common::config().with_order_contract(ViewKind::Step2, OrderContract::AnyOrder);
    let (app, session) = common::session_with_config(
        oldest_first().with_render_lag(ViewKind::Step2, 1_000_000),
        config,
    );
    session.main().add("A").await.unwrap();
    assert_eq!(app.model_labels(), vec!["A"]);
    let err = session.oracle().await_consistent().await.unwrap_err();
    assert!(matches!(err, TriviewError::ConsistencyTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_step2_adds_land_oldest_first() {
    let config = common::config().with_order_contract(ViewKind::Step2, OrderContract::AnyOrder);
    let (_app, session) = common::session_with_config(oldest_first(), config);
    for label in ["un", "deux", "trois"] {
        session.step2().add(label).await.unwrap();
    }
    session
        .oracle()
        .await_labels(ViewKind::Step2, &["un", "deux", "trois"])
        .await
        .unwrap();
    session.oracle().await_consistent().await.unwrap();
}
