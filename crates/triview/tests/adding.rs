//! Adding items through the editable views.
//!
//! Every accepted item must reach all three views, most recent first.
//! Rejected input must leave every view unchanged.

mod common;

use triview::{SimOptions, TriviewError, View, ViewKind, MAX_LABEL_CHARS};

// ============================================================================
// Propagation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_add_via_main_reaches_every_view() {
    let (_app, session) = common::session();
    session.main().add("A").await.unwrap();
    session.main().add("B").await.unwrap();

    for kind in ViewKind::ALL {
        session.oracle().await_labels(kind, &["B", "A"]).await.unwrap();
    }
    session.oracle().await_consistent().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_add_via_step2_reaches_every_view() {
    let (app, session) = common::session();
    session.step2().add("Acheter du pain").await.unwrap();

    session
        .oracle()
        .await_contains(ViewKind::Main, "Acheter du pain")
        .await
        .unwrap();
    let snapshot = session.oracle().await_consistent().await.unwrap();
    assert_eq!(snapshot.labels(ViewKind::JsonDebug), vec!["Acheter du pain"]);
    assert_eq!(app.model_labels(), vec!["Acheter du pain"]);
}

#[tokio::test(start_paused = true)]
async fn test_lagging_views_converge() {
    let (_app, session) = common::lagging_session();
    for label in ["un", "deux", "trois"] {
        session.main().add(label).await.unwrap();
    }
    // Agreement alone could be three stale views; wait for the dump first
    session
        .oracle()
        .await_labels(ViewKind::JsonDebug, &["trois", "deux", "un"])
        .await
        .unwrap();
    let snapshot = session.oracle().await_consistent().await.unwrap();
    assert_eq!(snapshot.labels(ViewKind::Step2), vec!["trois", "deux", "un"]);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_adds_all_land() {
    let (app, session) = common::session_with(
        SimOptions::default().with_render_lag(ViewKind::JsonDebug, 5),
    );
    for i in 0..8 {
        session.main().add(&format!("item {i}")).await.unwrap();
    }
    session.oracle().await_len(ViewKind::JsonDebug, 8).await.unwrap();
    session.oracle().await_consistent().await.unwrap();
    assert_eq!(app.model_labels().len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_view_added_through_trait_object() {
    let (_app, session) = common::session();
    let step2 = session.view(ViewKind::Step2);
    step2.add("via trait").await.unwrap();
    session
        .oracle()
        .await_labels(ViewKind::Main, &["via trait"])
        .await
        .unwrap();
}

// ============================================================================
// Rejected input
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_blank_input_adds_nothing() {
    let (_app, session) = common::session();
    for raw in ["", "      ", "\t"] {
        session.main().add(raw).await.unwrap();
    }
    for kind in ViewKind::ALL {
        session.oracle().assert_stable_len(kind, 0).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_symbols_only_input_adds_nothing() {
    let (app, session) = common::session();
    app.seed(&["gardé"]);
    session.main().add("!!!@@@###").await.unwrap();
    session.step2().add("%%%^^^&&&").await.unwrap();
    for kind in ViewKind::ALL {
        session.oracle().assert_stable_len(kind, 1).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_symbols_with_text_accepted() {
    let (_app, session) = common::session();
    session.main().add("tâche-#1-!@€").await.unwrap();
    session
        .oracle()
        .await_labels(ViewKind::JsonDebug, &["tâche-#1-!@€"])
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dump_is_read_only() {
    let (_app, session) = common::session();
    let err = session.json().add("X").await.unwrap_err();
    assert!(matches!(err, TriviewError::Unsupported { view: ViewKind::JsonDebug, .. }));
}

// ============================================================================
// Content rules
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_long_input_truncated_identically() {
    let (_app, session) = common::session();
    let long = "x".repeat(MAX_LABEL_CHARS + 20);
    session.main().add(&long).await.unwrap();
    session.step2().add(&long).await.unwrap();

    let labels = session.oracle().await_len(ViewKind::JsonDebug, 2).await.unwrap();
    assert_eq!(labels[0], labels[1]);
    assert_eq!(labels[0].chars().count(), MAX_LABEL_CHARS);
    session.oracle().await_consistent().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_emoji_and_accents_preserved() {
    let (_app, session) = common::session();
    let label = "Réviser l'été 🚀 ñ ü";
    session.main().add(label).await.unwrap();
    let snapshot = session.oracle().await_consistent().await.unwrap();
    for kind in ViewKind::ALL {
        assert_eq!(snapshot.labels(kind), vec![label]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_draft_holds_at_most_max_chars() {
    let (app, session) = common::session();
    let value = session.main().draft(&"é".repeat(80)).await.unwrap();
    assert_eq!(value.chars().count(), MAX_LABEL_CHARS);
    assert!(app.model_labels().is_empty());
}

// ============================================================================
// Counter
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_counter_follows_adds() {
    let (_app, session) = common::session();
    for label in ["a", "b", "c"] {
        session.main().add(label).await.unwrap();
    }
    assert_eq!(session.oracle().await_counter(3).await.unwrap(), 3);
    assert_eq!(session.oracle().await_counter_matches_dump().await.unwrap(), 3);
    assert_eq!(
        session.oracle().await_remaining(ViewKind::Step2, 3).await.unwrap(),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn test_counter_without_emphasis() {
    let (_app, session) = common::session_with(SimOptions {
        counter_emphasis: false,
        ..SimOptions::default()
    });
    session.main().add("a").await.unwrap();
    session.main().add("b").await.unwrap();
    assert_eq!(session.oracle().await_counter(2).await.unwrap(), 2);
}
