//! Async render path: worker offload, concurrency, completion delivery.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinSet;

use sassling::{RenderConfig, Renderer};

use common::{CountingEngine, mini_renderer};

#[tokio::test]
async fn test_async_render_basic() {
    let renderer = mini_renderer();
    let result = renderer
        .render("a { color: red; }", &RenderConfig::default())
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(result.css).unwrap(),
        "a {\n  color: red;\n}\n"
    );
}

#[tokio::test]
async fn test_async_matches_sync_byte_for_byte() {
    let renderer = mini_renderer();
    let source = "$w: 3px;\na { width: $w; color: blue; }\nb { margin: 0; }";
    let config = RenderConfig::default();

    let sync = renderer.render_sync(source, &config).unwrap();
    let r = renderer.clone();
    let async_result = r.render(source, &config).await.unwrap();

    assert_eq!(sync.css, async_result.css);
    assert_eq!(sync.map, async_result.map);
    assert_eq!(
        sync.stats.included_files,
        async_result.stats.included_files
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_jobs_do_not_interfere() {
    let renderer = mini_renderer();
    let mut set = JoinSet::new();
    for i in 0..50usize {
        let renderer = renderer.clone();
        set.spawn(async move {
            let source = format!("a {{ width: {}px; }}", i);
            let result = renderer
                .render(source, &RenderConfig::default())
                .await
                .unwrap();
            (i, String::from_utf8(result.css).unwrap())
        });
    }
    let mut completed = 0;
    while let Some(joined) = set.join_next().await {
        let (i, css) = joined.unwrap();
        assert_eq!(
            css,
            format!("a {{\n  width: {}px;\n}}\n", i),
            "job {} must see only its own output",
            i
        );
        completed += 1;
    }
    assert_eq!(completed, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_outcomes_stay_isolated() {
    let renderer = mini_renderer();
    let mut set = JoinSet::new();
    for i in 0..20usize {
        let renderer = renderer.clone();
        set.spawn(async move {
            let source = if i % 2 == 0 {
                format!("a {{ width: {}px; }}", i)
            } else {
                // Unterminated block, fails deterministically.
                format!("a {{ width: {}px;", i)
            };
            (i, renderer.render(source, &RenderConfig::default()).await)
        });
    }
    while let Some(joined) = set.join_next().await {
        let (i, outcome) = joined.unwrap();
        if i % 2 == 0 {
            let css = String::from_utf8(outcome.unwrap().css).unwrap();
            assert!(css.contains(&format!("width: {}px;", i)));
        } else {
            let err = outcome.unwrap_err();
            assert!(err.compile_failure().is_some(), "job {} should fail", i);
        }
    }
}

#[tokio::test]
async fn test_release_happens_after_completion() {
    let engine = Arc::new(CountingEngine::new());
    let renderer = Renderer::new(engine.clone());
    renderer
        .render("a { color: red; }", &RenderConfig::default())
        .await
        .unwrap();
    assert_eq!(engine.created(), 1);
    assert_eq!(engine.destroyed(), 1);
    assert_eq!(engine.live(), 0, "context released once the future resolves");
}

#[tokio::test]
async fn test_callback_delivery_exactly_once_on_success() {
    let renderer = mini_renderer();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = tokio::sync::oneshot::channel();

    let calls_inner = calls.clone();
    renderer.render_with_callback(
        "a { color: red; }",
        RenderConfig::default(),
        move |outcome| {
            calls_inner.fetch_add(1, Ordering::SeqCst);
            tx.send(outcome).ok();
        },
    );

    let outcome = rx.await.expect("completion must be delivered");
    let css = String::from_utf8(outcome.unwrap().css).unwrap();
    assert_eq!(css, "a {\n  color: red;\n}\n");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_callback_delivery_exactly_once_on_failure() {
    let renderer = mini_renderer();
    let (tx, rx) = tokio::sync::oneshot::channel();

    renderer.render_with_callback(
        "a { width: 1px;",
        RenderConfig::default(),
        move |outcome| {
            tx.send(outcome).ok();
        },
    );

    let outcome = rx.await.expect("completion must be delivered");
    let err = outcome.unwrap_err();
    let failure = err.compile_failure().expect("compile error");
    assert_ne!(failure.status, 0);
    assert!(!failure.message.is_empty());
    assert!(failure.line.is_some());
    let json: serde_json::Value = serde_json::from_str(&failure.json).unwrap();
    assert_eq!(json["status"], 1);
    assert!(!json["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_file_callback_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("entry.scss");
    std::fs::write(&entry, "a { color: green; }").unwrap();

    let renderer = mini_renderer();
    let (tx, rx) = tokio::sync::oneshot::channel();
    renderer.render_file_with_callback(&entry, RenderConfig::default(), move |outcome| {
        tx.send(outcome).ok();
    });

    let result = rx.await.unwrap().unwrap();
    assert!(String::from_utf8(result.css).unwrap().contains("color: green;"));
}

#[tokio::test]
async fn test_async_render_file() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("entry.scss");
    std::fs::write(&entry, "a { color: navy; }").unwrap();

    let renderer = mini_renderer();
    let result = renderer
        .render_file(&entry, &RenderConfig::default())
        .await
        .unwrap();
    assert!(String::from_utf8(result.css).unwrap().contains("color: navy;"));
    assert_eq!(result.stats.included_files.len(), 1);
}
