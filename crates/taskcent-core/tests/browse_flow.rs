mod support;

use std::io::Cursor;

use chrono::NaiveDate;
use taskcent_core::commands::browse;
use taskcent_core::error::ApiError;
use taskcent_core::render::Renderer;
use taskcent_core::store::{SortOrder, TaskStore};

use support::{FakeApi, id, raw};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
}

async fn three_tasks() -> (std::sync::Arc<FakeApi>, TaskStore) {
    let api = FakeApi::with_tasks(vec![raw("1", "First"), raw("2", "Second"), raw("3", "Third")]);
    let store = TaskStore::new(api.clone(), SortOrder::Server);
    store.load_tasks().await.expect("load");
    (api, store)
}

async fn run(store: &TaskStore, start: Option<&str>, input: &str) -> String {
    let mut out = Vec::new();
    browse(
        store,
        &Renderer::plain(),
        start.map(id),
        Cursor::new(input.to_string()),
        &mut out,
        today(),
    )
    .await
    .expect("browse");
    String::from_utf8(out).expect("utf8")
}

#[tokio::test]
async fn navigation_stops_at_the_ends() {
    let (_api, store) = three_tasks().await;
    let out = run(&store, None, "k\nj\nj\nj\nk\nq\n").await;

    let headers: Vec<&str> = out.lines().filter(|line| line.contains("  [")).collect();
    assert_eq!(
        headers,
        vec!["First  [1/3]", "Second  [2/3]", "Third  [3/3]", "Second  [2/3]"]
    );
}

#[tokio::test]
async fn delete_is_confirmed_before_it_happens() {
    let (api, store) = three_tasks().await;
    let out = run(&store, Some("2"), "d\nn\nd\ny\nq\n").await;

    assert!(out.starts_with("Second  [2/3]"));
    assert_eq!(out.matches("Delete this task? [y/n]").count(), 2);
    assert!(out.contains("Cancelled."));
    assert!(out.contains("Task deleted."));
    assert!(out.contains("Third  [2/2]"));
    assert_eq!(api.calls("delete"), 1);
    assert!(store.get(&id("2")).is_none());
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn escape_while_confirming_only_cancels() {
    let (api, store) = three_tasks().await;
    let out = run(&store, Some("1"), "d\nq\nj\nq\n").await;

    assert!(out.contains("Cancelled."));
    assert!(out.contains("Second  [2/3]"));
    assert_eq!(api.calls("delete"), 0);
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn failed_delete_keeps_the_task_on_screen() {
    let (api, store) = three_tasks().await;
    api.fail_next(ApiError::permission("not allowed"));
    let out = run(&store, Some("3"), "d\ny\nk\nq\n").await;

    assert!(out.contains("Delete failed: not allowed"));
    assert!(out.contains("Second  [2/3]"));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn unknown_start_is_an_error() {
    let (_api, store) = three_tasks().await;
    let mut out = Vec::new();
    let result = browse(
        &store,
        &Renderer::plain(),
        Some(id("missing")),
        Cursor::new(String::new()),
        &mut out,
        today(),
    )
    .await;
    assert!(result.is_err());
}
