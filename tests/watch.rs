// tests/watch.rs

mod common;
use crate::common::{fresh_mailbox, init_tracing};

use std::time::Duration;

use tempfile::TempDir;

use harvest::status::StatusRecord;
use harvest::watch_job;
use harvest_test_utils::with_timeout;

#[tokio::test]
async fn watch_prints_each_distinct_status_until_done() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 1);
    let id = mailbox.id().clone();

    let writer = tokio::spawn(async move {
        for record in [
            StatusRecord::starting(),
            StatusRecord::scraping(0, "Starting extraction"),
            StatusRecord::scraping(50, "Extracted unit 1/1: a [1 records found]"),
            StatusRecord::done(),
        ] {
            mailbox.set_status(&record).unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
    });

    let mut out = Vec::new();
    with_timeout(watch_job(root.path(), &id, Duration::from_millis(5), &mut out))
        .await
        .unwrap();
    writer.await.unwrap();

    let lines: Vec<StatusRecord> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(lines.first(), Some(&StatusRecord::starting()));
    assert_eq!(lines.last(), Some(&StatusRecord::done()));
    // Unchanged records are printed once.
    for pair in lines.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[tokio::test]
async fn watch_fails_when_the_job_fails() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 1);
    mailbox
        .set_status(&StatusRecord::error("TimeoutCondition: login token did not render"))
        .unwrap();

    let mut out = Vec::new();
    let err = with_timeout(watch_job(
        root.path(),
        mailbox.id(),
        Duration::from_millis(5),
        &mut out,
    ))
    .await
    .unwrap_err();

    assert!(err.to_string().contains("TimeoutCondition"));
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
}

#[tokio::test]
async fn watching_an_unknown_job_fails() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let id = harvest::job_id::JobId::generate();

    let mut out = Vec::new();
    let err = with_timeout(watch_job(root.path(), &id, Duration::from_millis(5), &mut out))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}
