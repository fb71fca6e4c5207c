// tests/worker_extraction.rs

mod common;
use crate::common::{fresh_mailbox, init_tracing, result_array};

use std::future::ready;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use harvest::errors::{HarvestError, Result};
use harvest::status::{Status, StatusRecord};
use harvest::worker::Worker;
use harvest_test_utils::recording::{RecordingMailbox, Write};
use harvest_test_utils::scripted::ScriptedAutomation;

async fn run(mailbox: &RecordingMailbox, limit: usize, script: ScriptedAutomation) -> Result<()> {
    Worker::new(mailbox.clone(), limit)
        .with_poll_interval(Duration::ZERO)
        .run(ready(Ok(script)))
        .await
}

#[tokio::test]
async fn zero_limit_pulls_nothing_and_completes_with_empty_array() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let inner = fresh_mailbox(root.path(), 0);
    let mailbox = RecordingMailbox::new(inner.clone());

    let script = ScriptedAutomation::new().unit("a", 3).endless();
    let log = script.log();
    run(&mailbox, 0, script).await.unwrap();

    assert_eq!(log.units_pulled(), 0);
    assert!(log.extracted().is_empty());
    assert_eq!(inner.read_results().unwrap(), "[]");
    assert_eq!(inner.get_status().unwrap(), StatusRecord::done());
}

#[tokio::test]
async fn records_of_all_units_end_up_in_one_array() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let inner = fresh_mailbox(root.path(), 3);
    let mailbox = RecordingMailbox::new(inner.clone());

    let script = ScriptedAutomation::new()
        .unit("a", 2)
        .unit("b", 0)
        .unit("c", 5);
    run(&mailbox, 3, script).await.unwrap();

    let records = result_array(&inner.read_results().unwrap());
    assert_eq!(records.len(), 7);
    assert_eq!(records[0], json!({"unit": "a", "seq": 0}));
    assert_eq!(records[6], json!({"unit": "c", "seq": 4}));

    assert_eq!(
        mailbox.statuses(),
        vec![
            StatusRecord::starting(),
            StatusRecord::scraping(0, "Starting extraction"),
            StatusRecord::scraping(25, "Extracted unit 1/3: Unit a [2 records found]"),
            StatusRecord::scraping(50, "Extracted unit 2/3: Unit b [2 records found]"),
            StatusRecord::scraping(75, "Extracted unit 3/3: Unit c [7 records found]"),
            StatusRecord::done(),
        ]
    );
}

#[tokio::test]
async fn records_are_appended_before_progress_and_compacted_before_done() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = RecordingMailbox::new(fresh_mailbox(root.path(), 1));

    run(&mailbox, 1, ScriptedAutomation::new().unit("a", 4)).await.unwrap();

    assert_eq!(
        mailbox.writes(),
        vec![
            Write::Status(StatusRecord::starting()),
            Write::Status(StatusRecord::scraping(0, "Starting extraction")),
            Write::Append(4),
            Write::Status(StatusRecord::scraping(
                50,
                "Extracted unit 1/1: Unit a [4 records found]"
            )),
            Write::Compact(4),
            Write::Status(StatusRecord::done()),
        ]
    );
}

#[tokio::test]
async fn unit_failure_keeps_earlier_records_uncompacted() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let inner = fresh_mailbox(root.path(), 3);
    let mailbox = RecordingMailbox::new(inner.clone());

    let script = ScriptedAutomation::new()
        .unit("a", 2)
        .failing_unit("b", "page crashed")
        .unit("c", 5);
    let log = script.log();

    let err = run(&mailbox, 3, script).await.unwrap_err();
    assert!(matches!(err, HarvestError::Automation(_)));
    assert_eq!(log.extracted(), vec!["a".to_string(), "b".to_string()]);

    let last = inner.get_status().unwrap();
    assert_eq!(last.status, Status::Error);
    let message = last.message.clone().unwrap();
    assert!(message.starts_with("AutomationFailure: "));
    assert!(message.contains("page crashed"));

    // ERROR is the final write and nothing was compacted.
    let writes = mailbox.writes();
    assert_eq!(writes.last(), Some(&Write::Status(last)));
    assert!(!writes.iter().any(|w| matches!(w, Write::Compact(_))));

    let raw = inner.read_results().unwrap();
    let lines: Vec<serde_json::Value> = raw
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![json!({"unit": "a", "seq": 0}), json!({"unit": "a", "seq": 1})]
    );
}

#[tokio::test]
async fn limit_bounds_an_endless_unit_sequence() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let inner = fresh_mailbox(root.path(), 2);
    let mailbox = RecordingMailbox::new(inner.clone());

    let script = ScriptedAutomation::new().endless();
    let log = script.log();
    run(&mailbox, 2, script).await.unwrap();

    assert_eq!(log.units_pulled(), 2);
    assert_eq!(log.extracted(), vec!["extra-1".to_string(), "extra-2".to_string()]);
    assert_eq!(result_array(&inner.read_results().unwrap()).len(), 2);

    // Unlabelled units are reported by id.
    let statuses = mailbox.statuses();
    assert_eq!(
        statuses[statuses.len() - 2],
        StatusRecord::scraping(67, "Extracted unit 2/2: extra-2 [2 records found]")
    );
}

#[tokio::test]
async fn short_unit_sequence_ends_early() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let inner = fresh_mailbox(root.path(), 10);
    let mailbox = RecordingMailbox::new(inner.clone());

    run(&mailbox, 10, ScriptedAutomation::new().unit("only", 1)).await.unwrap();

    assert_eq!(result_array(&inner.read_results().unwrap()).len(), 1);
    assert_eq!(inner.get_status().unwrap(), StatusRecord::done());
}

#[tokio::test]
async fn failing_status_write_is_returned_without_panicking() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let inner = fresh_mailbox(root.path(), 1);
    let mailbox = RecordingMailbox::new(inner.clone()).fail_status_writes_after(1);

    let err = run(&mailbox, 1, ScriptedAutomation::new().unit("a", 1)).await.unwrap_err();
    assert!(matches!(err, HarvestError::Io(_)));

    // Neither SCRAPING nor the ERROR that followed could be written.
    assert_eq!(mailbox.statuses(), vec![StatusRecord::starting()]);
    assert_eq!(inner.get_status().unwrap(), StatusRecord::starting());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn result_holds_exactly_the_records_of_the_first_limit_units(
        counts in proptest::collection::vec(0usize..6, 0..8),
        limit in 0usize..10,
    ) {
        let root = TempDir::new().unwrap();
        let inner = fresh_mailbox(root.path(), limit);
        let mailbox = RecordingMailbox::new(inner.clone());

        let mut script = ScriptedAutomation::new();
        for (i, n) in counts.iter().enumerate() {
            script = script.unit(&format!("u{i}"), *n);
        }
        let log = script.log();
        tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(run(&mailbox, limit, script))
            .unwrap();

        let expected: usize = counts.iter().take(limit).sum();
        prop_assert_eq!(result_array(&inner.read_results().unwrap()).len(), expected);
        prop_assert_eq!(log.extracted().len(), counts.len().min(limit));
        prop_assert_eq!(inner.get_status().unwrap(), StatusRecord::done());
    }
}
