// tests/mailbox.rs

mod common;
use crate::common::{fresh_mailbox, init_tracing, result_array};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use serde_json::json;
use tempfile::TempDir;

use harvest::errors::HarvestError;
use harvest::job_id::JobId;
use harvest::mailbox::{Mailbox, STATUS_FILE};
use harvest::status::{Status, StatusRecord};
use harvest::types::JobInfo;

#[test]
fn new_mailbox_is_seeded() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 4);

    assert_eq!(mailbox.get_status().unwrap(), StatusRecord::starting());
    assert_eq!(mailbox.read_token().unwrap(), "");
    assert_eq!(mailbox.read_results().unwrap(), "");
    assert_eq!(mailbox.read_info().unwrap().limit, 4);
    assert_eq!(mailbox.dir(), root.path().join(mailbox.id().as_str()).as_path());
}

#[test]
fn creating_an_existing_mailbox_is_an_allocation_error() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let id = JobId::generate();
    Mailbox::create(root.path(), &id, &JobInfo::new(1)).unwrap();

    match Mailbox::create(root.path(), &id, &JobInfo::new(1)) {
        Err(HarvestError::Allocation(msg)) => assert!(msg.contains("already exists")),
        other => panic!("Expected Allocation error, got: {:?}", other),
    }
}

#[test]
fn opening_an_unknown_job_is_not_found() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let id = JobId::generate();

    match Mailbox::open(root.path(), &id) {
        Err(HarvestError::NotFound(what)) => assert_eq!(what, id.to_string()),
        other => panic!("Expected NotFound, got: {:?}", other),
    }
}

#[test]
fn reads_after_cleanup_are_not_found() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 1);
    std::fs::remove_file(mailbox.dir().join(STATUS_FILE)).unwrap();

    assert!(matches!(
        mailbox.get_status(),
        Err(HarvestError::NotFound(_))
    ));
}

#[cfg(unix)]
#[test]
fn mailbox_directory_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 1);

    let mode = std::fs::metadata(mailbox.dir()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

#[test]
fn status_and_token_are_replaced_not_appended() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 1);

    mailbox.write_token("first").unwrap();
    mailbox.write_token("second").unwrap();
    mailbox.set_status(&StatusRecord::waiting_scan(1)).unwrap();
    mailbox.set_status(&StatusRecord::waiting_scan(2)).unwrap();

    assert_eq!(mailbox.read_token().unwrap(), "second");
    assert_eq!(mailbox.get_status().unwrap(), StatusRecord::waiting_scan(2));
}

#[test]
fn status_record_omits_absent_fields_on_disk() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 1);
    mailbox.set_status(&StatusRecord::done()).unwrap();

    let raw = std::fs::read_to_string(mailbox.dir().join(STATUS_FILE)).unwrap();
    assert_eq!(raw, r#"{"status":"DONE"}"#);
}

#[test]
fn appended_results_compact_into_one_array_in_order() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 2);

    mailbox
        .append_results(&[json!({"n": 1}), json!({"n": 2})])
        .unwrap();
    mailbox.append_results(&[]).unwrap();
    mailbox.append_results(&[json!({"n": 3})]).unwrap();

    let partial = mailbox.read_results().unwrap();
    assert_eq!(partial.lines().count(), 3);

    assert_eq!(mailbox.compact_results().unwrap(), 3);
    let records = result_array(&mailbox.read_results().unwrap());
    assert_eq!(records, vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
}

#[test]
fn compacting_no_results_gives_empty_array() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 0);

    assert_eq!(mailbox.compact_results().unwrap(), 0);
    assert_eq!(mailbox.read_results().unwrap(), "[]");
}

#[test]
fn concurrent_readers_never_see_a_torn_status() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let mailbox = fresh_mailbox(root.path(), 100);
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let reader = Mailbox::open(root.path(), mailbox.id()).unwrap();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut reads = 0usize;
                while !stop.load(Ordering::SeqCst) {
                    let record = reader.get_status().expect("torn or missing status");
                    assert!(matches!(record.status, Status::Starting | Status::Scraping));
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    for i in 0..200u32 {
        let msg = "x".repeat((i as usize * 37) % 500);
        mailbox
            .set_status(&StatusRecord::scraping(i / 2, msg))
            .unwrap();
    }
    stop.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(mailbox.get_status().unwrap().progress, Some(99));
}
