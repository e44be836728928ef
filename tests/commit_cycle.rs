//! End-to-end commit finalization through the public facade.

use std::fs;
use std::sync::Once;

use svn_wc::{
    AdmAccess, EntryTable, LogAccumulator, Schedule, cleanup, layout, rerun_log, run_log,
};
use test_support::Fixture;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[test]
fn a_file_commit_finalizes_in_one_pass() {
    init_tracing();
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"old contents\n", 4);

    // Local edit, about to be committed as r5.
    fs::write(fixture.root().join("iota"), b"edited contents\n").unwrap();

    let access = AdmAccess::open(fixture.root()).unwrap();
    let mut log = LogAccumulator::new();
    log.cp_and_detranslate("iota", ".svn/tmp/text-base/iota.svn-base", None);
    log.committed("iota", 5);
    log.modify_wcprop("iota", "svn:wc:ra_dav:version-url", Some("/r/5/iota"));
    log.save(&access).unwrap();
    run_log(&access).unwrap();
    access.close().unwrap();

    let table = fixture.entries();
    let entry = table.get("iota").unwrap();
    assert_eq!(entry.revision, Some(5));
    assert_eq!(entry.schedule, Schedule::Normal);
    assert_eq!(
        fs::read(layout::text_base_path(fixture.root(), "iota")).unwrap(),
        b"edited contents\n"
    );
    assert!(!fixture.adm_path(&[layout::ADM_LOG]).exists());
}

#[test]
fn an_interrupted_commit_is_finished_by_cleanup() {
    init_tracing();
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"edited\n", 4);
    fs::write(
        layout::tmp_text_base_path(fixture.root(), "iota"),
        b"edited\n",
    )
    .unwrap();

    // The segment was persisted, then the process died before running
    // it; the advisory lock is still on disk.
    {
        let access = AdmAccess::open(fixture.root()).unwrap();
        let mut log = LogAccumulator::new();
        log.committed("iota", 5);
        log.save(&access).unwrap();
        std::mem::forget(access);
    }

    cleanup(fixture.root(), None).unwrap();

    let table = fixture.entries();
    assert_eq!(table.get("iota").unwrap().revision, Some(5));
    assert!(!fixture.adm_path(&[layout::ADM_LOG]).exists());
    // The lock is free again.
    AdmAccess::open(fixture.root()).unwrap();
}

#[test]
fn committed_directory_deletion_is_atomic_across_a_rerun() {
    init_tracing();
    let fixture = Fixture::at_revision(4);
    let child = fixture.add_committed_dir("doomed", 4);
    {
        let mut table = EntryTable::read(&child).unwrap();
        table.this_dir_mut().unwrap().schedule = Schedule::Delete;
        table.write(&child).unwrap();
    }

    let access = AdmAccess::open(&child).unwrap();
    let mut log = LogAccumulator::new();
    log.committed("", 9);
    log.save(&access).unwrap();
    run_log(&access).unwrap();
    drop(access);

    assert!(!child.exists());
    let tombstone = fixture.entries().get("doomed").cloned().unwrap();
    assert!(tombstone.deleted);
    assert_eq!(tombstone.revision, Some(9));

    // Running recovery over the parent afterwards changes nothing.
    cleanup(fixture.root(), None).unwrap();
    assert_eq!(fixture.entries().get("doomed"), Some(&tombstone));
}

#[test]
fn reruns_settle_into_the_same_state() {
    init_tracing();
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"old\n", 4);
    fs::write(fixture.root().join("incoming"), b"new\n").unwrap();

    let access = AdmAccess::open(fixture.root()).unwrap();
    let mut log = LogAccumulator::new();
    log.mv("incoming", "iota");
    log.committed("iota", 5);
    let segment_text = log.serialize();
    log.save(&access).unwrap();
    run_log(&access).unwrap();
    let settled = fixture.entries();

    // Replay the already-consumed segment twice more.
    for _ in 0..2 {
        fs::write(fixture.adm_path(&[layout::ADM_LOG]), &segment_text).unwrap();
        rerun_log(&access).unwrap();
        assert_eq!(fixture.entries(), settled);
        assert_eq!(fs::read(fixture.root().join("iota")).unwrap(), b"new\n");
    }
}
