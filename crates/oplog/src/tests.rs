use std::fs;

use adm::{AdmAccess, layout};
use entries::props::{PROP_EOL_STYLE, PROP_KEYWORDS};
use entries::{Entry, EntryTable, FieldMask, NodeKind, Schedule, Timestamp};
use proptest::prelude::*;
use test_support::Fixture;

use crate::accum::LogAccumulator;
use crate::instruction::LogInstruction;
use crate::killme;
use crate::runner::{rerun_log, run_log};

fn run(fixture: &Fixture, log: &LogAccumulator) {
    let access = AdmAccess::open(fixture.root()).unwrap();
    log.save(&access).unwrap();
    run_log(&access).unwrap();
    access.close().unwrap();
}

#[test]
fn a_segment_runs_and_is_consumed() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"old\n", 4);
    fs::write(fixture.root().join("incoming"), b"new\n").unwrap();

    let mut log = LogAccumulator::new();
    log.mv("incoming", "iota");
    let mut values = Entry::named("iota");
    values.revision = Some(5);
    log.modify_entry("iota", values, FieldMask::REVISION);
    run(&fixture, &log);

    assert_eq!(fs::read(fixture.root().join("iota")).unwrap(), b"new\n");
    assert_eq!(fixture.entries().get("iota").unwrap().revision, Some(5));
    assert!(!fixture.adm_path(&[layout::ADM_LOG]).exists());
}

#[test]
fn segments_execute_in_ascending_order() {
    let fixture = Fixture::at_revision(1);
    fs::write(fixture.root().join("a"), b"first\n").unwrap();

    let access = AdmAccess::open(fixture.root()).unwrap();
    let mut first = LogAccumulator::new();
    first.mv("a", "b");
    assert_eq!(first.save(&access).unwrap(), 0);
    let mut second = LogAccumulator::new();
    second.mv("b", "c");
    assert_eq!(second.save(&access).unwrap(), 1);

    run_log(&access).unwrap();
    assert!(fixture.root().join("c").exists());
    assert!(!fixture.adm_path(&["log.1"]).exists());
}

#[test]
fn rerunning_a_consumed_segment_converges() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"old\n", 4);
    fs::write(fixture.root().join("incoming"), b"new\n").unwrap();

    let mut log = LogAccumulator::new();
    log.mv("incoming", "iota");
    log.rm("leftover");
    let mut values = Entry::named("iota");
    values.revision = Some(5);
    log.modify_entry("iota", values, FieldMask::REVISION);
    let segment_text = log.serialize();
    run(&fixture, &log);
    let after_first = fixture.entries();

    // A crash between executing and deleting the segment leaves the
    // file behind; the rerun must land in the same place.
    fs::write(fixture.adm_path(&[layout::ADM_LOG]), &segment_text).unwrap();
    let access = AdmAccess::open(fixture.root()).unwrap();
    rerun_log(&access).unwrap();

    assert_eq!(fixture.entries(), after_first);
    assert_eq!(fs::read(fixture.root().join("iota")).unwrap(), b"new\n");
    assert!(!fixture.adm_path(&[layout::ADM_LOG]).exists());
}

#[test]
fn missing_move_source_is_fatal_only_on_the_first_run() {
    let fixture = Fixture::at_revision(1);
    let mut log = LogAccumulator::new();
    log.mv("ghost", "iota");

    let access = AdmAccess::open(fixture.root()).unwrap();
    log.save(&access).unwrap();
    let error = run_log(&access).unwrap_err();
    assert!(error.is_bad_log_start());
    assert!(fixture.adm_path(&[layout::ADM_LOG]).exists());

    rerun_log(&access).unwrap();
    assert!(!fixture.adm_path(&[layout::ADM_LOG]).exists());
}

#[test]
fn failures_past_the_first_instruction_carry_their_position() {
    let fixture = Fixture::at_revision(1);
    fs::write(fixture.root().join("a"), b"x").unwrap();
    let mut log = LogAccumulator::new();
    log.mv("a", "b");
    log.mv("ghost", "c");

    let access = AdmAccess::open(fixture.root()).unwrap();
    log.save(&access).unwrap();
    let error = run_log(&access).unwrap_err();
    assert!(!error.is_bad_log_start());
    assert!(error.to_string().contains("instruction 1"));
}

#[test]
fn escaping_paths_in_segment_text_are_rejected() {
    let fixture = Fixture::at_revision(1);
    fs::write(
        fixture.adm_path(&[layout::ADM_LOG]),
        "<rm name=\"../outside\"/>\n",
    )
    .unwrap();
    let access = AdmAccess::open(fixture.root()).unwrap();
    let error = run_log(&access).unwrap_err();
    assert!(error.to_string().contains("not relative"));
}

#[test]
fn delete_lock_fields_clears_all_four() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"x", 4);
    {
        let mut table = fixture.entries();
        let entry = table.get_mut("iota").unwrap();
        entry.lock_token = Some("opaquelocktoken:1".to_owned());
        entry.lock_owner = Some("jrandom".to_owned());
        entry.lock_comment = Some("mine".to_owned());
        entry.lock_creation_date = Some("2008-01-01T12:00:00.000000Z".to_owned());
        table.write(fixture.root()).unwrap();
    }

    let mut log = LogAccumulator::new();
    log.delete_lock_fields("iota");
    run(&fixture, &log);

    let table = fixture.entries();
    let entry = table.get("iota").unwrap();
    assert!(entry.lock_token.is_none());
    assert!(entry.lock_owner.is_none());
    assert!(entry.lock_comment.is_none());
    assert!(entry.lock_creation_date.is_none());
}

#[test]
fn working_sentinel_resolves_against_the_file() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"contents\n", 4);

    let mut values = Entry::named("iota");
    values.text_time = Some(Timestamp::UseCurrentFileTime);
    let mut log = LogAccumulator::new();
    log.modify_entry("iota", values, FieldMask::TEXT_TIME);
    run(&fixture, &log);

    let table = fixture.entries();
    match table.get("iota").unwrap().text_time.as_ref().unwrap() {
        Timestamp::Literal(value) => {
            let mtime = adm::fsutil::file_mtime(&fixture.root().join("iota")).unwrap();
            assert_eq!(value, &entries::timeformat::to_iso8601(mtime));
        }
        Timestamp::UseCurrentFileTime => panic!("sentinel must not persist"),
    }
}

#[test]
fn wcprops_round_trip_through_the_log() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"x", 4);

    let mut log = LogAccumulator::new();
    log.modify_wcprop("iota", "svn:wc:ra_dav:version-url", Some("/r/4/iota"));
    run(&fixture, &log);

    let store = entries::props::WcPropStore::read(fixture.root()).unwrap();
    assert_eq!(
        store.get("iota").unwrap().get("svn:wc:ra_dav:version-url"),
        Some(&"/r/4/iota".to_owned())
    );

    let mut log = LogAccumulator::new();
    log.modify_wcprop("iota", "svn:wc:ra_dav:version-url", None);
    run(&fixture, &log);
    let store = entries::props::WcPropStore::read(fixture.root()).unwrap();
    assert!(store.get("iota").is_none());
}

#[test]
fn translate_copy_expands_keywords_and_eol() {
    let fixture = Fixture::at_revision(7);
    fixture.add_committed_file("iota", b"stale", 7);
    fixture.set_props("iota", &[(PROP_KEYWORDS, "Revision"), (PROP_EOL_STYLE, "CRLF")]);
    {
        let mut table = fixture.entries();
        table.get_mut("iota").unwrap().committed_rev = Some(7);
        table.write(fixture.root()).unwrap();
    }
    let staged = fixture.adm_path(&["tmp", "iota.in"]);
    fs::write(&staged, b"rev $Revision$\nnext\n").unwrap();

    let mut log = LogAccumulator::new();
    log.cp_and_translate(".svn/tmp/iota.in", "iota", None, false);
    run(&fixture, &log);

    assert_eq!(
        fs::read(fixture.root().join("iota")).unwrap(),
        b"rev $Revision: 7 $\r\nnext\r\n".to_vec()
    );
}

#[test]
fn detranslate_copy_contracts_back_to_repository_form() {
    let fixture = Fixture::at_revision(7);
    fixture.add_committed_file("iota", b"seed", 7);
    fixture.set_props("iota", &[(PROP_KEYWORDS, "Revision"), (PROP_EOL_STYLE, "native")]);
    fs::write(
        fixture.root().join("iota"),
        b"rev $Revision: 7 $\r\nnext\r\n",
    )
    .unwrap();

    let mut log = LogAccumulator::new();
    log.cp_and_detranslate("iota", ".svn/tmp/text-base/iota.svn-base", None);
    run(&fixture, &log);

    assert_eq!(
        fs::read(layout::tmp_text_base_path(fixture.root(), "iota")).unwrap(),
        b"rev $Revision$\nnext\n".to_vec()
    );
}

#[test]
fn committed_installs_the_staged_base_and_resets_the_record() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"new contents\n", 4);
    fixture.set_schedule("iota", Schedule::Add);
    fs::write(
        layout::tmp_text_base_path(fixture.root(), "iota"),
        b"new contents\n",
    )
    .unwrap();

    let mut log = LogAccumulator::new();
    log.committed("iota", 5);
    run(&fixture, &log);

    let table = fixture.entries();
    let entry = table.get("iota").unwrap();
    assert_eq!(entry.revision, Some(5));
    assert_eq!(entry.schedule, Schedule::Normal);
    assert!(entry.text_time.is_some());
    assert!(!layout::tmp_text_base_path(fixture.root(), "iota").exists());
    let base = layout::text_base_path(fixture.root(), "iota");
    assert_eq!(fs::read(&base).unwrap(), b"new contents\n");
    assert!(fs::metadata(&base).unwrap().permissions().readonly());
}

#[test]
fn committed_refreshes_expanded_keywords_in_the_working_file() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"rev $Revision: 4 $\n", 4);
    fixture.set_props("iota", &[(PROP_KEYWORDS, "Revision")]);
    fixture.set_schedule("iota", Schedule::Add);
    fs::write(
        layout::tmp_text_base_path(fixture.root(), "iota"),
        b"rev $Revision$\n",
    )
    .unwrap();

    let mut log = LogAccumulator::new();
    let mut values = Entry::named("iota");
    values.committed_rev = Some(5);
    log.modify_entry("iota", values, FieldMask::CMT_REV);
    log.committed("iota", 5);
    run(&fixture, &log);

    assert_eq!(
        fs::read(fixture.root().join("iota")).unwrap(),
        b"rev $Revision: 5 $\n".to_vec()
    );
    assert_eq!(
        fs::read(layout::text_base_path(fixture.root(), "iota")).unwrap(),
        b"rev $Revision$\n".to_vec()
    );
}

#[test]
fn committed_rerun_is_a_no_op() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"x\n", 4);
    fixture.set_schedule("iota", Schedule::Add);

    let mut log = LogAccumulator::new();
    log.committed("iota", 5);
    let segment_text = log.serialize();
    run(&fixture, &log);
    let after_first = fixture.entries();

    fs::write(fixture.adm_path(&[layout::ADM_LOG]), segment_text).unwrap();
    let access = AdmAccess::open(fixture.root()).unwrap();
    rerun_log(&access).unwrap();
    assert_eq!(fixture.entries(), after_first);
}

#[test]
fn committed_file_deletion_leaves_a_tombstone_past_the_parent() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"x\n", 4);
    fixture.set_schedule("iota", Schedule::Delete);

    let mut log = LogAccumulator::new();
    log.committed("iota", 9);
    run(&fixture, &log);

    assert!(!fixture.root().join("iota").exists());
    assert!(!layout::text_base_path(fixture.root(), "iota").exists());
    let table = fixture.entries();
    let tombstone = table.get("iota").expect("tombstone entry");
    assert!(tombstone.deleted);
    assert_eq!(tombstone.revision, Some(9));
}

#[test]
fn committed_file_deletion_at_the_parent_revision_just_forgets() {
    let fixture = Fixture::at_revision(9);
    fixture.add_committed_file("iota", b"x\n", 9);
    fixture.set_schedule("iota", Schedule::Delete);

    let mut log = LogAccumulator::new();
    log.committed("iota", 9);
    run(&fixture, &log);
    assert!(fixture.entries().get("iota").is_none());
}

#[test]
fn committed_directory_deletion_destroys_through_the_sentinel() {
    let fixture = Fixture::at_revision(4);
    let child = fixture.add_committed_dir("gone", 4);
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
    let table = fixture.entries();
    let tombstone = table.get("gone").expect("tombstone entry");
    assert!(tombstone.deleted);
    assert_eq!(tombstone.revision, Some(9));
    assert_eq!(tombstone.kind, NodeKind::Dir);
}

#[test]
fn a_surviving_sentinel_preempts_later_passes() {
    let fixture = Fixture::at_revision(4);
    let child = fixture.add_committed_dir("gone", 4);
    {
        let access = AdmAccess::open(&child).unwrap();
        let mut log = LogAccumulator::new();
        log.rm("never-runs");
        log.save(&access).unwrap();
        // Simulate a crash after the sentinel dropped but before
        // destruction finished.
        fs::write(layout::adm_path(&child, &[layout::ADM_KILLME]), b"").unwrap();
    }

    assert!(killme::killme_present(&child));
    crate::cleanup(&child, None).unwrap();
    assert!(!child.exists());
}

#[test]
fn committed_directory_bump_reaches_the_parent() {
    let fixture = Fixture::at_revision(4);
    let child = fixture.add_committed_dir("sub", 4);
    {
        let mut table = EntryTable::read(&child).unwrap();
        table.this_dir_mut().unwrap().schedule = Schedule::Add;
        table.write(&child).unwrap();
    }

    let access = AdmAccess::open(&child).unwrap();
    let mut log = LogAccumulator::new();
    log.committed("", 9);
    log.save(&access).unwrap();
    run_log(&access).unwrap();
    drop(access);

    let child_table = EntryTable::read(&child).unwrap();
    assert_eq!(child_table.this_dir().unwrap().revision, Some(9));
    let table = fixture.entries();
    let entry = table.get("sub").unwrap();
    assert_eq!(entry.revision, Some(9));
    // The parent is still at r4: its revision cannot contain sub@9 yet,
    // so the child entry carries the not-latest marker.
    assert!(entry.deleted);
    assert_eq!(entry.schedule, Schedule::Normal);
}

#[test]
fn committed_directory_bump_at_the_parent_revision_stays_latest() {
    let fixture = Fixture::at_revision(9);
    let child = fixture.add_committed_dir("sub", 9);
    {
        let mut table = EntryTable::read(&child).unwrap();
        table.this_dir_mut().unwrap().schedule = Schedule::Add;
        table.write(&child).unwrap();
    }

    let access = AdmAccess::open(&child).unwrap();
    let mut log = LogAccumulator::new();
    log.committed("", 9);
    log.save(&access).unwrap();
    run_log(&access).unwrap();
    drop(access);

    let table = fixture.entries();
    let entry = table.get("sub").unwrap();
    assert_eq!(entry.revision, Some(9));
    assert!(!entry.deleted);
}

#[test]
fn merge_applies_cleanly_over_an_unmodified_file() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"base\n", 4);
    fs::write(fixture.adm_path(&["tmp", "iota.old"]), b"base\n").unwrap();
    fs::write(fixture.adm_path(&["tmp", "iota.new"]), b"improved\n").unwrap();

    let mut log = LogAccumulator::new();
    log.merge(
        "iota",
        ".svn/tmp/iota.old",
        ".svn/tmp/iota.new",
        (None, None, None),
    );
    run(&fixture, &log);

    assert_eq!(fs::read(fixture.root().join("iota")).unwrap(), b"improved\n");
    assert!(fixture.entries().get("iota").unwrap().conflict_old.is_none());
}

#[test]
fn conflicting_merge_marks_the_file_and_the_entry() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"mine\n", 4);
    fs::write(fixture.adm_path(&["tmp", "iota.old"]), b"base\n").unwrap();
    fs::write(fixture.adm_path(&["tmp", "iota.new"]), b"theirs\n").unwrap();

    let mut log = LogAccumulator::new();
    log.merge(
        "iota",
        ".svn/tmp/iota.old",
        ".svn/tmp/iota.new",
        (Some(".r4"), Some(".r9"), Some(".mine")),
    );
    run(&fixture, &log);

    let merged = fs::read_to_string(fixture.root().join("iota")).unwrap();
    assert!(merged.contains("<<<<<<< iota.mine"));
    assert!(merged.contains("mine\n"));
    assert!(merged.contains("theirs\n"));
    assert!(merged.contains(">>>>>>> iota.r9"));

    assert_eq!(
        fs::read(fixture.root().join("iota.r4")).unwrap(),
        b"base\n"
    );
    assert_eq!(
        fs::read(fixture.root().join("iota.mine")).unwrap(),
        b"mine\n"
    );

    let table = fixture.entries();
    let entry = table.get("iota").unwrap();
    assert_eq!(entry.conflict_old.as_deref(), Some("iota.r4"));
    assert_eq!(entry.conflict_new.as_deref(), Some("iota.r9"));
    assert_eq!(entry.conflict_wrk.as_deref(), Some("iota.mine"));
}

#[test]
fn merge_with_missing_inputs_is_already_applied() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"mine\n", 4);

    let mut log = LogAccumulator::new();
    log.merge(
        "iota",
        ".svn/tmp/iota.old",
        ".svn/tmp/iota.new",
        (None, None, None),
    );
    run(&fixture, &log);
    assert_eq!(fs::read(fixture.root().join("iota")).unwrap(), b"mine\n");
}

#[test]
fn upgrade_format_rewrites_the_marker() {
    let fixture = Fixture::at_revision(1);
    let mut log = LogAccumulator::new();
    log.upgrade_format(layout::ADM_FORMAT_VERSION + 1);
    run(&fixture, &log);
    assert_eq!(
        layout::read_format(fixture.root()).unwrap(),
        layout::ADM_FORMAT_VERSION + 1
    );
}

#[test]
fn set_timestamp_stamps_a_literal_instant() {
    let fixture = Fixture::at_revision(1);
    fixture.add_committed_file("iota", b"x\n", 1);

    let mut log = LogAccumulator::new();
    log.set_timestamp(
        "iota",
        Timestamp::Literal("2008-01-01T12:00:00.000000Z".to_owned()),
    );
    run(&fixture, &log);

    let mtime = adm::fsutil::file_mtime(&fixture.root().join("iota")).unwrap();
    assert_eq!(entries::timeformat::to_iso8601(mtime), "2008-01-01T12:00:00.000000Z");
}

#[test]
fn delete_entry_scrubs_files_and_bookkeeping() {
    let fixture = Fixture::at_revision(4);
    fixture.add_committed_file("iota", b"x\n", 4);
    fixture.set_props("iota", &[(PROP_KEYWORDS, "Revision")]);

    let mut log = LogAccumulator::new();
    log.modify_wcprop("iota", "cache", Some("token"));
    log.delete_entry("iota");
    run(&fixture, &log);

    assert!(!fixture.root().join("iota").exists());
    assert!(!layout::text_base_path(fixture.root(), "iota").exists());
    assert!(!layout::working_props_path(fixture.root(), "iota").exists());
    assert!(fixture.entries().get("iota").is_none());
    let store = entries::props::WcPropStore::read(fixture.root()).unwrap();
    assert!(store.get("iota").is_none());
}

proptest! {
    #[test]
    fn move_instructions_round_trip_arbitrary_names(
        src in "[a-zA-Z0-9 ._&<>\"'-]{1,40}",
        dst in "[a-zA-Z0-9 ._&<>\"'-]{1,40}",
    ) {
        let instruction = LogInstruction::Move { src, dst };
        let mut text = String::new();
        instruction.to_element().write_to(&mut text);
        let elements = adm::codec::parse_all(&text).unwrap();
        prop_assert_eq!(elements.len(), 1);
        let decoded = LogInstruction::from_element(&elements[0]).unwrap();
        prop_assert_eq!(decoded, instruction);
    }
}
