use std::fs;
use std::io::Write;
use std::path::Path;

use entries::props::{
    PROP_EOL_STYLE, PROP_EXECUTABLE, PROP_KEYWORDS, PROP_NEEDS_LOCK, PROP_SPECIAL,
};
use entries::PropertyList;
use filetime::FileTime;

use crate::{InstallParams, WorkingFileWriter};

fn props(pairs: &[(&str, &str)]) -> PropertyList {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
        .collect()
}

fn tmp_is_clean(dir: &Path) {
    let leftovers: Vec<_> = fs::read_dir(dir).unwrap().filter_map(Result::ok).collect();
    assert!(leftovers.is_empty(), "staging leftovers: {leftovers:?}");
}

#[test]
fn plain_install_renames_atomically() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();
    let target = temp.path().join("iota");

    let list = PropertyList::new();
    let params = InstallParams::new(&list);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "iota", &params).unwrap();
    writer.stream().unwrap().write_all(b"contents\n").unwrap();
    let (_mtime, size) = writer.finalize().unwrap();
    assert_eq!(size, 9);
    writer.install(&target).unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"contents\n");
    tmp_is_clean(&tmp_dir);
}

#[test]
fn keyword_and_eol_translation_applies() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();
    let target = temp.path().join("iota");

    let list = props(&[(PROP_KEYWORDS, "Revision"), (PROP_EOL_STYLE, "LF")]);
    let mut params = InstallParams::new(&list);
    params.changed_rev = Some(42);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "iota", &params).unwrap();
    writer
        .stream()
        .unwrap()
        .write_all(b"rev $Revision$\r\nnext\r\n")
        .unwrap();
    writer.install(&target).unwrap();

    assert_eq!(
        fs::read(&target).unwrap(),
        b"rev $Revision: 42 $\nnext\n".to_vec()
    );
    assert!(!fs::metadata(&target).unwrap().permissions().readonly());
}

#[test]
fn needs_lock_without_lock_installs_read_only() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();
    let target = temp.path().join("locked");

    let list = props(&[(PROP_NEEDS_LOCK, "*")]);
    let params = InstallParams::new(&list);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "locked", &params).unwrap();
    writer.stream().unwrap().write_all(b"data").unwrap();
    writer.install(&target).unwrap();
    assert!(fs::metadata(&target).unwrap().permissions().readonly());

    // With the lock held the file stays writable.
    let writable = temp.path().join("unlocked");
    let mut params = InstallParams::new(&list);
    params.has_lock = true;
    let mut writer = WorkingFileWriter::open(&tmp_dir, "unlocked", &params).unwrap();
    writer.stream().unwrap().write_all(b"data").unwrap();
    writer.install(&writable).unwrap();
    assert!(!fs::metadata(&writable).unwrap().permissions().readonly());
}

#[cfg(unix)]
#[test]
fn executable_property_sets_the_bit() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();
    let target = temp.path().join("script");

    let list = props(&[(PROP_EXECUTABLE, "*")]);
    let params = InstallParams::new(&list);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "script", &params).unwrap();
    writer.stream().unwrap().write_all(b"#!/bin/sh\n").unwrap();
    writer.install(&target).unwrap();
    assert!(adm::fsutil::is_executable(&target));
}

#[test]
fn explicit_mtime_is_stamped() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();
    let target = temp.path().join("dated");

    let list = PropertyList::new();
    let mut params = InstallParams::new(&list);
    let wanted = FileTime::from_unix_time(1_199_188_800, 0);
    params.final_mtime = Some(wanted);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "dated", &params).unwrap();
    writer.stream().unwrap().write_all(b"x").unwrap();
    let (mtime, _) = writer.finalize().unwrap();
    assert_eq!(mtime, wanted);
    writer.install(&target).unwrap();
    assert_eq!(adm::fsutil::file_mtime(&target).unwrap(), wanted);
}

#[test]
fn close_without_install_rolls_back() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();

    let list = PropertyList::new();
    let params = InstallParams::new(&list);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "doomed", &params).unwrap();
    writer.stream().unwrap().write_all(b"junk").unwrap();
    writer.close().unwrap();
    writer.close().unwrap();
    drop(writer);
    tmp_is_clean(&tmp_dir);
}

#[test]
fn drop_without_install_rolls_back() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();

    let list = PropertyList::new();
    let params = InstallParams::new(&list);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "doomed", &params).unwrap();
    writer.stream().unwrap().write_all(b"junk").unwrap();
    drop(writer);
    tmp_is_clean(&tmp_dir);
}

#[test]
fn missing_parent_surfaces_as_error() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();

    let list = PropertyList::new();
    let params = InstallParams::new(&list);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "orphan", &params).unwrap();
    writer.stream().unwrap().write_all(b"x").unwrap();
    let missing = temp.path().join("no-such-dir").join("orphan");
    assert!(writer.install(&missing).is_err());
}

#[cfg(unix)]
#[test]
fn special_files_reappear_as_symlinks() {
    let temp = tempfile::tempdir().unwrap();
    let tmp_dir = temp.path().join("tmp");
    fs::create_dir(&tmp_dir).unwrap();
    let target = temp.path().join("the-link");

    let list = props(&[(PROP_SPECIAL, "*")]);
    let params = InstallParams::new(&list);
    let mut writer = WorkingFileWriter::open(&tmp_dir, "the-link", &params).unwrap();
    writer.stream().unwrap().write_all(b"link elsewhere").unwrap();
    writer.install(&target).unwrap();

    assert!(translate::special::is_special(&target));
    assert_eq!(fs::read_link(&target).unwrap(), Path::new("elsewhere"));
    tmp_is_clean(&tmp_dir);
}
