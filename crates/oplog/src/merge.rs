//! The `merge` instruction: three-way text merge into a working file.
//!
//! The merge is whole-file and deterministic: when the working version
//! matches one side the other side wins outright; otherwise the working
//! file is rewritten with diff3-style conflict markers and the three
//! full versions are preserved as conflict files next to the target. The
//! conflict-marker outcome also records the three file references in the
//! target's entry, through the same masked-update path a `modify-entry`
//! instruction would take.
//!
//! Missing inputs mean the merge already ran (its scratch files are
//! consumed by later instructions in the same segment), so absence is
//! success under both execution modes.

use std::fs;
use std::io;
use std::path::Path;

use adm::fsutil;
use entries::{Entry, FieldMask};

use crate::error::{LogError, LogResult};
use crate::instruction::LogInstruction;
use crate::runner::{self, RunContext};

const DEFAULT_LEFT_LABEL: &str = ".old";
const DEFAULT_RIGHT_LABEL: &str = ".new";
const DEFAULT_TARGET_LABEL: &str = ".working";

pub(crate) fn run(
    ctx: &mut RunContext<'_>,
    name: &str,
    left: &str,
    right: &str,
    labels: (Option<&str>, Option<&str>, Option<&str>),
) -> LogResult<()> {
    let dir = ctx.access.dir().to_path_buf();
    let left_path = runner::resolve(&dir, left)?;
    let right_path = runner::resolve(&dir, right)?;
    let target_path = runner::resolve(&dir, name)?;

    let Some(left_contents) = read_optional(&left_path)? else {
        return Ok(());
    };
    let Some(right_contents) = read_optional(&right_path)? else {
        return Ok(());
    };
    if left_contents == right_contents {
        return Ok(());
    }

    let mine = read_optional(&target_path)?;
    match mine {
        // No working version, or an unmodified one: the right side
        // applies cleanly.
        None => install(&target_path, &right_contents),
        Some(mine) if mine == left_contents => install(&target_path, &right_contents),
        Some(mine) if mine == right_contents => Ok(()),
        Some(mine) => conflict(
            ctx,
            &dir,
            name,
            labels,
            &left_contents,
            &right_contents,
            &mine,
        ),
    }
}

fn read_optional(path: &Path) -> LogResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(LogError::io("read merge input", path.to_path_buf(), error)),
    }
}

fn install(target: &Path, contents: &[u8]) -> LogResult<()> {
    fsutil::write_atomic(target, contents)
        .map_err(|error| LogError::io("write merged file", target.to_path_buf(), error))
}

#[allow(clippy::too_many_arguments)]
fn conflict(
    ctx: &mut RunContext<'_>,
    dir: &Path,
    name: &str,
    labels: (Option<&str>, Option<&str>, Option<&str>),
    left_contents: &[u8],
    right_contents: &[u8],
    mine: &[u8],
) -> LogResult<()> {
    let (left_label, right_label, target_label) = labels;
    let old_name = format!("{name}{}", left_label.unwrap_or(DEFAULT_LEFT_LABEL));
    let new_name = format!("{name}{}", right_label.unwrap_or(DEFAULT_RIGHT_LABEL));
    let wrk_name = format!("{name}{}", target_label.unwrap_or(DEFAULT_TARGET_LABEL));

    for (conflict_name, contents) in [
        (&old_name, left_contents),
        (&new_name, right_contents),
        (&wrk_name, mine),
    ] {
        let path = runner::resolve(dir, conflict_name)?;
        fsutil::write_atomic(&path, contents)
            .map_err(|error| LogError::io("write conflict file", path, error))?;
    }

    let mut marked = Vec::with_capacity(mine.len() + right_contents.len() + 128);
    push_block(&mut marked, &format!("<<<<<<< {wrk_name}"), mine);
    push_block(&mut marked, &format!("||||||| {old_name}"), left_contents);
    push_block(&mut marked, "=======", right_contents);
    marked.extend_from_slice(format!(">>>>>>> {new_name}\n").as_bytes());
    let target_path = runner::resolve(dir, name)?;
    fsutil::write_atomic(&target_path, &marked)
        .map_err(|error| LogError::io("write conflicted file", target_path, error))?;

    // Record the conflict references through the ordinary masked-update
    // path, exactly as a nested modify-entry would.
    let mut values = Entry::named(name);
    values.conflict_old = Some(old_name);
    values.conflict_new = Some(new_name);
    values.conflict_wrk = Some(wrk_name);
    let update = LogInstruction::ModifyEntry {
        name: name.to_owned(),
        values: Box::new(values),
        mask: FieldMask::CONFLICT_OLD | FieldMask::CONFLICT_NEW | FieldMask::CONFLICT_WRK,
    };
    runner::execute(ctx, &update)?;
    tracing::debug!(name, "text merge left a conflict");
    Ok(())
}

fn push_block(out: &mut Vec<u8>, header: &str, contents: &[u8]) {
    out.extend_from_slice(header.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(contents);
    if !contents.is_empty() && !contents.ends_with(b"\n") {
        out.push(b'\n');
    }
}
