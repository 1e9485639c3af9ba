//! Maple single-core source rewrite and its `.bak` restore (SPEC_FULL.md
//! §4.1 step 2, §10.5). The rewrite routine itself wasn't part of the
//! retrieved original source (`PBala.c` only calls it), so the body here
//! is this rewrite's own: back the original file up to `<path>.bak`, then
//! prepend a `kernelopts(numcpus=1):` directive so Maple's scheduler
//! never spawns worker threads of its own within one task.

use std::path::{Path, PathBuf};

use pbala_core::PbalaError;

const SINGLE_CORE_DIRECTIVE: &str = "kernelopts(numcpus=1):\n";

fn backup_path(program_file: &Path) -> PathBuf {
    let mut name = program_file.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Move `program_file` to its `.bak` sibling, then write a rewritten copy
/// back to the original path. Idempotent to call at most once per run;
/// calling it on an already-rewritten file would double the directive,
/// so the scheduler only does this when `--maple-single-core` is set.
pub fn apply_single_core(program_file: &Path) -> Result<(), PbalaError> {
    let original = std::fs::read_to_string(program_file).map_err(|source| PbalaError::MapleRewrite {
        path: program_file.to_path_buf(),
        source,
    })?;
    std::fs::write(backup_path(program_file), &original).map_err(|source| PbalaError::MapleRewrite {
        path: program_file.to_path_buf(),
        source,
    })?;
    let rewritten = format!("{SINGLE_CORE_DIRECTIVE}{original}");
    std::fs::write(program_file, rewritten).map_err(|source| PbalaError::MapleRewrite {
        path: program_file.to_path_buf(),
        source,
    })
}

/// Restore `program_file` from its `.bak` sibling at shutdown. Best
/// effort: a missing backup (the rewrite step never ran, or was already
/// restored) is not an error here, since this only runs when
/// `apply_single_core` already succeeded earlier in the same process.
pub fn restore_original(program_file: &Path) {
    let backup = backup_path(program_file);
    if backup.is_file() {
        let _ = std::fs::rename(&backup, program_file);
    }
}
