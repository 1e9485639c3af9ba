//! The transport's scratch state: a `.pbala-scratch/pids` file recording
//! every locally-spawned worker process id for the lifetime of a run.
//!
//! SPEC_FULL.md §9 treats the transport daemon as "process-wide, survives
//! crashes of the master" — with no external PVM-like daemon collaborator
//! in this rewrite (§10.6), that persistence has to come from somewhere
//! durable enough for `--kill` to find after an unclean master exit. This
//! file is it: written as slots are spawned, read and torn down by kill
//! mode (`kill.rs`), and removed on a clean shutdown.

use std::io::Write;
use std::path::{Path, PathBuf};

pub fn scratch_dir(cwd: &Path) -> PathBuf {
    cwd.join(".pbala-scratch")
}

fn pids_path(cwd: &Path) -> PathBuf {
    scratch_dir(cwd).join("pids")
}

/// Create the scratch directory and an empty `pids` file. Called once at
/// the start of fleet construction.
pub fn init(cwd: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(scratch_dir(cwd))?;
    std::fs::File::create(pids_path(cwd))?;
    Ok(())
}

/// Append one worker's process id, as each `ProcessTransport` slot spawns.
pub fn record_pid(cwd: &Path, pid: u32) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().append(true).open(pids_path(cwd))?;
    writeln!(file, "{pid}")
}

/// Read back every recorded process id, oldest first.
pub fn read_pids(cwd: &Path) -> Vec<u32> {
    let Ok(text) = std::fs::read_to_string(pids_path(cwd)) else {
        return Vec::new();
    };
    text.lines().filter_map(|l| l.trim().parse().ok()).collect()
}

/// Remove the scratch directory entirely (clean shutdown, or after kill
/// mode has signalled every pid it found).
pub fn clear(cwd: &Path) {
    let _ = std::fs::remove_dir_all(scratch_dir(cwd));
}
