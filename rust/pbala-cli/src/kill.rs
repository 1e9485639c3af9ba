//! `--kill` mode (SPEC_FULL.md §6): halt any running transport daemon,
//! remove its scratch directory, exit. Destructive, no confirmation.

use std::path::Path;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::scratch;

/// Signal every worker pid recorded by a previous (possibly crashed)
/// master run, then remove the scratch directory. Best-effort: a pid
/// that's already gone is not an error, since kill mode exists precisely
/// to clean up after an unclean prior exit.
pub fn run(cwd: &Path) {
    let pids = scratch::read_pids(cwd);
    for pid in &pids {
        let _ = signal::kill(Pid::from_raw(*pid as i32), Signal::SIGTERM);
    }
    println!("INFO - sent SIGTERM to {} worker process(es)", pids.len());
    scratch::clear(cwd);
    println!("INFO - removed transport scratch state");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_clears_scratch_state_even_with_no_recorded_pids() {
        let cwd = std::env::temp_dir().join(format!("pbala-kill-test-{}", std::process::id()));
        std::fs::create_dir_all(&cwd).unwrap();
        scratch::init(&cwd).unwrap();
        run(&cwd);
        assert!(!scratch::scratch_dir(&cwd).exists());
        std::fs::remove_dir_all(&cwd).ok();
    }
}
