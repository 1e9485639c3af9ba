//! Output-directory artefacts the master owns directly (SPEC_FULL.md
//! §6/§10.5): the transport hostfile, `node_info.txt`, the `auxprog-*`
//! cleanup sweep, and `unfinished_tasks.txt`'s empty-file deletion.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use pbala_core::{Node, PbalaError};

/// Write the transport's host configuration file: one control line
/// (`* ep=<cwd> wd=<cwd>`) followed by one bare hostname per line, in
/// node-file order (SPEC_FULL.md §4.1 step 4, §10.5).
pub fn write_hostfile(path: &Path, cwd: &Path, nodes: &[Node]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "* ep={} wd={}", cwd.display(), cwd.display())?;
    for node in nodes {
        writeln!(file, "{}", node.hostname)?;
    }
    Ok(())
}

/// `node_info.txt`: a commented `slot -> host` map, then a `NODE,TASK`
/// CSV log of every dispatch (SPEC_FULL.md §6/§10.5).
pub struct SlaveFile {
    file: File,
}

impl SlaveFile {
    pub fn create(out_dir: &Path, slot_hosts: &[(usize, String)]) -> Result<Self, PbalaError> {
        let path = out_dir.join("node_info.txt");
        let mut file = File::create(&path).map_err(|_| PbalaError::OutDirCreate {
            path: out_dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "could not create node_info.txt"),
        })?;
        writeln!(file, "# NODE CODENAMES").ok();
        for (slot, hostname) in slot_hosts {
            writeln!(file, "# Node {slot:02} -> {hostname}").ok();
        }
        writeln!(file).ok();
        writeln!(file, "NODE,TASK").ok();
        Ok(SlaveFile { file })
    }

    pub fn log_dispatch(&mut self, slot: usize, task_id: i64) {
        let _ = writeln!(self.file, "{slot},{task_id}");
    }
}

/// Delete every regular file directly under `out_dir` whose name contains
/// `auxprog` (the Task Preparer's wrapper scripts), ignoring I/O errors
/// on any one entry (best-effort shutdown cleanup, SPEC_FULL.md §4.1).
pub fn sweep_auxprog_files(out_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(out_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path: PathBuf = entry.path();
        let is_auxprog = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains("auxprog"));
        if is_auxprog && path.is_file() {
            let _ = std::fs::remove_file(&path);
        }
    }
}

/// Delete `unfinished_tasks.txt` if no task ever landed a row in it
/// (SPEC_FULL.md §4.1 Shutdown).
pub fn remove_unfinished_file_if_empty(out_dir: &Path, any_unfinished: bool) {
    if !any_unfinished {
        let _ = std::fs::remove_file(out_dir.join("unfinished_tasks.txt"));
    }
}
