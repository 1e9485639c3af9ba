//! The four message kinds of the wire protocol (SPEC_FULL.md §6) and their
//! length-prefixed `bincode` framing for the pipe-based transport.

use std::io::{self, Read, Write};

use pbala_core::{Status, TaskClass, TaskResult};
use serde::{Deserialize, Serialize};

/// `MSG_GREETING`: sent once per slot, before any work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub slot: usize,
    pub task_class: TaskClass,
    pub max_mem_kb: u64,
    pub create_err_files: bool,
    pub create_mem_files: bool,
    pub program_path: Option<String>,
}

/// `MSG_WORK`: one task dispatched to a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub task_id: i64,
    pub program_file: String,
    pub out_dir: String,
    pub raw_args: String,
}

/// The master-to-worker message envelope: exactly `MSG_GREETING` once,
/// then zero or more `MSG_WORK`, then exactly one `MSG_STOP`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToWorker {
    Greeting(Greeting),
    Work(Work),
    Stop,
}

/// The worker-to-master message envelope: one `MSG_RESULT` per retired
/// task (`TaskResult` already carries `exec_time_s`/`worker_lifetime_s`
/// as the optional trailing fields SPEC_FULL.md §6 describes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToMaster(pub TaskResult);

/// Write one length-prefixed `bincode` frame (u32 little-endian length,
/// then the payload) to `w`.
pub fn write_frame<T: Serialize>(w: &mut impl Write, msg: &T) -> io::Result<()> {
    let bytes = bincode::serialize(msg)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(&bytes)?;
    w.flush()
}

/// Read one length-prefixed `bincode` frame from `r`. Returns `Ok(None)`
/// on a clean EOF between frames (the peer closed its side).
pub fn read_frame<T: for<'de> Deserialize<'de>>(r: &mut impl Read) -> io::Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    match r.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    let msg = bincode::deserialize(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(msg))
}
