//! Adapts `supervisor::WorkerChannel` onto the two concrete transports:
//! in-process `crossbeam-channel` (driven as a `ChannelTransport`
//! `WorkerFn`) and the real stdin/stdout frame pipe (the `pbala-worker`
//! binary under `ProcessTransport`).

use std::io::{BufReader, BufWriter, Write};

use crossbeam_channel::{Receiver, Sender};
use pbala_core::TaskResult;
use pbala_memgate::{MemoryGate, SysinfoGate};
use pbala_transport::{read_frame, write_frame, ToMaster, ToWorker};

use crate::supervisor::{self, RealSleeper, WorkerChannel};

/// `WorkerChannel` over an in-process `crossbeam-channel` pair; matches
/// `pbala_transport::channel_transport::WorkerFn`'s signature.
pub struct InProcessChannel {
    rx: Receiver<ToWorker>,
    tx: Sender<TaskResult>,
}

impl WorkerChannel for InProcessChannel {
    fn recv(&mut self) -> Option<ToWorker> {
        self.rx.recv().ok()
    }

    fn send(&mut self, result: TaskResult) -> bool {
        self.tx.send(result).is_ok()
    }
}

/// The function pointer `ChannelTransport::new` expects. `slot` is unused
/// here beyond matching `WorkerFn`'s signature: the supervisor loop takes
/// its slot index from the greeting it receives, same as the real binary.
pub fn run_in_process(_slot: usize, rx: Receiver<ToWorker>, tx: Sender<TaskResult>) {
    let mut channel = InProcessChannel { rx, tx };
    let gate = SysinfoGate::new();
    supervisor::run(&mut channel, &gate, &RealSleeper);
}

/// `WorkerChannel` over framed stdin/stdout, for the real worker binary.
pub struct StdioChannel<R, W> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
}

impl<R: std::io::Read, W: Write> StdioChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        StdioChannel {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        }
    }
}

impl<R: std::io::Read, W: Write> WorkerChannel for StdioChannel<R, W> {
    fn recv(&mut self) -> Option<ToWorker> {
        read_frame(&mut self.reader).ok().flatten()
    }

    fn send(&mut self, result: TaskResult) -> bool {
        write_frame(&mut self.writer, &ToMaster(result)).is_ok()
    }
}

/// Whichever `MemoryGate` a worker process should consult. This is a
/// thin factory so `main.rs` can stay a few lines.
pub fn default_gate() -> impl MemoryGate {
    SysinfoGate::new()
}
