//! The `Transport` seam: everything the master scheduler needs from a
//! fleet of worker slots, independent of whether those slots are
//! in-process closures (tests) or real child processes (production).

use pbala_core::{Node, TaskResult};
use thiserror::Error;

use crate::wire::{Greeting, Work};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not start worker for slot {slot} on node {hostname}: {source}")]
    Spawn {
        slot: usize,
        hostname: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start transport after {attempts} attempts (duplicate host {hostname})")]
    DuplicateHost { hostname: String, attempts: u32 },

    #[error("lost contact with slot {slot}")]
    SlotGone { slot: usize },

    #[error("wire I/O error talking to slot {slot}: {source}")]
    Io {
        slot: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("no worker slots ever started")]
    EmptyFleet,
}

/// A running worker slot: something the master can hand `MSG_WORK` to and
/// eventually tell `MSG_STOP`.
pub struct Slot {
    pub index: usize,
    pub hostname: String,
}

/// The seam between the master scheduler and its fleet of worker slots.
///
/// `ChannelTransport` implements this in-process over `crossbeam-channel`
/// (tests, and a same-host "no remote nodes" mode); `ProcessTransport`
/// implements it by spawning real `pbala-worker` processes, locally or
/// over `ssh`, and framing messages on their stdin/stdout pipes.
pub trait Transport {
    /// Start one worker slot per node core, in node-major, dense slot-index
    /// order (SPEC_FULL.md §4.2), and send each its `MSG_GREETING`. Retries
    /// up to 3 times total on a duplicate-host failure before giving up,
    /// mirroring the original's `pvm_start_pvmd` retry loop.
    fn start_fleet(&mut self, nodes: &[Node], greeting_for_slot: &dyn Fn(usize) -> Greeting) -> Result<Vec<Slot>, TransportError>;

    /// Send `MSG_WORK` to the given slot.
    fn send_work(&mut self, slot: usize, work: Work) -> Result<(), TransportError>;

    /// Send `MSG_STOP` to the given slot.
    fn send_stop(&mut self, slot: usize) -> Result<(), TransportError>;

    /// Block until any slot produces a `MSG_RESULT`, and return it. This is
    /// the single fan-in queue the master's steady-state loop pulls from
    /// (SPEC_FULL.md §5): results from every slot interleave here in
    /// arrival order, never per-slot order.
    fn recv_result(&mut self) -> Result<TaskResult, TransportError>;

    /// Tear down every remaining slot (best-effort; used on the shutdown
    /// path after the drain loop, and on early-exit error paths).
    fn teardown(&mut self);

    /// Process ids of any real OS processes this transport owns, for the
    /// master's crash-recovery scratch file (`--kill`, SPEC_FULL.md §6).
    /// `ChannelTransport` has none to report; `ProcessTransport` returns
    /// one id per live slot.
    fn worker_pids(&self) -> Vec<u32> {
        Vec::new()
    }
}
