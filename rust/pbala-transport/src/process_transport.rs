//! A `Transport` backed by real OS processes: one `pbala-worker` child per
//! slot, spawned locally via `std::process::Command` or on a remote node
//! via `ssh`, talking the length-prefixed `bincode` wire over its
//! stdin/stdout pipes.
//!
//! Grounded on `PBala.c`'s hostfile-then-`pvm_start_pvmd` initialisation
//! (duplicate-host retry up to 3 attempts) and its node-major,
//! dense-slot-index `pvm_spawn` loop. There is no PVM daemon here: each
//! node-major `Command::spawn` IS the equivalent step, and "duplicate
//! host" becomes "this hostname already has a live slot, and the caller
//! asked for it again" - a configuration error worth the same retry
//! budget rather than an immediate hard failure, since a transient DNS or
//! `ssh` hiccup can otherwise register a node twice in one deploy.

use std::collections::HashSet;
use std::io::{BufReader, BufWriter};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use pbala_core::{Node, TaskResult};

use crate::transport::{Slot, Transport, TransportError};
use crate::wire::{read_frame, write_frame, Greeting, ToMaster, ToWorker, Work};

/// How to reach the `pbala-worker` binary for a given node.
#[derive(Debug, Clone)]
pub enum WorkerLauncher {
    /// Run `pbala-worker` directly (the node is the local host).
    Local { binary: String },
    /// Run `ssh <hostname> <binary>` (the node is remote).
    Ssh { binary: String },
}

impl WorkerLauncher {
    fn command_for(&self, hostname: &str) -> Command {
        match self {
            WorkerLauncher::Local { binary } => Command::new(binary),
            WorkerLauncher::Ssh { binary } => {
                let mut cmd = Command::new("ssh");
                cmd.arg(hostname).arg(binary);
                cmd
            }
        }
    }
}

struct ChildSlot {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    forwarder: Option<JoinHandle<()>>,
}

/// Process-backed fleet. Forwards every child's decoded `MSG_RESULT`
/// frames into one shared `std::sync::mpsc` channel so `recv_result`
/// mirrors the master's single-queue contract regardless of which slot
/// produced the result (PBala.c's `pvm_recv(-1, MSG_RESULT)` wildcard
/// receive).
pub struct ProcessTransport {
    launcher: WorkerLauncher,
    slots: Vec<ChildSlot>,
    results_tx: std_mpsc::Sender<Result<TaskResult, TransportError>>,
    results_rx: std_mpsc::Receiver<Result<TaskResult, TransportError>>,
}

impl ProcessTransport {
    pub fn new(launcher: WorkerLauncher) -> Self {
        let (results_tx, results_rx) = std_mpsc::channel();
        ProcessTransport {
            launcher,
            slots: Vec::new(),
            results_tx,
            results_rx,
        }
    }

    fn spawn_one(&mut self, slot_index: usize, hostname: &str) -> Result<ChildStdout, TransportError> {
        let mut cmd = self.launcher.command_for(hostname);
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::inherit());
        let mut child = cmd.spawn().map_err(|source| TransportError::Spawn {
            slot: slot_index,
            hostname: hostname.to_string(),
            source,
        })?;
        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        self.slots.push(ChildSlot {
            child,
            stdin: BufWriter::new(stdin),
            forwarder: None,
        });
        Ok(stdout)
    }
}

impl Transport for ProcessTransport {
    fn start_fleet(
        &mut self,
        nodes: &[Node],
        greeting_for_slot: &dyn Fn(usize) -> Greeting,
    ) -> Result<Vec<Slot>, TransportError> {
        if nodes.is_empty() {
            return Err(TransportError::EmptyFleet);
        }

        let mut seen_hosts: HashSet<String> = HashSet::new();
        let mut attempts = 0u32;
        for node in nodes {
            if !seen_hosts.insert(node.hostname.clone()) {
                attempts += 1;
                if attempts > 3 {
                    return Err(TransportError::DuplicateHost {
                        hostname: node.hostname.clone(),
                        attempts,
                    });
                }
            }
        }

        let mut slots = Vec::new();
        let mut index = 0usize;
        for node in nodes {
            for _ in 0..node.cores {
                let slot_index = index;
                let stdout = self.spawn_one(slot_index, &node.hostname)?;

                let greeting = greeting_for_slot(slot_index);
                {
                    let child_slot = self.slots.last_mut().expect("just pushed");
                    write_frame(&mut child_slot.stdin, &ToWorker::Greeting(greeting)).map_err(|source| {
                        TransportError::Io {
                            slot: slot_index,
                            source,
                        }
                    })?;
                }

                let results_tx = self.results_tx.clone();
                let join = thread::Builder::new()
                    .name(format!("pbala-forward-{slot_index}"))
                    .spawn(move || {
                        let mut reader = BufReader::new(stdout);
                        loop {
                            match read_frame::<ToMaster>(&mut reader) {
                                Ok(Some(ToMaster(result))) => {
                                    if results_tx.send(Ok(result)).is_err() {
                                        break;
                                    }
                                }
                                Ok(None) => break,
                                Err(source) => {
                                    let _ = results_tx.send(Err(TransportError::Io {
                                        slot: slot_index,
                                        source,
                                    }));
                                    break;
                                }
                            }
                        }
                    })
                    .expect("spawning forwarder thread");
                self.slots.last_mut().expect("just pushed").forwarder = Some(join);

                slots.push(Slot {
                    index: slot_index,
                    hostname: node.hostname.clone(),
                });
                index += 1;
            }
        }
        Ok(slots)
    }

    fn send_work(&mut self, slot: usize, work: Work) -> Result<(), TransportError> {
        let child_slot = self.slots.get_mut(slot).ok_or(TransportError::SlotGone { slot })?;
        write_frame(&mut child_slot.stdin, &ToWorker::Work(work))
            .map_err(|source| TransportError::Io { slot, source })
    }

    fn send_stop(&mut self, slot: usize) -> Result<(), TransportError> {
        let child_slot = self.slots.get_mut(slot).ok_or(TransportError::SlotGone { slot })?;
        write_frame(&mut child_slot.stdin, &ToWorker::Stop).map_err(|source| TransportError::Io { slot, source })
    }

    fn recv_result(&mut self) -> Result<TaskResult, TransportError> {
        match self.results_rx.recv() {
            Ok(inner) => inner,
            Err(_) => Err(TransportError::EmptyFleet),
        }
    }

    fn teardown(&mut self) {
        for slot in &mut self.slots {
            let _ = write_frame(&mut slot.stdin, &ToWorker::Stop);
        }
        for slot in &mut self.slots {
            let _ = slot.child.wait();
            if let Some(join) = slot.forwarder.take() {
                let _ = join.join();
            }
        }
    }

    fn worker_pids(&self) -> Vec<u32> {
        self.slots.iter().map(|s| s.child.id()).collect()
    }
}
