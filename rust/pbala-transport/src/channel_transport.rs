//! An in-process `Transport` backed by `crossbeam-channel`, for tests and
//! for the single-host "no remote nodes" run mode. Each slot runs its
//! worker logic on a dedicated thread instead of in a child process, so
//! the same `worker_fn` that drives `pbala-worker`'s binary can be driven
//! here without forking anything.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use pbala_core::{Node, TaskResult};

use crate::transport::{Slot, Transport, TransportError};
use crate::wire::{Greeting, ToWorker, Work};

/// The per-slot worker entry point `ChannelTransport` drives on a thread.
/// `pbala-worker` provides the production implementation of this
/// signature; tests can supply a stub.
pub type WorkerFn = fn(usize, Receiver<ToWorker>, Sender<TaskResult>);

struct SlotHandle {
    to_worker: Sender<ToWorker>,
    join: Option<JoinHandle<()>>,
}

/// In-process fleet of worker threads, fanning results into one shared
/// receiver exactly like the real PVM-style master does for OS processes.
pub struct ChannelTransport {
    worker_fn: WorkerFn,
    slots: Vec<SlotHandle>,
    results_tx: Sender<TaskResult>,
    results_rx: Receiver<TaskResult>,
}

impl ChannelTransport {
    pub fn new(worker_fn: WorkerFn) -> Self {
        let (results_tx, results_rx) = unbounded();
        ChannelTransport {
            worker_fn,
            slots: Vec::new(),
            results_tx,
            results_rx,
        }
    }
}

impl Transport for ChannelTransport {
    fn start_fleet(
        &mut self,
        nodes: &[Node],
        greeting_for_slot: &dyn Fn(usize) -> Greeting,
    ) -> Result<Vec<Slot>, TransportError> {
        if nodes.is_empty() {
            return Err(TransportError::EmptyFleet);
        }

        let mut slots = Vec::new();
        let mut index = 0usize;
        for node in nodes {
            for _ in 0..node.cores {
                let (to_worker_tx, to_worker_rx) = unbounded::<ToWorker>();
                let results_tx = self.results_tx.clone();
                let worker_fn = self.worker_fn;
                let slot_index = index;
                let join = thread::Builder::new()
                    .name(format!("pbala-slot-{slot_index}"))
                    .spawn(move || worker_fn(slot_index, to_worker_rx, results_tx))
                    .map_err(|source| TransportError::Spawn {
                        slot: slot_index,
                        hostname: node.hostname.clone(),
                        source,
                    })?;

                let greeting = greeting_for_slot(slot_index);
                to_worker_tx
                    .send(ToWorker::Greeting(greeting))
                    .map_err(|_| TransportError::SlotGone { slot: slot_index })?;

                self.slots.push(SlotHandle {
                    to_worker: to_worker_tx,
                    join: Some(join),
                });
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
        let handle = self.slots.get(slot).ok_or(TransportError::SlotGone { slot })?;
        handle
            .to_worker
            .send(ToWorker::Work(work))
            .map_err(|_| TransportError::SlotGone { slot })
    }

    fn send_stop(&mut self, slot: usize) -> Result<(), TransportError> {
        let handle = self.slots.get(slot).ok_or(TransportError::SlotGone { slot })?;
        handle
            .to_worker
            .send(ToWorker::Stop)
            .map_err(|_| TransportError::SlotGone { slot })
    }

    fn recv_result(&mut self) -> Result<TaskResult, TransportError> {
        self.results_rx
            .recv()
            .map_err(|_| TransportError::EmptyFleet)
    }

    fn teardown(&mut self) {
        for handle in &self.slots {
            let _ = handle.to_worker.send(ToWorker::Stop);
        }
        for handle in &mut self.slots {
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbala_core::{Status, TaskClass};

    fn echo_worker(slot: usize, rx: Receiver<ToWorker>, tx: Sender<TaskResult>) {
        loop {
            match rx.recv() {
                Ok(ToWorker::Greeting(_)) => continue,
                Ok(ToWorker::Work(work)) => {
                    tx.send(TaskResult {
                        slot,
                        task_id: work.task_id,
                        status: Status::Ok,
                        raw_args: work.raw_args,
                        exec_time_s: Some(0.0),
                        worker_lifetime_s: None,
                    })
                    .unwrap();
                }
                Ok(ToWorker::Stop) | Err(_) => break,
            }
        }
    }

    fn greeting(slot: usize) -> Greeting {
        Greeting {
            slot,
            task_class: TaskClass::Python,
            max_mem_kb: 1024,
            create_err_files: false,
            create_mem_files: false,
            program_path: None,
        }
    }

    #[test]
    fn start_fleet_rejects_empty_node_list() {
        let mut transport = ChannelTransport::new(echo_worker);
        let err = transport.start_fleet(&[], &greeting).unwrap_err();
        assert!(matches!(err, TransportError::EmptyFleet));
    }

    #[test]
    fn dispatches_work_and_collects_results_across_slots() {
        let nodes = vec![
            Node {
                hostname: "alpha".into(),
                cores: 2,
            },
            Node {
                hostname: "beta".into(),
                cores: 1,
            },
        ];
        let mut transport = ChannelTransport::new(echo_worker);
        let slots = transport.start_fleet(&nodes, &greeting).unwrap();
        assert_eq!(slots.len(), 3);

        for (i, slot) in slots.iter().enumerate() {
            transport
                .send_work(
                    slot.index,
                    Work {
                        task_id: i as i64,
                        program_file: "prog".into(),
                        out_dir: "/tmp".into(),
                        raw_args: String::new(),
                    },
                )
                .unwrap();
        }

        let mut seen_ids: Vec<i64> = (0..3).map(|_| transport.recv_result().unwrap().task_id).collect();
        seen_ids.sort_unstable();
        assert_eq!(seen_ids, vec![0, 1, 2]);

        transport.teardown();
    }
}
