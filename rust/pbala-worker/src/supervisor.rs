//! The worker slot's main loop: gate, pull work, fork/exec, wait, report
//! (SPEC_FULL.md §4.2). Transport-agnostic: driven by plain closures so
//! the same loop runs identically over `crossbeam-channel`
//! (`ChannelTransport`, tests) and over the real stdin/stdout pipe
//! (the `pbala-worker` binary, `ProcessTransport`).

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use pbala_core::{Status, TaskResult};
use pbala_memgate::{GateMode, MemoryGate, Verdict};
use pbala_transport::{Greeting, ToWorker, Work};

use crate::argv::build_argv;
use crate::resource::ResourceSampler;

const GATE_RETRY_SLEEP: Duration = Duration::from_secs(60);
const FILE_MODE: u32 = 0o666;

/// Everything the loop needs from its transport: a blocking receive of
/// the next `ToWorker` message, and a blocking send of a `TaskResult`.
/// `None` from `recv` means the channel was closed without a `Stop`
/// (treated the same as receiving `Stop`).
pub trait WorkerChannel {
    fn recv(&mut self) -> Option<ToWorker>;
    fn send(&mut self, result: TaskResult) -> bool;
}

/// Overridable so tests don't block for real on the memory-gate retry.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Run one worker slot to completion: read the greeting (which carries
/// this slot's own index), then loop gate→pull→fork→wait→report until
/// `MSG_STOP`.
pub fn run(channel: &mut dyn WorkerChannel, gate: &dyn MemoryGate, sleeper: &dyn Sleeper) {
    let greeting = match channel.recv() {
        Some(ToWorker::Greeting(g)) => g,
        _ => return,
    };
    let slot = greeting.slot;
    let mode = GateMode::from_max_task_size_kb(greeting.max_mem_kb);
    let lifetime_start = Instant::now();

    loop {
        while gate.check(mode) == Verdict::Defer {
            sleeper.sleep(GATE_RETRY_SLEEP);
        }

        let work = match channel.recv() {
            Some(ToWorker::Work(w)) => w,
            Some(ToWorker::Stop) | None => {
                let _ = channel.send(TaskResult {
                    slot,
                    task_id: -1,
                    status: Status::Ok,
                    raw_args: String::new(),
                    exec_time_s: None,
                    worker_lifetime_s: Some(lifetime_start.elapsed().as_secs_f64()),
                });
                return;
            }
            Some(ToWorker::Greeting(_)) => continue,
        };

        let result = run_one_task(slot, &greeting, &work);
        if !channel.send(result) {
            return;
        }
    }
}

fn run_one_task(slot: usize, greeting: &Greeting, work: &Work) -> TaskResult {
    let out_path = format!("{}/{}_out.txt", work.out_dir, work.task_id);
    let out_file = match open_redirect_target(&out_path) {
        Ok(f) => f,
        Err(_) => {
            return TaskResult {
                slot,
                task_id: work.task_id,
                status: Status::ForkErr,
                raw_args: work.raw_args.clone(),
                exec_time_s: None,
                worker_lifetime_s: None,
            }
        }
    };

    let argv = build_argv(
        greeting.task_class,
        work.task_id,
        &work.program_file,
        &work.raw_args,
        greeting.program_path.as_deref(),
    );
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]).stdin(Stdio::null()).stdout(Stdio::from(out_file));

    if greeting.create_err_files {
        let err_path = format!("{}/{}_err.txt", work.out_dir, work.task_id);
        match open_redirect_target(&err_path) {
            Ok(f) => {
                cmd.stderr(Stdio::from(f));
            }
            Err(_) => {
                return TaskResult {
                    slot,
                    task_id: work.task_id,
                    status: Status::ForkErr,
                    raw_args: work.raw_args.clone(),
                    exec_time_s: None,
                    worker_lifetime_s: None,
                }
            }
        }
    } else {
        cmd.stderr(Stdio::null());
    }

    let sampler = ResourceSampler::start();
    let start = Instant::now();
    let spawned = cmd.spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(_) => {
            return TaskResult {
                slot,
                task_id: work.task_id,
                status: Status::ForkErr,
                raw_args: work.raw_args.clone(),
                exec_time_s: None,
                worker_lifetime_s: None,
            }
        }
    };

    let wait_result = child.wait();
    let exec_time_s = start.elapsed().as_secs_f64();
    let usage = sampler.finish();

    if greeting.create_mem_files {
        let mem_path = format!("{}/{}_mem.txt", work.out_dir, work.task_id);
        let _ = std::fs::write(mem_path, usage.to_mem_file_contents());
    }

    let status = match wait_result {
        Ok(exit_status) if exit_status.success() => Status::Ok,
        _ => Status::TaskKilled,
    };

    TaskResult {
        slot,
        task_id: work.task_id,
        status,
        raw_args: work.raw_args.clone(),
        exec_time_s: Some(exec_time_s),
        worker_lifetime_s: None,
    }
}

fn open_redirect_target(path: &str) -> std::io::Result<std::fs::File> {
    OpenOptions::new().write(true).create(true).truncate(true).mode(FILE_MODE).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbala_core::TaskClass;
    use pbala_memgate::FixedGate;
    use std::collections::VecDeque;

    struct NoopSleeper;
    impl Sleeper for NoopSleeper {
        fn sleep(&self, _duration: Duration) {}
    }

    struct ScriptedChannel {
        inbox: VecDeque<ToWorker>,
        outbox: Vec<TaskResult>,
    }

    impl WorkerChannel for ScriptedChannel {
        fn recv(&mut self) -> Option<ToWorker> {
            self.inbox.pop_front()
        }
        fn send(&mut self, result: TaskResult) -> bool {
            self.outbox.push(result);
            true
        }
    }

    fn greeting() -> Greeting {
        Greeting {
            slot: 0,
            task_class: TaskClass::CBinary,
            max_mem_kb: 0,
            create_err_files: false,
            create_mem_files: false,
            program_path: None,
        }
    }

    #[test]
    fn runs_one_task_then_stops_and_reports_lifetime() {
        let dir = std::env::temp_dir().join(format!("pbala-worker-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("prog.sh"), "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(dir.join("prog.sh"), std::os::unix::fs::PermissionsExt::from_mode(0o755)).unwrap();

        let mut channel = ScriptedChannel {
            inbox: VecDeque::from(vec![
                ToWorker::Greeting(greeting()),
                ToWorker::Work(Work {
                    task_id: 1,
                    program_file: dir.join("prog.sh").to_str().unwrap().to_string(),
                    out_dir: dir.to_str().unwrap().to_string(),
                    raw_args: String::new(),
                }),
                ToWorker::Stop,
            ]),
            outbox: Vec::new(),
        };

        run(&mut channel, &FixedGate(Verdict::Accept), &NoopSleeper);

        assert_eq!(channel.outbox.len(), 2);
        assert_eq!(channel.outbox[0].status, Status::Ok);
        assert!(channel.outbox[0].exec_time_s.is_some());
        assert!(channel.outbox[1].worker_lifetime_s.is_some());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_greeting_returns_immediately() {
        let mut channel = ScriptedChannel {
            inbox: VecDeque::new(),
            outbox: Vec::new(),
        };
        run(&mut channel, &FixedGate(Verdict::Accept), &NoopSleeper);
        assert!(channel.outbox.is_empty());
    }
}
