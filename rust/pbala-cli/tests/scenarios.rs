//! End-to-end scenarios against `ChannelTransport` (SPEC_FULL.md §8).

use std::io::Cursor;
use std::path::PathBuf;

use pbala_cli::cli::RunArgs;
use pbala_cli::master;
use pbala_core::{Status, TaskClass, TaskResult};
use pbala_transport::{ChannelTransport, ToWorker};

fn scratch(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pbala-cli-scenario-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn base_args(dir: &std::path::Path, node_file: PathBuf, data_file: PathBuf, class: TaskClass) -> RunArgs {
    RunArgs {
        program_flag: class as i32,
        program_file: dir.join("prog"),
        data_file,
        node_file,
        out_dir: dir.join("out"),
        max_mem_size_kb: 0,
        maple_single_core: false,
        create_errfiles: false,
        create_memfiles: false,
        create_slavefile: false,
        custom_process: None,
    }
}

fn sentinel(slot: usize) -> TaskResult {
    TaskResult {
        slot,
        task_id: -1,
        status: Status::Ok,
        raw_args: String::new(),
        exec_time_s: None,
        worker_lifetime_s: Some(0.1),
    }
}

/// Scenario 3: every task reports `FORK_ERR`.
#[test]
fn fork_err_tasks_all_land_in_unfinished_tasks_file() {
    fn failing_worker(
        slot: usize,
        rx: crossbeam_channel::Receiver<ToWorker>,
        tx: crossbeam_channel::Sender<TaskResult>,
    ) {
        loop {
            match rx.recv() {
                Ok(ToWorker::Greeting(_)) => continue,
                Ok(ToWorker::Work(work)) => {
                    tx.send(TaskResult {
                        slot,
                        task_id: work.task_id,
                        status: Status::ForkErr,
                        raw_args: work.raw_args,
                        exec_time_s: None,
                        worker_lifetime_s: None,
                    })
                    .unwrap();
                }
                Ok(ToWorker::Stop) | Err(_) => {
                    tx.send(sentinel(slot)).unwrap();
                    break;
                }
            }
        }
    }

    let dir = scratch("forkerr");
    let node_file = dir.join("nodes.txt");
    std::fs::write(&node_file, "alpha 2\n").unwrap();
    let data_file = dir.join("data.txt");
    std::fs::write(&data_file, "1,a\n2,b\n").unwrap();

    let args = base_args(&dir, node_file, data_file, TaskClass::CBinary);
    let mut transport = ChannelTransport::new(failing_worker);
    let mut stdout = Cursor::new(Vec::new());
    let summary = master::run(&args, &dir, &mut transport, &mut stdout).unwrap();

    assert!(summary.any_unfinished);
    let unfinished = std::fs::read_to_string(args.out_dir.join("unfinished_tasks.txt")).unwrap();
    assert_eq!(unfinished.lines().count(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

/// Scenario 4: one killed task among otherwise-successful ones.
#[test]
fn killed_task_logs_error_and_one_unfinished_row() {
    fn mostly_ok_worker(
        slot: usize,
        rx: crossbeam_channel::Receiver<ToWorker>,
        tx: crossbeam_channel::Sender<TaskResult>,
    ) {
        loop {
            match rx.recv() {
                Ok(ToWorker::Greeting(_)) => continue,
                Ok(ToWorker::Work(work)) => {
                    let status = if work.task_id == 2 { Status::TaskKilled } else { Status::Ok };
                    tx.send(TaskResult {
                        slot,
                        task_id: work.task_id,
                        status,
                        raw_args: work.raw_args,
                        exec_time_s: Some(0.01),
                        worker_lifetime_s: None,
                    })
                    .unwrap();
                }
                Ok(ToWorker::Stop) | Err(_) => {
                    tx.send(sentinel(slot)).unwrap();
                    break;
                }
            }
        }
    }

    let dir = scratch("killed");
    let node_file = dir.join("nodes.txt");
    std::fs::write(&node_file, "alpha 1\n").unwrap();
    let data_file = dir.join("data.txt");
    std::fs::write(&data_file, "1,a\n2,b\n3,c\n").unwrap();

    let args = base_args(&dir, node_file, data_file, TaskClass::CBinary);
    let mut transport = ChannelTransport::new(mostly_ok_worker);
    let mut stdout = Cursor::new(Vec::new());
    let summary = master::run(&args, &dir, &mut transport, &mut stdout).unwrap();

    assert!(summary.any_unfinished);
    let unfinished = std::fs::read_to_string(args.out_dir.join("unfinished_tasks.txt")).unwrap();
    assert_eq!(unfinished.trim(), "2,b");

    std::fs::remove_dir_all(&dir).ok();
}

/// Scenarios 1/2/5: two concurrent slots, one instant and one slow, so the
/// fast slot races ahead and picks up more of the self-balancing queue
/// while the slow slot is still draining its one task. This is the shape
/// that exposes a premature `send_stop` racing a slot's lifetime sentinel
/// back into the shared result queue.
#[test]
fn fast_and_slow_slots_each_get_exactly_one_stop() {
    fn uneven_worker(
        slot: usize,
        rx: crossbeam_channel::Receiver<ToWorker>,
        tx: crossbeam_channel::Sender<TaskResult>,
    ) {
        loop {
            match rx.recv() {
                Ok(ToWorker::Greeting(_)) => continue,
                Ok(ToWorker::Work(work)) => {
                    if slot == 1 {
                        std::thread::sleep(std::time::Duration::from_millis(100));
                    }
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
                Ok(ToWorker::Stop) | Err(_) => {
                    tx.send(sentinel(slot)).unwrap();
                    break;
                }
            }
        }
    }

    let dir = scratch("uneven");
    let node_file = dir.join("nodes.txt");
    std::fs::write(&node_file, "alpha 2\n").unwrap();
    let data_file = dir.join("data.txt");
    std::fs::write(&data_file, "1,a\n2,b\n3,c\n4,d\n").unwrap();

    let args = base_args(&dir, node_file, data_file, TaskClass::CBinary);
    let mut transport = ChannelTransport::new(uneven_worker);
    let mut stdout = Cursor::new(Vec::new());
    let summary = master::run(&args, &dir, &mut transport, &mut stdout).unwrap();

    assert!(!summary.any_unfinished);
    assert!(summary.combined_computing_time_s > 0.0);

    let narration = String::from_utf8(stdout.into_inner()).unwrap();
    assert_eq!(narration.matches("TASK_COMPLETED").count(), 4);
    assert!(!narration.contains("TASK_COMPLETED -1"));

    std::fs::remove_dir_all(&dir).ok();
}

/// Scenario 6: Pari wrapper scripts exist mid-run and are swept away by
/// shutdown; `outfile.txt` is retained.
#[test]
fn pari_wrapper_scripts_are_cleaned_up_but_outfile_is_kept() {
    fn echo_worker(
        slot: usize,
        rx: crossbeam_channel::Receiver<ToWorker>,
        tx: crossbeam_channel::Sender<TaskResult>,
    ) {
        loop {
            match rx.recv() {
                Ok(ToWorker::Greeting(_)) => continue,
                Ok(ToWorker::Work(work)) => {
                    tx.send(TaskResult {
                        slot,
                        task_id: work.task_id,
                        status: Status::Ok,
                        raw_args: work.raw_args,
                        exec_time_s: Some(0.01),
                        worker_lifetime_s: None,
                    })
                    .unwrap();
                }
                Ok(ToWorker::Stop) | Err(_) => {
                    tx.send(sentinel(slot)).unwrap();
                    break;
                }
            }
        }
    }

    let dir = scratch("pari");
    let node_file = dir.join("nodes.txt");
    std::fs::write(&node_file, "alpha 1\n").unwrap();
    let data_file = dir.join("data.txt");
    std::fs::write(&data_file, "1,a\n2,b\n3,c\n").unwrap();
    std::fs::create_dir_all(dir.join("out")).unwrap();
    std::fs::write(dir.join("prog.gp"), "main(id) = id;\n").unwrap();

    let mut args = base_args(&dir, node_file, data_file, TaskClass::Pari);
    args.program_file = dir.join("prog.gp");

    let mut transport = ChannelTransport::new(echo_worker);
    let mut stdout = Cursor::new(Vec::new());
    master::run(&args, &dir, &mut transport, &mut stdout).unwrap();

    let leftover_auxprog = std::fs::read_dir(&args.out_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().contains("auxprog"));
    assert!(!leftover_auxprog);
    assert!(args.out_dir.join("outfile.txt").exists());

    std::fs::remove_dir_all(&dir).ok();
}
