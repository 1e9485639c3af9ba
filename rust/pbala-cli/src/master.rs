//! The Master Scheduler (SPEC_FULL.md §4.1): fleet construction, queue
//! drive, shutdown. Grounded directly on `PBala.c`'s `main`.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use pbala_core::{Node, PbalaError, Status, TaskClass, TaskFile, TaskResult};
use pbala_preparer::preparer_for;
use pbala_transport::{Greeting, Transport, TransportError, Work};

use crate::artifacts::{self, SlaveFile};
use crate::cli::RunArgs;
use crate::maple;
use crate::scratch;
use crate::tee::Tee;

/// What the run printed as its final summary, handed back to `main` for
/// exit-code purposes only (the numbers themselves are already on stdout).
pub struct Summary {
    pub combined_computing_time_s: f64,
    pub wall_clock_s: f64,
    pub any_unfinished: bool,
}

fn map_transport_err(e: TransportError) -> PbalaError {
    match e {
        TransportError::Spawn { slot, hostname, source } => {
            PbalaError::WorkerSpawn(source.to_string(), slot, hostname)
        }
        TransportError::DuplicateHost { attempts, .. } => PbalaError::DuplicateHost { attempts },
        other => PbalaError::TransportRuntime(other.to_string()),
    }
}

/// `(slot_index, hostname)` in node-major, dense order — both the greeting
/// fan-out order and `node_info.txt`'s header (SPEC_FULL.md §4.1/§10.5).
fn slot_hosts(nodes: &[Node]) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut index = 0usize;
    for node in nodes {
        for _ in 0..node.cores {
            out.push((index, node.hostname.clone()));
            index += 1;
        }
    }
    out
}

/// Self/parent transport identity sanity check (SPEC_FULL.md §4.1 step 7,
/// §10.6): this process's own pid always resolves, so `TransportSelfId`
/// is unreachable from this function but kept as a distinct exit code for
/// the (hypothetical) future transport that can fail to report it. A
/// parent endpoint, if the environment claims one, must parse as a pid.
fn check_transport_identity() -> Result<(), PbalaError> {
    if let Some(parent) = std::env::var_os("PBALA_PARENT_ENDPOINT") {
        parent
            .to_str()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or(PbalaError::TransportParentId)?;
    }
    Ok(())
}

fn dispatch_task(
    transport: &mut dyn Transport,
    slot: usize,
    task: pbala_core::Task,
    task_class: TaskClass,
    program_file: &Path,
    out_dir: &Path,
    slave_file: &mut Option<SlaveFile>,
    tee: &mut impl Write,
) -> Result<(), PbalaError> {
    let resolved_program_file = if task_class.needs_preparer() {
        let preparer = preparer_for(task_class).expect("needs_preparer implies a preparer exists");
        let path = preparer.prepare(
            task.id,
            &task.raw_args,
            &program_file.to_string_lossy(),
            &out_dir.to_string_lossy(),
        )?;
        writeln!(tee, "CREATED_SCRIPT {}", path.display()).ok();
        path.to_string_lossy().into_owned()
    } else {
        program_file.to_string_lossy().into_owned()
    };

    transport
        .send_work(
            slot,
            Work {
                task_id: task.id,
                program_file: resolved_program_file,
                out_dir: out_dir.to_string_lossy().into_owned(),
                raw_args: task.raw_args.clone(),
            },
        )
        .map_err(map_transport_err)?;

    writeln!(tee, "TASK_SENT {} to slot {}", task.id, slot).ok();
    if let Some(sf) = slave_file.as_mut() {
        sf.log_dispatch(slot, task.id);
    }
    Ok(())
}

/// Classify one `MSG_RESULT` and log/record it per SPEC_FULL.md §4.1/§7.
/// Returns `true` if this result landed a row in `unfinished_tasks.txt`.
fn classify_and_log(result: &TaskResult, tee: &mut impl Write, unfinished: &mut File) -> bool {
    match result.status {
        Status::Ok => {
            writeln!(
                tee,
                "TASK_COMPLETED {} in {:.5} seconds",
                result.task_id,
                result.exec_time_s.unwrap_or(0.0)
            )
            .ok();
            false
        }
        Status::MemErr => {
            eprintln!("ERROR - task {} ran out of memory", result.task_id);
            writeln!(unfinished, "{}", result.unfinished_row()).ok();
            true
        }
        Status::ForkErr => {
            eprintln!("ERROR - task {} could not be started", result.task_id);
            writeln!(unfinished, "{}", result.unfinished_row()).ok();
            true
        }
        Status::TaskKilled => {
            eprintln!("ERROR - task {} was stopped or killed", result.task_id);
            writeln!(unfinished, "{}", result.unfinished_row()).ok();
            true
        }
    }
}

/// Run a full dispatch: startup, fleet, queue drive, shutdown. `cwd` is
/// the resolved current working directory (SPEC_FULL.md §4.1 step 4);
/// `stdout` is the process's own stdout, teed into `outfile.txt`.
pub fn run(
    args: &RunArgs,
    cwd: &Path,
    transport: &mut dyn Transport,
    stdout: &mut impl Write,
) -> Result<Summary, PbalaError> {
    let start = Instant::now();
    let task_class = TaskClass::from_flag(args.program_flag)?;

    let nodes = Node::parse_file(&args.node_file)?;
    let total_cores = Node::total_cores(&nodes) as usize;

    if task_class == TaskClass::Maple && args.maple_single_core {
        maple::apply_single_core(&args.program_file)?;
    }

    std::fs::create_dir_all(&args.out_dir).map_err(|source| PbalaError::OutDirCreate {
        path: args.out_dir.clone(),
        source,
    })?;

    let hosts = slot_hosts(&nodes);
    let mut slave_file = if args.create_slavefile {
        Some(SlaveFile::create(&args.out_dir, &hosts)?)
    } else {
        None
    };

    artifacts::write_hostfile(&cwd.join("hostfile"), cwd, &nodes).map_err(|source| PbalaError::HostfileWrite {
        path: cwd.join("hostfile"),
        source,
    })?;

    scratch::init(cwd).ok();

    let program_path_override = args.custom_process.as_ref().map(|p| p.to_string_lossy().into_owned());
    let greeting_for_slot = |slot: usize| -> Greeting {
        Greeting {
            slot,
            task_class,
            max_mem_kb: args.max_mem_size_kb,
            create_err_files: args.create_errfiles,
            create_mem_files: args.create_memfiles,
            program_path: program_path_override.clone(),
        }
    };
    transport.start_fleet(&nodes, &greeting_for_slot).map_err(map_transport_err)?;
    for pid in transport.worker_pids() {
        scratch::record_pid(cwd, pid).ok();
    }

    let outfile_path = args.out_dir.join("outfile.txt");
    let outfile = File::create(&outfile_path).map_err(|source| PbalaError::OutfileOpen {
        path: outfile_path,
        source,
    })?;
    let mut tee = Tee::new(stdout, outfile);

    check_transport_identity()?;

    writeln!(tee, "PBALA v{}", env!("CARGO_PKG_VERSION")).ok();
    writeln!(tee, "INFO - program file: {}", args.program_file.display()).ok();
    writeln!(tee, "INFO - data file: {}", args.data_file.display()).ok();
    writeln!(tee, "INFO - node file: {}", args.node_file.display()).ok();
    writeln!(tee, "INFO - output directory: {}", args.out_dir.display()).ok();
    for (slot, hostname) in &hosts {
        writeln!(tee, "CREATED_SLAVE {slot} on {hostname}").ok();
    }

    let n_tasks = TaskFile::count_lines(&args.data_file)?;
    let n = n_tasks.min(total_cores);
    writeln!(tee, "INFO - nTasks={n_tasks} maxConcurrentTasks={total_cores}").ok();

    let mut unfinished_file = File::create(args.out_dir.join("unfinished_tasks.txt")).map_err(|source| {
        PbalaError::OutfileOpen {
            path: args.out_dir.join("unfinished_tasks.txt"),
            source,
        }
    })?;
    let mut any_unfinished = false;

    let mut task_stream = TaskFile::open(&args.data_file)?;

    for slot in 0..n {
        let task = task_stream.next().expect("n <= n_tasks")?;
        dispatch_task(
            transport,
            slot,
            task,
            task_class,
            &args.program_file,
            &args.out_dir,
            &mut slave_file,
            &mut tee,
        )?;
    }
    writeln!(tee, "INFO - first batch of work sent\n").ok();

    for _ in 0..(n_tasks - n) {
        let result = transport.recv_result().map_err(map_transport_err)?;
        if classify_and_log(&result, &mut tee, &mut unfinished_file) {
            any_unfinished = true;
        }
        if let Some(task) = task_stream.next() {
            dispatch_task(
                transport,
                result.slot,
                task?,
                task_class,
                &args.program_file,
                &args.out_dir,
                &mut slave_file,
                &mut tee,
            )?;
        }
    }

    // Collect every slot's final task result before stopping any of them:
    // a slot's lifetime sentinel is only emitted after it receives
    // MSG_STOP, so sending a stop mid-loop here would race that sentinel
    // back into the same fan-in queue this loop is still draining.
    let mut drained_slots = Vec::with_capacity(n);
    for _ in 0..n {
        let result = transport.recv_result().map_err(map_transport_err)?;
        if classify_and_log(&result, &mut tee, &mut unfinished_file) {
            any_unfinished = true;
        }
        drained_slots.push(result.slot);
    }
    for slot in drained_slots {
        transport.send_stop(slot).map_err(map_transport_err)?;
    }
    for slot in n..total_cores {
        transport.send_stop(slot).map_err(map_transport_err)?;
    }

    for _ in 0..total_cores {
        let result = transport.recv_result().map_err(map_transport_err)?;
        if result.task_id < 0 {
            let lifetime = result.worker_lifetime_s.unwrap_or(0.0);
            combined_computing_time_s += lifetime;
            writeln!(
                tee,
                "INFO - shutting down slave {:2} (total execution time: {:13.5} seconds)",
                result.slot, lifetime
            )
            .ok();
        } else if classify_and_log(&result, &mut tee, &mut unfinished_file) {
            any_unfinished = true;
        }
    }

    let wall_clock_s = start.elapsed().as_secs_f64();
    writeln!(
        tee,
        "END OF EXECUTION.\nCombined computing time: {combined_computing_time_s:.5} seconds\nTotal execution time: {wall_clock_s:.5} seconds"
    )
    .ok();

    drop(unfinished_file);
    transport.teardown();
    if task_class == TaskClass::Maple && args.maple_single_core {
        maple::restore_original(&args.program_file);
    }
    if task_class.needs_preparer() {
        artifacts::sweep_auxprog_files(&args.out_dir);
    }
    artifacts::remove_unfinished_file_if_empty(&args.out_dir, any_unfinished);
    scratch::clear(cwd);

    Ok(Summary {
        combined_computing_time_s,
        wall_clock_s,
        any_unfinished,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbala_core::TaskClass as CoreClass;
    use pbala_transport::ChannelTransport;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn scratch_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pbala-master-test-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn echo_worker(
        slot: usize,
        rx: crossbeam_channel::Receiver<pbala_transport::ToWorker>,
        tx: crossbeam_channel::Sender<TaskResult>,
    ) {
        use pbala_transport::ToWorker;
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
                    tx.send(TaskResult {
                        slot,
                        task_id: -1,
                        status: Status::Ok,
                        raw_args: String::new(),
                        exec_time_s: None,
                        worker_lifetime_s: Some(0.5),
                    })
                    .unwrap();
                    break;
                }
            }
        }
    }

    #[test]
    fn happy_path_c_binary_reports_all_tasks_completed() {
        let dir = scratch_root("happy");
        let node_file = dir.join("nodes.txt");
        std::fs::write(&node_file, "alpha 2\n").unwrap();
        let data_file = dir.join("data.txt");
        std::fs::write(&data_file, "1,a\n2,b\n3,c\n").unwrap();
        let out_dir = dir.join("out");

        let run_args = RunArgs {
            program_flag: CoreClass::CBinary as i32,
            program_file: dir.join("prog"),
            data_file,
            node_file,
            out_dir: out_dir.clone(),
            max_mem_size_kb: 0,
            maple_single_core: false,
            create_errfiles: false,
            create_memfiles: false,
            create_slavefile: true,
            custom_process: None,
        };

        let mut transport = ChannelTransport::new(echo_worker);
        let mut stdout = Cursor::new(Vec::new());
        let summary = run(&run_args, &dir, &mut transport, &mut stdout).unwrap();

        assert!(!summary.any_unfinished);
        assert!(summary.combined_computing_time_s > 0.0);
        assert!(!out_dir.join("unfinished_tasks.txt").exists());
        assert!(out_dir.join("outfile.txt").exists());
        assert!(out_dir.join("node_info.txt").exists());

        let narration = String::from_utf8(stdout.into_inner()).unwrap();
        assert_eq!(narration.matches("TASK_COMPLETED").count(), 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn wrong_task_class_is_rejected_before_any_fleet_work() {
        let dir = scratch_root("wrongclass");
        let node_file = dir.join("nodes.txt");
        std::fs::write(&node_file, "alpha 1\n").unwrap();
        let data_file = dir.join("data.txt");
        std::fs::write(&data_file, "1,a\n").unwrap();

        let run_args = RunArgs {
            program_flag: 9,
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
        };

        let mut transport = ChannelTransport::new(echo_worker);
        let mut stdout = Cursor::new(Vec::new());
        let err = run(&run_args, &dir, &mut transport, &mut stdout).unwrap_err();
        assert!(matches!(err, PbalaError::WrongTaskClass(9)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
