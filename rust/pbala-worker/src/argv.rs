//! Per-task-class child argv construction, grounded on `task_fork.c`'s
//! `task_type` branch (SPEC_FULL.md §4.2).

use pbala_core::TaskClass;

/// Build the argv for the child process. For the preparer-backed classes
/// (Pari/Sage/Octave) the master has already substituted `program_file`
/// with the wrapper script the Task Preparer wrote, before ever sending
/// `MSG_WORK`; this function only needs to pick the right interpreter.
///
/// `custom_interpreter` is the greeting's `program_path` (`--custom-process`,
/// SPEC_FULL.md §6): when set, it replaces the default interpreter binary
/// name for the classes that invoke one (Maple/Python/Pari/Sage/Octave).
/// `CBinary` has no interpreter to override — `program_file` already is
/// the binary — so it ignores this argument.
pub fn build_argv(
    class: TaskClass,
    task_id: i64,
    program_file: &str,
    raw_args: &str,
    custom_interpreter: Option<&str>,
) -> Vec<String> {
    let tokens: Vec<&str> = if raw_args.is_empty() {
        Vec::new()
    } else {
        raw_args.split(',').collect()
    };

    match class {
        TaskClass::Maple => vec![
            custom_interpreter.unwrap_or("maple").to_string(),
            format!("-tc \"taskId:={task_id}\""),
            format!("-c \"taskArgs:=[{raw_args}]\""),
            program_file.to_string(),
        ],
        TaskClass::CBinary => {
            let mut argv = vec![program_file.to_string(), task_id.to_string()];
            argv.extend(tokens.into_iter().map(str::to_string));
            argv
        }
        TaskClass::Python => {
            let mut argv = vec![
                custom_interpreter.unwrap_or("python").to_string(),
                program_file.to_string(),
                task_id.to_string(),
            ];
            argv.extend(tokens.into_iter().map(str::to_string));
            argv
        }
        TaskClass::Pari | TaskClass::Sage | TaskClass::Octave => {
            let default_interpreter = match class {
                TaskClass::Pari => "gp",
                TaskClass::Sage => "sage",
                TaskClass::Octave => "octave",
                _ => unreachable!(),
            };
            let mut argv = vec![
                custom_interpreter.unwrap_or(default_interpreter).to_string(),
                program_file.to_string(),
                task_id.to_string(),
            ];
            argv.extend(tokens.into_iter().map(str::to_string));
            argv
        }
    }
}
