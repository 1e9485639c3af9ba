//! Task class enumeration, the data-file task stream, and raw argument
//! parsing (SPEC_FULL.md §3/§6/§9).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PbalaError;

/// Which kind of user program a task invokes. The numeric value is the
/// `program_flag` CLI argument and also what travels over the wire in
/// `MSG_GREETING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TaskClass {
    Maple = 0,
    CBinary = 1,
    Python = 2,
    Pari = 3,
    Sage = 4,
    Octave = 5,
}

impl TaskClass {
    /// Parse the `program_flag` positional argument (`0..=5`).
    pub fn from_flag(flag: i32) -> Result<Self, PbalaError> {
        match flag {
            0 => Ok(TaskClass::Maple),
            1 => Ok(TaskClass::CBinary),
            2 => Ok(TaskClass::Python),
            3 => Ok(TaskClass::Pari),
            4 => Ok(TaskClass::Sage),
            5 => Ok(TaskClass::Octave),
            other => Err(PbalaError::WrongTaskClass(other)),
        }
    }

    /// Whether the Task Preparer must materialise a wrapper script for
    /// this class before dispatch.
    pub fn needs_preparer(self) -> bool {
        matches!(self, TaskClass::Pari | TaskClass::Sage | TaskClass::Octave)
    }

    /// Short tag used in the `auxprog-<tag>-<id>.<ext>` wrapper filename.
    pub fn preparer_tag(self) -> &'static str {
        match self {
            TaskClass::Pari => "pari",
            TaskClass::Sage => "sage",
            TaskClass::Octave => "octave",
            _ => "",
        }
    }
}

/// One row of the data file: an opaque task id and the verbatim raw
/// argument string handed to the user program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub raw_args: String,
}

impl Task {
    /// Parse one data-file line: `id,arg1,arg2,...`. The id is the first
    /// comma-separated field and must be an integer; `raw_args` is
    /// everything after the first comma, verbatim (no re-splitting here —
    /// the `,` is treated purely as a delimiter, per SPEC_FULL.md §9, so
    /// a line with no comma has empty `raw_args`).
    pub fn parse_line(line: &str, line_no: usize) -> Result<Task, PbalaError> {
        let comma = line.find(',');
        let (id_field, raw_args) = match comma {
            Some(idx) => (&line[..idx], line[idx + 1..].to_string()),
            None => (line, String::new()),
        };
        let id: i64 = id_field
            .parse()
            .map_err(|_| PbalaError::DataFileFirstCol { line: line_no })?;
        Ok(Task { id, raw_args })
    }
}

/// A lazy, line-at-a-time reader over the data file. `count_lines` is a
/// separate up-front pass (the scheduler needs `nTasks` before it starts
/// streaming, to compute `N = min(nTasks, maxConcurrentTasks)`).
pub struct TaskFile {
    reader: BufReader<File>,
    next_line_no: usize,
}

impl TaskFile {
    pub fn open(path: &Path) -> Result<Self, PbalaError> {
        let file = File::open(path).map_err(|_| PbalaError::DataFileOpen {
            path: path.to_path_buf(),
        })?;
        Ok(TaskFile {
            reader: BufReader::new(file),
            next_line_no: 1,
        })
    }

    /// Count the non-empty-file line count without holding the whole file
    /// in memory at once.
    pub fn count_lines(path: &Path) -> Result<usize, PbalaError> {
        let file = File::open(path).map_err(|_| PbalaError::DataFileOpen {
            path: path.to_path_buf(),
        })?;
        let reader = BufReader::new(file);
        let mut n = 0usize;
        for line in reader.lines() {
            line.map_err(|_| PbalaError::DataFileOpen {
                path: path.to_path_buf(),
            })?;
            n += 1;
        }
        Ok(n)
    }
}

impl Iterator for TaskFile {
    type Item = Result<Task, PbalaError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                let line_no = self.next_line_no;
                self.next_line_no += 1;
                Some(Task::parse_line(trimmed, line_no))
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_class_round_trips_through_flag() {
        for flag in 0..=5 {
            let class = TaskClass::from_flag(flag).unwrap();
            assert_eq!(class as u8, flag as u8);
        }
        assert!(TaskClass::from_flag(6).is_err());
        assert!(TaskClass::from_flag(-1).is_err());
    }

    #[test]
    fn preparer_only_needed_for_interpreter_wrappers() {
        assert!(!TaskClass::Maple.needs_preparer());
        assert!(!TaskClass::CBinary.needs_preparer());
        assert!(!TaskClass::Python.needs_preparer());
        assert!(TaskClass::Pari.needs_preparer());
        assert!(TaskClass::Sage.needs_preparer());
        assert!(TaskClass::Octave.needs_preparer());
    }

    #[test]
    fn parses_id_and_raw_args() {
        let task = Task::parse_line("12,3,5,7", 1).unwrap();
        assert_eq!(task.id, 12);
        assert_eq!(task.raw_args, "3,5,7");
    }

    #[test]
    fn parses_id_with_no_further_args() {
        let task = Task::parse_line("12", 1).unwrap();
        assert_eq!(task.id, 12);
        assert_eq!(task.raw_args, "");
    }

    #[test]
    fn rejects_non_integer_id() {
        let err = Task::parse_line("abc,1,2", 7).unwrap_err();
        assert!(matches!(err, PbalaError::DataFileFirstCol { line: 7 }));
    }

    #[test]
    fn stream_counts_and_reads_match() {
        let dir = std::env::temp_dir().join(format!("pbala-task-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data.txt");
        std::fs::write(&path, "1,a\n2,b\n3,c\n").unwrap();

        assert_eq!(TaskFile::count_lines(&path).unwrap(), 3);
        let tasks: Vec<Task> = TaskFile::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[1].id, 2);
        assert_eq!(tasks[1].raw_args, "b");

        std::fs::remove_dir_all(&dir).ok();
    }
}
