//! Distinct-error-kind-per-failure-class taxonomy and the stable process
//! exit codes each kind maps to (see SPEC_FULL.md §6/§7/§10.2).
//!
//! Numeric values below 23 are in the same range as the original
//! `antz_errcodes.h`, but not verbatim: this rewrite merges the original's
//! separate `E_NODE_LINES`/`E_DATAFILE_LINES` line-count classes into the
//! corresponding open/read variants below, which shifts every code after
//! them down by one from its original value. Distinctness is preserved
//! (see `exit_codes_are_distinct`), the original numbering is not. Values
//! 23+ are new (the original header defined `E_PVM_DUP`/`E_IO`/`E_MPL` in
//! a sibling file that wasn't preserved in the retrieved source, so this
//! rewrite assigns them fresh, contiguous codes instead of guessing the
//! originals).

use std::path::PathBuf;

/// A stable process exit code, one per [`PbalaError`] variant.
pub type ExitCode = i32;

#[derive(Debug, thiserror::Error)]
pub enum PbalaError {
    #[error("error reading arguments")]
    Args,

    #[error("cannot open node file {path}")]
    NodeFileOpen { path: PathBuf },

    #[error("cannot read node file {path}: {source}")]
    NodeFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot resolve current working directory: {source}")]
    Cwd {
        #[source]
        source: std::io::Error,
    },

    #[error("could not determine this process's transport endpoint id")]
    TransportSelfId,

    #[error("parent transport endpoint id is invalid")]
    TransportParentId,

    #[error("cannot open data file {path}")]
    DataFileOpen { path: PathBuf },

    #[error("cannot open output file {path}: {source}")]
    OutfileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} creating worker {1} on node {2}")]
    WorkerSpawn(String, usize, String),

    #[error("first column of data file must be an integer task id (line {line})")]
    DataFileFirstCol { line: usize },

    #[error("cannot create output directory {path}: {source}")]
    OutDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("wrong task_type value {0} (must be one of: 0,1,2,3,4,5)")]
    WrongTaskClass(i32),

    #[error("could not start transport after {attempts} attempts (duplicate host)")]
    DuplicateHost { attempts: u32 },

    #[error("I/O error while preparing auxiliary script for task {task_id}: {source}")]
    PreparerIo {
        task_id: i64,
        #[source]
        source: std::io::Error,
    },

    #[error("could not rewrite Maple source {path} for single-core execution: {source}")]
    MapleRewrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write transport hostfile {path}: {source}")]
    HostfileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transport failed mid-run: {0}")]
    TransportRuntime(String),
}

impl PbalaError {
    /// The stable exit code a CLI `main` should terminate the process with.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            PbalaError::Args => 10,
            PbalaError::NodeFileOpen { .. } => 11,
            PbalaError::NodeFileRead { .. } => 12,
            PbalaError::Cwd { .. } => 13,
            PbalaError::TransportSelfId => 14,
            PbalaError::TransportParentId => 15,
            PbalaError::DataFileOpen { .. } => 16,
            PbalaError::OutfileOpen { .. } => 17,
            PbalaError::WorkerSpawn(..) => 18,
            PbalaError::DataFileFirstCol { .. } => 19,
            PbalaError::OutDirCreate { .. } => 20,
            PbalaError::WrongTaskClass(_) => 21,
            PbalaError::DuplicateHost { .. } => 22,
            PbalaError::PreparerIo { .. } => 23,
            PbalaError::MapleRewrite { .. } => 24,
            PbalaError::HostfileWrite { .. } => 25,
            PbalaError::TransportRuntime(_) => 26,
        }
    }
}
