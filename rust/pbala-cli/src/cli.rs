//! Command-line surface (SPEC_FULL.md §6). Grounded in shape on
//! `lumen-cli`'s `clap::Parser` usage, flattened from subcommands to
//! `PBala.c`'s `argp`-style flat positional+flags surface.

use std::path::PathBuf;

use clap::Parser;
use pbala_core::PbalaError;

#[derive(Debug, Parser)]
#[command(
    name = "pbala",
    version,
    about = "Fan a batch of parameterised program invocations out to worker slots on remote compute nodes"
)]
pub struct Args {
    /// 0=MAPLE 1=C_BINARY 2=PYTHON 3=PARI 4=SAGE 5=OCTAVE
    pub program_flag: Option<i32>,
    pub program_file: Option<String>,
    pub data_file: Option<String>,
    pub node_file: Option<String>,
    pub out_dir: Option<String>,

    /// Tear down any running transport and exit. Ignores positionals.
    #[arg(short = 'k', long)]
    pub kill: bool,

    /// Per-task memory bound in KB; 0 selects the generic gate.
    #[arg(short = 'm', long = "max-mem-size")]
    pub max_mem_size: Option<u64>,

    /// Rewrite the Maple source to force a single-core kernel before running.
    #[arg(short = 's', long = "maple-single-core")]
    pub maple_single_core: bool,

    /// Bare flag: `-e`/`--create-errfiles` means true, same as `-e true`.
    #[arg(short = 'e', long = "create-errfiles", num_args(0..=1), default_missing_value = "true")]
    pub create_errfiles: Option<bool>,

    /// Bare flag: `--create-memfiles` means true, same as `--create-memfiles true`.
    #[arg(long = "create-memfiles", num_args(0..=1), default_missing_value = "true")]
    pub create_memfiles: Option<bool>,

    /// Bare flag: `--create-slavefile` means true, same as `--create-slavefile true`.
    #[arg(long = "create-slavefile", num_args(0..=1), default_missing_value = "true")]
    pub create_slavefile: Option<bool>,

    /// Override the default interpreter binary (`maple`/`python`/`gp`/`sage`/`octave`)
    /// with a custom one; `pbala-worker` itself is always the process spawned.
    #[arg(short = 'c', long = "custom-process")]
    pub custom_process: Option<String>,
}

/// `Args` after validation and config-file defaulting: either a kill
/// request, or a fully-resolved run.
pub enum Resolved {
    Kill,
    Run(RunArgs),
}

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub program_flag: i32,
    pub program_file: PathBuf,
    pub data_file: PathBuf,
    pub node_file: PathBuf,
    pub out_dir: PathBuf,
    pub max_mem_size_kb: u64,
    pub maple_single_core: bool,
    pub create_errfiles: bool,
    pub create_memfiles: bool,
    pub create_slavefile: bool,
    pub custom_process: Option<PathBuf>,
}

impl Args {
    /// Apply config-file defaults, then validate. `defaults` supplies
    /// fallbacks for the optional flags only when the CLI left them
    /// unset; an explicit CLI flag always wins (SPEC_FULL.md §10.3).
    pub fn resolve(self, defaults: &crate::config::Defaults) -> Result<Resolved, PbalaError> {
        if self.kill {
            return Ok(Resolved::Kill);
        }

        let program_flag = self.program_flag.ok_or(PbalaError::Args)?;
        let program_file = self.program_file.ok_or(PbalaError::Args)?;
        let data_file = self.data_file.ok_or(PbalaError::Args)?;
        let node_file = self.node_file.ok_or(PbalaError::Args)?;
        let out_dir = self.out_dir.ok_or(PbalaError::Args)?;

        Ok(Resolved::Run(RunArgs {
            program_flag,
            program_file: PathBuf::from(program_file),
            data_file: PathBuf::from(data_file),
            node_file: PathBuf::from(node_file),
            out_dir: PathBuf::from(out_dir),
            max_mem_size_kb: self.max_mem_size.or(defaults.max_mem_size).unwrap_or(0),
            maple_single_core: self.maple_single_core,
            create_errfiles: self.create_errfiles.or(defaults.create_errfiles).unwrap_or(false),
            create_memfiles: self.create_memfiles.or(defaults.create_memfiles).unwrap_or(false),
            create_slavefile: self.create_slavefile.or(defaults.create_slavefile).unwrap_or(false),
            custom_process: self.custom_process.map(PathBuf::from),
        }))
    }
}
