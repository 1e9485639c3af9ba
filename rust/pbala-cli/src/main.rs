//! `pbala`: the master scheduler's CLI entry point.

use clap::Parser;
use pbala_cli::cli::{Args, Resolved};
use pbala_cli::config::Defaults;
use pbala_cli::error_chain::format_error_chain;
use pbala_cli::{kill, master};
use pbala_core::{Node, PbalaError};
use pbala_transport::{ProcessTransport, WorkerLauncher};

fn main() {
    let args = Args::parse();
    let defaults = Defaults::load();

    if let Err(err) = run(args, &defaults) {
        eprintln!("{}", format_error_chain(&err));
        std::process::exit(err.exit_code());
    }
}

fn run(args: Args, defaults: &Defaults) -> Result<(), PbalaError> {
    match args.resolve(defaults)? {
        Resolved::Kill => {
            let cwd = std::env::current_dir().map_err(|source| PbalaError::Cwd { source })?;
            kill::run(&cwd);
            Ok(())
        }
        Resolved::Run(run_args) => {
            let cwd = std::env::current_dir().map_err(|source| PbalaError::Cwd { source })?;
            let nodes = Node::parse_file(&run_args.node_file)?;
            let all_local = nodes.iter().all(|n| n.hostname == "localhost" || n.hostname == "127.0.0.1");
            let launcher = if all_local {
                WorkerLauncher::Local {
                    binary: "pbala-worker".to_string(),
                }
            } else {
                WorkerLauncher::Ssh {
                    binary: "pbala-worker".to_string(),
                }
            };
            let mut transport = ProcessTransport::new(launcher);
            let mut stdout = std::io::stdout();
            master::run(&run_args, &cwd, &mut transport, &mut stdout)?;
            Ok(())
        }
    }
}
