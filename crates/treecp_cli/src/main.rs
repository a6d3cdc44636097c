//! `treecp`: copy regular files, symlinks and directories (recursively) into
//! an existing destination directory, keeping permission bits and
//! access/modification times.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tracing_subscriber::{EnvFilter, fmt};
use treecp_io_fs::{N_BYTES_CHUNK_DEFAULT, ReportCopy, SpecCopyOptions, copy_paths};

#[derive(Parser, Debug)]
#[command(
    name = "treecp",
    version,
    about = "Copy files, symlinks and directories into a destination directory",
    long_about = "Copy regular files, symbolic links and directories (recursively) into the\n\
                  directory given as the last argument. Permission bits and access/modification\n\
                  times are preserved; symbolic links are replicated, never followed.",
    override_usage = "treecp [OPTIONS] <PATH>... <DEST_DIR>"
)]
struct Cli {
    /// Source paths followed by the destination directory.
    #[arg(value_name = "PATH", num_args = 2.., required = true)]
    paths: Vec<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only report fatal errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Walk and classify sources without creating anything.
    #[arg(long)]
    dry_run: bool,

    /// Also copy extended attributes of files and directories.
    #[arg(long)]
    xattrs: bool,

    /// Reapply directory timestamps after their contents are copied.
    #[arg(long)]
    restore_dir_times: bool,

    /// Byte-stream chunk size for regular files.
    #[arg(long, value_name = "BYTES", default_value_t = N_BYTES_CHUNK_DEFAULT)]
    chunk_size: usize,
}

impl Cli {
    fn to_copy_options(&self) -> SpecCopyOptions {
        SpecCopyOptions {
            n_bytes_chunk: self.chunk_size,
            if_preserve_xattrs: self.xattrs,
            if_restore_dir_times: self.restore_dir_times,
            if_dry_run: self.dry_run,
        }
    }

    fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<ReportCopy> {
    // clap guarantees at least two values.
    let (path_dir_dst, paths_source) = cli
        .paths
        .split_last()
        .context("missing destination directory")?;
    tracing::debug!(
        "copying {} source(s) into {}",
        paths_source.len(),
        path_dir_dst.display()
    );

    let report = copy_paths(paths_source, path_dir_dst, cli.to_copy_options())?;
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match run(&cli) {
        Ok(report) => {
            tracing::info!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("treecp: {e:#}");
            ExitCode::FAILURE
        }
    }
}
