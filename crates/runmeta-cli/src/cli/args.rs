use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "runmeta",
    version,
    about = "Run metadata for experiment tracking: probe the environment, keep a heartbeat on disk"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Probe the environment once and write the metadata file
    Collect(CollectArgs),
    /// Run a command, re-writing its metadata until it exits
    Run(RunArgs),
    /// Print the metadata file of a run directory
    Show(ShowArgs),
    Version,
}

/// Options shared by every command that builds run metadata.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct MetaArgs {
    /// Run directory receiving wandb-metadata.json (default: $RUNMETA_DIR or .)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Entry-point file recorded as the program
    #[arg(long)]
    pub program: Option<PathBuf>,

    /// Runtime version recorded under "python"
    #[arg(long)]
    pub runtime_version: Option<String>,

    /// Host name override
    #[arg(long)]
    pub host: Option<String>,

    /// Username override
    #[arg(long)]
    pub username: Option<String>,

    /// Container identifier
    #[arg(long)]
    pub docker: Option<String>,

    /// Skip code capture and VCS recording
    #[arg(long)]
    pub disable_code: bool,

    /// Do not query git in the working directory
    #[arg(long)]
    pub no_git: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CollectArgs {
    #[command(flatten)]
    pub meta: MetaArgs,

    /// Print probe outcomes as JSON
    #[arg(long)]
    pub json: bool,

    /// Program arguments to record (after `--`)
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub meta: MetaArgs,

    /// Heartbeat interval in seconds (default: $RUNMETA_HEARTBEAT_SECS or 15)
    #[arg(long)]
    pub heartbeat_secs: Option<u64>,

    /// Command to run
    #[arg(allow_hyphen_values = true, required = true, trailing_var_arg = true)]
    pub command: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ShowArgs {
    /// Run directory (default: $RUNMETA_DIR or .)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print a single field
    #[arg(long)]
    pub field: Option<String>,
}
