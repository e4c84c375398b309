//! Clap derive structures for the `sift` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// sift -- select devices, agents and target addresses from a catalog
#[derive(Debug, Parser)]
#[command(
    name = "sift",
    version,
    about = "Select devices, agents and target addresses with declarative rules",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'o', env = "SIFT_OUTPUT", default_value = "brief", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Seed for `randomize`, for reproducible selections
    #[arg(long, env = "SIFT_SEED", global = true)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One item per line
    Brief,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List records matching `property:value` rules
    Match(MatchArgs),

    /// Print, per record, how each rule evaluated
    Explain(MatchArgs),

    /// Run the `agents` section of a config
    Agents(RunArgs),

    /// Resolve the `targets` section of a config to addresses
    Targets(RunArgs),

    /// Validate a config without touching a catalog
    Check {
        /// Config file (YAML, or JSON by extension)
        config: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Catalog file with `devices` and `agents` lists
    pub catalog: PathBuf,

    /// Match agents instead of devices
    #[arg(long)]
    pub agents: bool,

    /// Attributes to print in brief output (comma-separated paths)
    #[arg(long, short = 'f', value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Rules of the form `property:value`
    #[arg(required = true)]
    pub rules: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Catalog file with `devices` and `agents` lists
    pub catalog: PathBuf,

    /// Config file (YAML, or JSON by extension)
    pub config: PathBuf,

    /// Attributes to print in brief output (comma-separated paths)
    #[arg(long, short = 'f', value_delimiter = ',')]
    pub fields: Vec<String>,
}
