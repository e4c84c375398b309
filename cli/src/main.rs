//! sift CLI: driving adapter for the sift selection engine.
//!
//! Subcommands:
//! - `match <catalog> [--agents] RULE...`: list records matching `property:value` rules
//! - `explain <catalog> [--agents] RULE...`: show how each rule evaluated per record
//! - `agents <catalog> <config>`: run the config's `agents` section
//! - `targets <catalog> <config>`: resolve the config's `targets` section to addresses
//! - `check <config>`: validate a config

mod cli;
mod input;
mod output;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sift::prelude::*;
use sift::Plan;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalOpts, MatchArgs, RunArgs};
use crate::input::{load_document, FileCatalog, LoadError};
use crate::output::{render_explanations, render_selection, Explanation, RenderError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("\"{}\" has no {section} section", path.display())]
    MissingSection { path: PathBuf, section: &'static str },

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over `-v`.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let out = match &cli.command {
        Command::Match(args) => cmd_match(&cli.global, args)?,
        Command::Explain(args) => cmd_explain(&cli.global, args)?,
        Command::Agents(args) => cmd_run(&cli.global, args, Section::Agents)?,
        Command::Targets(args) => cmd_run(&cli.global, args, Section::Targets)?,
        Command::Check { config } => cmd_check(config)?,
    };
    if !out.is_empty() {
        writeln!(std::io::stdout().lock(), "{out}")?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn kind_of(agents: bool) -> RecordKind {
    if agents {
        RecordKind::Agent
    } else {
        RecordKind::Device
    }
}

fn compiler_for(kind: RecordKind) -> RuleCompiler {
    match kind {
        RecordKind::Device => RuleCompiler::default(),
        RecordKind::Agent => RuleCompiler::new(CompileOptions::agents()),
    }
}

fn rng(global: &GlobalOpts) -> StdRng {
    match global.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn parse_fields(fields: &[String], kind: RecordKind) -> Result<Vec<AttributePath>, ConfigError> {
    let style = compiler_for(kind).options().key_style;
    fields.iter().map(|f| AttributePath::parse(f, style)).collect()
}

fn cmd_match(global: &GlobalOpts, args: &MatchArgs) -> Result<String, CliError> {
    let kind = kind_of(args.agents);
    let rules = compiler_for(kind).compile_cli_rules(&args.rules)?;
    let fields = parse_fields(&args.fields, kind)?;
    let pipeline = Pipeline::records(rules, SelectionBounds::unbounded());
    let selection = pipeline.run_with_rng(
        &FileCatalog::new(&args.catalog),
        kind,
        &EvalContext::now(),
        &mut rng(global),
    )?;
    tracing::info!(%kind, matched = selection.len(), "match done");
    Ok(render_selection(
        global.output,
        &selection,
        &fields,
        &format!("No {kind} matches specified rules"),
    )?)
}

fn cmd_explain(global: &GlobalOpts, args: &MatchArgs) -> Result<String, CliError> {
    let kind = kind_of(args.agents);
    let rules = compiler_for(kind).compile_cli_rules(&args.rules)?;
    let records = FileCatalog::new(&args.catalog)
        .fetch(kind)
        .map_err(SelectError::provider)?;
    let ctx = EvalContext::now();
    let explanations: Vec<Explanation> = records
        .iter()
        .map(|record| {
            let trace = rules.filter().evaluate_with_trace(record, &ctx);
            Explanation {
                record: record.label(),
                matched: trace.matched(),
                trace,
            }
        })
        .collect();
    Ok(render_explanations(global.output, &explanations)?)
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Targets,
    Agents,
}

impl Section {
    fn name(self) -> &'static str {
        match self {
            Self::Targets => "targets",
            Self::Agents => "agents",
        }
    }
}

fn load_config(path: &Path) -> Result<SiftConfig, CliError> {
    Ok(load_document(path)?)
}

fn cmd_run(global: &GlobalOpts, args: &RunArgs, section: Section) -> Result<String, CliError> {
    let compiled = load_config(&args.config)?.compile()?;
    let plan = match section {
        Section::Targets => compiled.targets,
        Section::Agents => compiled.agents,
    }
    .ok_or_else(|| CliError::MissingSection {
        path: args.config.clone(),
        section: section.name(),
    })?;

    let kind = match (&plan, section) {
        (Plan::Select { kind, .. }, _) => *kind,
        (Plan::Explicit(_), Section::Targets) => RecordKind::Device,
        (Plan::Explicit(_), Section::Agents) => RecordKind::Agent,
    };
    let fields = parse_fields(&args.fields, kind)?;
    let catalog = FileCatalog::new(&args.catalog);
    let selection = plan.execute(&catalog, &EvalContext::now(), &mut rng(global))?;
    tracing::info!(section = section.name(), selected = selection.len(), "selection done");
    Ok(render_selection(
        global.output,
        &selection,
        &fields,
        &format!("No {} selected", section.name()),
    )?)
}

fn cmd_check(path: &Path) -> Result<String, CliError> {
    let compiled = load_config(path)?.compile()?;
    let mut lines = vec!["Config valid".to_owned()];
    for (name, plan) in [("targets", &compiled.targets), ("agents", &compiled.agents)] {
        let line = match plan {
            None => continue,
            Some(Plan::Explicit(selection)) => {
                format!("  {name}: explicit list of {}", selection.len())
            }
            Some(Plan::Select { pipeline, .. }) => format!(
                "  {name}: rule depth {}{}",
                pipeline.rules().filter().depth(),
                if pipeline.rules().one_of_each().is_some() {
                    ", one_of_each"
                } else {
                    ""
                }
            ),
        };
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
