//! changeplan - change-impact test planning CLI
//!
//! Reads a list of changed file paths and emits a JSON test execution plan.
//!
//! ## Commands
//!
//! - `plan`: Run the full pipeline and print or write the plan
//! - `analyze`: Print the change analysis without planning
//! - `policy`: Show the branch policy a branch resolves to
//! - `catalog`: Show the resolved test catalog

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use changeplan_core::{
    write_analysis_json, write_plan_json, GroupingStrategy, PlanRequest, Planner, PlannerConfig,
};

#[derive(Parser)]
#[command(name = "changeplan")]
#[command(version = changeplan_core::VERSION)]
#[command(about = "Plan which tests a change needs, in dependency order", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an execution plan for a change set
    Plan {
        /// Branch the change targets (e.g. main, feature/x, refs/heads/develop)
        #[arg(short, long)]
        branch: String,

        /// Selection mode override (full, comprehensive, minimal, targeted, smart)
        #[arg(short, long)]
        mode: Option<String>,

        /// File with one changed path per line; `-` or omitted reads stdin
        #[arg(short, long)]
        files: Option<PathBuf>,

        /// Planner configuration (TOML)
        #[arg(short, long, env = "CHANGEPLAN_CONFIG")]
        config: Option<PathBuf>,

        /// Use the single-pass grouping older plans were produced with
        #[arg(long)]
        legacy_grouping: bool,

        /// Write the plan here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the change analysis document here
        #[arg(long)]
        analysis_output: Option<PathBuf>,

        /// Plan timestamp (RFC 3339); defaults to now
        #[arg(long, value_parser = parse_timestamp)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Classify a change set and score its impact
    Analyze {
        /// File with one changed path per line; `-` or omitted reads stdin
        #[arg(short, long)]
        files: Option<PathBuf>,
    },

    /// Show the policy a branch resolves to
    Policy {
        #[arg(short, long)]
        branch: String,

        /// Planner configuration (TOML)
        #[arg(short, long, env = "CHANGEPLAN_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show the resolved test catalog
    Catalog {
        /// Planner configuration (TOML)
        #[arg(short, long, env = "CHANGEPLAN_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON documents.
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    changeplan_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Plan {
            branch,
            mode,
            files,
            config,
            legacy_grouping,
            output,
            analysis_output,
            timestamp,
        } => cmd_plan(PlanArgs {
            branch,
            mode,
            files,
            config,
            legacy_grouping,
            output,
            analysis_output,
            timestamp: timestamp.unwrap_or_else(Utc::now),
        }),
        Commands::Analyze { files } => cmd_analyze(files.as_deref()),
        Commands::Policy { branch, config } => cmd_policy(&branch, config.as_deref()),
        Commands::Catalog { config } => cmd_catalog(config.as_deref()),
    }
}

struct PlanArgs {
    branch: String,
    mode: Option<String>,
    files: Option<PathBuf>,
    config: Option<PathBuf>,
    legacy_grouping: bool,
    output: Option<PathBuf>,
    analysis_output: Option<PathBuf>,
    timestamp: DateTime<Utc>,
}

fn cmd_plan(args: PlanArgs) -> Result<()> {
    let planner = load_planner(args.config.as_deref())?;
    let paths = read_changed_paths(args.files.as_deref())?;

    let mut request = PlanRequest::new(paths, args.branch, args.timestamp);
    if let Some(mode) = args.mode {
        request = request.with_mode(mode);
    }
    if args.legacy_grouping {
        request = request.with_grouping(GroupingStrategy::Legacy);
    }

    let plan = planner
        .plan(&request)
        .with_context(|| format!("Failed to plan tests for branch '{}'", request.branch))?;

    if let Some(path) = &args.analysis_output {
        let document = planner.analyze(&request.changed_paths, request.generated_at);
        write_analysis_json(path, &document)
            .with_context(|| format!("Failed to write change analysis to {:?}", path))?;
        info!(event = "analysis.written", path = %path.display());
    }

    match &args.output {
        Some(path) => {
            write_plan_json(path, &plan)
                .with_context(|| format!("Failed to write plan to {:?}", path))?;
            info!(event = "plan.written", path = %path.display(), tests = plan.total_tests);
        }
        None => print_json(&plan)?,
    }
    Ok(())
}

fn cmd_analyze(files: Option<&Path>) -> Result<()> {
    let planner = Planner::builtin().context("Failed to build classification rules")?;
    let paths = read_changed_paths(files)?;
    print_json(&planner.analyze(&paths, Utc::now()))
}

fn cmd_policy(branch: &str, config: Option<&Path>) -> Result<()> {
    let planner = load_planner(config)?;
    print_json(planner.config().policies.resolve(branch))
}

fn cmd_catalog(config: Option<&Path>) -> Result<()> {
    let planner = load_planner(config)?;
    let entries: BTreeMap<_, _> = planner.config().catalog.iter().collect();
    print_json(&entries)
}

fn load_planner(config: Option<&Path>) -> Result<Planner> {
    let config = PlannerConfig::load_or_default(config).context("Failed to load configuration")?;
    Planner::new(config).context("Failed to build classification rules")
}

/// One path per line; blank lines and `#` comments are skipped.
fn read_changed_paths(source: Option<&Path>) -> Result<Vec<String>> {
    let content = match source {
        None => read_stdin()?,
        Some(path) if path == Path::new("-") => read_stdin()?,
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read changed paths from {:?}", path))?,
    };
    Ok(parse_path_list(&content))
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read changed paths from stdin")?;
    Ok(content)
}

fn parse_path_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", raw, e))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_path_list_skips_blanks_and_comments() {
        let paths = parse_path_list("  terraform/main.tf \n\n# generated\nflink/a.sql\n   \n");
        assert_eq!(paths, vec!["terraform/main.tf", "flink/a.sql"]);
    }

    #[test]
    fn test_parse_timestamp() {
        let t = parse_timestamp("2026-01-01T10:00:00+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-01-01T08:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_plan_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "changeplan",
            "plan",
            "--branch",
            "hotfix/x",
            "--mode",
            "minimal",
            "--legacy-grouping",
            "--timestamp",
            "2026-01-01T00:00:00Z",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan {
                branch,
                mode,
                legacy_grouping,
                timestamp,
                ..
            } => {
                assert_eq!(branch, "hotfix/x");
                assert_eq!(mode.as_deref(), Some("minimal"));
                assert!(legacy_grouping);
                assert!(timestamp.is_some());
            }
            _ => panic!("expected plan subcommand"),
        }
    }

    #[test]
    fn test_read_changed_paths_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "./docs/a.md\nMakefile").unwrap();

        let paths = read_changed_paths(Some(file.path())).unwrap();
        assert_eq!(paths, vec!["./docs/a.md", "Makefile"]);
    }
}
