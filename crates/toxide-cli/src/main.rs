//! Toxide - Factor-Matrix Test Orchestrator CLI
//!
//! The `toxide` command resolves a factor matrix from `toxide.toml`
//! and runs test environments against it.
//!
//! ## Commands
//!
//! - `list`: List the environments of the resolved schedule
//! - `show`: Show the resolved pipeline for one environment
//! - `run`: Execute environments and report per-cell outcomes
//! - `check`: Check matrix and CI axes for consistency
//! - `ci-matrix`: Print the CI view of the matrix

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use toxide_core::{
    check_consistency, host_platform, init_tracing, level_for, CiSchedule, MatrixConfig, Schedule,
};
use toxide_exec::{PathProbe, ProcessRunner, RunOptions, ScheduleExecutor};

#[derive(Parser)]
#[command(name = "toxide")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Factor-matrix test orchestrator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to the matrix configuration
    #[arg(short, long, global = true, default_value = "toxide.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the environments of the resolved schedule
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved pipeline for one environment
    Show {
        /// Environment identifier
        env: String,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute environments and report per-cell outcomes
    Run {
        /// Environments to run (default: every cell of the schedule)
        envs: Vec<String>,

        /// Skip cells whose interpreter is not installed
        #[arg(long)]
        skip_missing_interpreters: bool,

        /// Cells to execute concurrently
        #[arg(long, default_value_t = 1)]
        parallel: usize,

        /// Platform label to resolve the schedule for (default: host OS)
        #[arg(long)]
        platform: Option<String>,

        /// Write the JSON run report to this path
        #[arg(long)]
        report_file: Option<PathBuf>,
    },

    /// Check matrix and CI axes for consistency
    Check {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the CI view of the matrix
    CiMatrix {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_json, level_for(cli.verbose));

    let config = MatrixConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::List { json } => cmd_list(&config, json),
        Commands::Show { env, json } => cmd_show(&config, &env, json),
        Commands::Run {
            envs,
            skip_missing_interpreters,
            parallel,
            platform,
            report_file,
        } => {
            cmd_run(
                &config,
                &envs,
                skip_missing_interpreters,
                parallel,
                platform.as_deref(),
                report_file.as_deref(),
            )
            .await
        }
        Commands::Check { json } => cmd_check(&config, json),
        Commands::CiMatrix { json } => cmd_ci_matrix(&config, json),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct ListOutput {
    platform: String,
    digest: String,
    envs: Vec<String>,
}

impl ListOutput {
    fn from_schedule(schedule: &Schedule) -> Result<Self> {
        Ok(Self {
            platform: schedule.platform.clone(),
            digest: schedule.digest()?,
            envs: schedule.env_names().iter().map(|e| e.to_string()).collect(),
        })
    }
}

fn cmd_list(config: &MatrixConfig, json: bool) -> Result<()> {
    let schedule = Schedule::build(config, &host_platform())?;

    if json {
        let output = ListOutput::from_schedule(&schedule)?;
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for env in schedule.env_names() {
            println!("{}", env);
        }
    }
    Ok(())
}

fn cmd_show(config: &MatrixConfig, env: &str, json: bool) -> Result<()> {
    let schedule = Schedule::build(config, &host_platform())?;
    let cells = schedule.select(&[env.to_string()])?;
    let cell = cells.first().context("environment not in schedule")?;

    if json {
        println!("{}", serde_json::to_string_pretty(cell)?);
        return Ok(());
    }

    println!("environment: {}", cell.env);
    println!("role: {}", cell.pipeline.role);
    println!("interpreter: {}", cell.pipeline.exe);
    if let Some(dir) = &cell.pipeline.changedir {
        println!("changedir: {}", dir.display());
    }
    if !cell.pipeline.deps.is_empty() {
        println!("deps:");
        for dep in &cell.pipeline.deps {
            println!("  - {}", dep);
        }
    }
    println!("commands:");
    for argv in cell.pipeline.command_sequence() {
        println!("  $ {}", argv.join(" "));
    }
    if !cell.pipeline.externals.is_empty() {
        println!("externals: {}", cell.pipeline.externals.join(", "));
    }
    Ok(())
}

async fn cmd_run(
    config: &MatrixConfig,
    envs: &[String],
    skip_missing_interpreters: bool,
    parallel: usize,
    platform: Option<&str>,
    report_file: Option<&Path>,
) -> Result<()> {
    let platform = platform.map(str::to_string).unwrap_or_else(host_platform);
    let schedule = Schedule::build(config, &platform)?;
    let cells = schedule.select(envs)?;

    for finding in &check_consistency(config)?.findings {
        warn!(finding = %finding, "Matrix views are inconsistent");
    }

    println!("Platform: {}", platform);
    println!("Schedule digest: {}", schedule.digest()?);
    println!("Running {} environment(s)", cells.len());
    println!();

    let options = RunOptions {
        skip_missing_interpreters: skip_missing_interpreters
            || config.matrix.skip_missing_interpreters,
        timeout_secs: config.env.command_timeout_secs,
        parallel,
        allowlist_externals: config.env.allowlist_externals.clone(),
    };

    let runner = ProcessRunner::new();
    let probe = PathProbe::new();
    let executor = ScheduleExecutor::new(&runner, &probe, options);
    let report = executor
        .run(&schedule, &cells)
        .await
        .context("failed to execute schedule")?;

    for cell in &report.cells {
        let mark = if cell.status.is_ok() { "✓" } else { "✗" };
        match &cell.reason {
            Some(reason) => println!(
                "  {} {} ({}ms, {}): {}",
                mark, cell.env, cell.duration_ms, cell.status, reason
            ),
            None => println!("  {} {} ({}ms, {})", mark, cell.env, cell.duration_ms, cell.status),
        }
    }

    println!();
    println!("Summary: {}", report.summary());

    if let Some(path) = report_file {
        report
            .write_json(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if report.success() {
        println!("\n✓ All environments passed!");
        Ok(())
    } else {
        anyhow::bail!(
            "{} of {} environments did not pass",
            report.failed_count() + report.errored_count(),
            report.cells.len()
        )
    }
}

fn cmd_check(config: &MatrixConfig, json: bool) -> Result<()> {
    let report = check_consistency(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.consistent() {
        println!("✓ Matrix and CI axes are consistent");
    } else {
        println!("✗ Found {} finding(s):", report.findings.len());
        for finding in &report.findings {
            println!("  - {}", finding);
        }
    }

    if report.consistent() {
        Ok(())
    } else {
        anyhow::bail!("matrix and CI axes are inconsistent")
    }
}

fn cmd_ci_matrix(config: &MatrixConfig, json: bool) -> Result<()> {
    let ci = CiSchedule::build(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ci)?);
    } else if ci.cells.is_empty() {
        println!("No CI matrix configured");
    } else {
        println!("fail-fast: {}", ci.fail_fast);
        for cell in &ci.cells {
            println!("  {} / {} -> {}", cell.os, cell.python, cell.env);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [matrix]
        envlist = ["py{37,38}", "docs"]

        [factors]
        interpreters = ["py"]
        tools = ["docs"]

        [env]
        deps = ["lxml"]
        commands = [["python", "-m", "unittest"]]

        [[role]]
        name = "docs"
        when = { type = "atom", atom = "docs" }
        commands = [["make", "-C", "doc", "html"]]

        [ci]
        os = ["ubuntu-latest"]
        python = ["3.7", "3.8"]
    "#;

    fn config() -> MatrixConfig {
        MatrixConfig::from_toml_str(CONFIG).expect("parse failed")
    }

    #[test]
    fn test_cmd_list_and_show() {
        let config = config();
        cmd_list(&config, false).expect("list failed");
        cmd_list(&config, true).expect("list --json failed");
        cmd_show(&config, "py38", false).expect("show failed");
        cmd_show(&config, "docs", true).expect("show --json failed");

        let err = cmd_show(&config, "py999", false).expect_err("unknown env should fail");
        assert!(err.to_string().contains("py999"));
    }

    #[test]
    fn test_list_output_carries_schedule_fields() {
        let config = config();
        let schedule = Schedule::build(&config, "ubuntu-latest").expect("build failed");
        let output = ListOutput::from_schedule(&schedule).expect("output failed");

        assert_eq!(output.platform, "ubuntu-latest");
        assert_eq!(output.envs, vec!["py37", "py38", "docs"]);

        let value = serde_json::to_value(&output).expect("serialize failed");
        assert_eq!(value["envs"][0], "py37");
        assert_eq!(value["digest"], output.digest);
    }

    #[test]
    fn test_cmd_check_reports_inconsistency() {
        let config = config();
        cmd_check(&config, false).expect("consistent matrix should pass");

        let mut broken = config;
        broken.ci.python.push("3.11".to_string());
        let err = cmd_check(&broken, false).expect_err("expected inconsistency");
        assert!(err.to_string().contains("inconsistent"));
    }

    #[test]
    fn test_cmd_ci_matrix() {
        let config = config();
        cmd_ci_matrix(&config, false).expect("ci-matrix failed");
        cmd_ci_matrix(&config, true).expect("ci-matrix --json failed");
    }

    #[test]
    fn test_config_loads_from_disk_then_lists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("toxide.toml");
        std::fs::write(&path, CONFIG).expect("write config");

        let config = MatrixConfig::load(&path).expect("load failed");
        cmd_list(&config, false).expect("list failed");
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "toxide",
            "run",
            "py38",
            "docs",
            "--parallel",
            "4",
            "--skip-missing-interpreters",
            "--report-file",
            "report.json",
        ])
        .expect("parse failed");

        match cli.command {
            Commands::Run {
                envs,
                skip_missing_interpreters,
                parallel,
                report_file,
                ..
            } => {
                assert_eq!(envs, vec!["py38", "docs"]);
                assert!(skip_missing_interpreters);
                assert_eq!(parallel, 4);
                assert_eq!(report_file, Some(PathBuf::from("report.json")));
            }
            _ => panic!("expected run command"),
        }
    }
}
