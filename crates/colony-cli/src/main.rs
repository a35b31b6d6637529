//! Colony CLI
//!
//! Loads scenario files and drives the scheduler frame by frame.
//!
//! # Usage
//! ```bash
//! colony validate colony.toml
//! colony plan colony.toml
//! colony simulate colony.toml --ticks 200 --dt 0.5 --json
//! colony demo --seed 42 --agents 6
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use colony_core::validation::TaskValidator;
use colony_core::{SchedulerConfig, TaskId};

mod driver;
mod scenario;

use driver::Run;
use scenario::Scenario;

/// Colony - task scheduler for simulated settlements
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Scheduler configuration file; overrides a scenario's [config] table
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every task definition in a scenario
    Validate {
        scenario: PathBuf,
    },

    /// Show execution order, executable tasks and the critical path
    Plan {
        scenario: PathBuf,
    },

    /// Run a scenario frame by frame
    Simulate {
        scenario: PathBuf,

        /// Maximum number of frames
        #[arg(long, default_value = "100")]
        ticks: u32,

        /// Seconds per frame
        #[arg(long, default_value = "1.0")]
        dt: f64,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Simulate a randomly generated colony
    Demo {
        /// Seed for the colony generator
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of settlers
        #[arg(long, default_value = "6")]
        agents: usize,

        /// Maximum number of frames
        #[arg(long, default_value = "100")]
        ticks: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Validate { scenario } => {
            let scenario = Scenario::load(scenario)?;
            let config = resolve_config(cli.config.as_deref(), &scenario)?;
            validate(&scenario, &config)?;
        }
        Commands::Plan { scenario } => {
            let scenario = Scenario::load(scenario)?;
            let config = resolve_config(cli.config.as_deref(), &scenario)?;
            plan(&scenario, config)?;
        }
        Commands::Simulate {
            scenario,
            ticks,
            dt,
            json,
        } => {
            if !(dt.is_finite() && *dt > 0.0) {
                bail!("--dt must be a positive number of seconds");
            }
            let scenario = Scenario::load(scenario)?;
            let config = resolve_config(cli.config.as_deref(), &scenario)?;
            let mut run = Run::new(&scenario, config)?;
            let frames = run.simulate(*ticks, *dt);
            if *json {
                println!("{}", run.report().to_json()?);
            } else {
                run.print_summary(frames);
            }
        }
        Commands::Demo {
            seed,
            agents,
            ticks,
        } => {
            let scenario = Scenario::random(*seed, *agents);
            let config = resolve_config(cli.config.as_deref(), &scenario)?;
            println!(
                "Demo colony: seed {}, {} settlers, {} tasks",
                seed,
                scenario.agents.len(),
                scenario.tasks.len()
            );
            let mut run = Run::new(&scenario, config)?;
            let frames = run.simulate(*ticks, 1.0);
            run.print_summary(frames);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

/// `--config` wins over the scenario's own table, which wins over defaults
fn resolve_config(path: Option<&Path>, scenario: &Scenario) -> Result<SchedulerConfig> {
    match (path, &scenario.config) {
        (Some(path), _) => Ok(SchedulerConfig::from_file(path)?),
        (None, Some(config)) => Ok(config.clone()),
        (None, None) => Ok(SchedulerConfig::default()),
    }
}

fn validate(scenario: &Scenario, config: &SchedulerConfig) -> Result<()> {
    let resolved = scenario.resolve()?;
    let validator = TaskValidator::new(config.validation.clone());
    let now = colony_core::types::now();
    let declared: Vec<TaskId> = resolved.definitions.iter().filter_map(|d| d.id).collect();

    let mut failed = 0;
    for def in &resolved.definitions {
        let mut report = validator.validate_definition(def, now);
        report.merge(validator.validate_dependencies(def, |id| declared.contains(&id)));

        let key = def.id.map(|id| resolved.key(id)).unwrap_or("?");
        if report.is_valid() {
            println!("✓ {}", key);
        } else {
            failed += 1;
            println!("✗ {}", key);
        }
        for issue in &report.errors {
            println!("    error: {}", issue);
        }
        for issue in &report.warnings {
            println!("    warning: {}", issue);
        }
    }

    if failed > 0 {
        bail!("{} of {} task(s) failed validation", failed, resolved.definitions.len());
    }
    println!("All {} task(s) valid", resolved.definitions.len());
    Ok(())
}

fn plan(scenario: &Scenario, config: SchedulerConfig) -> Result<()> {
    let run = Run::new(scenario, config)?;
    let manager = run.scheduler.manager();
    let label = |id: TaskId| run.tasks.key(id).to_string();

    println!("EXECUTION ORDER");
    for (step, id) in manager.topological_order()?.into_iter().enumerate() {
        println!("  {:>2}. {}", step + 1, label(id));
    }

    let executable: Vec<String> = manager.executable_tasks().into_iter().map(label).collect();
    println!();
    println!("READY NOW: {}", executable.join(", "));

    let path = manager.critical_path();
    let length: f64 = path
        .iter()
        .filter_map(|id| manager.task(*id))
        .map(|t| t.definition().estimated_duration)
        .sum();
    let names: Vec<String> = path.into_iter().map(label).collect();
    println!("CRITICAL PATH ({:.1}s): {}", length, names.join(" -> "));

    if let Some(cycle) = manager.graph().detect_cycle() {
        let names: Vec<String> = cycle.into_iter().map(label).collect();
        println!("WARNING: cycle detected through {}", names.join(", "));
    }
    Ok(())
}
