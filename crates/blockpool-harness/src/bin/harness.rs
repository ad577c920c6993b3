//! CLI entrypoint for the blockpool scenario harness.

use std::io::Write;
use std::path::PathBuf;

use blockpool_core::PoolConfig;
use blockpool_harness::rng::parse_seed;
use blockpool_harness::scenarios::{self, ScenarioParams};
use blockpool_harness::{HarnessError, Scenario, ScenarioOutcome, logging};
use clap::{Parser, Subcommand};

/// Exercise fixed-size block pools and the size-class allocator.
#[derive(Debug, Parser)]
#[command(name = "blockpool-harness")]
#[command(about = "Scenario harness for blockpool")]
struct Cli {
    /// Root seed for randomized scenarios (decimal or 0x...).
    #[arg(long, global = true, default_value = "0xDEAD_BEEF")]
    seed: String,
    /// Emit outcomes as JSON instead of text reports.
    #[arg(long, global = true)]
    json: bool,
    /// Write output to a file instead of stdout.
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    /// Log pool lifecycle events at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Allocate points from a five-block pool, overflow it, and reuse freed blocks.
    Simple,
    /// Time a thousand mixed allocate/free steps.
    Performance,
    /// Check that freed addresses are handed out again.
    Reuse,
    /// Worker threads share one lock-guarded pool of records.
    Threads {
        /// Number of worker threads.
        #[arg(long, default_value_t = 5)]
        threads: usize,
        /// Iterations per worker.
        #[arg(long, default_value_t = 20)]
        iterations: usize,
    },
    /// Compare exclusive and lock-guarded allocate/free cost.
    Compare {
        /// Allocate/free pairs per variant.
        #[arg(long, default_value_t = 10_000)]
        operations: usize,
    },
    /// Eight threads race over a twenty-block pool; reports leaks.
    Race,
    /// Threads take two pools in mixed order; must finish without deadlock.
    TwoPools,
    /// Route every small size through the size-class allocator.
    SizeClasses {
        /// Blocks per class pool (defaults to BLOCKPOOL_BLOCKS_PER_CLASS or 100).
        #[arg(long)]
        blocks_per_class: Option<usize>,
    },
    /// Run every scenario with default parameters.
    All,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let env = PoolConfig::from_env();
    logging::init(cli.verbose || env.verbose);

    let seed = parse_seed(&cli.seed).ok_or_else(|| HarnessError::InvalidSeed(cli.seed.clone()))?;
    let mut params = ScenarioParams {
        seed,
        blocks_per_class: env.blocks_per_class,
        ..ScenarioParams::default()
    };

    let selected: Vec<Scenario> = match cli.command {
        Command::Simple => vec![Scenario::Simple],
        Command::Performance => vec![Scenario::Performance],
        Command::Reuse => vec![Scenario::Reuse],
        Command::Threads {
            threads,
            iterations,
        } => {
            params.threads = threads;
            params.iterations = iterations;
            vec![Scenario::Threads]
        }
        Command::Compare { operations } => {
            params.operations = operations;
            vec![Scenario::Compare]
        }
        Command::Race => vec![Scenario::Race],
        Command::TwoPools => vec![Scenario::TwoPools],
        Command::SizeClasses { blocks_per_class } => {
            if let Some(n) = blocks_per_class {
                params.blocks_per_class = n;
            }
            vec![Scenario::SizeClasses]
        }
        Command::All => Scenario::ALL.to_vec(),
    };

    let outcomes = selected
        .into_iter()
        .map(|scenario| scenarios::run(scenario, &params))
        .collect::<Result<Vec<ScenarioOutcome>, _>>()?;

    let body = if cli.json {
        let mut body = match outcomes.as_slice() {
            [single] => serde_json::to_string_pretty(single)?,
            many => serde_json::to_string_pretty(many)?,
        };
        body.push('\n');
        body
    } else {
        outcomes.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
    };

    match &cli.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &body)?;
            eprintln!("Wrote scenario output to {}", path.display());
        }
        None => std::io::stdout().lock().write_all(body.as_bytes())?,
    }

    let failed: Vec<&'static str> = outcomes
        .iter()
        .filter(|outcome| !outcome.passed())
        .map(|outcome| outcome.scenario().name())
        .collect();
    if !failed.is_empty() {
        for outcome in &outcomes {
            if let Err(err) = outcome.check() {
                eprintln!("{err}");
            }
        }
        return Err(format!("{} scenario(s) failed: {}", failed.len(), failed.join(", ")).into());
    }
    Ok(())
}
