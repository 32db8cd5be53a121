//! Neighbourhood selection CLI binary.
//!
//! Runs adaptive neighbour-selection simulations.
//!
//! # Commands
//!
//! - `run` - Run a simulation scenario
//! - `gamma` - Print gamma variates
//! - `strategies` - List selection strategies

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use neighbourhood::{
    random::{Gamma, DEFAULT_GAMMA_SEED},
    sim::{output_paths, Recorder, RunSummary},
    Config, NodeId, Overrides, Simulator, Strategy, VERSION,
};

#[derive(Parser)]
#[command(name = "neighbourhood")]
#[command(version = VERSION)]
#[command(about = "Adaptive neighbour selection in dynamic networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation scenario
    Run {
        /// Scenario file (default: <config dir>/neighbourhood/config.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of timesteps
        #[arg(short = 'n', long)]
        steps: Option<u64>,

        /// Number of nodes
        #[arg(long)]
        nodes: Option<u32>,

        /// Strategy for nodes without an override
        #[arg(long)]
        strategy: Option<String>,

        /// Write per-step traces to <PREFIX>.taus, .node_utilities and
        /// .conjoint_utilities
        #[arg(short, long, value_name = "PREFIX")]
        output: Option<String>,

        /// Suffix appended to the trace file names
        #[arg(long)]
        run_id: Option<String>,

        /// Node whose state is traced
        #[arg(long)]
        observe: Option<u32>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print gamma variates, one per line
    Gamma {
        /// Shape
        #[arg(short, long, default_value = "2.0")]
        alpha: f64,

        /// Scale
        #[arg(short, long, default_value = "1.0")]
        beta: f64,

        /// Number of variates
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Seed
        #[arg(short, long, default_value_t = DEFAULT_GAMMA_SEED)]
        seed: u64,
    },

    /// List selection strategies
    Strategies,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            seed,
            steps,
            nodes,
            strategy,
            output,
            run_id,
            observe,
            json,
            verbose,
        } => {
            let mut config = load_config(config)?;
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }
            if let Some(steps) = steps {
                config.simulation.steps = steps;
            }
            if let Some(nodes) = nodes {
                config.simulation.num_nodes = nodes;
            }
            if let Some(strategy) = strategy {
                config.simulation.default_strategy = strategy;
            }
            if let Some(observe) = observe {
                config.simulation.observed_node = observe;
            }

            cmd_run(&config, output, run_id.as_deref(), json, verbose)
        },

        Commands::Gamma {
            alpha,
            beta,
            count,
            seed,
        } => cmd_gamma(alpha, beta, count, seed),

        Commands::Strategies => {
            cmd_strategies();
            Ok(())
        },
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let file_config = match path {
        Some(path) => Config::from_file(path)?,
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        },
    };
    Ok(file_config.merge(Overrides::from_env()))
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(
    config: &Config,
    output: Option<String>,
    run_id: Option<&str>,
    json_output: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    init_logging(verbose || config.simulation.debug);

    let observed = NodeId(config.simulation.observed_node);
    let mut sim = Simulator::from_config(config)?;
    if sim.node(observed).is_none() {
        anyhow::bail!(
            "Observed node {observed} does not exist ({} nodes)",
            sim.nodes().len()
        );
    }

    tracing::info!(scenario = %config.simulation.name, "running scenario");

    let summary = match output {
        Some(prefix) => {
            let mut recorder = Recorder::create(&prefix, run_id, observed)?;
            let summary = sim.run_with(config.simulation.steps, |s| recorder.record(s))?;
            recorder.flush()?;
            for path in output_paths(&prefix, run_id) {
                tracing::info!(path = %path.display(), "trace written");
            }
            summary
        },
        None => sim.run(config.simulation.steps)?,
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Run Summary (seed {}, {} steps):", summary.seed, summary.steps);
    println!();
    println!(
        "{:>6} {:<34} {:<10} {:>16} {:>10}",
        "Node", "Strategy", "Connected", "Conjoint", "Max tau"
    );
    println!("{}", "-".repeat(80));

    for node in &summary.nodes {
        let max_tau = node.taus.values().copied().fold(f64::NAN, f64::max);
        println!(
            "{:>6} {:<34} {:<10} {:>16.3} {:>10.3}",
            node.id, node.strategy, node.connected, node.cumulative_conjoint_utility, max_tau
        );
    }
}

fn cmd_gamma(alpha: f64, beta: f64, count: usize, seed: u64) -> anyhow::Result<()> {
    let mut gamma = Gamma::seeded(seed);
    for _ in 0..count {
        println!("{}", gamma.sample(alpha, beta)?);
    }
    Ok(())
}

fn cmd_strategies() {
    println!("Selection Strategies ({}):", Strategy::all().len());
    println!();
    for strategy in Strategy::all() {
        let marker = if strategy.is_stateful() { "learns" } else { "" };
        println!("  {:<34} {}", strategy.name(), marker);
    }
}
