//! Wildfire Simulator CLI
//!
//! Run the sensor-network fire simulation on built-in scenarios or a
//! topology file.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wildfire_core::TopologyInput;
use wildfire_sim::visualizer::{legend, render_map};
use wildfire_sim::{load_config, RunError, ScenarioId, ScenarioResult, ScenarioRunner, SimExport};

/// Wildfire sensor-network simulator
#[derive(Parser, Debug)]
#[command(name = "wildfire-sim")]
#[command(about = "Simulate fire spread and mobile-agent relays on a sensor network", long_about = None)]
struct Args {
    /// Topology file (node/edge/station/fire directives)
    #[arg(short, long, conflicts_with = "scenario")]
    config: Option<PathBuf>,

    /// Scenario to run (line, split, grid, ring, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Master seed (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of consecutive seeds to run
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Length of one time unit in milliseconds
    #[arg(long, default_value = "1000")]
    time_unit_ms: u64,

    /// Maximum simulated duration in seconds
    #[arg(short, long, default_value = "120")]
    duration: f64,

    /// Threatened nodes never ignite
    #[arg(long)]
    no_spread: bool,

    /// Run on the wall clock instead of virtual time
    #[arg(long)]
    realtime: bool,

    /// Print the final node map and station log
    #[arg(short, long)]
    render: bool,

    /// Export the run to a JSON file (single run only)
    #[arg(long)]
    export: Option<PathBuf>,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// What to run: a file, or built-in scenarios.
enum Target {
    File(PathBuf, TopologyInput),
    Scenarios(Vec<ScenarioId>),
}

impl Target {
    fn len(&self) -> usize {
        match self {
            Target::File(..) => 1,
            Target::Scenarios(ids) => ids.len(),
        }
    }
}

fn run_target(runner: &ScenarioRunner, target: &Target) -> Vec<Result<ScenarioResult, RunError>> {
    match target {
        Target::File(path, input) => vec![runner.run(&path.display().to_string(), input)],
        Target::Scenarios(ids) => ids.iter().map(|id| runner.run_scenario(*id)).collect(),
    }
}

fn print_render(result: &ScenarioResult) {
    println!("── {} (seed={}) ──", result.scenario, result.seed);
    print!("{}", render_map(&result.nodes));
    println!("{}", legend());
    for entry in &result.station_log {
        println!();
        print!("{}", entry.rendered());
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Wildfire Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let target = match &args.config {
        Some(path) => match load_config(path) {
            Ok(input) => Target::File(path.clone(), input),
            Err(e) => {
                error!("{}", e);
                std::process::exit(2);
            }
        },
        None if args.scenario == "all" => Target::Scenarios(ScenarioId::all()),
        None => match args.scenario.parse::<ScenarioId>() {
            Ok(id) => Target::Scenarios(vec![id]),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: line, split, grid, ring, all");
                std::process::exit(2);
            }
        },
    };

    if args.export.is_some() && target.len() * args.seeds > 1 {
        eprintln!("Error: --export only supports a single run");
        std::process::exit(2);
    }

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_time_unit(Duration::from_millis(args.time_unit_ms))
            .with_fire_spread(!args.no_spread)
            .with_duration(args.duration)
            .with_realtime(args.realtime);

        for outcome in run_target(&runner, &target) {
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!("Run aborted (seed={}): {}", seed, e);
                    std::process::exit(2);
                }
            };

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED - {} burning, {} agents, {} logged",
                        result.scenario,
                        seed,
                        result.metrics.nodes_burning,
                        result.metrics.agents_created,
                        result.metrics.log_entries
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        result.scenario,
                        seed,
                        result.failure_reason().as_deref().unwrap_or("unknown")
                    );
                }
            }
            if args.render && !args.json {
                print_render(&result);
            }

            if let Some(path) = &args.export {
                let export = SimExport::from_result(&result, runner.config());
                match export.write_to_file(path) {
                    Ok(()) => info!("Exported run {} to {}", export.run_id, path.display()),
                    Err(e) => error!("Failed to write export: {}", e),
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario,
                    "seed": r.seed,
                    "started_at_unix_ms": r.started_at_unix_ms,
                    "passed": r.passed,
                    "settled": r.settled,
                    "time_secs": r.final_time_secs,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason(),
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} runs passed!", total);
        } else {
            error!("❌ {}/{} runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
