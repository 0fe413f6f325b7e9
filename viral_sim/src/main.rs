//! Viral Growth Simulator CLI
//!
//! Run deterministic growth scenarios against the referral engine.

use clap::Parser;
use std::path::Path;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use viral_core::NetworkConfig;
use viral_sim::{ScenarioId, ScenarioResult, ScenarioRunner, SimExport, SimResult};

/// Viral growth deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "viral-sim")]
#[command(about = "Run deterministic referral growth simulations", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Size of the initial persona cohort
    #[arg(short, long, default_value = "50")]
    personas: usize,

    /// Simulation rounds per scenario
    #[arg(short, long, default_value = "5")]
    rounds: usize,

    /// Days to project after the last round
    #[arg(short, long, default_value = "30")]
    days: u32,

    /// Scenario to run (baseline, viral_loop, churn_storm, slow_burn, no_network_effects, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// JSON file with NetworkConfig overrides
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export per-round frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn load_config(path: &str) -> SimResult<NetworkConfig> {
    let json = std::fs::read_to_string(Path::new(path))?;
    Ok(NetworkConfig::from_json_str(&json)?)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }

    if !args.json {
        info!("Viral Growth Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: baseline, viral_loop, churn_storm, slow_burn, no_network_effects, all");
                std::process::exit(1);
            }
        }
    };

    let base_config = match args.config.as_deref().map(load_config) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            eprintln!("Error: failed to load config: {}", e);
            std::process::exit(2);
        }
        None => NetworkConfig::default(),
    };

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    if args.export.is_some() && scenarios.len() > 1 {
        eprintln!("Error: --export only supports a single scenario, not 'all'");
        std::process::exit(1);
    }

    let runner = ScenarioRunner::new(seed, args.personas)
        .with_rounds(args.rounds)
        .with_projection_days(args.days)
        .with_base_config(base_config);

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in &scenarios {
        let result = runner.run(*scenario);

        if !args.json {
            if result.passed {
                info!(
                    "✓ {} (seed={}) PASSED: {} users after {:.1} days",
                    scenario.name(),
                    seed,
                    result.final_user_count,
                    result.final_time_days
                );
                if let Some(projection) = &result.projection {
                    info!(
                        "  projection: {} -> {} users over {} days ({})",
                        projection.starting_users,
                        projection.final_user_count,
                        projection.days,
                        projection.growth_type
                    );
                }
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        if let Some(path) = &args.export {
            match SimExport::from_result(&result).write_to_file(path) {
                Ok(()) => info!("Exported {} frames to {}", result.frames.len(), path),
                Err(e) => error!("Failed to write export: {}", e),
            }
        }

        results.push(result);
    }

    let total = results.len();
    let failed = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed, total);
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
