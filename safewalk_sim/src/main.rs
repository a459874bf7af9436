//! SafeWalk DST Simulator CLI
//!
//! Replays simulated walks to school through the tracking session.

use clap::Parser;
use safewalk_core::TrackingConfig;
use safewalk_sim::{ScenarioId, ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Replay simulated walks to school and check the tracker's reactions
#[derive(Parser, Debug)]
#[command(name = "safewalk-sim", version)]
struct Args {
    /// Seed for the first run (0 = derive from the clock)
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Scenario name (see the list printed for an unknown name), or all
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// How many consecutive seeds to replay each scenario with
    #[arg(long, default_value_t = 1)]
    seeds: u64,

    /// Tracking configuration file (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GPS noise standard deviation in meters
    #[arg(long, default_value_t = 2.0)]
    noise: f64,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Print a machine-readable summary on stdout
    #[arg(long)]
    json: bool,
}

fn init_logging(args: &Args) {
    let level = match (args.verbose, args.json) {
        (true, _) => Level::DEBUG,
        // Keep stdout parseable
        (false, true) => Level::WARN,
        (false, false) => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn select_scenarios(name: &str) -> Result<Vec<ScenarioId>, String> {
    if name == "all" {
        return Ok(ScenarioId::all());
    }
    name.parse().map(|s| vec![s])
}

fn first_seed(requested: u64) -> u64 {
    if requested != 0 {
        return requested;
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

fn print_json(results: &[ScenarioResult]) -> Result<(), serde_json::Error> {
    let failed = results.iter().filter(|r| !r.passed).count();
    let summary = serde_json::json!({
        "total": results.len(),
        "passed": results.len() - failed,
        "failed": failed,
        "results": results,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn log_summary(results: &[ScenarioResult]) {
    let failures: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();

    info!("────────────────────────────────────────");
    if failures.is_empty() {
        info!("All {} runs passed", results.len());
        return;
    }

    error!("{} of {} runs failed:", failures.len(), results.len());
    for r in failures {
        error!(
            "  {} seed={}: {}",
            r.scenario,
            r.seed,
            r.failure_reason.as_deref().unwrap_or("no reason recorded")
        );
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let config = match &args.config {
        Some(path) => match TrackingConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: cannot load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => TrackingConfig::default(),
    };

    let scenarios = match select_scenarios(&args.scenario) {
        Ok(scenarios) => scenarios,
        Err(e) => {
            eprintln!("Error: {}", e);
            for scenario in ScenarioId::all() {
                eprintln!("  {:<16} {}", scenario.name(), scenario.description());
            }
            return ExitCode::FAILURE;
        }
    };

    let base_seed = first_seed(args.seed);
    info!(
        "SafeWalk simulator v{}: {} scenario(s) x {} seed(s) from {}",
        env!("CARGO_PKG_VERSION"),
        scenarios.len(),
        args.seeds,
        base_seed
    );

    let mut results = Vec::new();
    for offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(offset);
        let runner = ScenarioRunner::new(seed)
            .with_config(config.clone())
            .with_noise(args.noise);

        for &scenario in &scenarios {
            let result = runner.run(scenario);
            if result.passed {
                info!("PASS {} (seed={}, {} fixes)", scenario, seed, result.total_fixes);
            } else {
                error!(
                    "FAIL {} (seed={}): {}",
                    scenario,
                    seed,
                    result.failure_reason.as_deref().unwrap_or("no reason recorded")
                );
            }
            results.push(result);
        }
    }

    if args.json {
        if let Err(e) = print_json(&results) {
            eprintln!("Error: cannot encode summary: {}", e);
            return ExitCode::FAILURE;
        }
    } else {
        log_summary(&results);
    }

    if results.iter().all(|r| r.passed) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
