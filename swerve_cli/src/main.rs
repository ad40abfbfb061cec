use swerve_core::config::{SwerveConfig, default_n_total};
use swerve_core::core::SearchCore;
use swerve_core::executor::MockExecutor;
use swerve_core::mutators::RoadMutator;
use swerve_core::report::collect_failures;
use swerve_core::runner::SearchRunner;
use swerve_core::stopcriteria::CountingStop;

use clap::Parser;
use log::info;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Total execution budget, overriding the config file.
    #[clap(short, long)]
    iterations: Option<u64>,
    /// Seed for the search's random stream, overriding the config file.
    #[clap(short, long)]
    seed: Option<u64>,
    /// Where to write the history export (JSON).
    #[clap(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match cli.config_file {
        Some(config_path) => {
            println!("Loading configuration from specified path: {config_path:?}");
            SwerveConfig::load_from_file(&config_path)?
        }
        None => {
            // No config file specified via CLI, load default
            let default_config_path = PathBuf::from("swerve.toml");
            if default_config_path.exists() {
                println!(
                    "No config file specified via CLI, loading default: {default_config_path:?}",
                );
                SwerveConfig::load_from_file(&default_config_path)?
            } else {
                println!(
                    "No config file specified and default 'swerve.toml' not found, using built-in defaults."
                );
                SwerveConfig::default()
            }
        }
    };

    if let Some(iterations) = cli.iterations {
        config.search.get_or_insert_with(Default::default).n_total = iterations;
    }
    if let Some(seed) = cli.seed {
        config.search.get_or_insert_with(Default::default).seed = Some(seed);
    }

    let search = config.search.clone().unwrap_or_default();
    let objective_settings = config.objective.clone().unwrap_or_default();
    let representation_settings = config.representation.clone().unwrap_or_default();
    let crossover_settings = config.crossover.clone().unwrap_or_default();

    let n_total = if search.n_total == 0 {
        default_n_total()
    } else {
        search.n_total
    };
    let n_random = search.n_random.min(n_total);
    let feature = objective_settings.feature.clone();

    let core = SearchCore::new(
        Box::new(representation_settings.build()),
        objective_settings.build(),
        Some(RoadMutator::standard()),
        Some(crossover_settings.build()),
    );

    let seed = search.seed.unwrap_or(0);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut runner = SearchRunner::new(
        core,
        Box::new(MockExecutor::new(seed.wrapping_add(1))),
        Box::new(CountingStop::new(n_total, n_random)),
    );

    println!("Starting search: {n_total} executions ({n_random} random), seed {seed}");
    let start_time = Instant::now();
    runner.run(&mut rng)?;
    let elapsed = start_time.elapsed();

    let history = runner.core().history();
    let failures = collect_failures(history);
    println!("Search finished in {elapsed:.2?}.");
    println!(
        "Executions: {}, Failures found: {}",
        history.len(),
        failures.len()
    );
    for failure in &failures {
        println!(
            "  #{:<4} method: {:<24} generation: {:<3} {}: {:<10} digest: {}",
            failure.index,
            failure.method,
            failure.generation,
            feature,
            failure
                .feature
                .map_or_else(|| "-".to_string(), |value| format!("{value:.4}")),
            failure.digest
        );
    }

    let output_path = cli
        .output
        .or(search.results_path)
        .unwrap_or_else(|| PathBuf::from("swerve_history.json"));
    history.export_json(&output_path, &feature)?;
    info!("history exported to {output_path:?}");
    println!("History written to {output_path:?}");

    Ok(())
}
