//! Avalanche danger estimation entry point
//!
//! Three modes: serve the prediction API, run the offline feature
//! search, or print dataset statistics.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use avalanche_ml::data::{Dataset, FEATURE_COLUMNS};
use avalanche_ml::search::{SearchConfig, SearchObjective, SubsetSearch};
use avalanche_ml::server::{run_server, ServerConfig};
use avalanche_ml::service::{PredictionService, ServiceConfig};

#[derive(Parser)]
#[command(name = "avalanche-ml")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Avalanche danger estimation from weather history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the prediction API
    Serve {
        /// Path to the avalanche observation CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Bind address (default from AVALANCHE_HOST, then 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (default from AVALANCHE_PORT, then 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Search for the best-scoring feature subset
    Search {
        /// Path to the avalanche observation CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Scoring objective
        #[arg(short, long, value_enum)]
        objective: Objective,

        /// Network fits per subset (mlp objective only)
        #[arg(long, default_value_t = 10)]
        repeats: usize,

        /// Master seed; omit for a different search every run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print dataset summary and per-feature statistics
    Info {
        /// Path to the avalanche observation CSV
        #[arg(short, long)]
        data: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Objective {
    /// Cluster/label agreement deviation
    Hac,
    /// Mean held-out network accuracy
    Mlp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avalanche_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { data, host, port } => cmd_serve(data, host, port).await,
        Commands::Search {
            data,
            objective,
            repeats,
            seed,
        } => cmd_search(&data, objective, repeats, seed),
        Commands::Info { data } => cmd_info(&data),
    }
}

async fn cmd_serve(data: PathBuf, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let service = Arc::new(PredictionService::new(ServiceConfig::new(data)));
    run_server(config, service).await
}

fn cmd_search(
    data: &Path,
    objective: Objective,
    repeats: usize,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let dataset = Dataset::load_csv(data)?;
    let x = dataset.feature_matrix()?;
    let y = dataset.labels()?;

    let objective = match objective {
        Objective::Hac => SearchObjective::ClusterAgreement,
        Objective::Mlp => SearchObjective::ClassifierAccuracy { repeats },
    };
    let mut config = SearchConfig::new(objective);
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    let headers: Vec<String> = FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
    let columns: Vec<usize> = (0..headers.len()).collect();

    let mut search = SubsetSearch::new(&x, &y, config);
    let outcome = search.run(&headers, &columns)?;

    match outcome.score {
        Some(score) => {
            println!("best score:  {:.4}", score);
            println!("headers:     {}", outcome.headers.join(", "));
        }
        None => println!("no subset evaluated"),
    }
    println!("evaluations: {}", outcome.evaluations);
    Ok(())
}

fn cmd_info(data: &Path) -> anyhow::Result<()> {
    let dataset = Dataset::load_csv(data)?;
    let summary = dataset.summary()?;

    println!("records:    {}", summary.total_records);
    println!("dangerous:  {}", summary.dangerous_count);
    println!("safe:       {}", summary.safe_count);
    println!("locations:  {}", summary.locations);
    if let (Some(start), Some(end)) = (&summary.date_range.start, &summary.date_range.end) {
        println!("date range: {} to {}", start, end);
    }

    println!();
    for (feature, stats) in dataset.weather_stats()? {
        println!(
            "{:>14}: mean {:>9.2}  std {:>9.2}  min {:>9.2}  max {:>9.2}",
            feature, stats.mean, stats.std, stats.min, stats.max
        );
    }
    Ok(())
}
