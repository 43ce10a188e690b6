//! Strata CLI binary.
//!
//! Provides a command-line interface for computing and caching features.

mod integration;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use integration::cache_manager::{cache_path, cache_size, open_store};
use integration::pipeline::{open_source, parse_range, split_list};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use strata::{ComputeEngine, EngineConfig, QueryRequest, QueryService};
use strata_data::EntityId;
use strata_features::FeatureRegistry;
use strata_output::{ExportFormat, Exporter};
use strata_store::{FeatureStore, MemoryStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata: versioned feature computation for financial time series", long_about = None)]
#[command(version)]
struct Cli {
    /// Feature cache database (defaults to the platform cache directory)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered features
    Features {
        /// Print the catalogue as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute features for one or more entities
    Compute {
        /// Entity identifiers (comma separated or repeated)
        #[arg(required = true)]
        entities: Vec<String>,

        /// Features to compute, optionally as name@version
        #[arg(short, long = "feature", required = true)]
        features: Vec<String>,

        /// First date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: String,

        /// Last date, inclusive (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: String,

        /// Version for features not pinned with name@version
        #[arg(long)]
        version: Option<u32>,

        /// Raw records as JSON instead of fetching from Yahoo Finance
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Entities computed concurrently
        #[arg(long)]
        concurrency: Option<usize>,

        /// Keep computed values in memory only
        #[arg(long)]
        no_cache: bool,
    },

    /// Inspect or clear the feature cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache statistics
    Stats,

    /// Delete cached values
    Clear {
        /// Only clear this entity
        #[arg(long)]
        entity: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
    PrettyJson,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => Self::Csv,
            Format::Json => Self::Json,
            Format::PrettyJson => Self::PrettyJson,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Features { json } => list_features(json)?,
        Commands::Compute {
            entities,
            features,
            start,
            end,
            version,
            input,
            format,
            output,
            concurrency,
            no_cache,
        } => {
            let mut config = match &cli.config {
                Some(path) => EngineConfig::from_json_file(path)?,
                None => EngineConfig::default(),
            };
            if let Some(concurrency) = concurrency {
                config = config.with_entity_concurrency(concurrency);
            }

            let entities = split_list(&entities)
                .into_iter()
                .map(EntityId::new)
                .collect::<Result<Vec<_>, _>>()?;
            let mut request = QueryRequest::new(entities, split_list(&features), parse_range(&start, &end)?);
            request.version = version;

            let store: Arc<dyn FeatureStore> = if no_cache {
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(open_store(&cache_path(cli.cache.as_deref()))?)
            };
            let engine = ComputeEngine::new(
                Arc::new(FeatureRegistry::with_builtins()?),
                open_source(input.as_deref())?,
                store,
                config,
            );

            compute(QueryService::new(engine), request, format.into(), output.as_deref()).await?;
        }
        Commands::Cache { action } => {
            let path = cache_path(cli.cache.as_deref());
            match action {
                CacheAction::Stats => cache_stats(&path).await?,
                CacheAction::Clear { entity } => {
                    let store = open_store(&path)?;
                    let removed = match entity {
                        Some(entity) => store.clear_entity(EntityId::new(entity)?.as_str())?,
                        None => store.clear_all()?,
                    };
                    println!("Removed {} cached values from {}", removed, path.display());
                }
            }
        }
    }

    Ok(())
}

fn list_features(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = FeatureRegistry::with_builtins()?;

    if json {
        let catalogue: Vec<strata::FeatureSummary> = registry
            .list()
            .iter()
            .map(|definition| strata::FeatureSummary::from(definition.as_ref()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&catalogue)?);
        return Ok(());
    }

    println!("{:<26} {:<18} {:<22} DEPENDS ON", "FEATURE", "CATEGORY", "TRANSFORMATION");
    for definition in registry.list() {
        let dependencies: Vec<String> = definition.dependencies().iter().map(ToString::to_string).collect();
        println!(
            "{:<26} {:<18} {:<22} {}",
            definition.key().to_string(),
            format!("{:?}", definition.category()),
            definition.transformation().to_string(),
            dependencies.join(", ")
        );
        if !definition.description().is_empty() {
            println!("    {}", definition.description());
        }
    }
    Ok(())
}

async fn compute(
    service: QueryService,
    request: QueryRequest,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!(
        "Computing {} feature(s) for {} entit{}...",
        request.features.len(),
        request.entities.len(),
        if request.entities.len() == 1 { "y" } else { "ies" }
    ));

    let response = service.query(request).await;
    pb.finish_and_clear();

    for failure in &response.errors {
        eprintln!("Warning: {} failed ({}): {}", failure.feature, failure.kind, failure.message);
    }
    if response.table.columns().is_empty() && !response.errors.is_empty() {
        return Err("no feature could be computed".into());
    }

    match output {
        Some(path) => {
            response.table.export_to_file(path, format)?;
            eprintln!(
                "Wrote {} rows to {}",
                response.table.row_count(),
                path.display()
            );
        }
        None => print!("{}", response.table.export_to_string(format)?),
    }
    Ok(())
}

async fn cache_stats(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let stats = store.stats().await?;

    println!("Cache: {}", path.display());
    println!("  Series: {}", stats.series);
    println!("  Values: {}", stats.values);
    if let Some(bytes) = cache_size(path) {
        println!("  Size:   {:.1} KiB", bytes as f64 / 1024.0);
    }
    Ok(())
}
