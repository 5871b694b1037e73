//! hotel-enricher: batch LLM enrichment for hotel listings
//!
//! Entry point. Parses the command line, loads configuration,
//! initialises structured logging, opens the property database and runs
//! the requested job.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tracing::info;

use hotel_enricher::config::AppConfig;
use hotel_enricher::engine::{BatchEnricher, BatchOptions, BatchReport};
use hotel_enricher::llm::{self, ProviderKind};
use hotel_enricher::storage::Store;
use hotel_enricher::types::JobKind;

#[derive(Debug, Parser)]
#[command(
    name = "hotel-enricher",
    version,
    about = "Generate titles, descriptions, summaries and reviews for hotel listings"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Database URL, overrides the config file and DATABASE_URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rewrite every property title.
    RewriteTitles(JobArgs),
    /// Generate descriptions for properties without one.
    GenerateDescriptions(JobArgs),
    /// Generate summaries for described properties without a summary.
    GenerateSummaries(JobArgs),
    /// Generate a rating and review for properties without reviews.
    GenerateReviews {
        #[command(flatten)]
        job: JobArgs,
        /// Process every property and replace its existing reviews.
        #[arg(long)]
        force: bool,
    },
    /// Show counts of properties and pending work.
    Status,
    /// Create the database schema if it does not exist.
    InitDb,
}

#[derive(Debug, Args)]
struct JobArgs {
    /// Properties per batch (defaults to batch.default_batch_size).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: Option<u64>,

    /// Provider to use instead of the job's configured one.
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let mut cfg = AppConfig::load_or_default(&cli.config)?;
    if let Some(url) = &cli.database_url {
        cfg.database.url = url.clone();
    }

    let store = Store::connect(&cfg.database.url).await?;
    store.migrate().await?;

    match cli.command {
        Command::RewriteTitles(args) => {
            run_job(&store, &cfg, JobKind::RewriteTitles, &args, false).await?;
        }
        Command::GenerateDescriptions(args) => {
            run_job(&store, &cfg, JobKind::Descriptions, &args, false).await?;
        }
        Command::GenerateSummaries(args) => {
            run_job(&store, &cfg, JobKind::Summaries, &args, false).await?;
        }
        Command::GenerateReviews { job, force } => {
            run_job(&store, &cfg, JobKind::Reviews, &job, force).await?;
        }
        Command::Status => {
            let counts = store.pending_counts().await?;
            println!("properties:            {}", counts.properties);
            println!("missing descriptions:  {}", counts.descriptions);
            println!("missing summaries:     {}", counts.summaries);
            println!("missing reviews:       {}", counts.reviews);
        }
        Command::InitDb => {
            info!(url = %cfg.database.url, "Database initialised");
        }
    }

    Ok(())
}

/// Build the provider for `job` and run one enrichment pass.
async fn run_job(
    store: &Store,
    cfg: &AppConfig,
    job: JobKind,
    args: &JobArgs,
    force: bool,
) -> Result<BatchReport> {
    let kind = args.provider.unwrap_or_else(|| cfg.jobs.provider_for(job));
    let generator = llm::build_generator(kind, cfg)
        .with_context(|| format!("Failed to build {kind} client"))?;

    let batch_size = args
        .batch_size
        .map(|n| n as usize)
        .unwrap_or(cfg.batch.default_batch_size);
    let options = BatchOptions {
        batch_size,
        force,
        item_delay: Duration::from_millis(cfg.batch.item_delay_ms),
    };

    info!(job = %job, provider = %kind, batch_size, force, "Starting job");
    BatchEnricher::new(store, generator.as_ref(), options)
        .run(job)
        .await
}

/// Initialise the `tracing` subscriber.
fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose {
        "hotel_enricher=debug"
    } else {
        "hotel_enricher=info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json_logging = json || std::env::var("HOTEL_ENRICHER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
