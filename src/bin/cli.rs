//! featwatch CLI
//!
//! Scheduled local execution entry point: one run processes every
//! configured content source once, batch by batch.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use featwatch::{
    error::Result,
    models::{Config, ContentKind},
    pipeline::{
        ChangeDetector, JsonFileSink, OutputSink,
        run::{NullSink, run_bulletin_batch, run_discussion_batch},
    },
    resolver::{EntityResolver, HttpClassifier},
    services::ContentFetcher,
    store::LocalTrackingStore,
    taxonomy::InMemoryTaxonomy,
};

/// featwatch - Feature mention tracker
#[derive(Parser, Debug)]
#[command(name = "featwatch", version, about = "Release bulletin and community feature tracker")]
struct Cli {
    /// Path to storage directory containing config and tracking files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, classify, and diff all configured sources
    Run {
        /// Only process the named source
        #[arg(long)]
        source: Option<String>,

        /// Classify and diff but do not publish emissions
        #[arg(long)]
        dry_run: bool,
    },

    /// Score a title/body against the catalog for manual triage
    Triage {
        /// Item title
        title: String,

        /// Item body text
        #[arg(long, default_value = "")]
        body: String,
    },

    /// Validate configuration files
    Validate,

    /// Show tracking store info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("featwatch starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);

    match cli.command {
        Command::Run { source, dry_run } => {
            config.validate()?;
            run_all(Arc::new(config), &cli.storage_dir, source.as_deref(), dry_run).await?;
        }

        Command::Triage { title, body } => {
            let taxonomy = InMemoryTaxonomy::from_catalog(&config.catalog);
            let resolver = EntityResolver::new(&taxonomy);
            let suggestions = featwatch::resolver::suggest(&title, &body, resolver.features());

            if suggestions.is_empty() {
                log::info!("No feature suggestions; item stays in the general bucket");
            }
            for suggestion in suggestions {
                log::info!("{:>3}  {}", suggestion.score, suggestion.feature_id);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK ({} sources, {} catalog features)",
                config.sources.len(),
                config.catalog.len()
            );
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            let tracking_path = cli.storage_dir.join("tracking.json");
            if tracking_path.exists() {
                if let Ok(content) = std::fs::read_to_string(&tracking_path) {
                    if let Ok(table) =
                        serde_json::from_str::<serde_json::Value>(&content)
                    {
                        let count = table.as_object().map(|o| o.len()).unwrap_or(0);
                        log::info!("Tracked items: {}", count);
                    }
                }
            } else {
                log::info!("No tracking data yet.");
            }
        }
    }

    log::info!("Done!");

    Ok(())
}

/// Process every configured source, one batch per source.
async fn run_all(
    config: Arc<Config>,
    storage_dir: &PathBuf,
    only_source: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let store = LocalTrackingStore::new(storage_dir);
    let json_sink = JsonFileSink::new(storage_dir);
    let null_sink = NullSink;
    let sink: &dyn OutputSink = if dry_run { &null_sink } else { &json_sink };

    let fetcher = ContentFetcher::new(Arc::clone(&config))?;
    let mut taxonomy = InMemoryTaxonomy::from_catalog(&config.catalog);
    let today = chrono::Utc::now().date_naive();

    for source in &config.sources {
        if let Some(name) = only_source {
            if source.name != name {
                continue;
            }
        }

        log::info!("Processing source '{}' ({})", source.name, source.kind.as_str());
        let detector = ChangeDetector::new(config.limits.first_run_limit(source.kind));

        match source.kind {
            ContentKind::Bulletin => {
                let fetched = fetcher.fetch_bulletins(source).await?;
                run_bulletin_batch(&fetched, &mut taxonomy, &detector, &store, sink, today)
                    .await?;
            }
            ContentKind::Question | ContentKind::Blog => {
                let items = fetcher.fetch_discussions(source).await?;

                let mut resolver = EntityResolver::new(&taxonomy);
                if let Some(backend) = HttpClassifier::from_config(&config.classifier)? {
                    resolver = resolver
                        .with_backend(Box::new(backend), config.classifier.max_input_chars);
                }

                run_discussion_batch(source.kind, &items, &resolver, &detector, &store, sink)
                    .await?;
            }
        }
    }

    Ok(())
}
