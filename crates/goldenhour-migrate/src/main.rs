use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use goldenhour_core::MigrationConfig;
use goldenhour_db::{create_pool, run_migrations, PgAlbumRepository};
use goldenhour_migrate::{init_tracing, MigrationOptions, MigrationOrchestrator};
use goldenhour_processing::ImageEnricher;
use goldenhour_storage::create_storage;
use serde::Serialize;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "goldenhour-migrate")]
#[command(about = "Backfill thumbnails, blurhashes and camera metadata for album images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate every album and print the run report
    Run(RunArgs),
    /// Enrich a single raw image and upload its thumbnail
    Enrich {
        /// Object key of the raw upload
        raw_key: String,
    },
    /// Print the camera metadata decoded from a raw image
    Exif {
        /// Object key of the raw upload
        raw_key: String,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Classify albums without uploading thumbnails or writing manifests
    #[arg(long)]
    dry_run: bool,

    /// Albums processed in parallel (default: MIGRATION_ALBUM_CONCURRENCY)
    #[arg(long)]
    album_concurrency: Option<usize>,

    /// Images enriched in parallel per album (default: MIGRATION_IMAGE_CONCURRENCY)
    #[arg(long)]
    image_concurrency: Option<usize>,

    /// Albums fetched per scan page (default: MIGRATION_PAGE_SIZE)
    #[arg(long)]
    page_size: Option<u32>,

    /// Trust the stored manifests and skip listing album prefixes
    #[arg(long)]
    no_reconcile: bool,

    /// Apply pending schema migrations before the run
    #[arg(long)]
    apply_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = MigrationConfig::from_env().context("Failed to load configuration")?;

    if let Command::Run(args) = &cli.command {
        if let Some(n) = args.album_concurrency {
            config.album_concurrency = n;
        }
        if let Some(n) = args.image_concurrency {
            config.image_concurrency = n;
        }
        if let Some(n) = args.page_size {
            config.page_size = n;
        }
        if args.no_reconcile {
            config.reconcile_prefix = false;
        }
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        environment = %config.environment,
        storage_backend = %config.storage_backend(),
        "Configuration loaded"
    );

    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    let enricher = ImageEnricher::new(storage.clone());

    match cli.command {
        Command::Run(args) => {
            let pool = create_pool(&config).await?;
            if args.apply_schema {
                run_migrations(&pool).await?;
            }

            let mut options = MigrationOptions::from_config(&config);
            options.dry_run = args.dry_run;

            let orchestrator = MigrationOrchestrator::new(
                Arc::new(PgAlbumRepository::new(pool)),
                storage,
                enricher,
                options,
            );

            tokio::select! {
                result = orchestrator.run() => match result {
                    Ok(report) => {
                        print_json(&report)?;
                        if report.has_failures() {
                            tracing::warn!(
                                failures = report.failures.len(),
                                "Migration finished with failures, re-run to retry them"
                            );
                        }
                    }
                    Err(e) => {
                        print_json(e.partial_report())?;
                        return Err(e).context("Migration aborted");
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupted, committed albums are kept and the rest will be picked up by the next run");
                    anyhow::bail!("Migration interrupted");
                }
            }
        }
        Command::Enrich { raw_key } => {
            let enriched = enricher
                .enrich(&raw_key)
                .await
                .with_context(|| format!("Failed to enrich {}", raw_key))?;
            print_json(&enriched)?;
        }
        Command::Exif { raw_key } => {
            let exif = enricher.read_exif(&raw_key).await;
            print_json(&exif)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
