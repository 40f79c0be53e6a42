//! Lumio CLI: upload photos for one or many orders.
//!
//! Set LUMIO_API_KEY and LUMIO_API_URL (X-API-Key auth), or LUMIO_API_TOKEN
//! with `--bearer`. Upload tuning is read from the `UPLOAD_*` variables.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumio_api_client::ApiClient;
use lumio_cli::{init_tracing, load_photo, progress_line, Manifest, OrderSummary};
use lumio_core::{PhotoFile, UploadConfig};
use lumio_upload::{TracingNotificationSink, UploadManager};

#[derive(Parser)]
#[command(name = "lumio", about = "Lumio photo upload CLI")]
struct Cli {
    /// Authenticate with `Authorization: Bearer` instead of X-API-Key
    #[arg(long, global = true)]
    bearer: bool,

    /// Do not print per-order progress lines
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files for a single order
    Upload {
        /// Order ID
        #[arg(long)]
        order_id: String,
        /// Human-readable order name used in notifications
        #[arg(long)]
        order_name: Option<String>,
        /// Photos to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload several orders from a JSON manifest, one order at a time
    Batch {
        /// Path to the manifest
        manifest: PathBuf,
    },
}

struct OrderInput {
    order_id: String,
    order_name: String,
    files: Vec<PathBuf>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize summary")?;
    println!("{}", out);
    Ok(())
}

async fn read_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PhotoFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(load_photo(path).await?);
    }
    Ok(files)
}

async fn orders_from(command: Commands) -> anyhow::Result<Vec<OrderInput>> {
    match command {
        Commands::Upload {
            order_id,
            order_name,
            files,
        } => Ok(vec![OrderInput {
            order_name: order_name.unwrap_or_else(|| order_id.clone()),
            order_id,
            files,
        }]),
        Commands::Batch { manifest } => {
            let manifest = Manifest::load(Path::new(&manifest)).await?;
            Ok(manifest
                .orders
                .into_iter()
                .map(|order| OrderInput {
                    order_name: order.display_name().to_string(),
                    order_id: order.order_id,
                    files: order.files,
                })
                .collect())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = UploadConfig::from_env().context("Invalid upload configuration")?;
    let client = if cli.bearer {
        ApiClient::from_env_bearer()
    } else {
        ApiClient::from_env()
    }
    .context("Failed to create API client. Set LUMIO_API_KEY and LUMIO_API_URL")?;
    let client = Arc::new(client);

    let manager = UploadManager::new(
        &config,
        client.clone(),
        client,
        Arc::new(TracingNotificationSink),
    );

    let orders = orders_from(cli.command).await?;
    let mut order_ids = Vec::with_capacity(orders.len());
    for order in orders {
        let files = read_files(&order.files).await?;
        let report = manager.enqueue_files(&order.order_id, &order.order_name, files);
        for (name, err) in &report.rejected {
            tracing::warn!(
                order_id = %order.order_id,
                file = %name,
                error_code = err.error_code(),
                "Skipping file: {}",
                err
            );
        }
        tracing::info!(
            order_id = %order.order_id,
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "Order enqueued"
        );
        if !report.accepted.is_empty() {
            order_ids.push(order.order_id);
        }
    }

    if order_ids.is_empty() {
        anyhow::bail!("Nothing to upload");
    }

    let progress = if cli.quiet {
        None
    } else {
        let mut lines = manager.store().subscribe(|state| {
            let mut lines: Vec<(String, String)> = state
                .orders
                .values()
                .map(|q| (q.order_id.clone(), progress_line(q)))
                .collect();
            lines.sort();
            lines
        });
        Some(tokio::spawn(async move {
            let mut printed = lines.last().clone();
            while let Some(current) = lines.changed().await {
                for line in current.iter().filter(|line| !printed.contains(line)) {
                    eprintln!("{}", line.1);
                }
                printed = current;
            }
        }))
    };

    for order_id in &order_ids {
        manager.start_order(order_id);
    }
    manager.wait_idle().await;

    if let Some(handle) = progress {
        handle.abort();
    }

    let summaries: Vec<OrderSummary> = order_ids
        .iter()
        .filter_map(|id| manager.store().get_order(id))
        .map(|queue| OrderSummary::from(queue.as_ref()))
        .collect();
    print_json(&summaries)?;

    let failed: usize = summaries.iter().map(|s| s.failed).sum();
    let done: usize = summaries.iter().map(|s| s.done).sum();
    tracing::info!(orders = summaries.len(), done, failed, "Upload run finished");
    if failed > 0 {
        anyhow::bail!("{} photo(s) failed to upload", failed);
    }

    Ok(())
}
