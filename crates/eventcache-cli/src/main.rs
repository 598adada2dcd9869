//! eventcache - command line front end for the offline content cache.
//!
//! Inspects and edits the local store, queues form submissions, and runs the
//! background sync loop. In `run` mode, typing `online` or `offline` on stdin
//! stands in for the platform's connectivity events.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eventcache_core::{
    Config, ConnectivitySignal, ContentType, Expiry, FormType, OfflineCache, Priority, StoreOptions,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "eventcache")]
#[command(about = "Offline content cache and form sync queue", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "EVENTCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the event site API
    #[arg(long, env = "EVENTCACHE_API_URL")]
    api_url: Option<String>,

    /// Directory holding the record store
    #[arg(long, env = "EVENTCACHE_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long, env = "EVENTCACHE_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show record counts, size and quota
    Stats,
    /// Print the payload stored under an id
    Get { id: String },
    /// Print every live payload of a content type
    List { content_type: ContentType },
    /// Store a JSON payload under an id
    Put {
        id: String,
        content_type: ContentType,
        /// Payload as a JSON document
        payload: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Lifetime in hours (defaults to the configured expiry)
        #[arg(long, conflicts_with = "never_expires", value_parser = clap::value_parser!(i64).range(1..))]
        ttl_hours: Option<i64>,
        #[arg(long)]
        never_expires: bool,
    },
    /// Queue a form submission for delivery
    Submit {
        form_type: FormType,
        /// Form data as a JSON document
        data: String,
    },
    /// List submissions waiting for delivery
    Pending,
    /// Run one drain cycle now
    Sync,
    /// Evict expired and, under pressure, old low-priority records
    Cleanup,
    /// Fetch schedule, speakers and content into the cache
    Prefetch,
    /// Run the background scheduler until Ctrl+C
    Run {
        /// Start in offline mode
        #[arg(long)]
        offline: bool,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "eventcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        },
    };
    if let Some(ref url) = cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(ref dir) = cli.store_dir {
        config.store_dir = Some(dir.clone());
    }
    Ok(config)
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("Argument is not valid JSON")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_ref());

    let config = load_config(&cli)?;
    let cache = OfflineCache::open(&config).await?;
    let repo = cache.repository();

    match cli.command {
        Commands::Stats => {
            let stats = repo.get_stats().await?;
            print_json(&stats)?;
            eprintln!("Last updated: {}", stats.last_updated(repo.now()));
        }
        Commands::Get { id } => match repo.get_content(&id).await? {
            Some(payload) => print_json(&payload)?,
            None => eprintln!("No live record for {}", id),
        },
        Commands::List { content_type } => {
            print_json(&repo.get_content_by_type(content_type).await?)?;
        }
        Commands::Put {
            id,
            content_type,
            payload,
            priority,
            ttl_hours,
            never_expires,
        } => {
            let expiry = match (ttl_hours, never_expires) {
                (_, true) => Expiry::Never,
                (Some(hours), false) => Expiry::In(
                    chrono::Duration::try_hours(hours).context("--ttl-hours is out of range")?,
                ),
                (None, false) => Expiry::Default,
            };
            let options = StoreOptions::default().priority(priority).expiry(expiry);
            repo.store_content(&id, content_type, &parse_json(&payload)?, options)
                .await?;
            eprintln!("Stored {}", id);
        }
        Commands::Submit { form_type, data } => {
            let id = repo.store_form_submission(form_type, parse_json(&data)?).await?;
            println!("{}", id);
        }
        Commands::Pending => {
            for record in cache.queue().get_pending_submissions().await? {
                println!("{}\tretries={}\t{}", record.id, record.retry_count, record.created_at);
            }
        }
        Commands::Sync => print_json(&cache.queue().process_sync_queue().await)?,
        Commands::Cleanup => {
            let report = repo.cleanup().await?;
            eprintln!(
                "Removed {} record(s): {} expired, {} low priority",
                report.removed,
                report.plan.expired.len(),
                report.plan.low_priority.len()
            );
        }
        Commands::Prefetch => {
            let report = cache.prefetcher().prefetch().await;
            for content_type in &report.stored {
                eprintln!("Stored {}", content_type);
            }
            for (content_type, error) in &report.failed {
                eprintln!("Failed {}: {}", content_type, error);
            }
        }
        Commands::Run { offline } => run(&cache, !offline).await?,
    }

    Ok(())
}

/// Drive the scheduler from stdin until Ctrl+C or end of input.
async fn run(cache: &OfflineCache, online: bool) -> Result<()> {
    let (signals, handle) = cache.start_background(online);
    info!(online = online, "Background sync running");
    eprintln!("Type `online` or `offline` to simulate connectivity; Ctrl+C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let signal = match line?.as_deref().map(str::trim) {
                    None => break,
                    Some("online") => ConnectivitySignal::Restored,
                    Some("offline") => ConnectivitySignal::Lost,
                    Some("") => continue,
                    Some(other) => {
                        eprintln!("Unknown command: {}", other);
                        continue;
                    }
                };
                if signals.send(signal).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(signals);
    handle.await.context("Scheduler task panicked")?;
    info!("Background sync stopped");
    Ok(())
}
