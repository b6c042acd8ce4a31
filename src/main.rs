//! reqlog CLI - capture and browse outbound HTTP requests
//!
//! Runs the admin/ingest API with the periodic retention cleanup, and offers
//! offline commands over the same database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqlog_api::{ApiServer, ApiServerConfig};
use reqlog_capture::{
    LoggerConfig, Observer, RecordQuery, RequestStore, RetentionTask, SettingsHandle, SortColumn,
    SortOrder, DIAGNOSTIC_TARGET,
};
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{filter::Targets, fmt, prelude::*, EnvFilter};

/// reqlog - Log outbound HTTP requests to monitored services
#[derive(Parser, Debug)]
#[command(name = "reqlog")]
#[command(about = "reqlog - Log outbound HTTP requests to monitored services")]
#[command(version)]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: reqlog.yml in this or a parent directory)
    #[arg(short, long, global = true, env = "REQLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overrides the configuration file
    #[arg(long, global = true, env = "REQLOG_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the API server and the periodic cleanup
    Serve {
        /// Address to bind the API server, overrides the configuration file
        #[arg(long, env = "REQLOG_BIND")]
        bind: Option<SocketAddr>,
    },

    /// List stored requests, newest first
    List {
        /// Search pattern, URL, message and code
        #[arg(short, long)]
        search: Option<String>,

        /// Sort column (captured_at, response_code, request_url, ...)
        #[arg(long, default_value = "captured_at")]
        orderby: SortColumn,

        /// Sort direction (asc, desc)
        #[arg(long, default_value = "desc")]
        order: SortOrder,

        /// Page number, 1-based
        #[arg(long, default_value = "1")]
        page: u64,

        /// Page size
        #[arg(long, default_value = "10")]
        per_page: u64,
    },

    /// Show one stored request in full
    Show {
        /// Record ID
        id: i64,
    },

    /// Delete stored requests
    Delete {
        /// Record IDs
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Run the retention cleanup once
    Cleanup {
        /// Records to keep, overrides the configuration file
        #[arg(long)]
        max_records: Option<u64>,
    },

    /// Write a configuration template
    Init {
        /// Output path
        #[arg(default_value = "reqlog.yml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective pattern list
    Patterns,

    /// Create or upgrade the database schema
    Migrate,
}

/// Setup logging with the specified log level
///
/// When `diagnostic_log` is set, the diagnostic target is also written to
/// that file regardless of the console level.
fn setup_logging(verbose: bool, diagnostic_log: Option<&Path>) -> Result<()> {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let diagnostic_layer = match diagnostic_log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open diagnostic log {:?}", path))?;

            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(Targets::new().with_target(DIAGNOSTIC_TARGET, Level::DEBUG)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_filter(filter),
        )
        .with(diagnostic_layer)
        .init();

    Ok(())
}

/// Load the explicit config file, or discover one from the working directory
fn load_config(path: Option<&Path>) -> Result<(Option<PathBuf>, LoggerConfig)> {
    if let Some(path) = path {
        let config = LoggerConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?;
        return Ok((Some(path.to_path_buf()), config));
    }

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    match LoggerConfig::discover_from(&cwd).context("Failed to load discovered config")? {
        Some((path, config)) => Ok((Some(path), config)),
        None => Ok((None, LoggerConfig::default())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { path, force } = &cli.command {
        return init_config(path, *force);
    }

    let (config_path, mut config) = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    setup_logging(cli.verbose, config.diagnostic_log.as_deref())?;

    match &config_path {
        Some(path) => info!("Using config file {:?}", path),
        None => info!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Serve { bind } => serve(config, bind).await,
        Commands::List {
            search,
            orderby,
            order,
            page,
            per_page,
        } => {
            let store = open_store(&config).await?;
            let query = RecordQuery::page(page, per_page)
                .with_search(search.unwrap_or_default())
                .sorted_by(orderby, order);

            let total = store.count(query.search.as_deref()).await?;
            let records = store.query(&query).await?;

            println!(
                "{:>8}  {:<20}  {:>4}  {:<28}  URL",
                "ID", "CAPTURED", "CODE", "PATTERN"
            );
            for record in &records {
                println!(
                    "{:>8}  {:<20}  {:>4}  {:<28}  {}",
                    record.id,
                    record.captured_at.format("%Y-%m-%d %H:%M:%S"),
                    record
                        .response_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    record.matched_pattern,
                    record.request_url
                );
            }
            println!(
                "\n{} of {} records (page {}/{})",
                records.len(),
                total,
                page.max(1),
                total.div_ceil(per_page.max(1)).max(1)
            );
            Ok(())
        }
        Commands::Show { id } => {
            let store = open_store(&config).await?;
            let record = store
                .get(id)
                .await?
                .with_context(|| format!("Request {} not found", id))?;

            println!("ID:       {}", record.id);
            println!("Captured: {}", record.captured_at.to_rfc3339());
            println!("Pattern:  {}", record.matched_pattern);
            println!("URL:      {}", record.request_url);
            println!(
                "Code:     {}",
                record
                    .response_code
                    .map(|c| c.to_string())
                    .unwrap_or_default()
            );
            println!(
                "Message:  {}",
                record.response_message.as_deref().unwrap_or_default()
            );

            println!("\n--- Request args ---");
            match record.decode_request_args() {
                Ok(args) => println!("{}", serde_json::to_string_pretty(&args)?),
                Err(_) => println!("{}", record.request_args),
            }

            println!("\n--- Response headers ---");
            match record.decode_response_headers() {
                Some(Ok(headers)) => println!("{}", serde_json::to_string_pretty(&headers)?),
                Some(Err(_)) => println!("{}", record.response_headers.as_deref().unwrap_or_default()),
                None => println!("(none)"),
            }

            println!("\n--- Response body ---");
            println!("{}", record.pretty_body().unwrap_or_else(|| "(none)".to_string()));
            Ok(())
        }
        Commands::Delete { ids } => {
            let store = open_store(&config).await?;
            let report = store.delete_many(&ids).await;

            for id in &report.deleted {
                println!("Deleted request {}", id);
            }
            for id in &report.not_found {
                warn!("Request {} not found", id);
            }
            for failure in &report.failed {
                error!("Failed to delete request {}: {}", failure.id, failure.error);
            }

            if !report.failed.is_empty() {
                anyhow::bail!("{} request(s) could not be deleted", report.failed.len());
            }
            Ok(())
        }
        Commands::Cleanup { max_records } => {
            let store = open_store(&config).await?;
            if let Some(max_records) = max_records.filter(|n| *n > 0) {
                config.settings.max_records = max_records;
            }

            let task = RetentionTask::new(store, SettingsHandle::new(config.settings));
            let report = task.run_once().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Patterns => {
            for pattern in config.settings.pattern_set().patterns() {
                println!("{}", pattern);
            }
            Ok(())
        }
        Commands::Migrate => {
            let db = reqlog_db::connect(&config.database_url)
                .await
                .context("Failed to connect to database")?;
            reqlog_db::migrate(&db)
                .await
                .context("Failed to run migrations")?;
            info!("Database schema is up to date");
            Ok(())
        }
        Commands::Init { .. } => Ok(()),
    }
}

async fn open_store(config: &LoggerConfig) -> Result<RequestStore> {
    RequestStore::open(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }

    std::fs::write(path, LoggerConfig::template())
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote configuration template to {:?}", path);
    Ok(())
}

async fn serve(config: LoggerConfig, bind: Option<SocketAddr>) -> Result<()> {
    info!("reqlog starting...");

    let bind_addr = match bind {
        Some(addr) => addr,
        None => config
            .api
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid api.bind_addr {:?}", config.api.bind_addr))?,
    };

    let store = open_store(&config).await?;
    let settings = SettingsHandle::new(config.settings);
    let observer = Observer::new(settings.clone(), store.clone());
    let retention = RetentionTask::new(store, settings);

    let cleanup_task = retention.clone().spawn();

    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr,
            enable_cors: config.api.enable_cors,
        },
        observer,
        retention,
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = tokio::select! {
        _ = &mut ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
        result = server.start() => {
            if let Err(ref e) = result {
                error!("API server error: {:#}", e);
            }
            result
        }
    };

    cleanup_task.abort();
    info!("reqlog stopped");
    result
}
