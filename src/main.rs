use anyhow::{Context, Result};
use axum::{routing::get, Router};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use listing_sync::{
    config::MetricsConfig,
    models::SourceKind,
    storage::{ListingStore, MemoryStore, SqliteStore},
    sync::SyncCoordinator,
    web::{create_router, AppState},
    AppConfig,
};

#[derive(Parser)]
#[command(name = "listing-sync", version, about = "Aggregates retailer listings and matches them to the product catalog")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP sync trigger (default)
    Serve,
    /// Run one sync and print the report as JSON
    Sync {
        /// Only sync one source class (`api` or `scraped`)
        #[arg(long)]
        class: Option<String>,
        /// Read the catalog from the database but keep results in memory
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("listing_sync=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load configuration")?;

    let store = SqliteStore::connect(&config.database)
        .await
        .context("failed to open database")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            store.migrate().await?;
            info!("Migrations applied");
        }
        Command::Sync { class, dry_run } => {
            store.migrate().await?;
            run_once(&config, store, class.as_deref(), dry_run).await?;
        }
        Command::Serve => {
            store.migrate().await?;
            serve(config, store).await?;
        }
    }

    Ok(())
}

async fn run_once(config: &AppConfig, store: SqliteStore, class: Option<&str>, dry_run: bool) -> Result<()> {
    let store: Arc<dyn ListingStore> = if dry_run {
        let memory = MemoryStore::with_catalog(store.list_products().await?, store.list_active_sources().await?).await;
        Arc::new(memory)
    } else {
        Arc::new(store)
    };
    let coordinator = SyncCoordinator::from_config(config, store).await?;

    let report = match class {
        Some(class) => {
            let kind = SourceKind::parse(class).with_context(|| format!("unknown source class '{}'", class))?;
            serde_json::to_string_pretty(&coordinator.run_class(kind).await?)?
        }
        None => serde_json::to_string_pretty(&coordinator.run_all().await?)?,
    };
    println!("{}", report);
    Ok(())
}

async fn serve(config: AppConfig, store: SqliteStore) -> Result<()> {
    if config.metrics.enabled {
        spawn_metrics_server(&config.metrics).await?;
    }

    let coordinator = SyncCoordinator::from_config(&config, Arc::new(store)).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_router(AppState {
        coordinator: Arc::new(coordinator),
        config,
    });

    let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn spawn_metrics_server(config: &MetricsConfig) -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let app = Router::new().route(
        &config.endpoint,
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, endpoint = %config.endpoint, "Serving metrics");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
