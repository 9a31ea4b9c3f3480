use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use ledger_core::config::env_required;
use ledger_core::AssetCatalog;
use ledger_custody::{CustodyApi, CustodyConfig, CustodyHttpClient};
use ledger_db::{Attribution, DatabaseConfig, DatabasePool, Subledger};
use ledger_reconciler::{load_monitored_wallets, Reconciler, ReconcilerConfig};

/// How long shutdown waits for in-flight work before forcing termination.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("ledger_reconciler=info".parse()?)
                .add_directive("ledger_db=info".parse()?),
        )
        .init();

    info!("Custody subledger starting...");

    let db_config = match DatabaseConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load database configuration");
            std::process::exit(1);
        }
    };
    let reconciler_config = match ReconcilerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load reconciler configuration");
            std::process::exit(1);
        }
    };
    let custody_config = match CustodyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load custody configuration");
            std::process::exit(1);
        }
    };
    let portfolio_id = match env_required("CUSTODY_PORTFOLIO_ID") {
        Ok(portfolio_id) => portfolio_id,
        Err(e) => {
            error!(error = %e, "Failed to resolve custody portfolio");
            std::process::exit(1);
        }
    };

    let pool = match DatabasePool::new(&db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to open database");
            std::process::exit(1);
        }
    };
    if let Err(e) = pool.init_schema().await {
        error!(error = %e, "Failed to initialize schema");
        std::process::exit(1);
    }

    let catalog = match AssetCatalog::load(Path::new(&reconciler_config.assets_file)) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "Failed to load asset catalog");
            std::process::exit(1);
        }
    };

    let custody: Arc<dyn CustodyApi> = match CustodyHttpClient::new(custody_config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to initialize custody client");
            std::process::exit(1);
        }
    };

    let subledger = Arc::new(Subledger::new(&pool));
    let attribution = Arc::new(Attribution::new(&pool));

    match subledger.most_recent_transaction_time().await {
        Ok(watermark) => info!(watermark = %watermark, "Resuming from ledger watermark"),
        Err(e) => warn!(error = %e, "Failed to read ledger watermark"),
    }

    let wallets = match load_monitored_wallets(&pool, &catalog).await {
        Ok(wallets) => wallets,
        Err(e) => {
            error!(error = %e, "Failed to load monitored wallets");
            std::process::exit(1);
        }
    };
    if wallets.is_empty() {
        warn!("No monitored wallets found; new addresses are picked up on restart");
    }

    let reconciler = Arc::new(Reconciler::new(
        custody,
        subledger,
        attribution,
        reconciler_config,
        portfolio_id,
        wallets,
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    let shutdown_trigger = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received (Ctrl+C)");
        shutdown_trigger.send(()).ok();
    });

    let mut shutdown_observer = shutdown_tx.subscribe();
    let run_handle = tokio::spawn(reconciler.run(shutdown_rx));

    info!("Reconciler running, waiting for transactions...");
    let _ = shutdown_observer.recv().await;
    info!("Stopping reconciler...");

    match tokio::time::timeout(SHUTDOWN_DEADLINE, run_handle).await {
        Ok(Ok(Ok(()))) => info!("Reconciler stopped gracefully"),
        Ok(Ok(Err(e))) => error!(error = %e, "Reconciler exited with error"),
        Ok(Err(e)) => error!(error = %e, "Reconciler task failed"),
        Err(_) => warn!("Forced shutdown after timeout"),
    }

    pool.close().await;
    info!("Custody subledger shutdown complete");
    Ok(())
}
