use rebase_keeper::config::{Config, LastRebaseBackend};
use rebase_keeper::jobs::confirmation::FixedDelayConfirmation;
use rebase_keeper::jobs::rebase_cycle::RebaseCycle;
use rebase_keeper::services::chain_client::{AlloyChainClient, ChainClient};
use rebase_keeper::services::last_rebase_store::{
    DbLastRebaseStore, FileLastRebaseStore, LastRebaseStore,
};
use rebase_keeper::services::quote_provider::HttpQuoteProvider;
use rebase_keeper::services::rebase_history_store::DbRebaseHistoryStore;
use sea_orm::Database;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rebase_keeper=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Rebase cycle aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    let database_url = config
        .database_url
        .as_deref()
        .ok_or("DATABASE_URL must be set")?;

    let chain: Arc<dyn ChainClient> =
        Arc::new(AlloyChainClient::new(&config.chain, config.http_timeout).await?);

    let quotes = Arc::new(HttpQuoteProvider::new(
        &config.quotes,
        config.pool,
        chain.clone(),
        config.http_timeout,
    )?);

    let last_rebase: Arc<dyn LastRebaseStore> = match &config.last_rebase_backend {
        LastRebaseBackend::Database => {
            Arc::new(DbLastRebaseStore::new(Database::connect(database_url).await?))
        }
        LastRebaseBackend::File(path) => {
            tracing::info!(path = %path.display(), "Using file-backed last rebase store");
            Arc::new(FileLastRebaseStore::new(path.clone()))
        }
    };

    // Connect to database
    tracing::info!("Connecting to database...");
    let history = Arc::new(DbRebaseHistoryStore::new(Database::connect(database_url).await?));
    let confirmation = Arc::new(FixedDelayConfirmation::new(config.cycle.confirmation_window()));

    let cycle = RebaseCycle::new(config.cycle, chain, quotes, last_rebase, history, confirmation);

    let report = cycle.run().await?;

    tracing::info!(
        seconds_to_rebase = report.seconds_to_rebase,
        rebase_tx = %report.rebase_tx,
        total_supply = %report.total_supply,
        raised = ?report.entry.raised,
        "Rebase cycle completed"
    );

    Ok(())
}
