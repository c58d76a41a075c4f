mod cli;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use naffa_core::adapters::PostgresLedger;
use naffa_core::config::Config;
use naffa_core::ports::{LedgerStore, Notifier};
use naffa_core::services::notifier::{HttpNotifier, NoopNotifier};
use naffa_core::{create_app, AppState};

use cli::{Cli, Commands, DbCommands, TxCommands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let args = Cli::parse();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Reconcile { file, apply } => {
            cli::handle_reconcile(&config, &file, apply).await
        }
        Commands::Tx(TxCommands::Reverse {
            reference,
            to,
            reason,
        }) => cli::handle_tx_reverse(&config, &reference, &to, &reason).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = sqlx::PgPool::connect(&config.database_url).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let ledger: Arc<dyn LedgerStore> = Arc::new(PostgresLedger::new(pool));
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(endpoint = %url, "completion notifications enabled");
            Arc::new(HttpNotifier::new(url.clone()))
        }
        None => {
            tracing::info!("no notification endpoint configured, completions will not notify");
            Arc::new(NoopNotifier)
        }
    };

    let app = create_app(AppState::new(ledger, notifier));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
