use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::PgPool;

use naffa_core::adapters::PostgresLedger;
use naffa_core::config::Config;
use naffa_core::domain::IntentStatus;
use naffa_core::ports::{LedgerStore, Notifier};
use naffa_core::services::notifier::NoopNotifier;
use naffa_core::services::reconcile::{self, ApplyRow};
use naffa_core::settlement::SettlementEngine;

#[derive(Parser)]
#[command(name = "naffa-core")]
#[command(about = "Transaction intent & settlement engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Reconcile a provider CSV export against the ledger
    Reconcile {
        /// Path to the semicolon-delimited export file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Apply exact matches after classification (mismatches are only
        /// ever reported)
        #[arg(long)]
        apply: bool,
    },

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Administratively reverse a COMPLETED intent
    Reverse {
        /// Intent reference number
        #[arg(value_name = "REFERENCE")]
        reference: String,

        /// Target status: FAILED or CANCELLED
        #[arg(long, default_value = "FAILED")]
        to: String,

        /// Reason recorded on the intent and in the audit log
        #[arg(long)]
        reason: String,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    use sqlx::migrate::Migrator;

    let pool = PgPool::connect(&config.database_url).await?;
    let migrator = Migrator::new(Path::new("./migrations")).await?;

    tracing::info!("Running database migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Database migrations completed");
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_reconcile(config: &Config, file: &Path, apply: bool) -> anyhow::Result<()> {
    let pool = PgPool::connect(&config.database_url).await?;
    let ledger: Arc<dyn LedgerStore> = Arc::new(PostgresLedger::new(pool));

    let reader = std::fs::File::open(file)?;
    let export = reconcile::parse_export(reader);
    println!(
        "Parsed {} in-scope row(s) ({} skipped, {} out of scope)",
        export.rows.len(),
        export.skipped,
        export.out_of_scope
    );

    let report = reconcile::classify(&ledger, export).await?;
    println!("Exact matches:        {}", report.exact.len());
    println!("Amount mismatches:    {}", report.amount_mismatch.len());
    println!("Not found internally: {}", report.not_found.len());
    println!(
        "Missing from provider: {}",
        report.missing_from_provider.len()
    );

    for matched in &report.amount_mismatch {
        println!(
            "  MISMATCH {} intent={} provider={} discrepancy={}",
            matched.row.reference_number,
            matched
                .intent_amount
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            matched.row.amount,
            matched
                .discrepancy
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default(),
        );
    }

    if apply {
        let rows: Vec<ApplyRow> = report
            .exact
            .iter()
            .map(|matched| ApplyRow {
                reference_number: matched.row.reference_number.clone(),
                provider_transaction_id: matched.row.provider_transaction_id.clone(),
                amount: matched.row.amount.clone(),
                status_code: matched.row.status_code.clone(),
            })
            .collect();

        let notifier: Arc<dyn Notifier> = Arc::new(NoopNotifier);
        let engine = SettlementEngine::new(ledger, notifier);
        let results = reconcile::apply(&engine, rows).await;

        for result in &results {
            match (&result.error, result.duplicate) {
                (Some(error), _) => {
                    println!("  FAILED {}: {}", result.reference_number, error)
                }
                (None, true) => println!("  SKIPPED {} (already settled)", result.reference_number),
                (None, false) => println!("  APPLIED {}", result.reference_number),
            }
        }
    }

    Ok(())
}

pub async fn handle_tx_reverse(
    config: &Config,
    reference: &str,
    to: &str,
    reason: &str,
) -> anyhow::Result<()> {
    let target: IntentStatus = to
        .to_uppercase()
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let pool = PgPool::connect(&config.database_url).await?;
    let ledger = PostgresLedger::new(pool);
    let outcome = ledger
        .reverse(reference, target, reason)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    println!(
        "✓ Intent {} reversed: {} -> {}",
        reference, outcome.previous_status, outcome.intent.status
    );
    Ok(())
}
