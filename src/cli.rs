use clap::{Parser, Subcommand};
use std::path::Path;

use crate::adapters::{PostgresDeadLetterSink, PostgresTransactionStore};
use crate::config::Config;
use crate::ports::{DeadLetterSink, TransactionStore};

#[derive(Parser)]
#[command(name = "ledger-relay")]
#[command(about = "Ledger Relay - deposit, withdrawal and transfer orchestration", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction log commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Compensation dead-letter commands
    #[command(subcommand)]
    Dlq(DlqCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Print every recorded transaction in insertion order
    History,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum DlqCommands {
    /// List compensations that could not be applied
    List,
}

fn require_database_url(config: &Config) -> anyhow::Result<&str> {
    config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for this command"))
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(require_database_url(config)?).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool, Path::new("./migrations")).await?;

    tracing::info!("Database migrations completed");
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_tx_history(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(require_database_url(config)?).await?;
    let transactions = PostgresTransactionStore::new(pool).list_all().await?;

    if transactions.is_empty() {
        println!("No transactions recorded");
        return Ok(());
    }

    println!(
        "{:<38} {:<11} {:>16} {:<20} {:<20} {:<20}",
        "ID", "Type", "Amount", "Origin", "Destination", "Date"
    );
    println!("{}", "-".repeat(130));

    for tx in transactions {
        println!(
            "{:<38} {:<11} {:>16} {:<20} {:<20} {:<20}",
            tx.id,
            tx.kind.as_str(),
            tx.amount.to_string(),
            tx.origin_account,
            tx.destination_account.as_deref().unwrap_or("-"),
            tx.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
    }

    Ok(())
}

pub async fn handle_dlq_list(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(require_database_url(config)?).await?;
    let letters = PostgresDeadLetterSink::new(pool).list().await?;

    if letters.is_empty() {
        println!("No pending compensations");
        return Ok(());
    }

    println!(
        "{:<38} {:<38} {:>10} {:>16} {:>8}  Reason",
        "ID", "Operation", "Account", "Delta", "Attempts"
    );
    println!("{}", "-".repeat(130));

    for letter in letters {
        println!(
            "{:<38} {:<38} {:>10} {:>16} {:>8}  {}",
            letter.id,
            letter.operation_id,
            letter.account_id,
            letter.balance_delta.to_string(),
            letter.attempts,
            letter.reason,
        );
    }

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Account Service URL: {}", config.account_service_url);
    println!(
        "  Database URL: {}",
        config
            .database_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "(in-memory)".to_string())
    );
    println!(
        "  Redis URL: {}",
        config
            .redis_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "(in-memory)".to_string())
    );
    println!(
        "  Compensation: {} attempt(s), {}ms initial backoff",
        config.compensation_max_attempts, config.compensation_backoff_ms
    );
    println!("  Conflict Retries: {}", config.conflict_retry_limit);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
