use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::accounts::HttpAccountClient;
use crate::adapters::{
    InMemoryDeadLetterSink, InMemoryIdempotencyStore, InMemoryTransactionStore,
    PostgresDeadLetterSink, PostgresTransactionStore, RedisIdempotencyStore,
};
use crate::config::Config;
use crate::ports::{DeadLetterSink, IdempotencyStore, TransactionStore};
use crate::processors::ProcessorContext;
use crate::services::TransactionService;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Failed,
    /// The dependency is not configured; an in-memory fallback is used.
    Skipped,
}

#[derive(Debug)]
pub struct ValidationReport {
    pub environment: CheckStatus,
    pub database: CheckStatus,
    pub redis: CheckStatus,
    pub account_service: CheckStatus,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        [self.environment, self.database, self.redis, self.account_service]
            .iter()
            .all(|status| *status != CheckStatus::Failed)
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Redis Connectivity:    {}", status(self.redis));
        println!("Account Service:       {}", status(self.account_service));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(check: CheckStatus) -> &'static str {
    match check {
        CheckStatus::Ok => "✅ OK",
        CheckStatus::Failed => "❌ FAIL",
        CheckStatus::Skipped => "➖ SKIPPED (in-memory)",
    }
}

fn record(report_status: &mut CheckStatus, errors: &mut Vec<String>, label: &str, result: Option<Result<()>>) {
    *report_status = match result {
        None => CheckStatus::Skipped,
        Some(Ok(())) => CheckStatus::Ok,
        Some(Err(e)) => {
            errors.push(format!("{label}: {e:#}"));
            CheckStatus::Failed
        }
    };
}

pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        environment: CheckStatus::Ok,
        database: CheckStatus::Skipped,
        redis: CheckStatus::Skipped,
        account_service: CheckStatus::Ok,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = CheckStatus::Failed;
        report.errors.push(format!("Environment: {e:#}"));
    }

    let database = async {
        match &config.database_url {
            Some(url) => Some(validate_database(url).await),
            None => None,
        }
    };
    let redis = async {
        match &config.redis_url {
            Some(url) => Some(validate_redis(url).await),
            None => None,
        }
    };
    let accounts = validate_account_service(&config.account_service_url, config.account_service_timeout());

    let (database, redis, accounts) = futures::join!(database, redis, accounts);

    record(&mut report.database, &mut report.errors, "Database", database);
    record(&mut report.redis, &mut report.errors, "Redis", redis);
    record(&mut report.account_service, &mut report.errors, "Account service", Some(accounts));

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.circuit_breaker_failure_threshold == 0 {
        anyhow::bail!("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be greater than 0");
    }

    url::Url::parse(&config.account_service_url)
        .context("ACCOUNT_SERVICE_URL is not a valid URL")?;
    if let Some(database_url) = &config.database_url {
        url::Url::parse(database_url).context("DATABASE_URL is not a valid URL")?;
    }
    if let Some(redis_url) = &config.redis_url {
        url::Url::parse(redis_url).context("REDIS_URL is not a valid URL")?;
    }

    Ok(())
}

async fn validate_database(database_url: &str) -> Result<()> {
    let pool = crate::db::create_pool(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .context("Failed to query database")?;

    Ok(())
}

async fn validate_redis(redis_url: &str) -> Result<()> {
    let client = redis::Client::open(redis_url).context("Invalid Redis URL")?;

    let mut conn = client
        .get_multiplexed_tokio_connection()
        .await
        .context("Failed to connect to Redis")?;

    redis::cmd("PING")
        .query_async::<_, String>(&mut conn)
        .await
        .context("Redis PING failed")?;

    Ok(())
}

// Any answer below 500 means the service is up; the base path itself is not
// necessarily a valid resource.
async fn validate_account_service(base_url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let response = client
        .get(base_url)
        .send()
        .await
        .context("Failed to connect to account service")?;

    if response.status().is_server_error() {
        anyhow::bail!("Account service returned status: {}", response.status());
    }

    Ok(())
}

/// Wires the service from configuration: Postgres when `DATABASE_URL` is
/// set, Redis when `REDIS_URL` is set, in-memory otherwise.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let accounts = Arc::new(HttpAccountClient::from_config(config));
    tracing::info!(url = %config.account_service_url, "Account service client initialized");

    let store: Arc<dyn TransactionStore>;
    let dead_letters: Arc<dyn DeadLetterSink>;
    match &config.database_url {
        Some(url) => {
            let pool = crate::db::create_pool(url).await?;
            crate::db::run_migrations(&pool, Path::new("./migrations")).await?;
            tracing::info!("Database migrations completed");
            store = Arc::new(PostgresTransactionStore::new(pool.clone()));
            dead_letters = Arc::new(PostgresDeadLetterSink::new(pool));
        }
        None => {
            tracing::warn!("DATABASE_URL not set, transactions are kept in memory");
            store = Arc::new(InMemoryTransactionStore::new());
            dead_letters = Arc::new(InMemoryDeadLetterSink::new());
        }
    }

    let idempotency: Arc<dyn IdempotencyStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisIdempotencyStore::new(url)?),
        None => {
            tracing::warn!("REDIS_URL not set, idempotency keys are kept in memory");
            Arc::new(InMemoryIdempotencyStore::new())
        }
    };

    let ctx = ProcessorContext::new(accounts, store, dead_letters)
        .with_compensation(config.compensation_policy());
    let service = TransactionService::new(ctx, idempotency)
        .with_conflict_retries(config.conflict_retry_limit);

    Ok(AppState {
        service: Arc::new(service),
    })
}
