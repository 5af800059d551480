use async_trait::async_trait;
use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, Error as FailsafeError, StateMachine};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::domain::{AccountId, AccountSnapshot, AccountVersion};
use crate::ports::{AccountServiceClient, AccountServiceError, CircuitState};

/// Account as returned by `GET {base}/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    id: AccountId,
    account_number: String,
    #[serde(with = "crate::utils::decimal")]
    balance: BigDecimal,
    #[serde(default)]
    account_type: Option<String>,
    #[serde(default)]
    customer_id: Option<i64>,
    #[serde(default)]
    version: Option<serde_json::Value>,
}

impl AccountResponse {
    fn into_snapshot(self, etag: Option<String>) -> AccountSnapshot {
        let body_version = match self.version {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        AccountSnapshot {
            account_id: self.id,
            account_number: self.account_number,
            balance: self.balance,
            account_type: self.account_type,
            owner_id: self.customer_id,
            version: etag.or(body_version).map(AccountVersion::new),
        }
    }
}

/// HTTP client for the remote account service.
#[derive(Clone)]
pub struct HttpAccountClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpAccountClient {
    /// Creates a client with a 10 second timeout and a breaker that opens
    /// after 5 consecutive failures.
    pub fn new(base_url: String) -> Self {
        Self::with_settings(base_url, Duration::from_secs(10), 5, 30)
    }

    pub fn with_settings(
        base_url: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        HttpAccountClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            circuit_breaker,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_settings(
            config.account_service_url.clone(),
            config.account_service_timeout(),
            config.circuit_breaker_failure_threshold,
            config.circuit_breaker_reset_secs,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // Only transport and server failures trip the breaker; a missing account
    // or a stale version says nothing about the service's health.
    async fn guarded<T, F>(&self, call: F) -> Result<T, AccountServiceError>
    where
        F: Future<Output = Result<T, AccountServiceError>>,
    {
        let counts_as_failure =
            |err: &AccountServiceError| matches!(err, AccountServiceError::Unavailable(_));

        match self.circuit_breaker.call_with(counts_as_failure, call).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(AccountServiceError::Unavailable(
                "account service circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

fn transport_error(err: reqwest::Error) -> AccountServiceError {
    if err.is_timeout() {
        AccountServiceError::Unavailable("account service timed out".to_string())
    } else {
        AccountServiceError::Unavailable(format!("account service request failed: {err}"))
    }
}

#[async_trait]
impl AccountServiceClient for HttpAccountClient {
    async fn fetch_account(&self, account_id: AccountId) -> Result<AccountSnapshot, AccountServiceError> {
        let url = format!("{}/{}", self.base_url, account_id);
        let client = self.client.clone();

        self.guarded(async move {
            let response = client.get(&url).send().await.map_err(transport_error)?;

            match response.status() {
                StatusCode::NOT_FOUND => return Err(AccountServiceError::NotFound(account_id)),
                status if !status.is_success() => {
                    return Err(AccountServiceError::Unavailable(format!(
                        "account service returned {status} for account {account_id}"
                    )))
                }
                _ => {}
            }

            let etag = response
                .headers()
                .get(header::ETAG)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            let account = response
                .json::<AccountResponse>()
                .await
                .map_err(|e| AccountServiceError::Unavailable(format!("invalid account payload: {e}")))?;

            Ok(account.into_snapshot(etag))
        })
        .await
    }

    async fn adjust_balance(
        &self,
        account_id: AccountId,
        new_balance: &BigDecimal,
        expected_version: Option<&AccountVersion>,
    ) -> Result<(), AccountServiceError> {
        let url = format!("{}/{}/balance", self.base_url, account_id);
        let mut request = self
            .client
            .put(&url)
            .json(&serde_json::json!({ "balance": new_balance.to_string() }));
        if let Some(version) = expected_version {
            request = request.header(header::IF_MATCH, version.as_str());
        }

        self.guarded(async move {
            let response = request.send().await.map_err(transport_error)?;

            match response.status() {
                StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                    Err(AccountServiceError::VersionMismatch(account_id))
                }
                status if status.is_success() => Ok(()),
                status => Err(AccountServiceError::Unavailable(format!(
                    "account service returned {status} adjusting account {account_id}"
                ))),
            }
        })
        .await
    }

    fn circuit_state(&self) -> CircuitState {
        if self.circuit_breaker.is_call_permitted() {
            CircuitState::Closed
        } else {
            CircuitState::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::str::FromStr;

    fn account_body(balance: &str) -> String {
        format!(
            r#"{{"id": 1, "accountNumber": "ACC-1", "balance": {balance}, "accountType": "SAVINGS", "customerId": 77}}"#
        )
    }

    #[test]
    fn test_client_creation_trims_base_url() {
        let client = HttpAccountClient::new("http://accounts:8080/account/".to_string());
        assert_eq!(client.base_url(), "http://accounts:8080/account");
        assert_eq!(client.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_fetch_account() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(account_body("250.75"))
            .create_async()
            .await;

        let client = HttpAccountClient::new(server.url());
        let account = client.fetch_account(1).await.unwrap();

        assert_eq!(account.account_id, 1);
        assert_eq!(account.account_number, "ACC-1");
        assert_eq!(account.balance, BigDecimal::from_str("250.75").unwrap());
        assert_eq!(account.account_type.as_deref(), Some("SAVINGS"));
        assert_eq!(account.owner_id, Some(77));
        assert!(account.version.is_none());
    }

    #[tokio::test]
    async fn test_fetch_account_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/9").with_status(404).create_async().await;

        let client = HttpAccountClient::new(server.url());
        let result = client.fetch_account(9).await;

        assert_eq!(result.unwrap_err(), AccountServiceError::NotFound(9));
        assert_eq!(client.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_fetch_account_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/1").with_status(503).create_async().await;

        let client = HttpAccountClient::new(server.url());
        let result = client.fetch_account(1).await;

        assert!(matches!(result, Err(AccountServiceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_etag_is_sent_back_as_if_match() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("etag", "\"v7\"")
            .with_body(account_body("\"100\""))
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/1/balance")
            .match_header("if-match", "\"v7\"")
            .match_body(Matcher::Json(serde_json::json!({ "balance": "150" })))
            .with_status(200)
            .create_async()
            .await;

        let client = HttpAccountClient::new(server.url());
        let account = client.fetch_account(1).await.unwrap();
        assert_eq!(account.version, Some(AccountVersion::new("\"v7\"")));

        client
            .adjust_balance(1, &BigDecimal::from(150), account.version.as_ref())
            .await
            .unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_body_version_is_used_without_etag() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 1, "accountNumber": "ACC-1", "balance": 10, "version": 3}"#)
            .create_async()
            .await;

        let client = HttpAccountClient::new(server.url());
        let account = client.fetch_account(1).await.unwrap();

        assert_eq!(account.version, Some(AccountVersion::new("3")));
    }

    #[tokio::test]
    async fn test_adjust_version_mismatch() {
        let mut server = mockito::Server::new_async().await;
        let _conflict = server.mock("PUT", "/1/balance").with_status(409).create_async().await;
        let _precondition = server.mock("PUT", "/2/balance").with_status(412).create_async().await;

        let client = HttpAccountClient::new(server.url());
        let version = AccountVersion::new("4");

        assert_eq!(
            client.adjust_balance(1, &BigDecimal::from(5), Some(&version)).await,
            Err(AccountServiceError::VersionMismatch(1))
        );
        assert_eq!(
            client.adjust_balance(2, &BigDecimal::from(5), Some(&version)).await,
            Err(AccountServiceError::VersionMismatch(2))
        );
    }

    #[tokio::test]
    async fn test_adjust_without_version_omits_if_match() {
        let mut server = mockito::Server::new_async().await;
        let put = server
            .mock("PUT", "/1/balance")
            .match_header("if-match", Matcher::Missing)
            .with_status(204)
            .create_async()
            .await;

        let client = HttpAccountClient::new(server.url());
        client.adjust_balance(1, &BigDecimal::from(5), None).await.unwrap();
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/1")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let client = HttpAccountClient::with_settings(server.url(), Duration::from_secs(5), 3, 60);

        for _ in 0..3 {
            let _ = client.fetch_account(1).await;
        }

        let result = client.fetch_account(1).await;
        assert_eq!(
            result.unwrap_err(),
            AccountServiceError::Unavailable("account service circuit breaker is open".to_string())
        );
        assert_eq!(client.circuit_state(), CircuitState::Open);
    }
}
