use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::{
    config::GatewayConfig,
    domain::TransactionState,
    error::{AppError, Result},
};

/// Authoritative source of transaction state.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn transaction_status(&self, order_id: &str) -> Result<TransactionState>;
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: Option<String>,
    status_message: Option<String>,
    transaction_status: Option<String>,
    payment_type: Option<String>,
    transaction_id: Option<String>,
}

/// Client for the gateway's `GET /v2/{order_id}/status` endpoint.
pub struct HttpGatewayClient {
    client: Client,
    base_url: Url,
    server_key: String,
}

impl HttpGatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| AppError::Internal(format!("Invalid gateway base URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            server_key: config.server_key.clone(),
        })
    }

    fn status_url(&self, order_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Gateway base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(&["v2", order_id, "status"]);
        Ok(url)
    }
}

#[async_trait]
impl PaymentGateway for HttpGatewayClient {
    async fn transaction_status(&self, order_id: &str) -> Result<TransactionState> {
        let url = self.status_url(order_id)?;

        let response = self
            .client
            .get(url)
            .basic_auth(&self.server_key, Some(""))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Status request failed: {}", e)))?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(AppError::Gateway(format!(
                "Status request for {} returned HTTP {}",
                order_id, http_status
            )));
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid status response: {}", e)))?;

        // The gateway reports lookup failures inside a 200 body.
        let transaction_status = body.transaction_status.ok_or_else(|| {
            AppError::Gateway(format!(
                "No transaction status for {} (code {}: {})",
                order_id,
                body.status_code.as_deref().unwrap_or("?"),
                body.status_message.as_deref().unwrap_or("no message"),
            ))
        })?;

        tracing::debug!(
            order_id = %order_id,
            transaction_status = %transaction_status,
            "Resolved transaction status"
        );

        Ok(TransactionState {
            transaction_status,
            payment_type: body.payment_type,
            transaction_id: body.transaction_id,
        })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeGateway;

#[cfg(any(test, feature = "test-utils"))]
mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory gateway returning canned states per order id.
    #[derive(Default)]
    pub struct FakeGateway {
        states: Mutex<HashMap<String, std::result::Result<TransactionState, String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_status(&self, order_id: &str, transaction_status: &str) {
            self.set_state(
                order_id,
                TransactionState {
                    transaction_status: transaction_status.to_string(),
                    payment_type: Some("bank_transfer".to_string()),
                    transaction_id: Some(format!("txn-{}", order_id)),
                },
            );
        }

        pub fn set_state(&self, order_id: &str, state: TransactionState) {
            self.states.lock().unwrap().insert(order_id.to_string(), Ok(state));
        }

        pub fn set_error(&self, order_id: &str, error: &str) {
            self.states.lock().unwrap().insert(order_id.to_string(), Err(error.to_string()));
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn transaction_status(&self, order_id: &str) -> Result<TransactionState> {
            self.calls.lock().unwrap().push(order_id.to_string());
            match self.states.lock().unwrap().get(order_id) {
                Some(Ok(state)) => Ok(state.clone()),
                Some(Err(e)) => Err(AppError::Gateway(e.clone())),
                None => Err(AppError::Gateway(format!("Unknown order {}", order_id))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> GatewayConfig {
        GatewayConfig {
            server_key: "key".to_string(),
            api_base_url: base.to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_status_url_escapes_order_id() {
        let client = HttpGatewayClient::new(&config("https://api.example.com/")).unwrap();
        let url = client.status_url("ORD 1001/x").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/ORD%201001%2Fx/status");
    }

    #[test]
    fn test_status_url_without_trailing_slash() {
        let client = HttpGatewayClient::new(&config("https://api.example.com")).unwrap();
        let url = client.status_url("ORD-1001").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/ORD-1001/status");
    }

    #[tokio::test]
    async fn test_fake_gateway_returns_configured_state() {
        let gateway = FakeGateway::new();
        gateway.set_status("ORD-1", "settlement");
        gateway.set_error("ORD-2", "timeout");

        let state = gateway.transaction_status("ORD-1").await.unwrap();
        assert_eq!(state.transaction_status, "settlement");
        assert!(matches!(
            gateway.transaction_status("ORD-2").await,
            Err(AppError::Gateway(_))
        ));
        assert_eq!(gateway.calls(), vec!["ORD-1".to_string(), "ORD-2".to_string()]);
    }
}
