//! Live gateway client.
//!
//! Thin reqwest wrapper over the gateway's HTTP API: bounded timeout,
//! secure API-key handling, provider failure reasons surfaced verbatim.
//! No retry loop lives here; see the trait docs in [`super::gateway`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PointeError, Result};

use super::gateway::{ChargeReceipt, CreateSessionRequest, GatewayClient, GatewaySession};

/// Configuration for the live gateway client.
#[derive(Debug, Clone)]
pub struct LiveGatewayConfig {
    /// Base URL of the gateway API.
    pub base_url: String,
    /// Request timeout. Gateway calls block the calling task for at most
    /// this long.
    pub timeout_seconds: u64,
}

impl Default for LiveGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gateway.example.com/api".to_string(),
            timeout_seconds: 5,
        }
    }
}

/// Production gateway client.
///
/// The API key is held in a [`SecretString`] and never appears in debug
/// output.
#[derive(Clone)]
pub struct LiveGatewayClient {
    http: reqwest::Client,
    config: LiveGatewayConfig,
    api_key: SecretString,
}

impl LiveGatewayClient {
    /// Create a new live client.
    ///
    /// # Errors
    /// Returns a validation error when the base URL does not parse or the
    /// HTTP client cannot be constructed.
    pub fn new(api_key: impl Into<SecretString>, config: LiveGatewayConfig) -> Result<Self> {
        url::Url::parse(&config.base_url)
            .map_err(|e| PointeError::validation(format!("invalid gateway URL: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PointeError::internal(format!("http client: {e}")))?;

        Ok(Self {
            http,
            config,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                // Includes timeouts; treated as a network error.
                PointeError::external(format!("gateway request failed: {e}"))
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PointeError::external(format!("gateway response read failed: {e}")))?;

        if !status.is_success() {
            let reason = String::from_utf8_lossy(&bytes);
            return Err(PointeError::external(format!(
                "gateway returned {status}: {reason}"
            )));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| PointeError::external(format!("malformed gateway response: {e}")))
    }
}

impl std::fmt::Debug for LiveGatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveGatewayClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// Wire shapes for the gateway's documented endpoints. Treated as opaque
// beyond the fields consumed here.

#[derive(Serialize)]
struct WireCreateSession<'a> {
    unique_id: &'a str,
    amount: f64,
    description: &'a str,
    create_token: bool,
    success_url: &'a str,
    failure_url: &'a str,
    customer_email: Option<&'a str>,
    customer_name: Option<&'a str>,
    customer_phone: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireSessionCreated {
    session_id: String,
    payment_url: String,
}

#[derive(Serialize)]
struct WireChargeToken<'a> {
    token: &'a str,
    amount: f64,
    unique_id: &'a str,
}

#[derive(Deserialize)]
struct WireCharged {
    reference_number: String,
    approval_number: String,
}

#[derive(Serialize)]
struct WireRefund<'a> {
    reference_number: &'a str,
    amount: f64,
}

#[derive(Deserialize)]
struct WireRefunded {
    #[allow(dead_code)]
    reference_number: String,
}

#[async_trait]
impl GatewayClient for LiveGatewayClient {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<GatewaySession> {
        let body = WireCreateSession {
            unique_id: &request.reference,
            amount: request.amount_cents as f64 / 100.0,
            description: &request.product_name,
            create_token: request.recurring,
            success_url: &request.callback_url,
            failure_url: &request.failure_callback_url,
            customer_email: request.customer.email.as_deref(),
            customer_name: request.customer.full_name.as_deref(),
            customer_phone: request.customer.phone.as_deref(),
        };

        let created: WireSessionCreated = self.post("sessions", &body).await?;
        tracing::debug!(
            target: "pointe::checkout",
            reference = %request.reference,
            gateway_session = %created.session_id,
            "gateway session created"
        );
        Ok(GatewaySession {
            gateway_session_id: created.session_id,
            checkout_url: created.payment_url,
        })
    }

    async fn charge_token(
        &self,
        token: &str,
        amount_cents: i64,
        reference: &str,
    ) -> Result<ChargeReceipt> {
        let body = WireChargeToken {
            token,
            amount: amount_cents as f64 / 100.0,
            unique_id: reference,
        };

        let charged: WireCharged = self.post("charges", &body).await?;
        Ok(ChargeReceipt {
            reference_number: charged.reference_number,
            approval_number: charged.approval_number,
        })
    }

    async fn refund(&self, reference_number: &str, amount_cents: i64) -> Result<()> {
        let body = WireRefund {
            reference_number,
            amount: amount_cents as f64 / 100.0,
        };
        let _: WireRefunded = self.post("refunds", &body).await?;
        Ok(())
    }
}
