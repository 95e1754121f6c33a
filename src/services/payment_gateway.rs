//! Payment gateway client
//!
//! Razorpay-compatible order creation over HTTPS. Every call runs under the
//! configured timeout; the engine never writes a payment row for an order
//! the gateway did not acknowledge.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::environment::GatewayConfig;
use crate::utils::errors::AppError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout | GatewayError::Transport(_) => {
                AppError::GatewayUnavailable(e.to_string())
            }
            GatewayError::Rejected { status, .. } if status >= 500 => {
                AppError::GatewayUnavailable(e.to_string())
            }
            GatewayError::Rejected { .. } | GatewayError::InvalidResponse(_) => {
                AppError::GatewayRejected(e.to_string())
            }
        }
    }
}

/// Order creation request, in gateway wire format
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderRequest {
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    /// 1 = capture automatically
    pub payment_capture: u8,
    pub notes: serde_json::Value,
}

/// Order acknowledged by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: serde_json::Value,
    /// Full response body, kept for audit
    #[serde(skip)]
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the checkout widget
    fn key_id(&self) -> &str;

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError>;
}

pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Error building gateway client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/orders", self.base_url);
        debug!("📤 Creating gateway order: receipt={} amount={}", request.receipt, request.amount);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Gateway rejected order {}: {} {}", request.receipt, status, body);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let raw: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::InvalidResponse(e.to_string())
            }
        })?;

        let mut order: GatewayOrder = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        order.raw = raw;

        info!("✅ Gateway order {} created for receipt {}", order.id, request.receipt);
        Ok(order)
    }
}
