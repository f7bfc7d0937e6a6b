//! Paystack gateway client
//!
//! Thin HTTP client over the Paystack transaction API plus webhook
//! signature verification. Amounts cross the wire in minor units
//! (pesewas), so every outbound amount is multiplied by 100 here and
//! nowhere else.

use anyhow::{anyhow, bail, Context, Result};
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;
use tracing::warn;

type HmacSha512 = Hmac<Sha512>;

#[derive(Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    webhook_secret: Option<String>,
}

#[derive(Debug)]
pub struct InitializeParams {
    pub email: String,
    /// Amount in minor units (pesewas)
    pub amount_minor: i64,
    pub reference: String,
    pub callback_url: String,
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    pub status: bool,
    pub data: Option<VerifiedTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct VerifiedTransaction {
    pub status: String,
    pub amount: i64,
    pub reference: String,
    pub gateway_response: Option<String>,
    pub currency: Option<String>,
}

impl VerifiedTransaction {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub reference: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub gateway_response: Option<String>,
    pub customer: Option<Value>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

/// Converts a decimal major-unit amount to integer minor units,
/// truncating sub-pesewa precision. Returns `None` on overflow.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).trunc().to_i64()
}

impl PaystackClient {
    pub fn new(base_url: String, secret_key: String, webhook_secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            secret_key,
            webhook_secret,
        }
    }

    pub async fn initialize_transaction(
        &self,
        params: InitializeParams,
    ) -> Result<InitializedTransaction> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let body = serde_json::json!({
            "email": params.email,
            "amount": params.amount_minor,
            "reference": params.reference,
            "callback_url": params.callback_url,
            "metadata": params.metadata,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach payment gateway")?;

        let envelope: Envelope<InitializedTransaction> = response
            .json()
            .await
            .context("Failed to parse gateway initialize response")?;

        if !envelope.status {
            bail!(
                "Gateway rejected transaction: {}",
                envelope.message.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        envelope
            .data
            .ok_or_else(|| anyhow!("Gateway initialize response missing data"))
    }

    pub async fn verify_transaction(&self, reference: &str) -> Result<VerifyResponse> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("Failed to reach payment gateway")?;

        let envelope: Envelope<VerifiedTransaction> = response
            .json()
            .await
            .context("Failed to parse gateway verify response")?;

        Ok(VerifyResponse {
            status: envelope.status,
            data: envelope.data,
        })
    }

    /// Verifies the `x-paystack-signature` header: hex-encoded
    /// HMAC-SHA512 of the raw request body. Fails closed when no
    /// webhook secret is configured.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        let Some(secret) = &self.webhook_secret else {
            warn!("Webhook received but no webhook secret is configured; rejecting");
            return false;
        };

        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }

    pub fn parse_webhook_event(body: &[u8]) -> Option<WebhookEvent> {
        serde_json::from_slice(body).ok()
    }
}
