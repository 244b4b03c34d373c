use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::info;

use crate::charges::ChargeQueue;
use crate::models::charge::{ChargeResponse, PixCharge};

// No overall timeout on the shared client: the SSE stream is long-lived.
// Request deadlines are applied per call instead.
static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build reqwest client")
});

pub(crate) fn http_client() -> &'static reqwest::Client {
    &CLIENT
}

#[derive(Debug, Serialize)]
pub struct CreateChargeRequest {
    #[serde(rename = "payerName")]
    pub payer_name: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub email: String,
}

impl CreateChargeRequest {
    /// Rejects obviously invalid input before it reaches the backend.
    pub fn validate(&self) -> Result<(), String> {
        if self.payer_name.trim().is_empty() {
            return Err("Enter the payer name.".to_string());
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err("Enter a valid e-mail.".to_string());
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err("Enter a valid amount.".to_string());
        }
        Ok(())
    }
}

/// Issues a charge-creation request and maps the response to a `PixCharge`.
pub async fn create_charge(
    api_base: &str,
    charge_path: &str,
    req: &CreateChargeRequest,
) -> Result<PixCharge> {
    let url = format!("{}{}", api_base.trim_end_matches('/'), charge_path);
    let response = http_client()
        .post(&url)
        .timeout(Duration::from_secs(30))
        .json(req)
        .send()
        .await
        .context("charge creation request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("charge creation failed (HTTP {}). {}", status, body);
    }

    let parsed: ChargeResponse = response
        .json()
        .await
        .context("invalid charge creation response")?;
    Ok(PixCharge::from_response(parsed, Utc::now()))
}

/// Creates a charge and enqueues it on success. Failure is surfaced as an
/// operator-readable message and leaves the queue untouched.
pub async fn submit_charge(
    queue: &ChargeQueue,
    api_base: &str,
    charge_path: &str,
    req: &CreateChargeRequest,
) -> Result<PixCharge, String> {
    req.validate()?;
    match create_charge(api_base, charge_path, req).await {
        Ok(charge) => {
            info!(payment_id = charge.payment_id, "charge created");
            queue.enqueue(charge.clone());
            Ok(charge)
        }
        Err(e) => Err(format!("{e:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, amount: f64) -> CreateChargeRequest {
        CreateChargeRequest {
            payer_name: name.to_string(),
            amount,
            message: None,
            email: email.to_string(),
        }
    }

    #[test]
    fn validation_rejects_incomplete_requests() {
        assert!(request("", "a@b.c", 10.0).validate().is_err());
        assert!(request("Ana", "not-an-email", 10.0).validate().is_err());
        assert!(request("Ana", "a@b.c", 0.0).validate().is_err());
        assert!(request("Ana", "a@b.c", f64::NAN).validate().is_err());
        assert!(request("Ana", "a@b.c", 10.0).validate().is_ok());
    }

    #[test]
    fn request_serializes_with_wire_field_names() {
        let req = request("Ana", "a@b.c", 12.5);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["payerName"], "Ana");
        assert_eq!(json["amount"], 12.5);
        assert!(json.get("message").is_none());
    }

    #[tokio::test]
    async fn failed_creation_does_not_mutate_the_queue() {
        let queue = ChargeQueue::new();
        // Unroutable endpoint: the request itself fails.
        let result = submit_charge(
            &queue,
            "http://127.0.0.1:1",
            "/pix/charges",
            &request("Ana", "a@b.c", 10.0),
        )
        .await;
        assert!(result.is_err());
        assert!(queue.charges().is_empty());
        assert_eq!(queue.active_payment_id(), None);
    }
}
