use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::status::{normalize, PixStatus};

/// A pending payment charge awaiting settlement, confirmation or expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixCharge {
    #[serde(rename = "paymentId")]
    pub payment_id: i64,
    pub status: PixStatus,
    /// Copy-and-paste payload of the QR code.
    #[serde(rename = "qrText")]
    pub qr_text: Option<String>,
    /// QR image as base64-encoded PNG.
    #[serde(rename = "qrImageData")]
    pub qr_image_data: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl PixCharge {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.expires_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Wire shape of a successful charge-creation response.
#[derive(Debug, Deserialize)]
pub struct ChargeResponse {
    #[serde(rename = "paymentId")]
    pub payment_id: i64,
    pub status: Option<String>,
    #[serde(rename = "qrText")]
    pub qr_text: Option<String>,
    #[serde(rename = "qrImageData")]
    pub qr_image_data: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<String>,
}

impl PixCharge {
    pub fn from_response(resp: ChargeResponse, now: DateTime<Utc>) -> Self {
        // A creation response without a status is a freshly pending charge.
        let status = match resp.status.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => normalize(Some(s), None),
            _ => PixStatus::Pending,
        };

        PixCharge {
            payment_id: resp.payment_id,
            status,
            qr_text: resp.qr_text,
            qr_image_data: resp.qr_image_data,
            expires_at: resp.expires_at,
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
