use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::status::{normalize, PixStatus};

/// Untrusted payload from the alert stream. Every field is optional and
/// loosely typed; the payload is treated as adversarial input.
#[derive(Debug, Default, Deserialize)]
pub struct RawAlertEvent {
    #[serde(rename = "paymentId", default, deserialize_with = "parse_i64_option")]
    pub payment_id: Option<i64>,
    pub status: Option<String>,
    #[serde(default)]
    pub ok: Option<Value>,
    #[serde(rename = "payerName")]
    pub payer_name: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub amount: Option<f64>,
    pub message: Option<String>,
    #[serde(rename = "occurredAt")]
    pub occurred_at: Option<String>,
}

/// Fully populated alert; construction never fails on malformed input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedAlert {
    #[serde(rename = "paymentId")]
    pub payment_id: i64,
    pub status: PixStatus,
    #[serde(rename = "payerName")]
    pub payer_name: String,
    pub amount: f64,
    pub message: String,
    #[serde(rename = "occurredAt")]
    pub occurred_at: String,
}

pub const ANONYMOUS_PAYER: &str = "Anonymous";

impl NormalizedAlert {
    pub fn from_raw(raw: RawAlertEvent, now: DateTime<Utc>) -> Self {
        let payer_name = raw
            .payer_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS_PAYER)
            .to_string();

        let amount = match raw.amount {
            Some(v) if v.is_finite() && v >= 0.0 => v,
            _ => 0.0,
        };

        let occurred_at = raw
            .occurred_at
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));

        NormalizedAlert {
            payment_id: raw.payment_id.unwrap_or(0),
            status: normalize(raw.status.as_deref(), raw.ok.as_ref()),
            payer_name,
            amount,
            message: raw.message.as_deref().map(str::trim).unwrap_or("").to_string(),
            occurred_at,
        }
    }
}

/// A normalized alert plus its locally generated identity, as it sits in
/// the display queue and the persisted history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub seq: u64,
    #[serde(flatten)]
    pub alert: NormalizedAlert,
}

impl QueueEntry {
    pub fn new(alert: NormalizedAlert, seq: u64, now: DateTime<Utc>) -> Self {
        let id = format!("{}-{}", alert.payment_id, now.timestamp_millis());
        QueueEntry { id, seq, alert }
    }
}

fn parse_i64_option<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    // Accept number, numeric string, or garbage (mapped to None).
    let v: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer).unwrap_or(None);
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                Ok(s.trim().parse::<f64>().ok())
            }
        }
        None => Ok(None),
    }
}
