use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Canonical payment status vocabulary. Backend tokens that match none of
/// the known shapes survive as `Other` so nothing is lost at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PixStatus {
    Pending,
    Approved,
    Expired,
    Cancelled,
    Unknown,
    Other(String),
}

impl PixStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PixStatus::Pending => "PENDING",
            PixStatus::Approved => "APPROVED",
            PixStatus::Expired => "EXPIRED",
            PixStatus::Cancelled => "CANCELLED",
            PixStatus::Unknown => "UNKNOWN",
            PixStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for PixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PixStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => PixStatus::Pending,
            "APPROVED" => PixStatus::Approved,
            "EXPIRED" => PixStatus::Expired,
            "CANCELLED" => PixStatus::Cancelled,
            "UNKNOWN" => PixStatus::Unknown,
            _ => PixStatus::Other(s),
        }
    }
}

impl From<PixStatus> for String {
    fn from(s: PixStatus) -> Self {
        s.as_str().to_string()
    }
}

/// The `ok` flag arrives as bool, number or string depending on the backend.
fn ok_truthy(ok: Option<&Value>) -> bool {
    match ok {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1) || n.as_f64() == Some(1.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s == "1"
        }
        _ => false,
    }
}

/// Maps a free-form backend status token to the closed vocabulary.
///
/// Classification is by substring so language variants and suffixes
/// ("APROVADO", "APPROVED_PIX", "PENDENTE") all land on the right status.
/// Pure and total: every input yields a status, nothing ever fails.
pub fn normalize(raw: Option<&str>, ok: Option<&Value>) -> PixStatus {
    let s = raw.unwrap_or("").trim().to_uppercase();

    // No status but an affirmative flag counts as approved.
    if s.is_empty() && ok_truthy(ok) {
        return PixStatus::Approved;
    }

    if s.contains("APROV") || s.contains("APPROV") {
        return PixStatus::Approved;
    }
    if s.contains("PEND") {
        return PixStatus::Pending;
    }
    if s.contains("CANCEL") {
        return PixStatus::Cancelled;
    }
    if s.contains("EXPIR") {
        return PixStatus::Expired;
    }

    match s.as_str() {
        "PENDING" => PixStatus::Pending,
        "APPROVED" => PixStatus::Approved,
        "CANCELLED" => PixStatus::Cancelled,
        "EXPIRED" => PixStatus::Expired,
        "" => PixStatus::Unknown,
        _ => PixStatus::Other(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn portuguese_variants_classify_by_substring() {
        assert_eq!(normalize(Some("APROVADO"), None), PixStatus::Approved);
        assert_eq!(normalize(Some("aprovada"), None), PixStatus::Approved);
        assert_eq!(normalize(Some("aprovado_pix"), None), PixStatus::Approved);
        assert_eq!(normalize(Some("PENDENTE"), None), PixStatus::Pending);
        assert_eq!(normalize(Some("cancelado"), None), PixStatus::Cancelled);
        assert_eq!(normalize(Some("Expirado"), None), PixStatus::Expired);
    }

    #[test]
    fn english_suffixed_tokens_classify() {
        assert_eq!(normalize(Some("APPROVED_PIX"), None), PixStatus::Approved);
        assert_eq!(normalize(Some("payment_pending"), None), PixStatus::Pending);
    }

    #[test]
    fn canonical_tokens_pass_through() {
        assert_eq!(normalize(Some("APPROVED"), None), PixStatus::Approved);
        assert_eq!(normalize(Some(" pending "), None), PixStatus::Pending);
        assert_eq!(normalize(Some("CANCELLED"), None), PixStatus::Cancelled);
        assert_eq!(normalize(Some("EXPIRED"), None), PixStatus::Expired);
    }

    #[test]
    fn ok_flag_approves_only_without_status() {
        assert_eq!(normalize(None, Some(&json!(true))), PixStatus::Approved);
        assert_eq!(normalize(Some(""), Some(&json!(1))), PixStatus::Approved);
        assert_eq!(normalize(Some("  "), Some(&json!("1"))), PixStatus::Approved);
        assert_eq!(normalize(None, Some(&json!("TRUE"))), PixStatus::Approved);
        assert_eq!(normalize(None, Some(&json!("True"))), PixStatus::Approved);
        assert_eq!(normalize(None, Some(&json!(false))), PixStatus::Unknown);
        assert_eq!(normalize(None, Some(&json!(0))), PixStatus::Unknown);
        assert_eq!(normalize(None, None), PixStatus::Unknown);
        // A concrete status wins over the flag.
        assert_eq!(
            normalize(Some("PENDENTE"), Some(&json!(true))),
            PixStatus::Pending
        );
    }

    #[test]
    fn unmatched_tokens_survive_as_other() {
        assert_eq!(
            normalize(Some("refunded"), None),
            PixStatus::Other("REFUNDED".to_string())
        );
        assert_eq!(normalize(Some("   "), None), PixStatus::Unknown);
    }

    #[test]
    fn serde_round_trips_as_plain_string() {
        let s: PixStatus = serde_json::from_str("\"APPROVED\"").unwrap();
        assert_eq!(s, PixStatus::Approved);
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"APPROVED\"");
        let o: PixStatus = serde_json::from_str("\"REFUNDED\"").unwrap();
        assert_eq!(o, PixStatus::Other("REFUNDED".to_string()));
    }
}
