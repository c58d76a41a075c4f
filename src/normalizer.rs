//! Callback normalizer.
//!
//! The provider delivers the same logical notification through several wire
//! shapes: JSON bodies, form-urlencoded bodies, bare query strings, and
//! with field names that drift between integrations (`referenceNumber`,
//! `reference_number`, `orderNumber`, ...). This module reduces all of them
//! to one canonical [`NormalizedCallback`]. Resolution order is fixed so a
//! payload carrying several candidate fields always resolves the same way.

use serde_json::Value;

use crate::domain::NormalizedCallback;
use crate::error::AppError;

/// Candidate field names for the reference number, in resolution order.
const REFERENCE_FIELDS: &[&str] = &[
    "referenceNumber",
    "reference_number",
    "orderNumber",
    "order_number",
    "commandNumber",
    "command_number",
    "reference",
];

/// Candidate field names for the provider transaction id, in resolution
/// order. `num_transaction_from_gu` is what the live gateway sends.
const PROVIDER_TX_FIELDS: &[&str] = &[
    "num_transaction_from_gu",
    "providerTransactionId",
    "provider_transaction_id",
    "transactionId",
    "transaction_id",
];

/// Candidate field names for the provider status code, in resolution order.
const STATUS_FIELDS: &[&str] = &[
    "errorCode",
    "error_code",
    "status",
    "statusCode",
    "status_code",
    "code",
];

/// Key/value pairs extracted from whatever transport the callback used.
#[derive(Debug, Clone, Default)]
pub struct WirePayload {
    pairs: Vec<(String, String)>,
    raw: Value,
}

impl WirePayload {
    /// Parse a request body. JSON is attempted first; anything that is not
    /// a JSON object falls back to form-urlencoded decoding of the raw
    /// bytes. Content-Type headers are advisory at best with this provider.
    pub fn from_body(body: &[u8]) -> Self {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            if value.is_object() {
                return Self::from_json(value);
            }
        }
        Self::from_form(body)
    }

    /// Top-level scalar fields of a JSON object. Nested objects and arrays
    /// carry no settlement fields in any known provider format and are
    /// ignored.
    pub fn from_json(value: Value) -> Self {
        let mut pairs = Vec::new();
        if let Value::Object(map) = &value {
            for (key, field) in map {
                let text = match field {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                };
                if let Some(text) = text {
                    pairs.push((key.clone(), text));
                }
            }
        }
        Self { pairs, raw: value }
    }

    /// Form-urlencoded bytes (also used for query strings).
    pub fn from_form(body: &[u8]) -> Self {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let raw = Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        Self { pairs, raw }
    }

    pub fn from_query(query: &str) -> Self {
        Self::from_form(query.as_bytes())
    }

    /// First non-empty value among `candidates`, in order.
    fn first_non_empty(&self, candidates: &[&str]) -> Option<String> {
        for candidate in candidates {
            if let Some((_, value)) = self.pairs.iter().find(|(k, _)| k == candidate) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        None
    }

    pub fn get(&self, field: &str) -> Option<String> {
        self.first_non_empty(&[field])
    }

    /// The payload as received, kept verbatim for the audit log.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// Reduce a wire payload to the canonical callback triple.
///
/// Fails with [`AppError::MissingReference`] when no reference field
/// resolves; without the reference there is nothing to join on, so this is
/// terminal and the provider must not retry.
pub fn normalize(payload: &WirePayload) -> Result<NormalizedCallback, AppError> {
    let reference_number = payload
        .first_non_empty(REFERENCE_FIELDS)
        .ok_or(AppError::MissingReference)?;

    let provider_transaction_id = payload.first_non_empty(PROVIDER_TX_FIELDS);
    let provider_status_code = payload.first_non_empty(STATUS_FIELDS).unwrap_or_default();

    Ok(NormalizedCallback {
        reference_number,
        provider_transaction_id,
        provider_status_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_json_body() {
        let payload = WirePayload::from_body(
            json!({
                "referenceNumber": "SAMA-NAFFA-DEPOSIT-1700000000-ABC123",
                "errorCode": "200",
                "num_transaction_from_gu": "GU-778899"
            })
            .to_string()
            .as_bytes(),
        );
        let callback = normalize(&payload).unwrap();
        assert_eq!(
            callback.reference_number,
            "SAMA-NAFFA-DEPOSIT-1700000000-ABC123"
        );
        assert_eq!(callback.provider_transaction_id.as_deref(), Some("GU-778899"));
        assert_eq!(callback.provider_status_code, "200");
    }

    #[test]
    fn normalizes_form_body_with_alternate_field_names() {
        let payload =
            WirePayload::from_body(b"command_number=APE-INVESTMENT-1700000000-XYZ001&status=420");
        let callback = normalize(&payload).unwrap();
        assert_eq!(
            callback.reference_number,
            "APE-INVESTMENT-1700000000-XYZ001"
        );
        assert_eq!(callback.provider_transaction_id, None);
        assert_eq!(callback.provider_status_code, "420");
    }

    #[test]
    fn normalizes_query_string() {
        let payload = WirePayload::from_query(
            "orderNumber=SAMA-NAFFA-WITHDRAWAL-1700000000-DEF456&errorCode=200&transaction_id=GU-1",
        );
        let callback = normalize(&payload).unwrap();
        assert_eq!(
            callback.reference_number,
            "SAMA-NAFFA-WITHDRAWAL-1700000000-DEF456"
        );
        assert_eq!(callback.provider_transaction_id.as_deref(), Some("GU-1"));
    }

    #[test]
    fn resolution_order_is_fixed() {
        // Both candidate fields present: the earlier one in the table wins.
        let payload = WirePayload::from_body(
            json!({
                "reference_number": "SECOND",
                "referenceNumber": "FIRST",
                "errorCode": "200"
            })
            .to_string()
            .as_bytes(),
        );
        let callback = normalize(&payload).unwrap();
        assert_eq!(callback.reference_number, "FIRST");
    }

    #[test]
    fn empty_candidate_falls_through_to_next() {
        let payload = WirePayload::from_body(
            json!({
                "referenceNumber": "  ",
                "orderNumber": "SAMA-NAFFA-DEPOSIT-1-A",
                "errorCode": "200"
            })
            .to_string()
            .as_bytes(),
        );
        let callback = normalize(&payload).unwrap();
        assert_eq!(callback.reference_number, "SAMA-NAFFA-DEPOSIT-1-A");
    }

    #[test]
    fn missing_reference_is_terminal() {
        let payload = WirePayload::from_body(json!({"errorCode": "200"}).to_string().as_bytes());
        assert!(matches!(
            normalize(&payload),
            Err(AppError::MissingReference)
        ));
    }

    #[test]
    fn numeric_json_fields_are_stringified() {
        let payload = WirePayload::from_body(
            json!({"referenceNumber": "APE-X-1-A", "errorCode": 200}).to_string().as_bytes(),
        );
        let callback = normalize(&payload).unwrap();
        assert_eq!(callback.provider_status_code, "200");
    }

    #[test]
    fn non_json_body_falls_back_to_form_decoding() {
        let payload = WirePayload::from_body(b"referenceNumber=APE-X-1-A&errorCode=200");
        let callback = normalize(&payload).unwrap();
        assert_eq!(callback.reference_number, "APE-X-1-A");
    }
}
