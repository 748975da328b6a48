// Wire types: the check request a subscriber receives and the result it publishes.

use crate::checks::CheckOutput;
use serde::Serialize;
use serde_json::{Map, Value};

/// A decoded check request.
///
/// Decoding is lenient field by field: a field of the wrong JSON type is
/// treated as absent, so a bad request is dropped rather than rejected mid-parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckRequest {
    pub name: Option<String>,
    pub command: Option<String>,
    pub issued: Option<i64>,
}

impl CheckRequest {
    /// Decode a request. Fails only when `blob` is not a JSON object.
    pub fn decode(blob: &[u8]) -> Result<Self, serde_json::Error> {
        let payload: Map<String, Value> = serde_json::from_slice(blob)?;
        Ok(Self::from_payload(&payload))
    }

    fn from_payload(payload: &Map<String, Value>) -> Self {
        let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            name: text("name"),
            command: text("command"),
            // Timestamps may arrive as floats; truncate like an integer cast.
            issued: payload.get("issued").and_then(Value::as_f64).map(|v| v as i64),
        }
    }
}

/// Payload published on the results exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub client: String,
    pub check: CheckResultBody,
}

/// The `check` object of a result: request echo fields plus the check output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResultBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<i64>,
    pub output: String,
    pub duration: f64,
    pub status: i32,
    pub executed: i64,
}

impl CheckResult {
    pub fn new(client: &str, name: &str, issued: Option<i64>, output: CheckOutput) -> Self {
        Self {
            client: client.to_string(),
            check: CheckResultBody {
                name: name.to_string(),
                issued,
                output: output.output,
                duration: output.duration,
                status: output.status,
                executed: output.executed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_all_fields() {
        let request =
            CheckRequest::decode(br#"{"name":"cpu-check","command":"uptime","issued":1700000000}"#)
                .unwrap();
        assert_eq!(
            request,
            CheckRequest {
                name: Some("cpu-check".into()),
                command: Some("uptime".into()),
                issued: Some(1_700_000_000),
            }
        );
    }

    #[test]
    fn wrongly_typed_fields_are_absent() {
        let request = CheckRequest::decode(br#"{"name":42,"command":["ls"],"issued":"soon"}"#).unwrap();
        assert_eq!(request, CheckRequest::default());
    }

    #[test]
    fn fractional_issued_is_truncated() {
        let request = CheckRequest::decode(br#"{"name":"x","issued":1700000000.9}"#).unwrap();
        assert_eq!(request.issued, Some(1_700_000_000));
    }

    #[test]
    fn non_object_fails_to_decode() {
        assert!(CheckRequest::decode(b"not json").is_err());
        assert!(CheckRequest::decode(b"[1,2]").is_err());
    }

    #[test]
    fn result_serializes_in_wire_order() {
        let result = CheckResult::new(
            "host1",
            "cpu-check",
            Some(1_700_000_000),
            CheckOutput {
                output: "OK".into(),
                duration: 0.12,
                status: 0,
                executed: 1_700_000_001,
            },
        );
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"client":"host1","check":{"name":"cpu-check","issued":1700000000,"output":"OK","duration":0.12,"status":0,"executed":1700000001}}"#
        );
    }

    #[test]
    fn result_omits_missing_issued() {
        let result = CheckResult::new(
            "host1",
            "unknown",
            None,
            CheckOutput {
                output: "hi".into(),
                duration: 0.0,
                status: 0,
                executed: 1,
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["check"].get("issued").is_none());
    }
}
