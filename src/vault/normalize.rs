//! Response normalization.
//!
//! Bodies are decoded in two stages: first into a generic `serde_json::Value`,
//! then flattened into string records. How the status is read depends on the
//! endpoint ([`StatusRule`]); where the error message lives is looked up in
//! [`MESSAGE_POINTERS`], which covers both error conventions the server uses:
//! `{"error": {"code": .., "message": ..}}` and a flat `{"message": ..}`.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Message used when the status code is absent or not a number.
pub const MISSING_STATUS: &str = "missing or invalid status code";

/// Message used when a failed response names no message at all.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Candidate locations of the error message, in lookup order.
pub const MESSAGE_POINTERS: &[&str] = &["/error/message", "/message"];

/// Envelope key holding the status; never copied into records.
const STATUS_KEY: &str = "status_code";

/// How an endpoint reports success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRule {
    /// `status_code` must be present and numeric; only 200 succeeds.
    Required,
    /// A missing `status_code` counts as 0; 0 and 200 succeed.
    ZeroIsSuccess,
    /// The endpoint normally omits `status_code`. Success is reported as 200
    /// unless an explicit status other than 0 or 200 is present.
    Implicit,
}

/// Result of one façade operation: the record, the status and a message.
///
/// Failed calls carry `T::default()` as the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub record: T,
    pub status: i64,
    pub message: String,
}

impl<T> Outcome<T> {
    pub fn completed(record: T, status: i64, message: impl Into<String>) -> Self {
        Self {
            record,
            status,
            message: message.into(),
        }
    }

    /// 200, or 0 for endpoints that accept without reporting a status.
    pub fn is_success(&self) -> bool {
        self.status == 200 || self.status == 0
    }
}

impl<T: Default> Outcome<T> {
    pub fn failed(status: i64, message: impl Into<String>) -> Self {
        Self::completed(T::default(), status, message)
    }
}

/// A non-success status and the message explaining it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub status: i64,
    pub message: String,
}

impl Failure {
    pub fn new(status: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn into_outcome<T: Default>(self) -> Outcome<T> {
        Outcome::failed(self.status, self.message)
    }
}

/// A decoded body whose status passed its [`StatusRule`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub status: i64,
    pub body: Map<String, Value>,
}

impl Normalized {
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

/// Structured error some endpoints attach to failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiErrorDetail {
    pub code: Option<String>,
    pub message: String,
}

/// Status and message fields common to every response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub status_code: Option<i64>,
    pub message: Option<String>,
    pub error: Option<ApiErrorDetail>,
}

impl ResponseEnvelope {
    pub fn from_body(body: &Value) -> Self {
        let error = body.get("error").and_then(Value::as_object).map(|err| ApiErrorDetail {
            code: err.get("code").map(stringify),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
        Self {
            status_code: body.get(STATUS_KEY).and_then(status_number),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            error,
        }
    }
}

/// Decodes `raw` and applies `rule` to its status.
pub fn normalize(raw: &[u8], rule: StatusRule) -> Result<Normalized, Failure> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| Failure::new(500, format!("Error parsing response JSON: {}", e)))?;
    let Value::Object(body) = value else {
        return Err(Failure::new(
            500,
            "Error parsing response JSON: expected a JSON object",
        ));
    };

    let reported = body.get(STATUS_KEY);
    let status = match (rule, reported) {
        (StatusRule::Required, Some(v)) => status_number(v),
        (StatusRule::Required, None) => None,
        (StatusRule::ZeroIsSuccess, Some(v)) => status_number(v),
        (StatusRule::ZeroIsSuccess, None) => Some(0),
        (StatusRule::Implicit, Some(v)) => Some(status_number(v).unwrap_or(200)),
        (StatusRule::Implicit, None) => Some(200),
    }
    .ok_or_else(|| Failure::new(500, MISSING_STATUS))?;

    let success = match rule {
        StatusRule::Required => status == 200,
        StatusRule::ZeroIsSuccess | StatusRule::Implicit => status == 200 || status == 0,
    };
    if !success {
        return Err(Failure::new(status, error_message(&body)));
    }

    let status = match rule {
        StatusRule::Implicit => 200,
        StatusRule::Required | StatusRule::ZeroIsSuccess => status,
    };
    Ok(Normalized { status, body })
}

/// First message found along [`MESSAGE_POINTERS`], else [`UNKNOWN_ERROR`].
pub fn error_message(body: &Map<String, Value>) -> String {
    MESSAGE_POINTERS
        .iter()
        .find_map(|pointer| lookup(body, pointer).filter(|msg| !msg.is_empty()))
        .unwrap_or(UNKNOWN_ERROR)
        .to_string()
}

fn lookup<'a>(body: &'a Map<String, Value>, pointer: &str) -> Option<&'a str> {
    let mut segments = pointer.trim_start_matches('/').split('/');
    let first = segments.next()?;
    let mut current = body.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    current.as_str()
}

fn status_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Decimal rendering of a JSON number. Integral floats print without a
/// fraction, so `17` and `17.0` both become "17".
pub fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or_default();
    if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

/// Scalar-to-string rule shared by every record shape. `null` becomes an
/// empty string; arrays and objects fall back to compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Flattened single-account response.
///
/// Scalars live in `fields`; every nested JSON object is kept one level deep
/// under `account`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub account: BTreeMap<String, BTreeMap<String, String>>,
}

impl AccountRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.account.is_empty()
    }
}

/// Account id mapped to that account's flattened fields.
pub type AccountsRecord = BTreeMap<String, BTreeMap<String, String>>;

/// Flattens a single-record body. The status key is dropped.
pub fn flatten_single(body: &Map<String, Value>) -> AccountRecord {
    let mut record = AccountRecord::default();
    for (key, value) in body {
        if key == STATUS_KEY {
            continue;
        }
        match value {
            Value::Object(nested) => {
                let nested = nested
                    .iter()
                    .map(|(k, v)| (k.clone(), stringify(v)))
                    .collect();
                record.account.insert(key.clone(), nested);
            }
            other => {
                record.fields.insert(key.clone(), stringify(other));
            }
        }
    }
    record
}

/// Flattens an id-to-object body. Top-level entries that are not objects are
/// skipped.
pub fn flatten_multi(body: &Map<String, Value>) -> AccountsRecord {
    body.iter()
        .filter_map(|(id, value)| {
            let account = value.as_object()?;
            let fields = account
                .iter()
                .map(|(k, v)| (k.clone(), stringify(v)))
                .collect();
            Some((id.clone(), fields))
        })
        .collect()
}
