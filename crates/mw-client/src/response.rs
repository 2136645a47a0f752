//! Decoded API responses: error and warning extraction.

use std::sync::LazyLock;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

/// One physical response, as handed to the classifier.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed `Retry-After` header.
    pub retry_after: Option<Duration>,
    /// Decoded body.
    pub body: ResponseBody,
}

/// Response body, decoded if it was JSON.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Json(Value),
    /// Anything that failed to parse as JSON (HTML error pages, `format=xml`, ...).
    Text(String),
}

impl ApiResponse {
    /// Create a JSON response with no Retry-After.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            retry_after: None,
            body: ResponseBody::Json(body),
        }
    }

    /// Set the Retry-After duration.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// The JSON body, if the response was JSON.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// Take the JSON body, if the response was JSON.
    pub fn into_json(self) -> Option<Value> {
        match self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

/// Error shape of the default error format: `{"error": {"code", "info"}}`.
#[derive(Debug, Deserialize)]
struct LegacyError {
    code: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(rename = "*", default)]
    star: Option<String>,
}

/// One entry of `{"errors": [...]}` when `errorformat` is set.
#[derive(Debug, Deserialize)]
struct ModernMessage {
    code: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(rename = "*", default)]
    star: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    module: Option<String>,
}

impl ModernMessage {
    fn message(self) -> String {
        self.text
            .or(self.html)
            .or(self.star)
            .or(self.key)
            .unwrap_or_default()
    }
}

/// Extract `(code, info)` from a response body, if it carries an error.
///
/// Both the legacy `error` object and the `errors` array are recognized.
/// An error entry whose shape is not understood is reported with code
/// [`UNKNOWN_ERROR_CODE`].
pub fn extract_error(body: &Value) -> Option<(String, String)> {
    match body.get("error") {
        None | Some(Value::Null) => {}
        Some(error) => {
            return Some(match LegacyError::deserialize(error) {
                Ok(err) => (err.code, err.info.or(err.star).unwrap_or_default()),
                Err(_) => unknown_error(error),
            });
        }
    }

    let first = body.get("errors")?.as_array()?.first()?;
    match ModernMessage::deserialize(first) {
        Ok(msg) => {
            let code = msg.code.clone();
            Some((code, msg.message()))
        }
        Err(_) => Some(unknown_error(first)),
    }
}

/// Code reported for an error entry without a usable `code`.
pub const UNKNOWN_ERROR_CODE: &str = "unknown";

fn unknown_error(entry: &Value) -> (String, String) {
    let info = entry
        .get("info")
        .or_else(|| entry.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| entry.to_string());
    (UNKNOWN_ERROR_CODE.to_string(), info)
}

/// A non-fatal warning attached to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiWarning {
    /// Module that raised the warning (`main`, `query`, ...).
    pub module: String,
    /// Warning code; `None` in the legacy keyed shape.
    pub code: Option<String>,
    /// Warning text.
    pub text: String,
}

impl std::fmt::Display for ApiWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}: {}", self.module, code, self.text),
            None => write!(f, "[{}] {}", self.module, self.text),
        }
    }
}

/// Extract warnings from a response body.
///
/// Accepts the `warnings` array (`errorformat` set), the formatversion=2
/// keyed object (`{module: {"warnings": text}}`) and the formatversion=1
/// keyed object (`{module: {"*": text}}`).
pub fn extract_warnings(body: &Value) -> Vec<ApiWarning> {
    match body.get("warnings") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| ModernMessage::deserialize(entry).ok())
            .map(|msg| ApiWarning {
                module: msg.module.clone().unwrap_or_else(|| "main".to_string()),
                code: Some(msg.code.clone()),
                text: msg.message(),
            })
            .collect(),
        Some(Value::Object(modules)) => modules
            .iter()
            .filter_map(|(module, entry)| {
                let text = entry
                    .get("warnings")
                    .or_else(|| entry.get("*"))
                    .and_then(Value::as_str)
                    .or_else(|| entry.as_str())?;
                Some(ApiWarning {
                    module: module.clone(),
                    code: None,
                    text: text.to_string(),
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse a `Retry-After` header: delta seconds or an HTTP date.
///
/// Values beyond what a `Duration` holds saturate to `Duration::MAX`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
        }
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

static TOKEN_PATTERN: LazyLock<Option<regex_lite::Regex>> =
    LazyLock::new(|| regex_lite::Regex::new(r"[0-9a-f]{32,}\+\\").ok());

static SECRET_PARAM_PATTERN: LazyLock<Option<regex_lite::Regex>> = LazyLock::new(|| {
    regex_lite::Regex::new(r"(lgpassword|password|lgtoken|token)=[^&\s]+").ok()
});

/// Sanitize text taken from a response body before it lands in an error.
///
/// Redacts edit tokens and secret form fields, and truncates long bodies.
pub(crate) fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let mut sanitized = message.to_string();

    if let Some(pattern) = TOKEN_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "[REDACTED_TOKEN]")
            .to_string();
    }

    if let Some(pattern) = SECRET_PARAM_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "$1=[REDACTED]")
            .to_string();
    }

    if let Some((cut, _)) = sanitized.char_indices().nth(MAX_LENGTH) {
        sanitized.truncate(cut);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}
