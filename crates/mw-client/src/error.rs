//! Error types for mw-client.

use crate::request::RequestContext;

/// Result type alias for mw-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mw-client operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Wrap a remote API error.
    pub fn api(error: ApiError) -> Self {
        Self::new(ErrorKind::Api(Box::new(error)))
    }

    /// Returns true if a transport-level retry may succeed.
    ///
    /// API errors are never retryable here; they go through the
    /// response classifier instead.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// The remote error, if this is an API error.
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.kind {
            ErrorKind::Api(err) => Some(err),
            _ => None,
        }
    }

    /// The remote error code (`badtoken`, `missingtitle`, ...), if any.
    pub fn code(&self) -> Option<&str> {
        self.api_error().map(|e| e.code.as_str())
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// The API answered with an error object.
    #[error("{0}")]
    Api(Box<ApiError>),

    /// HTTP request failed without a usable API payload.
    #[error("HTTP error: {status} {message}")]
    Http { status: u16, message: String },

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Name resolution failed. Never retried.
    #[error("DNS error: {0}")]
    Dns(String),

    /// The server answered with something other than JSON.
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller passed something that cannot work. Never retried.
    #[error("Usage error: {0}")]
    Usage(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Credential or signing problem.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable at the transport level.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Timeout => true,
            ErrorKind::Connection(_) => true,
            ErrorKind::Http { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is typically transient.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429 | 500 | 502 | 503 | 504)
}

/// A structured error returned by the API.
///
/// Carries the full decoded payload and the request that produced it, so
/// the caller can inspect or resubmit.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable description.
    pub info: String,
    /// The full decoded response body.
    pub response: serde_json::Value,
    /// The request that produced this error.
    pub request: Option<RequestContext>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API error: {} - {}", self.code, self.info)
    }
}

impl ApiError {
    /// Create a new API error with no attached request.
    pub fn new(code: impl Into<String>, info: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            code: code.into(),
            info: info.into(),
            response,
            request: None,
        }
    }

    /// Attach the request that produced this error.
    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }

    /// Map the code to a known variant.
    pub fn code_kind(&self) -> ApiErrorCode {
        ApiErrorCode::parse(&self.code)
    }
}

/// Remote error codes the client knows how to react to.
///
/// Unrecognized codes land in [`ApiErrorCode::Other`] and are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCode {
    BadToken,
    ReadOnly,
    MaxLag,
    AssertBotFailed,
    AssertUserFailed,
    OAuthInvalidAuthorization,
    MissingTitle,
    PermissionDenied,
    ProtectedPage,
    EditConflict,
    ArticleExists,
    RateLimited,
    Other(String),
}

impl ApiErrorCode {
    /// Parse a remote error code.
    pub fn parse(code: &str) -> Self {
        match code {
            "badtoken" => ApiErrorCode::BadToken,
            "readonly" => ApiErrorCode::ReadOnly,
            "maxlag" => ApiErrorCode::MaxLag,
            "assertbotfailed" => ApiErrorCode::AssertBotFailed,
            "assertuserfailed" => ApiErrorCode::AssertUserFailed,
            "mwoauth-invalid-authorization" => ApiErrorCode::OAuthInvalidAuthorization,
            "missingtitle" => ApiErrorCode::MissingTitle,
            "permissiondenied" => ApiErrorCode::PermissionDenied,
            "protectedpage" => ApiErrorCode::ProtectedPage,
            "editconflict" => ApiErrorCode::EditConflict,
            "articleexists" => ApiErrorCode::ArticleExists,
            "ratelimited" => ApiErrorCode::RateLimited,
            other => ApiErrorCode::Other(other.to_string()),
        }
    }
}

fn is_dns_failure(err: &reqwest::Error) -> bool {
    const MARKERS: &[&str] = &[
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
    ];

    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        let text = current.to_string().to_lowercase();
        if MARKERS.iter().any(|m| text.contains(m)) {
            return true;
        }
        source = current.source();
    }
    false
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if is_dns_failure(&err) {
            ErrorKind::Dns(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ErrorKind::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ErrorKind::InvalidJson(err.to_string())
        } else {
            ErrorKind::Other(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::with_source(ErrorKind::Serialization(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Config(format!("Invalid URL: {}", err)), err)
    }
}

impl From<busbar_mw_auth::Error> for Error {
    fn from(err: busbar_mw_auth::Error) -> Self {
        Error::with_source(ErrorKind::Auth(err.to_string()), err)
    }
}
