//! Per-call options and the context threaded through retries.

use std::time::Duration;

use crate::params::{normalize, CallParams, ParamValue, WireParams};

/// Actions that only read and are sent as GET when nothing forces a body.
const READ_ACTIONS: &[&str] = &[
    "query",
    "parse",
    "expandtemplates",
    "opensearch",
    "help",
    "paraminfo",
    "compare",
    "sitematrix",
    "feedcontributions",
    "feedrecentchanges",
    "feedwatchlist",
];

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

impl RequestMethod {
    /// Convert to reqwest::Method.
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
        }
    }

    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
        }
    }
}

/// Options for a single logical call. Unset fields use the client config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Force GET or POST. Ignored for GET when the call uploads files.
    pub method: Option<RequestMethod>,
    /// Override the retry budget.
    pub max_retries: Option<u32>,
    /// Override the pause used for readonly/maxlag/transport retries.
    pub retry_pause: Option<Duration>,
    /// Override whether API warnings are logged.
    pub suppress_warnings: Option<bool>,
}

impl CallOptions {
    /// Options that defer to the client config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a request method.
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Always send a request body.
    pub fn post(self) -> Self {
        self.with_method(RequestMethod::Post)
    }

    /// Set the retry budget for this call.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the retry pause for this call.
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = Some(pause);
        self
    }

    /// Silence API warnings for this call.
    pub fn with_suppress_warnings(mut self, suppress: bool) -> Self {
        self.suppress_warnings = Some(suppress);
        self
    }
}

/// Everything needed to (re)submit one logical call.
///
/// `attempt` starts at 0 and grows by one on every retry of any kind, so
/// different failure types draw from the same budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    params: CallParams,
    options: CallOptions,
    attempt: u32,
}

impl RequestContext {
    /// Create a fresh context for a first attempt.
    pub fn new(params: CallParams, options: CallOptions) -> Self {
        Self {
            params,
            options,
            attempt: 0,
        }
    }

    /// The logical parameters (defaults already merged).
    pub fn params(&self) -> &CallParams {
        &self.params
    }

    /// The call options.
    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    /// Number of retries performed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The `action` parameter.
    pub fn action(&self) -> Option<&str> {
        self.params.action()
    }

    /// Normalized wire parameters.
    pub fn wire_params(&self) -> WireParams {
        normalize(&self.params)
    }

    /// Returns true if the call sends a token parameter.
    pub fn carries_token(&self) -> bool {
        self.params
            .iter()
            .any(|(key, value)| is_token_param(key) && !matches!(value, ParamValue::Unset))
    }

    /// Resolve the HTTP method for the given wire parameters.
    pub fn method(&self, wire: &WireParams) -> RequestMethod {
        if wire.has_files() || wire.has_long_field {
            return RequestMethod::Post;
        }
        if let Some(method) = self.options.method {
            return method;
        }
        if self.carries_token() {
            return RequestMethod::Post;
        }
        match self.action() {
            Some(action) if READ_ACTIONS.contains(&action) => RequestMethod::Get,
            _ => RequestMethod::Post,
        }
    }

    /// The same call, counted as one more retry.
    pub fn retried(mut self) -> Self {
        self.attempt += 1;
        self
    }

    /// Replace a parameter, e.g. a refreshed token.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.set(key, value);
        self
    }
}

/// Parameter names that carry a token.
pub(crate) fn is_token_param(key: &str) -> bool {
    matches!(key, "token" | "lgtoken" | "logintoken" | "createtoken")
}
