//! Retry policy: backoff configuration and the response classifier.

use std::time::Duration;

use busbar_mw_auth::AuthKind;
use rand::Rng;

use crate::error::{ApiError, ApiErrorCode, Error, ErrorKind};
use crate::request::RequestContext;
use crate::response::{extract_error, sanitize_error_message, ApiResponse, ResponseBody};

/// Marker in `mwoauth-invalid-authorization` info for a nonce collision.
const NONCE_REPLAY_MARKER: &str = "Nonce already used";

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries per logical call, across all failure types.
    pub max_retries: u32,
    /// Pause before a readonly, maxlag (without Retry-After), nonce or transport retry.
    pub retry_pause: Duration,
    /// Maximum pause computed by the backoff strategy.
    pub max_delay: Duration,
    /// How the pause grows with the attempt number.
    pub backoff: BackoffStrategy,
    /// Maximum time to wait from a Retry-After header.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_pause: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff: BackoffStrategy::Constant,
            max_retry_after: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Set the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base retry pause.
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Set the maximum computed pause.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cap server-provided Retry-After values.
    pub fn with_max_retry_after(mut self, cap: Duration) -> Self {
        self.max_retry_after = cap;
        self
    }

    /// Disable retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Pause before the retry following `attempt` (0-indexed).
    pub fn pause(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt, self.retry_pause, self.max_delay)
    }

    /// Pause for a maxlag retry: the server's Retry-After (capped) or the
    /// regular pause.
    pub fn maxlag_pause(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(retry_after) => std::cmp::min(retry_after, self.max_retry_after),
            None => self.pause(attempt),
        }
    }

    /// Apply per-call overrides.
    pub(crate) fn for_call(&self, ctx: &RequestContext) -> RetryConfig {
        let mut config = self.clone();
        if let Some(max_retries) = ctx.options().max_retries {
            config.max_retries = max_retries;
        }
        if let Some(pause) = ctx.options().retry_pause {
            config.retry_pause = pause;
        }
        config
    }
}

/// Backoff strategy for determining retry delays.
#[derive(Debug, Clone, Copy, Default)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    #[default]
    Constant,
    /// Linear increase in delay (delay * attempt).
    Linear,
    /// Exponential increase in delay (delay * factor^attempt).
    Exponential { factor: f64 },
    /// Exponential with random jitter to avoid thundering herd.
    ExponentialWithJitter { factor: f64 },
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay(&self, attempt: u32, base: Duration, max_delay: Duration) -> Duration {
        let delay = match self {
            BackoffStrategy::Constant => base,
            BackoffStrategy::Linear => base.saturating_mul(attempt + 1),
            BackoffStrategy::Exponential { factor } => {
                let multiplier = factor.powi(attempt as i32);
                Duration::from_secs_f64((base.as_secs_f64() * multiplier).min(max_delay.as_secs_f64()))
            }
            BackoffStrategy::ExponentialWithJitter { factor } => {
                let base_delay = base.as_secs_f64() * factor.powi(attempt as i32);
                let jitter = rand::rng().random::<f64>() * base_delay;
                Duration::from_secs_f64((base_delay + jitter).min(max_delay.as_secs_f64()))
            }
        };

        std::cmp::min(delay, max_delay)
    }
}

/// What to do with a dispatched response.
#[derive(Debug)]
pub enum Decision {
    /// Success; hand the payload to the caller.
    Accept,
    /// Refresh the token the action needs, inject it, resubmit.
    RetryToken,
    /// Sleep, then resubmit unchanged.
    RetryBackoff(Duration),
    /// Log in again, then resubmit.
    RetryReauth,
    /// OAuth nonce collision; sleep, then resubmit with a fresh signature.
    RetryOAuthNonce(Duration),
    /// Give up with this error.
    Fatal(Error),
}

/// Classify one response of the call described by `ctx`.
///
/// Pure: performs no I/O and does not touch session state.
pub fn classify(
    response: &ApiResponse,
    ctx: &RequestContext,
    config: &RetryConfig,
    auth: AuthKind,
) -> Decision {
    let body = match &response.body {
        ResponseBody::Json(body) => body,
        ResponseBody::Text(text) => {
            let format = ctx.params().get_str("format").unwrap_or("json");
            let kind = if format != "json" {
                ErrorKind::Config(format!(
                    "format={} cannot be decoded, only format=json is supported",
                    format
                ))
            } else {
                ErrorKind::InvalidJson(sanitize_error_message(text))
            };
            return Decision::Fatal(Error::new(kind));
        }
    };

    let Some((code, info)) = extract_error(body) else {
        return Decision::Accept;
    };

    let fatal = |code: String, info: String| {
        Decision::Fatal(Error::api(
            ApiError::new(code, sanitize_error_message(&info), body.clone())
                .with_request(ctx.clone()),
        ))
    };

    if ctx.attempt() >= config.max_retries {
        return fatal(code, info);
    }

    let attempt = ctx.attempt();
    match ApiErrorCode::parse(&code) {
        ApiErrorCode::BadToken => Decision::RetryToken,
        ApiErrorCode::ReadOnly => Decision::RetryBackoff(config.pause(attempt)),
        ApiErrorCode::MaxLag => {
            Decision::RetryBackoff(config.maxlag_pause(attempt, response.retry_after))
        }
        ApiErrorCode::AssertBotFailed | ApiErrorCode::AssertUserFailed => {
            if auth.is_oauth() {
                fatal(code, info)
            } else {
                Decision::RetryReauth
            }
        }
        ApiErrorCode::OAuthInvalidAuthorization if info.contains(NONCE_REPLAY_MARKER) => {
            Decision::RetryOAuthNonce(config.pause(attempt))
        }
        _ => fatal(code, info),
    }
}

/// Delay before retrying a transport failure, or `None` to surface it.
pub fn transport_retry_delay(err: &Error, ctx: &RequestContext, config: &RetryConfig) -> Option<Duration> {
    if ctx.attempt() >= config.max_retries || !err.is_retryable() {
        return None;
    }
    Some(config.pause(ctx.attempt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CallParams;
    use crate::request::CallOptions;
    use serde_json::json;

    fn ctx_at(attempt: u32) -> RequestContext {
        let mut ctx = RequestContext::new(
            CallParams::from([("action", "edit"), ("format", "json")]),
            CallOptions::new(),
        );
        for _ in 0..attempt {
            ctx = ctx.retried();
        }
        ctx
    }

    fn error_body(code: &str, info: &str) -> ApiResponse {
        ApiResponse::json(200, json!({"error": {"code": code, "info": info}}))
    }

    fn config() -> RetryConfig {
        RetryConfig::default().with_retry_pause(Duration::from_secs(5))
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_pause, Duration::from_secs(5));
        assert_eq!(config.max_retry_after, Duration::from_secs(120));
        assert_eq!(config.pause(2), Duration::from_secs(5));
    }

    #[test]
    fn test_accept_plain_payload() {
        let response = ApiResponse::json(200, json!({"edit": {"result": "Success"}}));
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::Accept));
    }

    #[test]
    fn test_badtoken_retries_token() {
        let decision = classify(
            &error_body("badtoken", "Invalid CSRF token."),
            &ctx_at(0),
            &config(),
            AuthKind::Session,
        );
        assert!(matches!(decision, Decision::RetryToken));
    }

    #[test]
    fn test_readonly_uses_configured_pause() {
        let decision = classify(
            &error_body("readonly", "The wiki is in read-only mode"),
            &ctx_at(1),
            &config(),
            AuthKind::Session,
        );
        assert!(matches!(decision, Decision::RetryBackoff(d) if d == Duration::from_secs(5)));
    }

    #[test]
    fn test_maxlag_honors_retry_after() {
        let response = error_body("maxlag", "Waiting for a database server: 7 seconds lagged.")
            .with_retry_after(Duration::from_secs(7));
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::RetryBackoff(d) if d == Duration::from_secs(7)));

        let response = error_body("maxlag", "lagged");
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::RetryBackoff(d) if d == Duration::from_secs(5)));
    }

    #[test]
    fn test_maxlag_retry_after_is_capped() {
        let response = error_body("maxlag", "lagged").with_retry_after(Duration::from_secs(3600));
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::RetryBackoff(d) if d == Duration::from_secs(120)));
    }

    #[test]
    fn test_oversized_retry_after_is_capped() {
        let retry_after = crate::response::parse_retry_after("99999999999999999999").unwrap();
        let response = error_body("maxlag", "lagged").with_retry_after(retry_after);
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::RetryBackoff(d) if d == Duration::from_secs(120)));
    }

    #[test]
    fn test_malformed_error_is_fatal() {
        let response = ApiResponse::json(200, json!({"error": {"info": "No code given."}}));
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::Fatal(ref e) if e.code() == Some("unknown")));
    }

    #[test]
    fn test_assert_failure_depends_on_auth() {
        let response = error_body("assertuserfailed", "You are no longer logged in.");
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::RetryReauth));

        let response = error_body("assertbotfailed", "You do not have the bot right.");
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::OAuth1);
        assert!(matches!(decision, Decision::Fatal(ref e) if e.code() == Some("assertbotfailed")));

        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::OAuth2);
        assert!(matches!(decision, Decision::Fatal(_)));
    }

    #[test]
    fn test_oauth_nonce_replay() {
        let response = error_body(
            "mwoauth-invalid-authorization",
            "The authorization headers in your request are not valid: Nonce already used: abc",
        );
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::OAuth1);
        assert!(matches!(decision, Decision::RetryOAuthNonce(_)));

        let response = error_body(
            "mwoauth-invalid-authorization",
            "The authorization headers in your request are not valid: Invalid signature",
        );
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::OAuth1);
        assert!(matches!(decision, Decision::Fatal(_)));
    }

    #[test]
    fn test_unknown_code_is_fatal_with_context() {
        let decision = classify(
            &error_body("missingtitle", "The page you specified doesn't exist."),
            &ctx_at(0),
            &config(),
            AuthKind::Session,
        );
        let Decision::Fatal(err) = decision else {
            panic!("expected fatal");
        };
        let api = err.api_error().unwrap();
        assert_eq!(api.code, "missingtitle");
        assert_eq!(api.response["error"]["code"], "missingtitle");
        assert_eq!(api.request.as_ref().unwrap().action(), Some("edit"));
    }

    #[test]
    fn test_budget_exhausted_is_fatal() {
        let decision = classify(
            &error_body("badtoken", "Invalid CSRF token."),
            &ctx_at(3),
            &config(),
            AuthKind::Session,
        );
        assert!(matches!(decision, Decision::Fatal(ref e) if e.code() == Some("badtoken")));
    }

    #[test]
    fn test_per_call_budget_override() {
        let ctx = RequestContext::new(
            CallParams::from([("action", "edit")]),
            CallOptions::new().with_max_retries(0),
        );
        let config = config().for_call(&ctx);
        let decision = classify(&error_body("readonly", "ro"), &ctx, &config, AuthKind::Session);
        assert!(matches!(decision, Decision::Fatal(_)));
    }

    #[test]
    fn test_non_json_payload() {
        let response = ApiResponse {
            status: 200,
            retry_after: None,
            body: ResponseBody::Text("<html>oops</html>".to_string()),
        };
        let decision = classify(&response, &ctx_at(0), &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::Fatal(ref e) if matches!(e.kind, ErrorKind::InvalidJson(_))));

        let ctx = RequestContext::new(
            CallParams::from([("action", "query"), ("format", "xml")]),
            CallOptions::new(),
        );
        let decision = classify(&response, &ctx, &config(), AuthKind::Session);
        assert!(matches!(decision, Decision::Fatal(ref e) if matches!(e.kind, ErrorKind::Config(_))));
    }

    #[test]
    fn test_transport_retry_delay() {
        let config = config();
        let transient = Error::new(ErrorKind::Http {
            status: 503,
            message: "Service Unavailable".into(),
        });
        assert_eq!(
            transport_retry_delay(&transient, &ctx_at(0), &config),
            Some(Duration::from_secs(5))
        );
        assert_eq!(transport_retry_delay(&transient, &ctx_at(3), &config), None);

        let dns = Error::new(ErrorKind::Dns("no such host".into()));
        assert_eq!(transport_retry_delay(&dns, &ctx_at(0), &config), None);

        let not_found = Error::new(ErrorKind::Http {
            status: 404,
            message: "Not Found".into(),
        });
        assert_eq!(transport_retry_delay(&not_found, &ctx_at(0), &config), None);
    }

    #[test]
    fn test_constant_backoff() {
        let delay = BackoffStrategy::Constant.delay(5, Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn test_linear_backoff() {
        let strategy = BackoffStrategy::Linear;
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(5);
        assert_eq!(strategy.delay(0, base, max), Duration::from_secs(2));
        assert_eq!(strategy.delay(1, base, max), Duration::from_secs(4));
        assert_eq!(strategy.delay(2, base, max), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_backoff() {
        let strategy = BackoffStrategy::Exponential { factor: 2.0 };
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        assert_eq!(strategy.delay(0, initial, max), Duration::from_secs(1));
        assert_eq!(strategy.delay(3, initial, max), Duration::from_secs(8));
        assert_eq!(strategy.delay(10, initial, max), Duration::from_secs(60));
    }

    #[test]
    fn test_exponential_with_jitter() {
        let strategy = BackoffStrategy::ExponentialWithJitter { factor: 2.0 };
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        let delay = strategy.delay(1, initial, max);
        assert!(delay >= Duration::from_secs(2));
        assert!(delay <= Duration::from_secs(4));
    }
}
