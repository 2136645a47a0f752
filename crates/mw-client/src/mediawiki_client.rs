//! High-level MediaWiki client: the single `call` entry point.
//!
//! `MwClient` owns the transport, the authentication strategy and the
//! session state, and drives the retry loop for every logical call.
//!
//! ## Security
//!
//! - Credentials and tokens are redacted in Debug output
//! - Parameters are skipped in tracing spans

use std::sync::Arc;

use busbar_mw_auth::{AuthKind, AuthStrategy, SessionState};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{instrument, warn};
use url::Url;

use crate::account::token_param_name;
use crate::client::MwHttpClient;
use crate::config::ClientConfig;
use crate::error::{ApiError, Error, ErrorKind, Result};
use crate::params::CallParams;
use crate::request::{CallOptions, RequestContext};
use crate::response::{extract_error, extract_warnings, sanitize_error_message, ApiResponse};
use crate::retry::{classify, transport_retry_delay, Decision};

/// MediaWiki Action API client.
///
/// Cheap to clone; clones share the connection pool, cookie jar and token
/// table, so a token refreshed by one call is seen by every other.
///
/// # Example
///
/// ```rust,ignore
/// use busbar_mw_client::{CallOptions, CallParams, MwClient};
/// use busbar_mw_auth::AuthStrategy;
///
/// let client = MwClient::new("https://test.wikipedia.org/w/api.php", AuthStrategy::from_env()?)?;
/// client.login().await?;
///
/// let token = client.csrf_token();
/// let result = client
///     .call(
///         CallParams::new()
///             .with("action", "edit")
///             .with("title", "Sandbox")
///             .with("appendtext", "hello")
///             .with("token", token),
///         CallOptions::new(),
///     )
///     .await?;
/// ```
#[derive(Clone)]
pub struct MwClient {
    http: MwHttpClient,
    api_url: Url,
    auth: Arc<AuthStrategy>,
    session: Arc<SessionState>,
}

impl std::fmt::Debug for MwClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MwClient")
            .field("api_url", &self.api_url.as_str())
            .field("auth", &self.auth)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl MwClient {
    /// Create a client for the given `api.php` URL.
    pub fn new(api_url: impl AsRef<str>, auth: AuthStrategy) -> Result<Self> {
        Self::with_config(api_url, auth, ClientConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(
        api_url: impl AsRef<str>,
        auth: AuthStrategy,
        config: ClientConfig,
    ) -> Result<Self> {
        let api_url = parse_api_url(api_url.as_ref())?;
        let http = MwHttpClient::new(config, auth.uses_cookies())?;
        Ok(Self {
            http,
            api_url,
            auth: Arc::new(auth),
            session: Arc::new(SessionState::new()),
        })
    }

    /// The `api.php` endpoint.
    pub fn api_url(&self) -> &str {
        self.api_url.as_str()
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        self.http.config()
    }

    /// The active authentication strategy.
    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    /// Which authentication strategy is active.
    pub fn auth_kind(&self) -> AuthKind {
        self.auth.kind()
    }

    /// Shared session state (tokens, capability flags).
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Whether the account may use the raised multi-value limits.
    pub fn has_api_high_limits(&self) -> bool {
        self.session.has_api_high_limits()
    }

    /// Set the high-limit flag, for callers that already know it.
    pub fn set_api_high_limits(&self, enabled: bool) {
        self.session.set_api_high_limits(enabled);
    }

    /// Perform one logical API call.
    ///
    /// `params` are layered over the configured default parameters. Token
    /// refreshes, backoff and re-login happen inside; the caller sees the
    /// decoded payload or the final error.
    #[instrument(skip(self, params, options), fields(action = params.action().unwrap_or("")))]
    pub async fn call(&self, params: CallParams, options: CallOptions) -> Result<Value> {
        let merged = params.merged_over(&self.config().default_params);
        self.execute(RequestContext::new(merged, options)).await
    }

    /// [`call`](Self::call) with default options.
    pub async fn request(&self, params: CallParams) -> Result<Value> {
        self.call(params, CallOptions::default()).await
    }

    /// Resubmit a context as-is, e.g. one taken from [`ApiError::request`].
    pub async fn resubmit(&self, ctx: RequestContext) -> Result<Value> {
        self.execute(ctx).await
    }

    // Boxed: token refresh and re-login call back into `call`.
    fn execute(&self, ctx: RequestContext) -> BoxFuture<'_, Result<Value>> {
        async move {
            let config = self.config().retry.for_call(&ctx);
            let suppress_warnings = ctx
                .options()
                .suppress_warnings
                .unwrap_or(self.config().suppress_warnings);
            let mut ctx = ctx;

            loop {
                let response = match self.http.dispatch(&self.api_url, &ctx, &self.auth).await {
                    Ok(response) => response,
                    Err(err) => match transport_retry_delay(&err, &ctx, &config) {
                        Some(delay) => {
                            warn!(
                                attempt = ctx.attempt(),
                                delay_ms = delay.as_millis(),
                                error = %err,
                                "Request failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            ctx = ctx.retried();
                            continue;
                        }
                        None => return Err(err),
                    },
                };

                match classify(&response, &ctx, &config, self.auth.kind()) {
                    Decision::Accept => {
                        let body = response.into_json().ok_or_else(|| {
                            Error::new(ErrorKind::InvalidJson("empty response".to_string()))
                        })?;
                        if !suppress_warnings {
                            for warning in extract_warnings(&body) {
                                warn!(action = ctx.action().unwrap_or(""), %warning, "API warning");
                            }
                        }
                        return Ok(body);
                    }
                    Decision::RetryToken => {
                        warn!(attempt = ctx.attempt(), "Bad token, refreshing");
                        let action = ctx.action().map(str::to_string);
                        let Some(token) = self.refresh_token_for(action.as_deref()).await? else {
                            return Err(api_failure(&response, &ctx));
                        };
                        let param = token_param_name(action.as_deref());
                        ctx = ctx.with_param(param, token).retried();
                    }
                    Decision::RetryBackoff(delay) => {
                        warn!(
                            attempt = ctx.attempt(),
                            delay_ms = delay.as_millis(),
                            "Server asked to back off, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        ctx = ctx.retried();
                    }
                    Decision::RetryOAuthNonce(delay) => {
                        warn!(
                            attempt = ctx.attempt(),
                            delay_ms = delay.as_millis(),
                            "OAuth nonce rejected, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        ctx = ctx.retried();
                    }
                    Decision::RetryReauth => {
                        if self.auth.login_credentials().is_none() {
                            return Err(api_failure(&response, &ctx));
                        }
                        warn!(attempt = ctx.attempt(), "Session lost, logging in again");
                        self.login().await?;
                        if ctx.carries_token() {
                            let action = ctx.action().map(str::to_string);
                            if let Some(token) = self.refresh_token_for(action.as_deref()).await? {
                                ctx = ctx.with_param(token_param_name(action.as_deref()), token);
                            }
                        }
                        ctx = ctx.retried();
                    }
                    Decision::Fatal(err) => return Err(err),
                }
            }
        }
        .boxed()
    }
}

/// Build the typed error for a response whose recovery failed.
fn api_failure(response: &ApiResponse, ctx: &RequestContext) -> Error {
    let body = response.json_body().cloned().unwrap_or(Value::Null);
    let (code, info) = extract_error(&body).unwrap_or_default();
    Error::api(ApiError::new(code, sanitize_error_message(&info), body).with_request(ctx.clone()))
}

fn parse_api_url(api_url: &str) -> Result<Url> {
    if api_url.trim().is_empty() {
        return Err(Error::new(ErrorKind::Config("API URL is empty".to_string())));
    }
    let url = Url::parse(api_url)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::new(ErrorKind::Config(format!(
            "unsupported API URL scheme: {}",
            other
        )))),
    }
}
