//! Transport: one physical HTTP request per call.

use busbar_mw_auth::AuthStrategy;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::params::{WireParams, WireValue};
use crate::request::{RequestContext, RequestMethod};
use crate::response::{
    extract_error, parse_retry_after, sanitize_error_message, ApiResponse, ResponseBody,
};

/// HTTP transport for the Action API.
///
/// Knows nothing about API error codes. A response is returned whenever the
/// body is something the classifier can look at; transport failures and
/// non-2xx responses without an API error become [`Error`]s.
#[derive(Debug, Clone)]
pub struct MwHttpClient {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl MwHttpClient {
    /// Create a transport. `cookies` enables the session cookie jar.
    pub fn new(config: ClientConfig, cookies: bool) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .cookie_store(cookies)
            .gzip(config.accept_compressed)
            .deflate(config.accept_compressed);

        let inner = builder
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send one request for `ctx` and decode the answer.
    pub async fn dispatch(
        &self,
        api_url: &Url,
        ctx: &RequestContext,
        auth: &AuthStrategy,
    ) -> Result<ApiResponse> {
        let wire = ctx.wire_params();
        let method = ctx.method(&wire);
        let multipart = wire.has_files() || wire.has_long_field;

        let req = match method {
            RequestMethod::Get => {
                let mut url = api_url.clone();
                url.query_pairs_mut().extend_pairs(wire.text_pairs());
                let auth_header = auth.authorization_header(method.as_str(), url.as_str(), &[])?;
                self.with_auth(self.inner.request(method.to_reqwest(), url), auth_header)
            }
            RequestMethod::Post if multipart => {
                let auth_header =
                    auth.authorization_header(method.as_str(), api_url.as_str(), &[])?;
                let req = self.inner.request(method.to_reqwest(), api_url.clone());
                self.with_auth(req, auth_header).multipart(multipart_form(wire))
            }
            RequestMethod::Post => {
                let pairs = wire.text_pairs();
                let body = serde_urlencoded::to_string(&pairs)?;
                let auth_header =
                    auth.authorization_header(method.as_str(), api_url.as_str(), &pairs)?;
                let req = self.inner.request(method.to_reqwest(), api_url.clone());
                self.with_auth(req, auth_header)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body)
            }
        };

        if self.config.enable_tracing {
            debug!(
                method = method.as_str(),
                action = ctx.action().unwrap_or(""),
                attempt = ctx.attempt(),
                multipart,
                "Sending request"
            );
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        if self.config.enable_tracing {
            let content_length = response.content_length();
            if response.status().is_success() {
                debug!(status, content_length, "Response received");
            } else {
                info!(status, content_length, "Non-success response");
            }
        }

        let success = response.status().is_success();
        let text = response.text().await?;

        let body = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) if success || extract_error(&value).is_some() => ResponseBody::Json(value),
            Ok(_) => return Err(http_error(status, &text)),
            Err(_) if success => ResponseBody::Text(text),
            Err(_) => return Err(http_error(status, &text)),
        };

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }

    fn with_auth(
        &self,
        req: reqwest::RequestBuilder,
        header: Option<String>,
    ) -> reqwest::RequestBuilder {
        match header {
            Some(value) => req.header(AUTHORIZATION, value),
            None => req,
        }
    }
}

fn http_error(status: u16, body: &str) -> Error {
    let message = if body.trim().is_empty() {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string()
    } else {
        sanitize_error_message(body)
    };
    Error::new(ErrorKind::Http { status, message })
}

fn multipart_form(wire: WireParams) -> Form {
    wire.fields
        .into_iter()
        .fold(Form::new(), |form, (key, value)| match value {
            WireValue::Text(text) => form.text(key, text),
            WireValue::File(file) => {
                let part = Part::bytes(file.data.to_vec()).file_name(file.filename);
                form.part(key, part)
            }
        })
}
