//! # mw-client
//!
//! Resilient request execution for the MediaWiki Action API.
//!
//! This crate turns one logical API call into correctly encoded,
//! correctly authenticated HTTP requests and resolves every recoverable
//! failure before the caller sees it:
//! - Parameter normalization (lists, booleans, dates, file uploads)
//! - GET/POST/multipart selection
//! - Bad-token refresh, readonly/maxlag backoff, re-login, OAuth nonce retries
//! - Transport retries for transient HTTP failures
//! - Warning logging
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  (mw-bulk, page/user/category helpers)                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ call(params, options)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MwClient                              │
//! │  - Merges default params, owns the retry loop               │
//! │  - Classifies responses, refreshes tokens, logs in again    │
//! │  - Holds auth strategy + shared session state               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MwHttpClient                            │
//! │  - One physical request: query string, form or multipart    │
//! │  - Cookie jar / OAuth signature / bearer header             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use busbar_mw_auth::AuthStrategy;
//! use busbar_mw_client::{CallOptions, CallParams, MwClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), busbar_mw_client::Error> {
//!     let client = MwClient::new("https://test.wikipedia.org/w/api.php", AuthStrategy::anonymous())?;
//!
//!     let info = client
//!         .call(
//!             CallParams::new()
//!                 .with("action", "query")
//!                 .with("prop", "info")
//!                 .with("titles", vec!["Main Page", "Sandbox"]),
//!             CallOptions::new(),
//!         )
//!         .await?;
//!
//!     println!("{}", info["query"]["pages"]);
//!     Ok(())
//! }
//! ```

mod account;
mod client;
mod config;
mod error;
mod mediawiki_client;
mod params;
mod request;
mod response;
mod retry;

pub use account::token_param_name;
pub use client::MwHttpClient;
pub use config::{default_params, ClientConfig, ClientConfigBuilder};
pub use error::{ApiError, ApiErrorCode, Error, ErrorKind, Result};
pub use mediawiki_client::MwClient;
pub use params::{
    join_multi_value, normalize, CallParams, FileUpload, ParamValue, WireParams, WireValue,
    LONG_FIELD_THRESHOLD, MULTI_VALUE_SEPARATOR,
};
pub use request::{CallOptions, RequestContext, RequestMethod};
pub use response::{
    extract_error, extract_warnings, parse_retry_after, ApiResponse, ApiWarning, ResponseBody,
    UNKNOWN_ERROR_CODE,
};
pub use retry::{classify, transport_retry_delay, BackoffStrategy, Decision, RetryConfig};

pub use busbar_mw_auth::{AuthKind, AuthStrategy, SessionState, TokenKind};

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("busbar-mw-api/", env!("CARGO_PKG_VERSION"));
