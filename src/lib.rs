//! # busbar-mw-api
//!
//! A resilient MediaWiki Action API client for Rust.
//!
//! One logical call becomes as many HTTP round trips as it takes: stale
//! tokens are refreshed, `maxlag` and `readonly` are waited out, expired
//! sessions are logged back in, and OAuth nonce replays are retried. Bulk
//! helpers build on the same call path.
//!
//! ## Security
//!
//! - Passwords, OAuth secrets and edit tokens are redacted in Debug output
//! - Tracing spans skip request parameters
//! - Error messages sanitize token-looking values
//!
//! ## Crates
//!
//! - **busbar-mw-auth** - Authentication strategies: bot password session, OAuth 1.0a, OAuth 2.0
//! - **busbar-mw-client** - Parameter encoding, transport, error classification and retry
//! - **busbar-mw-bulk** - Batch executors, continued queries and mass queries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use busbar_mw_api::{AuthStrategy, BulkClient, CallParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bulk = BulkClient::new(
//!         "https://test.wikipedia.org/w/api.php",
//!         AuthStrategy::from_env()?,
//!     )?;
//!
//!     let pages = bulk
//!         .continued_query(
//!             CallParams::new()
//!                 .with("action", "query")
//!                 .with("list", "recentchanges")
//!                 .with("rclimit", "max"),
//!             Some(3),
//!         )
//!         .await?;
//!
//!     for page in pages {
//!         println!("{}", page["query"]["recentchanges"]);
//!     }
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "auth")]
pub use busbar_mw_auth as auth;
#[cfg(feature = "bulk")]
pub use busbar_mw_bulk as bulk;
#[cfg(feature = "client")]
pub use busbar_mw_client as client;

#[cfg(feature = "auth")]
pub use busbar_mw_auth::{AuthKind, AuthStrategy, BotPassword, TokenKind};
#[cfg(feature = "bulk")]
pub use busbar_mw_bulk::{batch_operation, series_batch_operation, BatchResult, BulkClient};
#[cfg(feature = "client")]
pub use busbar_mw_client::{ApiError, CallOptions, CallParams, ClientConfig, MwClient, RetryConfig};
