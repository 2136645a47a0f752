//! # mw-auth
//!
//! Authentication for the MediaWiki Action API.
//!
//! ## Security
//!
//! - Passwords, secrets and tokens are redacted in Debug output
//! - Signing helpers never log key material
//!
//! ## Supported Authentication Methods
//!
//! Exactly one strategy is active per client:
//!
//! - **Session** - Cookie session, optionally established with a bot password
//! - **OAuth 1.0a** - Owner-only consumer, every request signed with HMAC-SHA1
//! - **OAuth 2.0** - Bearer access token
//!
//! ## Example
//!
//! ```rust,ignore
//! use busbar_mw_auth::AuthStrategy;
//!
//! // From environment variables
//! let auth = AuthStrategy::from_env()?;
//!
//! // Bot password login
//! let auth = AuthStrategy::bot_password("Example@mybot", "secret");
//!
//! // OAuth 2.0
//! let auth = AuthStrategy::oauth2("eyJ0eXAiOiJKV1Qi...");
//! ```

mod credentials;
mod error;
mod oauth;
mod session;

pub use credentials::{AuthKind, AuthStrategy, BearerToken, BotPassword};
pub use error::{Error, ErrorKind, Result};
pub use oauth::OAuth1Credentials;
pub use session::{SessionState, TokenKind};

/// Right that raises per-call multi-value limits from 50 to 500.
pub const HIGH_LIMITS_RIGHT: &str = "apihighlimits";
