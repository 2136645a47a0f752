//! Authentication strategies.
//!
//! All credential types implement custom Debug to redact sensitive data.

use crate::error::{Error, ErrorKind, Result};
use crate::oauth::OAuth1Credentials;

/// Which authentication strategy is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// Cookie session (anonymous or bot-password login).
    Session,
    /// OAuth 1.0a signed requests.
    OAuth1,
    /// OAuth 2.0 bearer token.
    OAuth2,
}

impl AuthKind {
    /// Returns true for either OAuth flavor.
    pub fn is_oauth(&self) -> bool {
        matches!(self, AuthKind::OAuth1 | AuthKind::OAuth2)
    }
}

/// Username and bot password used for `action=login`.
#[derive(Clone)]
pub struct BotPassword {
    username: String,
    password: String,
}

impl std::fmt::Debug for BotPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotPassword")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl BotPassword {
    /// Create new bot password credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Login name (`User@botname` for bot passwords).
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password. Never log this.
    pub fn password(&self) -> &str {
        &self.password
    }
}

/// OAuth 2.0 access token.
#[derive(Clone)]
pub struct BearerToken(String);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

impl BearerToken {
    /// Wrap an access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

/// The proof of identity attached to every API request.
///
/// Selected once when a client is constructed. The enum makes it impossible
/// for two strategies to be active at the same time.
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// Cookie session. `None` means anonymous until something logs in.
    Session(Option<BotPassword>),
    /// OAuth 1.0a owner-only consumer.
    OAuth1(OAuth1Credentials),
    /// OAuth 2.0 bearer token.
    OAuth2(BearerToken),
}

impl Default for AuthStrategy {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl AuthStrategy {
    /// Anonymous cookie session.
    pub fn anonymous() -> Self {
        AuthStrategy::Session(None)
    }

    /// Cookie session established with a bot password.
    pub fn bot_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthStrategy::Session(Some(BotPassword::new(username, password)))
    }

    /// OAuth 1.0a with the consumer and access key pairs.
    pub fn oauth1(
        consumer_token: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_secret: impl Into<String>,
    ) -> Self {
        AuthStrategy::OAuth1(OAuth1Credentials::new(
            consumer_token,
            consumer_secret,
            access_token,
            access_secret,
        ))
    }

    /// OAuth 2.0 bearer token.
    pub fn oauth2(access_token: impl Into<String>) -> Self {
        AuthStrategy::OAuth2(BearerToken::new(access_token))
    }

    /// Which strategy this is.
    pub fn kind(&self) -> AuthKind {
        match self {
            AuthStrategy::Session(_) => AuthKind::Session,
            AuthStrategy::OAuth1(_) => AuthKind::OAuth1,
            AuthStrategy::OAuth2(_) => AuthKind::OAuth2,
        }
    }

    /// Returns true if requests should carry the session cookie jar.
    pub fn uses_cookies(&self) -> bool {
        matches!(self, AuthStrategy::Session(_))
    }

    /// Bot password to log in with, if this is a credentialed session.
    pub fn login_credentials(&self) -> Option<&BotPassword> {
        match self {
            AuthStrategy::Session(login) => login.as_ref(),
            _ => None,
        }
    }

    /// Compute the `Authorization` header for one outgoing request.
    ///
    /// `signed_params` are the parameters that travel in an urlencoded form
    /// body; query-string parameters are taken from `url`. Session mode
    /// returns `None` since the cookie jar carries its identity.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        signed_params: &[(String, String)],
    ) -> Result<Option<String>> {
        match self {
            AuthStrategy::Session(_) => Ok(None),
            AuthStrategy::OAuth1(creds) => creds.sign(method, url, signed_params).map(Some),
            AuthStrategy::OAuth2(token) => Ok(Some(format!("Bearer {}", token.secret()))),
        }
    }

    /// Load an authentication strategy from environment variables.
    ///
    /// Checked in order:
    /// - `MW_OAUTH2_ACCESS_TOKEN`
    /// - `MW_OAUTH_CONSUMER_TOKEN`, `MW_OAUTH_CONSUMER_SECRET`,
    ///   `MW_OAUTH_ACCESS_TOKEN`, `MW_OAUTH_ACCESS_SECRET` (all four required)
    /// - `MW_USERNAME` and `MW_PASSWORD`
    ///
    /// Falls back to an anonymous session when none are set.
    pub fn from_env() -> Result<Self> {
        let strategy = Self::from_lookup(|key| std::env::var(key).ok())?;
        tracing::debug!(
            kind = ?strategy.kind(),
            login = strategy.login_credentials().is_some(),
            "Loaded authentication from environment"
        );
        Ok(strategy)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(token) = lookup("MW_OAUTH2_ACCESS_TOKEN") {
            return Ok(Self::oauth2(token));
        }

        if let Some(consumer_token) = lookup("MW_OAUTH_CONSUMER_TOKEN") {
            let require = |key: &str| {
                lookup(key).ok_or_else(|| Error::new(ErrorKind::EnvVar(key.to_string())))
            };
            return Ok(Self::oauth1(
                consumer_token,
                require("MW_OAUTH_CONSUMER_SECRET")?,
                require("MW_OAUTH_ACCESS_TOKEN")?,
                require("MW_OAUTH_ACCESS_SECRET")?,
            ));
        }

        match (lookup("MW_USERNAME"), lookup("MW_PASSWORD")) {
            (Some(username), Some(password)) => Ok(Self::bot_password(username, password)),
            (Some(_), None) => Err(Error::new(ErrorKind::EnvVar("MW_PASSWORD".to_string()))),
            (None, Some(_)) => Err(Error::new(ErrorKind::InvalidCredentials(
                "MW_PASSWORD set without MW_USERNAME".to_string(),
            ))),
            (None, None) => Ok(Self::anonymous()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_kind_and_cookie_usage() {
        assert_eq!(AuthStrategy::anonymous().kind(), AuthKind::Session);
        assert!(AuthStrategy::anonymous().uses_cookies());
        assert!(!AuthStrategy::oauth2("tok").uses_cookies());
        assert!(AuthStrategy::oauth2("tok").kind().is_oauth());
        assert!(AuthStrategy::oauth1("a", "b", "c", "d").kind().is_oauth());
        assert!(!AuthKind::Session.is_oauth());
    }

    #[test]
    fn test_login_credentials() {
        let auth = AuthStrategy::bot_password("Example@bot", "hunter2");
        let login = auth.login_credentials().unwrap();
        assert_eq!(login.username(), "Example@bot");
        assert_eq!(login.password(), "hunter2");

        assert!(AuthStrategy::anonymous().login_credentials().is_none());
        assert!(AuthStrategy::oauth2("tok").login_credentials().is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = AuthStrategy::bot_password("Example@bot", "hunter2");
        let debug = format!("{:?}", auth);
        assert!(debug.contains("Example@bot"));
        assert!(!debug.contains("hunter2"));

        let debug = format!("{:?}", AuthStrategy::oauth2("very-secret-token"));
        assert!(!debug.contains("very-secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_authorization_header() {
        let url = "https://example.org/w/api.php";

        assert!(AuthStrategy::anonymous()
            .authorization_header("GET", url, &[])
            .unwrap()
            .is_none());

        let header = AuthStrategy::oauth2("abc")
            .authorization_header("GET", url, &[])
            .unwrap();
        assert_eq!(header.as_deref(), Some("Bearer abc"));

        let header = AuthStrategy::oauth1("ck", "cs", "tk", "ts")
            .authorization_header("POST", url, &[("action".into(), "edit".into())])
            .unwrap()
            .unwrap();
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature=\""));
    }

    #[test]
    fn test_from_lookup_precedence() {
        let auth = AuthStrategy::from_lookup(lookup_from(&[
            ("MW_OAUTH2_ACCESS_TOKEN", "t"),
            ("MW_USERNAME", "u"),
            ("MW_PASSWORD", "p"),
        ]))
        .unwrap();
        assert_eq!(auth.kind(), AuthKind::OAuth2);

        let auth = AuthStrategy::from_lookup(lookup_from(&[
            ("MW_OAUTH_CONSUMER_TOKEN", "a"),
            ("MW_OAUTH_CONSUMER_SECRET", "b"),
            ("MW_OAUTH_ACCESS_TOKEN", "c"),
            ("MW_OAUTH_ACCESS_SECRET", "d"),
        ]))
        .unwrap();
        assert_eq!(auth.kind(), AuthKind::OAuth1);

        let auth =
            AuthStrategy::from_lookup(lookup_from(&[("MW_USERNAME", "u"), ("MW_PASSWORD", "p")]))
                .unwrap();
        assert_eq!(auth.login_credentials().unwrap().username(), "u");

        let auth = AuthStrategy::from_lookup(lookup_from(&[])).unwrap();
        assert!(auth.login_credentials().is_none());
        assert_eq!(auth.kind(), AuthKind::Session);
    }

    #[test]
    fn test_from_lookup_incomplete() {
        let err = AuthStrategy::from_lookup(lookup_from(&[("MW_OAUTH_CONSUMER_TOKEN", "a")]))
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::EnvVar(ref v) if v == "MW_OAUTH_CONSUMER_SECRET"));

        let err = AuthStrategy::from_lookup(lookup_from(&[("MW_USERNAME", "u")])).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::EnvVar(_)));

        let err = AuthStrategy::from_lookup(lookup_from(&[("MW_PASSWORD", "p")])).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidCredentials(_)));
    }
}
