//! Per-client session state: token table and capability flags.
//!
//! Shared by every logical call made through one client. A token refresh
//! performed by any call is visible to all others immediately.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Token an anonymous session uses for write actions.
pub const ANONYMOUS_CSRF_TOKEN: &str = "+\\";

/// Token types served by `meta=tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Csrf,
    CreateAccount,
    Login,
    Patrol,
    Rollback,
    UserRights,
    Watch,
}

impl TokenKind {
    /// All token types, in the order `meta=tokens` documents them.
    pub const ALL: [TokenKind; 7] = [
        TokenKind::Csrf,
        TokenKind::CreateAccount,
        TokenKind::Login,
        TokenKind::Patrol,
        TokenKind::Rollback,
        TokenKind::UserRights,
        TokenKind::Watch,
    ];

    /// Name used in the `type` parameter of `meta=tokens`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Csrf => "csrf",
            TokenKind::CreateAccount => "createaccount",
            TokenKind::Login => "login",
            TokenKind::Patrol => "patrol",
            TokenKind::Rollback => "rollback",
            TokenKind::UserRights => "userrights",
            TokenKind::Watch => "watch",
        }
    }

    /// Parse a token type name, as reported by `paraminfo`'s `tokentype`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Key under which `meta=tokens` returns this token (`csrftoken`, ...).
    pub fn response_key(&self) -> String {
        format!("{}token", self.as_str())
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct SessionData {
    tokens: HashMap<TokenKind, String>,
    api_high_limits: bool,
    user_name: Option<String>,
    rights: Vec<String>,
}

/// Mutable credential state scoped to one client, from login to logout.
///
/// Token values are redacted in Debug output.
#[derive(Default)]
pub struct SessionState {
    inner: RwLock<SessionData>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.read();
        let mut kinds: Vec<&str> = data.tokens.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("SessionState")
            .field("tokens", &kinds)
            .field("api_high_limits", &data.api_high_limits)
            .field("user_name", &data.user_name)
            .finish()
    }
}

impl SessionState {
    /// Create empty session state.
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a writer panicked mid-update of plain data.
    fn read(&self) -> RwLockReadGuard<'_, SessionData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a token. Csrf falls back to the anonymous token.
    pub fn token(&self, kind: TokenKind) -> Option<String> {
        let data = self.read();
        match data.tokens.get(&kind) {
            Some(token) => Some(token.clone()),
            None if kind == TokenKind::Csrf => Some(ANONYMOUS_CSRF_TOKEN.to_string()),
            None => None,
        }
    }

    /// Store a single token.
    pub fn set_token(&self, kind: TokenKind, value: impl Into<String>) {
        self.write().tokens.insert(kind, value.into());
    }

    /// Merge freshly fetched tokens into the table.
    pub fn update_tokens(&self, tokens: impl IntoIterator<Item = (TokenKind, String)>) {
        self.write().tokens.extend(tokens);
    }

    /// Forget every token, e.g. after logout.
    pub fn clear_tokens(&self) {
        self.write().tokens.clear();
    }

    /// Whether the account may use the raised multi-value limits.
    pub fn has_api_high_limits(&self) -> bool {
        self.read().api_high_limits
    }

    /// Set the high-limit flag directly.
    pub fn set_api_high_limits(&self, enabled: bool) {
        self.write().api_high_limits = enabled;
    }

    /// Record the logged-in user and their rights; derives the high-limit flag.
    pub fn set_user(&self, name: Option<String>, rights: Vec<String>) {
        let mut data = self.write();
        data.api_high_limits = rights.iter().any(|r| r == crate::HIGH_LIMITS_RIGHT);
        data.user_name = name;
        data.rights = rights;
    }

    /// Name of the current user, if known.
    pub fn user_name(&self) -> Option<String> {
        self.read().user_name.clone()
    }

    /// Rights of the current user, as last reported by the server.
    pub fn rights(&self) -> Vec<String> {
        self.read().rights.clone()
    }

    /// Drop user information and tokens.
    pub fn reset(&self) {
        *self.write() = SessionData::default();
    }
}
