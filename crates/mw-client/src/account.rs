//! Tokens, login and capability discovery.

use busbar_mw_auth::{AuthStrategy, TokenKind};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{Error, ErrorKind, Result};
use crate::mediawiki_client::MwClient;
use crate::params::{CallParams, ParamValue};
use crate::request::CallOptions;

/// Token type for core actions: `Some(None)` if the action takes no token,
/// `None` if the action is not in the table.
fn known_token_type(action: &str) -> Option<Option<TokenKind>> {
    let kind = match action {
        "query" | "parse" | "expandtemplates" | "opensearch" | "help" | "paraminfo"
        | "compare" | "sitematrix" | "feedcontributions" | "feedrecentchanges"
        | "feedwatchlist" | "purge" => None,
        "login" | "clientlogin" => Some(TokenKind::Login),
        "createaccount" => Some(TokenKind::CreateAccount),
        "rollback" => Some(TokenKind::Rollback),
        "patrol" | "review" => Some(TokenKind::Patrol),
        "userrights" => Some(TokenKind::UserRights),
        "watch" => Some(TokenKind::Watch),
        "edit" | "move" | "delete" | "undelete" | "protect" | "block" | "unblock" | "upload"
        | "import" | "emailuser" | "options" | "mergehistory" | "changecontentmodel"
        | "managetags" | "tag" | "setpagelanguage" | "revisiondelete" | "filerevert"
        | "stashedit" | "setnotificationtimestamp" | "logout" | "linkaccount"
        | "unlinkaccount" | "changeauthenticationdata" | "removeauthenticationdata"
        | "resetpassword" | "thank" => Some(TokenKind::Csrf),
        _ => return None,
    };
    Some(kind)
}

/// Name of the parameter that carries the token for `action`.
pub fn token_param_name(action: Option<&str>) -> &'static str {
    match action {
        Some("login") => "lgtoken",
        Some("createaccount") => "createtoken",
        Some("clientlogin") => "logintoken",
        _ => "token",
    }
}

impl MwClient {
    /// Current csrf token; the anonymous token until one is fetched.
    pub fn csrf_token(&self) -> String {
        self.token(TokenKind::Csrf).unwrap_or_default()
    }

    /// Look up a token in the shared table.
    pub fn token(&self, kind: TokenKind) -> Option<String> {
        self.session().token(kind)
    }

    /// Fetch every token type in one round trip and store them.
    #[instrument(skip(self))]
    pub async fn get_tokens(&self) -> Result<()> {
        let types: Vec<&str> = TokenKind::ALL.iter().map(TokenKind::as_str).collect();
        let response = self
            .call(
                CallParams::new()
                    .with("action", "query")
                    .with("meta", "tokens")
                    .with("type", types)
                    .with("assert", ParamValue::Unset),
                CallOptions::new(),
            )
            .await?;

        let tokens = &response["query"]["tokens"];
        let fetched: Vec<(TokenKind, String)> = TokenKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let value = tokens.get(kind.response_key())?.as_str()?;
                Some((kind, value.to_string()))
            })
            .collect();

        debug!(count = fetched.len(), "Tokens refreshed");
        self.session().update_tokens(fetched);
        Ok(())
    }

    /// Token type required by `action`.
    ///
    /// Core actions come from a built-in table; anything else is looked up
    /// with `action=paraminfo`.
    pub async fn get_token_type(&self, action: &str) -> Result<Option<TokenKind>> {
        if let Some(kind) = known_token_type(action) {
            return Ok(kind);
        }

        let response = self
            .call(
                CallParams::new()
                    .with("action", "paraminfo")
                    .with("modules", action),
                CallOptions::new(),
            )
            .await?;

        Ok(paraminfo_token_type(&response))
    }

    /// Fetch fresh tokens and return the one `action` needs.
    pub(crate) async fn refresh_token_for(&self, action: Option<&str>) -> Result<Option<String>> {
        let Some(action) = action else {
            return Ok(None);
        };
        let Some(kind) = self.get_token_type(action).await? else {
            return Ok(None);
        };
        self.get_tokens().await?;
        Ok(self.token(kind))
    }

    /// Log in with the configured bot password.
    ///
    /// Only valid for session authentication. Refreshes user info and tokens
    /// afterwards.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<()> {
        let credentials = match self.auth() {
            AuthStrategy::Session(Some(credentials)) => credentials.clone(),
            AuthStrategy::Session(None) => {
                return Err(Error::new(ErrorKind::Config(
                    "no login credentials configured".to_string(),
                )))
            }
            _ => {
                return Err(Error::new(ErrorKind::Config(
                    "login is only used with session authentication".to_string(),
                )))
            }
        };

        let response = self
            .call(
                CallParams::new()
                    .with("action", "query")
                    .with("meta", "tokens")
                    .with("type", "login")
                    .with("assert", ParamValue::Unset),
                CallOptions::new(),
            )
            .await?;
        let login_token = response["query"]["tokens"]["logintoken"]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::Auth("no login token returned".to_string())))?
            .to_string();

        let response = self
            .call(
                CallParams::new()
                    .with("action", "login")
                    .with("lgname", credentials.username())
                    .with("lgpassword", credentials.password())
                    .with("lgtoken", login_token)
                    .with("assert", ParamValue::Unset),
                CallOptions::new(),
            )
            .await?;

        let login = &response["login"];
        if login["result"].as_str() != Some("Success") {
            let reason = match &login["reason"] {
                Value::String(reason) => reason.clone(),
                Value::Null => login["result"].as_str().unwrap_or("unknown").to_string(),
                other => other.to_string(),
            };
            return Err(Error::new(ErrorKind::Auth(format!("login failed: {}", reason))));
        }

        self.session().clear_tokens();
        self.refresh_user_info().await?;
        self.get_tokens().await?;

        info!(
            user = %self.session().user_name().unwrap_or_default(),
            high_limits = self.has_api_high_limits(),
            "Logged in"
        );
        Ok(())
    }

    /// End the session and forget user info and tokens.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.call(
            CallParams::new()
                .with("action", "logout")
                .with("token", self.csrf_token()),
            CallOptions::new(),
        )
        .await?;
        self.session().reset();
        info!("Logged out");
        Ok(())
    }

    /// Read the current user's name and rights; sets the high-limit flag.
    pub async fn refresh_user_info(&self) -> Result<()> {
        let response = self
            .call(
                CallParams::new()
                    .with("action", "query")
                    .with("meta", "userinfo")
                    .with("uiprop", "rights"),
                CallOptions::new(),
            )
            .await?;

        let userinfo = &response["query"]["userinfo"];
        let name = userinfo["name"].as_str().map(str::to_string);
        let rights = userinfo["rights"]
            .as_array()
            .map(|rights| {
                rights
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        self.session().set_user(name, rights);
        Ok(())
    }
}

/// Find the `tokentype` of the first token parameter in a paraminfo response.
fn paraminfo_token_type(response: &Value) -> Option<TokenKind> {
    let modules = response["paraminfo"]["modules"].as_array()?;
    modules
        .iter()
        .filter_map(|module| module["parameters"].as_array())
        .flatten()
        .find_map(|param| {
            let name = param["name"].as_str()?;
            if !matches!(name, "token" | "lgtoken" | "createtoken" | "logintoken") {
                return None;
            }
            TokenKind::parse(param["tokentype"].as_str()?)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::retry::RetryConfig;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, auth: AuthStrategy) -> MwClient {
        let config = ClientConfig::builder()
            .with_retry(RetryConfig::default().with_retry_pause(Duration::from_millis(10)))
            .build();
        MwClient::with_config(format!("{}/w/api.php", server.uri()), auth, config).unwrap()
    }

    #[test]
    fn test_known_token_types() {
        assert_eq!(known_token_type("edit"), Some(Some(TokenKind::Csrf)));
        assert_eq!(known_token_type("rollback"), Some(Some(TokenKind::Rollback)));
        assert_eq!(known_token_type("login"), Some(Some(TokenKind::Login)));
        assert_eq!(known_token_type("query"), Some(None));
        assert_eq!(known_token_type("flow"), None);
    }

    #[test]
    fn test_token_param_name() {
        assert_eq!(token_param_name(Some("login")), "lgtoken");
        assert_eq!(token_param_name(Some("createaccount")), "createtoken");
        assert_eq!(token_param_name(Some("clientlogin")), "logintoken");
        assert_eq!(token_param_name(Some("edit")), "token");
        assert_eq!(token_param_name(None), "token");
    }

    #[test]
    fn test_paraminfo_token_type() {
        let response = serde_json::json!({
            "paraminfo": {"modules": [{
                "name": "thank",
                "parameters": [
                    {"name": "rev", "type": "integer"},
                    {"name": "token", "type": "string", "tokentype": "csrf"}
                ]
            }]}
        });
        assert_eq!(paraminfo_token_type(&response), Some(TokenKind::Csrf));

        let response = serde_json::json!({
            "paraminfo": {"modules": [{"name": "x", "parameters": [{"name": "foo"}]}]}
        });
        assert_eq!(paraminfo_token_type(&response), None);
    }

    #[tokio::test]
    async fn test_get_token_type_falls_back_to_paraminfo() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("action", "paraminfo"))
            .and(query_param("modules", "flowthank"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paraminfo": {"modules": [{
                    "name": "flowthank",
                    "parameters": [{"name": "token", "tokentype": "csrf"}]
                }]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, AuthStrategy::anonymous());
        assert_eq!(client.get_token_type("edit").await.unwrap(), Some(TokenKind::Csrf));
        assert_eq!(
            client.get_token_type("flowthank").await.unwrap(),
            Some(TokenKind::Csrf)
        );
    }

    #[tokio::test]
    async fn test_get_tokens_fills_table() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("meta", "tokens"))
            .and(query_param(
                "type",
                "csrf|createaccount|login|patrol|rollback|userrights|watch",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"tokens": {
                    "csrftoken": "c+\\",
                    "rollbacktoken": "r+\\",
                    "logintoken": "l+\\"
                }}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, AuthStrategy::anonymous());
        assert_eq!(client.csrf_token(), "+\\");

        client.get_tokens().await.unwrap();
        assert_eq!(client.csrf_token(), "c+\\");
        assert_eq!(client.token(TokenKind::Rollback).as_deref(), Some("r+\\"));
        assert_eq!(client.token(TokenKind::Watch), None);
    }

    #[tokio::test]
    async fn test_login_flow() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("type", "login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"tokens": {"logintoken": "lt+\\"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_string_contains("action=login"))
            .and(body_string_contains("lgname=Example%40bot"))
            .and(body_string_contains("lgtoken=lt%2B%5C"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": {"result": "Success", "lguserid": 1, "lgusername": "Example"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("meta", "userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"userinfo": {"id": 1, "name": "Example", "rights": ["read", "edit", "apihighlimits"]}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("type", "csrf|createaccount|login|patrol|rollback|userrights|watch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"tokens": {"csrftoken": "session+\\"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, AuthStrategy::bot_password("Example@bot", "secret"));
        client.login().await.unwrap();

        assert!(client.has_api_high_limits());
        assert_eq!(client.session().user_name().as_deref(), Some("Example"));
        assert_eq!(client.csrf_token(), "session+\\");
    }

    #[tokio::test]
    async fn test_login_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("type", "login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"tokens": {"logintoken": "lt+\\"}}
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_string_contains("action=login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": {"result": "Failed", "reason": "Incorrect username or password entered."}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, AuthStrategy::bot_password("Example@bot", "wrong"));
        let err = client.login().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Auth(ref m) if m.contains("Incorrect username")));
    }

    #[tokio::test]
    async fn test_login_requires_session_credentials() {
        let client = MwClient::new("https://example.org/w/api.php", AuthStrategy::oauth2("t")).unwrap();
        assert!(matches!(client.login().await.unwrap_err().kind, ErrorKind::Config(_)));

        let client = MwClient::new("https://example.org/w/api.php", AuthStrategy::anonymous()).unwrap();
        assert!(matches!(client.login().await.unwrap_err().kind, ErrorKind::Config(_)));
    }

    #[tokio::test]
    async fn test_reauth_on_assert_failure() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let server = MockServer::start().await;
        let purges = Arc::new(AtomicU32::new(0));
        let purges_clone = purges.clone();

        Mock::given(method("POST"))
            .and(body_string_contains("action=purge"))
            .respond_with(move |_: &wiremock::Request| {
                if purges_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "error": {"code": "assertuserfailed", "info": "You are no longer logged in."}
                    }))
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "batchcomplete": true, "purge": [{"title": "Foo", "purged": true}]
                    }))
                }
            })
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("type", "login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"tokens": {"logintoken": "lt+\\"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_string_contains("action=login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": {"result": "Success", "lgusername": "Example"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("meta", "userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"userinfo": {"name": "Example", "rights": ["read"]}}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(query_param("meta", "tokens"))
            .and(query_param("type", "csrf|createaccount|login|patrol|rollback|userrights|watch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"tokens": {"csrftoken": "c+\\"}}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, AuthStrategy::bot_password("Example@bot", "secret"));
        let result = client
            .request(CallParams::from([
                ("action", "purge"),
                ("titles", "Foo"),
                ("assert", "user"),
            ]))
            .await
            .unwrap();

        assert_eq!(result["purge"][0]["purged"], true);
        assert_eq!(purges.load(Ordering::SeqCst), 2);
        assert!(!client.has_api_high_limits());
    }
}
