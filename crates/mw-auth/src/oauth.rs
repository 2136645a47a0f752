//! OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).
//!
//! MediaWiki's OAuth extension only accepts HMAC-SHA1 and RSA-SHA1 for
//! owner-only consumers; this module implements the former.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

use crate::error::{Error, ErrorKind, Result};

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Consumer and access key pairs for an owner-only OAuth 1.0a consumer.
///
/// Secrets are redacted in Debug output.
#[derive(Clone)]
pub struct OAuth1Credentials {
    consumer_token: String,
    consumer_secret: String,
    access_token: String,
    access_secret: String,
}

impl std::fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_token", &self.consumer_token)
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("access_secret", &"[REDACTED]")
            .finish()
    }
}

impl OAuth1Credentials {
    /// Create new OAuth 1.0a credentials.
    pub fn new(
        consumer_token: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_token: consumer_token.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_secret: access_secret.into(),
        }
    }

    /// Get the consumer token.
    pub fn consumer_token(&self) -> &str {
        &self.consumer_token
    }

    /// Sign a request with a fresh nonce and the current timestamp.
    ///
    /// Returns the full `Authorization` header value.
    pub fn sign(&self, method: &str, url: &str, body_params: &[(String, String)]) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        self.sign_with(method, url, body_params, &nonce, timestamp)
    }

    pub(crate) fn sign_with(
        &self,
        method: &str,
        url: &str,
        body_params: &[(String, String)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String> {
        let url = Url::parse(url)?;
        let timestamp = timestamp.to_string();

        let oauth_params: [(&str, &str); 6] = [
            ("oauth_consumer_key", self.consumer_token.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", SIGNATURE_METHOD),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.access_token.as_str()),
            ("oauth_version", OAUTH_VERSION),
        ];

        let mut all_params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        all_params.extend(body_params.iter().cloned());
        all_params.extend(
            oauth_params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );

        let base = signature_base_string(method, &url, &all_params)?;
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.access_secret)
        );

        let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
            .map_err(|e| Error::new(ErrorKind::Signing(e.to_string())))?;
        mac.update(base.as_bytes());
        let signature =
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        let mut header_params: Vec<(&str, &str)> = oauth_params.to_vec();
        header_params.push(("oauth_signature", signature.as_str()));
        header_params.sort();

        let fields: Vec<String> = header_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();

        Ok(format!("OAuth {}", fields.join(", ")))
    }
}

/// RFC 3986 percent-encoding (everything but unreserved characters).
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build the RFC 5849 §3.4.1 signature base string.
fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput("URL has no host".to_string())))?;

    // Url::port() is None for the scheme's default port
    let base_url = match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    };

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(&base_url),
        encode(&normalized)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_base_string() {
        let url = Url::parse("https://example.org/w/api.php?action=query").unwrap();
        let params = vec![
            ("action".to_string(), "query".to_string()),
            ("format".to_string(), "json".to_string()),
            ("oauth_consumer_key".to_string(), "ck".to_string()),
            ("oauth_nonce".to_string(), "abc".to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), "1000".to_string()),
            ("oauth_token".to_string(), "tk".to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let base = signature_base_string("post", &url, &params).unwrap();
        assert_eq!(
            base,
            "POST&https%3A%2F%2Fexample.org%2Fw%2Fapi.php&action%3Dquery%26format%3Djson\
             %26oauth_consumer_key%3Dck%26oauth_nonce%3Dabc%26oauth_signature_method%3DHMAC-SHA1\
             %26oauth_timestamp%3D1000%26oauth_token%3Dtk%26oauth_version%3D1.0"
        );
    }

    #[test]
    fn test_base_string_keeps_non_default_port() {
        let url = Url::parse("http://localhost:8080/api.php").unwrap();
        let base = signature_base_string("GET", &url, &[]).unwrap();
        assert!(base.starts_with("GET&http%3A%2F%2Flocalhost%3A8080%2Fapi.php&"));

        let url = Url::parse("https://example.org:443/api.php").unwrap();
        let base = signature_base_string("GET", &url, &[]).unwrap();
        assert!(base.starts_with("GET&https%3A%2F%2Fexample.org%2Fapi.php&"));
    }

    #[test]
    fn test_known_signature_vector() {
        // Widely published HMAC-SHA1 reference request
        let creds = OAuth1Credentials::new(
            "xvz1evFS4wEEPTGEFPHBog",
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        );

        let header = creds
            .sign_with(
                "POST",
                "https://api.twitter.com/1.1/statuses/update.json?include_entities=true",
                &[(
                    "status".to_string(),
                    "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
                )],
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
                1318622958,
            )
            .unwrap();

        assert!(
            header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""),
            "unexpected header: {header}"
        );
    }

    #[test]
    fn test_signature_depends_on_body() {
        let creds = OAuth1Credentials::new("ck", "cs", "tk", "ts");
        let url = "https://example.org/w/api.php";
        let a = creds
            .sign_with("POST", url, &[("title".into(), "A".into())], "n", 1)
            .unwrap();
        let b = creds
            .sign_with("POST", url, &[("title".into(), "B".into())], "n", 1)
            .unwrap();
        let a_again = creds
            .sign_with("POST", url, &[("title".into(), "A".into())], "n", 1)
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_header_layout() {
        let creds = OAuth1Credentials::new("ck", "cs", "tk", "ts");
        let header = creds
            .sign_with("GET", "https://example.org/w/api.php", &[], "nonce1", 42)
            .unwrap();

        assert!(header.starts_with("OAuth oauth_consumer_key=\"ck\", oauth_nonce=\"nonce1\", "));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(header.contains("oauth_timestamp=\"42\""));
        assert!(header.contains("oauth_token=\"tk\""));
        assert!(header.ends_with("oauth_version=\"1.0\""));
    }

    #[test]
    fn test_fresh_nonce_per_signature() {
        let creds = OAuth1Credentials::new("ck", "cs", "tk", "ts");
        let url = "https://example.org/w/api.php";
        let a = creds.sign("GET", url, &[]).unwrap();
        let b = creds.sign("GET", url, &[]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_url() {
        let creds = OAuth1Credentials::new("ck", "cs", "tk", "ts");
        assert!(creds.sign("GET", "not a url", &[]).is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let creds = OAuth1Credentials::new("ck", "cs-secret", "tk-secret", "ts-secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("ck"));
        assert!(!debug.contains("cs-secret"));
        assert!(!debug.contains("tk-secret"));
        assert!(!debug.contains("ts-secret"));
    }
}
