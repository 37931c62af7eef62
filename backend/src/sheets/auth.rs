//! Credentials for the Sheets API.
//!
//! Three ways in, first configured wins:
//! - a bearer access token obtained elsewhere
//! - an API key (read-only, public sheets)
//! - a service-account key, exchanged for an access token with a signed
//!   RS256 JWT assertion

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{SheetsError, SheetsResult};

/// Scope for reading values only.
pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

/// Scope for reading and appending values.
pub const READWRITE_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for an assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this many seconds before they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// How the client authenticates.
#[derive(Clone)]
pub enum Credentials {
    AccessToken(String),
    ApiKey(String),
    ServiceAccount(ServiceAccountKey),
}

impl Credentials {
    /// Short label for logs; never includes the secret.
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::AccessToken(_) => "access token",
            Credentials::ApiKey(_) => "API key",
            Credentials::ServiceAccount(_) => "service account",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Credentials::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credentials::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
        }
    }
}

/// The fields of a Google service-account key file that token exchange needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> SheetsResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SheetsError::Auth(format!("invalid service account key: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> SheetsResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SheetsError::Auth(format!(
                "cannot read key file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Sign the JWT assertion for a token exchange issued at `now` (unix secs).
pub fn sign_assertion(key: &ServiceAccountKey, scope: &str, now: i64) -> SheetsResult<String> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SheetsError::Auth(format!("invalid private key: {}", e)))?;

    let claims = Claims {
        iss: &key.client_email,
        scope,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| SheetsError::Auth(format!("jwt encode error: {}", e)))
}

/// An access token and the unix time it expires at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: i64,
}

impl AccessToken {
    /// Usable at `now`, with a safety margin before expiry.
    pub fn is_fresh(&self, now: i64) -> bool {
        now + EXPIRY_MARGIN_SECS < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

/// Exchange a signed assertion for an access token.
pub async fn exchange_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    scope: &str,
) -> SheetsResult<AccessToken> {
    let now = chrono::Utc::now().timestamp();
    let assertion = sign_assertion(key, scope, now)?;

    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| SheetsError::RequestFailed(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SheetsError::RequestFailed(e.to_string()))?;

    if !status.is_success() {
        return Err(SheetsError::Auth(format!(
            "token exchange failed (HTTP {}): {}",
            status.as_u16(),
            body
        )));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| SheetsError::InvalidResponse(format!("token response: {}", e)))?;

    tracing::debug!(client = %key.client_email, expires_in = token.expires_in, "Obtained access token");

    Ok(AccessToken {
        value: token.access_token,
        expires_at: now + token.expires_in,
    })
}
