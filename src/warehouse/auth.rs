//! OAuth access tokens for the BigQuery REST API.
//!
//! Service-account keys are exchanged for short-lived access tokens using the
//! JWT bearer grant; tokens are cached until shortly before they expire.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{InsightError, Result};

const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Tokens this close to expiry are refreshed.
const EXPIRY_MARGIN_SECS: i64 = 60;

const TOKEN_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account key file that token minting needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ServiceAccountKey {
    /// Reads and parses a key file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InsightError::config(format!(
                "Failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| InsightError::config(format!("Invalid service-account key: {e}")))
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Mints and caches access tokens for a service account.
#[derive(Clone)]
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    encoding_key: Arc<EncodingKey>,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("client_email", &self.key.client_email)
            .field("token_uri", &self.key.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    /// Parses the key's private key and checks that it can sign.
    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| InsightError::config(format!("Invalid service-account private key: {e}")))?;
        let source = Self {
            key,
            encoding_key: Arc::new(encoding_key),
            cached: Arc::new(Mutex::new(None)),
        };
        // A key can parse as PEM and still fail to sign
        source.build_jwt(unix_now())?;
        Ok(source)
    }

    /// Returns a valid access token, fetching a new one if needed.
    pub async fn access_token(&self, http: &Client) -> Result<String> {
        let now = unix_now();

        // Held across the fetch so concurrent requests don't all refresh at once.
        let mut cache = self.cached.lock().await;
        if let Some(token) = cache
            .as_ref()
            .filter(|t| t.expires_at.saturating_sub(EXPIRY_MARGIN_SECS) > now)
        {
            return Ok(token.access_token.clone());
        }

        let jwt = self.build_jwt(now)?;
        let token = self.fetch_token(http, &jwt).await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    fn build_jwt(&self, now: i64) -> Result<String> {
        #[derive(Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: i64,
            exp: i64,
        }

        let claims = Claims {
            iss: &self.key.client_email,
            scope: BIGQUERY_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| {
                InsightError::config(format!("Invalid service-account private key: {e}"))
            })
    }

    async fn fetch_token(&self, http: &Client, jwt: &str) -> Result<CachedToken> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        debug!(token_uri = %self.key.token_uri, "Fetching BigQuery access token");

        let response = http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt),
            ])
            .send()
            .await
            .map_err(|e| InsightError::query(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::query(format!(
                "Token request rejected ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| InsightError::query(format!("Invalid token response: {e}")))?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: unix_now() + token.expires_in,
        })
    }
}

/// How requests to BigQuery are authenticated.
#[derive(Debug, Clone)]
pub enum BigQueryAuth {
    /// Tokens minted from a service-account key.
    ServiceAccount(ServiceAccountTokenSource),
    /// A fixed, externally-managed access token.
    StaticToken(String),
}

impl BigQueryAuth {
    pub async fn bearer_token(&self, http: &Client) -> Result<String> {
        match self {
            Self::ServiceAccount(source) => source.access_token(http).await,
            Self::StaticToken(token) => Ok(token.clone()),
        }
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
