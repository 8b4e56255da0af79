//! Access token sources.
//!
//! Every API call carries the corp access token in its query string. The token
//! lives for `expires_in` seconds (7200 in practice) and is shared by every
//! caller of the same corp, so it is fetched once and cached here.

use crate::config::Config;
use crate::error::{ApiError, ErrCoded, Error};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

/// Seconds shaved off `expires_in` so a token is never used right at its deadline.
const EXPIRY_MARGIN_SECS: i64 = 300;

#[async_trait]
pub trait AccessTokenServer: Send + Sync {
    /// Returns the current token, fetching one if none is cached.
    async fn token(&self) -> Result<String, Error>;

    /// Discards the cached token and fetches a new one.
    async fn refresh_token(&self) -> Result<String, Error>;
}

/// A token managed outside this crate.
pub struct StaticTokenServer {
    token: String,
}

impl StaticTokenServer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenServer for StaticTokenServer {
    async fn token(&self) -> Result<String, Error> {
        Ok(self.token.clone())
    }

    async fn refresh_token(&self) -> Result<String, Error> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    error: ApiError,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

impl ErrCoded for TokenResponse {
    fn err_code(&self) -> i64 {
        self.error.errcode
    }

    fn err_msg(&self) -> &str {
        &self.error.errmsg
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Fetches tokens from `<base>/gettoken` and caches them until shortly before expiry.
pub struct DefaultAccessTokenServer {
    http: Client,
    token_url: String,
    corp_id: String,
    corp_secret: String,
    cache: Mutex<Option<CachedToken>>,
}

impl DefaultAccessTokenServer {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            token_url: config.endpoint("gettoken"),
            corp_id: config.corp_id.clone(),
            corp_secret: config.corp_secret.clone(),
            cache: Mutex::new(None),
        }
    }

    #[tracing::instrument(name = "fetch_token", skip_all, fields(corp_id = %self.corp_id))]
    async fn fetch(&self) -> Result<CachedToken, Error> {
        let res = self
            .http
            .get(&self.token_url)
            .query(&[
                ("corpid", self.corp_id.as_str()),
                ("corpsecret", self.corp_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| Error::Token(format!("request failed: {err}")))?;

        let status = res.status();
        if status != StatusCode::OK {
            return Err(Error::Token(format!("http.Status: {status}")));
        }

        let body = res
            .bytes()
            .await
            .map_err(|err| Error::Token(format!("read body failed: {err}")))?;
        let payload: TokenResponse = serde_json::from_slice(&body)
            .map_err(|err| Error::Token(format!("decode failed: {err}")))?;
        let payload = payload
            .check()
            .map_err(|err| Error::Token(err.to_string()))?;

        if payload.access_token.is_empty() {
            return Err(Error::Token("response has no access_token".into()));
        }
        if payload.expires_in <= 0 {
            return Err(Error::Token(format!(
                "invalid expires_in: {}",
                payload.expires_in
            )));
        }

        tracing::debug!(expires_in = payload.expires_in, "access token fetched.");
        Ok(CachedToken {
            token: payload.access_token,
            expires_at: Utc::now() + Duration::seconds(effective_ttl(payload.expires_in)),
        })
    }
}

// Short-lived tokens get half their lifetime rather than going negative.
fn effective_ttl(expires_in: i64) -> i64 {
    if expires_in > 2 * EXPIRY_MARGIN_SECS {
        expires_in - EXPIRY_MARGIN_SECS
    } else {
        expires_in / 2
    }
}

#[async_trait]
impl AccessTokenServer for DefaultAccessTokenServer {
    async fn token(&self) -> Result<String, Error> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(Utc::now())) {
            return Ok(cached.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    async fn refresh_token(&self) -> Result<String, Error> {
        let mut cache = self.cache.lock().await;
        *cache = None;

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}
