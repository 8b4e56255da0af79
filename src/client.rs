use crate::config::Config;
use crate::error::{ErrCoded, Error};
use crate::multipart::UploadBody;
use crate::token::{AccessTokenServer, DefaultAccessTokenServer};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

/// Extra attempts allowed after the vendor rejects the access token.
const TOKEN_RETRIES: usize = 1;

/// Client for the corp API: a shared reqwest client plus a token source.
#[derive(Clone)]
pub struct CorpClient {
    http: Client,
    tokens: Arc<dyn AccessTokenServer>,
    pub base_url: String,
}

// Why a single attempt stopped.
#[derive(Debug)]
enum AttemptError<T> {
    // The vendor rejected the token; carries the decoded response in case we
    // are out of retries.
    TokenRejected(T),
    Failed(Error),
}

impl<T> From<Error> for AttemptError<T> {
    fn from(err: Error) -> Self {
        AttemptError::Failed(err)
    }
}

impl CorpClient {
    pub fn new(
        http: Client,
        tokens: Arc<dyn AccessTokenServer>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds the HTTP client and a caching token server from `config`.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| Error::Config(format!("http client: {err}")))?;

        let tokens = Arc::new(DefaultAccessTokenServer::new(http.clone(), config));
        Ok(Self::new(http, tokens, config.base_url.clone()))
    }

    pub(crate) fn endpoint(&self, path_and_query: &str) -> String {
        format!("{}/{}", self.base_url, path_and_query)
    }

    /// Generic multipart upload.
    ///
    /// The final URL is `incomplete_url` followed by the escaped access token, so
    /// `incomplete_url` must end with `access_token=`. Part 1 is the file; part 2
    /// is a plain string and is left out when its name or value is empty.
    ///
    /// A response whose `errcode` says the token expired is retried once with a
    /// refreshed token. Any other `errcode` is returned inside `T` untouched.
    /// Most callers want the wrappers in [`crate::media`] instead.
    pub async fn upload_from_reader<T, R>(
        &self,
        incomplete_url: &str,
        part1_field_name: &str,
        part1_file_name: &str,
        part1_reader: R,
        part2_field_name: &str,
        part2_value: impl Into<Bytes>,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned + ErrCoded,
        R: AsyncRead + Unpin,
    {
        let body = UploadBody::from_reader(part1_field_name, part1_file_name, part1_reader)
            .await?
            .with_field(part2_field_name, part2_value);
        self.upload(incomplete_url, &body).await
    }

    /// Same as [`upload_from_reader`](Self::upload_from_reader) for content already in memory.
    pub async fn upload_bytes<T>(
        &self,
        incomplete_url: &str,
        part1_field_name: &str,
        part1_file_name: &str,
        part1_content: impl Into<Bytes>,
        part2_field_name: &str,
        part2_value: impl Into<Bytes>,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned + ErrCoded,
    {
        let body = UploadBody::new(part1_field_name, part1_file_name, part1_content)
            .with_field(part2_field_name, part2_value);
        self.upload(incomplete_url, &body).await
    }

    #[tracing::instrument(
        name = "upload",
        skip_all,
        fields(url = %incomplete_url, size = body.file_len())
    )]
    pub async fn upload<T>(&self, incomplete_url: &str, body: &UploadBody) -> Result<T, Error>
    where
        T: DeserializeOwned + ErrCoded,
    {
        let token = self.tokens.token().await?;
        let attempts = AtomicUsize::new(0);
        let action = || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            self.attempt::<T>(attempt, token.clone(), incomplete_url, body)
        };

        let strategy = FixedInterval::from_millis(0).take(TOKEN_RETRIES);
        match RetryIf::start(strategy, action, |err: &AttemptError<T>| {
            matches!(err, AttemptError::TokenRejected(_))
        })
        .await
        {
            Ok(response) => Ok(response),
            Err(AttemptError::TokenRejected(response)) => {
                tracing::warn!(
                    errcode = response.err_code(),
                    "access token still rejected after refresh."
                );
                Ok(response)
            }
            Err(AttemptError::Failed(err)) => Err(err),
        }
    }

    async fn attempt<T>(
        &self,
        attempt: usize,
        token: String,
        incomplete_url: &str,
        body: &UploadBody,
    ) -> Result<T, AttemptError<T>>
    where
        T: DeserializeOwned + ErrCoded,
    {
        let token = if attempt == 0 {
            token
        } else {
            tracing::warn!(attempt, "access token rejected; refreshing.");
            self.tokens.refresh_token().await?
        };

        let final_url = final_url(incomplete_url, &token);
        let res = self
            .http
            .post(final_url)
            .multipart(body.to_form()?)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = res.status();
        if status != StatusCode::OK {
            tracing::warn!(%status, "upload rejected by upstream.");
            return Err(Error::Status(status).into());
        }

        let raw = res.bytes().await.map_err(Error::Transport)?;
        let response: T = serde_json::from_slice(&raw).map_err(Error::Decode)?;

        if response.is_token_error() {
            return Err(AttemptError::TokenRejected(response));
        }

        tracing::debug!(errcode = response.err_code(), "upload finished.");
        Ok(response)
    }
}

fn final_url(incomplete_url: &str, token: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    format!("{incomplete_url}{escaped}")
}
