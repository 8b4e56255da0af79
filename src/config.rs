use crate::error::Error;
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin";

#[derive(Debug, Clone)]
pub struct Config {
    pub corp_id: String,
    pub corp_secret: String,
    // No trailing slash; endpoint paths are appended with one.
    pub base_url: String,
    pub http_timeout: Option<Duration>,
}

impl Config {
    pub fn new(corp_id: impl Into<String>, corp_secret: impl Into<String>) -> Self {
        Self {
            corp_id: corp_id.into(),
            corp_secret: corp_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http_timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Reads the config from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::Config(format!("{key} must be set")))
        };

        let mut config = Config::new(required("CORP_ID")?, required("CORP_SECRET")?);

        if let Some(base_url) = lookup("CORP_API_BASE_URL") {
            config = config.with_base_url(base_url);
        }

        if let Some(raw) = lookup("CORP_HTTP_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("invalid CORP_HTTP_TIMEOUT_SECS: {raw}")))?;
            config.http_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}
