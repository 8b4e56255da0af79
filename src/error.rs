use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ERR_CODE_OK: i64 = 0;
/// access_token expired or not valid for this corp.
pub const ERR_CODE_INVALID_CREDENTIAL: i64 = 40001;
/// access_token timed out (sometimes reported instead of 40001).
pub const ERR_CODE_TIMEOUT: i64 = 42001;

/// The `errcode`/`errmsg` pair every vendor response carries.
///
/// Response types embed it with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errcode: {}, errmsg: {}", self.errcode, self.errmsg)
    }
}

impl std::error::Error for ApiError {}

/// Access to the vendor error code of a decoded response.
pub trait ErrCoded: Sized {
    fn err_code(&self) -> i64;

    fn err_msg(&self) -> &str {
        ""
    }

    fn is_token_error(&self) -> bool {
        matches!(
            self.err_code(),
            ERR_CODE_TIMEOUT | ERR_CODE_INVALID_CREDENTIAL
        )
    }

    /// Turns a non-zero code into `Error::Api`.
    fn check(self) -> Result<Self, Error> {
        match self.err_code() {
            ERR_CODE_OK => Ok(self),
            errcode => Err(Error::Api(ApiError {
                errcode,
                errmsg: self.err_msg().to_string(),
            })),
        }
    }
}

impl ErrCoded for ApiError {
    fn err_code(&self) -> i64 {
        self.errcode
    }

    fn err_msg(&self) -> &str {
        &self.errmsg
    }
}

#[derive(Debug)]
pub enum Error {
    Multipart(String),
    Token(String),
    Transport(reqwest::Error),
    Status(StatusCode),
    Decode(serde_json::Error),
    Api(ApiError),
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Multipart(message) => write!(f, "multipart build error: {message}"),
            Error::Token(message) => write!(f, "access token error: {message}"),
            Error::Transport(err) => write!(f, "transport error: {err}"),
            Error::Status(status) => write!(f, "http.Status: {status}"),
            Error::Decode(err) => write!(f, "response decode error: {err}"),
            Error::Api(err) => write!(f, "api error: {err}"),
            Error::Config(message) => write!(f, "config error: {message}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            Error::Decode(err) => Some(err),
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}
