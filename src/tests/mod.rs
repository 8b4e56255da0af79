use super::*;
use serde::Deserialize;

mod helpers;

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub error: ApiError,
    #[serde(default)]
    pub media_id: String,
}

impl ErrCoded for UploadResponse {
    fn err_code(&self) -> i64 {
        self.error.errcode
    }

    fn err_msg(&self) -> &str {
        &self.error.errmsg
    }
}
