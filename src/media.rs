//! Media and material upload endpoints.
//!
//! These wrap [`CorpClient::upload_from_reader`] and, unlike it, report a
//! non-zero `errcode` as [`Error::Api`].

use crate::client::CorpClient;
use crate::error::{ApiError, ErrCoded, Error};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::io::AsyncRead;

const MEDIA_FIELD: &str = "media";
const DESCRIPTION_FIELD: &str = "description";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Voice,
    Video,
    File,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Voice => "voice",
            MediaType::Video => "video",
            MediaType::File => "file",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "voice" => Ok(MediaType::Voice),
            "video" => Ok(MediaType::Video),
            "file" => Ok(MediaType::File),
            other => Err(Error::Config(format!("unknown media type: {other}"))),
        }
    }
}

/// A temporary media file, valid for three days after upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaInfo {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub media_id: String,
    // Unix seconds; sent as a string by the vendor.
    #[serde(deserialize_with = "de_unix_seconds")]
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    #[serde(flatten)]
    error: ApiError,
    // Decoded into `MediaInfo` only once `errcode` says the upload succeeded.
    #[serde(flatten)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl MediaUploadResponse {
    fn into_info(self) -> Result<MediaInfo, Error> {
        let res = self.check()?;
        serde_json::from_value(serde_json::Value::Object(res.fields)).map_err(Error::Decode)
    }
}

#[derive(Debug, Deserialize)]
struct UploadImageResponse {
    #[serde(flatten)]
    error: ApiError,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct AddMaterialResponse {
    #[serde(flatten)]
    error: ApiError,
    #[serde(default)]
    media_id: String,
}

macro_rules! impl_err_coded {
    ($($ty:ty),*) => {
        $(impl ErrCoded for $ty {
            fn err_code(&self) -> i64 {
                self.error.errcode
            }

            fn err_msg(&self) -> &str {
                &self.error.errmsg
            }
        })*
    };
}

impl_err_coded!(MediaUploadResponse, UploadImageResponse, AddMaterialResponse);

/// Title and introduction sent alongside a permanent video.
#[derive(Debug, Clone, Serialize)]
pub struct VideoDescription {
    pub title: String,
    pub introduction: String,
}

fn de_unix_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(secs) => Ok(secs),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn file_name_of(path: &Path) -> Result<String, Error> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Multipart(format!("no file name in {}", path.display())))
}

impl CorpClient {
    /// Uploads a temporary media file.
    #[tracing::instrument(name = "upload_media", skip(self, reader))]
    pub async fn upload_media<R>(
        &self,
        media_type: MediaType,
        file_name: &str,
        reader: R,
    ) -> Result<MediaInfo, Error>
    where
        R: AsyncRead + Unpin,
    {
        let url = self.endpoint(&format!(
            "media/upload?type={}&access_token=",
            media_type.as_str()
        ));
        let res: MediaUploadResponse = self
            .upload_from_reader(&url, MEDIA_FIELD, file_name, reader, "", Bytes::new())
            .await?;

        res.into_info()
    }

    pub async fn upload_media_from_file(
        &self,
        media_type: MediaType,
        path: impl AsRef<Path>,
    ) -> Result<MediaInfo, Error> {
        let path = path.as_ref();
        let file_name = file_name_of(path)?;
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|err| Error::Multipart(format!("open {}: {err}", path.display())))?;
        self.upload_media(media_type, &file_name, file).await
    }

    /// Uploads an image for use inside news articles and returns its URL.
    #[tracing::instrument(name = "upload_image_for_news", skip(self, reader))]
    pub async fn upload_image_for_news<R>(&self, file_name: &str, reader: R) -> Result<String, Error>
    where
        R: AsyncRead + Unpin,
    {
        let url = self.endpoint("media/uploadimg?access_token=");
        let res: UploadImageResponse = self
            .upload_from_reader(&url, MEDIA_FIELD, file_name, reader, "", Bytes::new())
            .await?;
        Ok(res.check()?.url)
    }

    /// Adds a permanent material for `agent_id` and returns its media id.
    #[tracing::instrument(name = "add_material", skip(self, reader))]
    pub async fn add_material<R>(
        &self,
        agent_id: i64,
        media_type: MediaType,
        file_name: &str,
        reader: R,
    ) -> Result<String, Error>
    where
        R: AsyncRead + Unpin,
    {
        let url = self.material_url(agent_id, media_type);
        let res: AddMaterialResponse = self
            .upload_from_reader(&url, MEDIA_FIELD, file_name, reader, "", Bytes::new())
            .await?;
        Ok(res.check()?.media_id)
    }

    /// Adds a permanent video along with its description part.
    #[tracing::instrument(name = "add_video_material", skip(self, reader, description))]
    pub async fn add_video_material<R>(
        &self,
        agent_id: i64,
        file_name: &str,
        reader: R,
        description: &VideoDescription,
    ) -> Result<String, Error>
    where
        R: AsyncRead + Unpin,
    {
        let description = serde_json::to_vec(description)
            .map_err(|err| Error::Multipart(format!("encode description: {err}")))?;
        let url = self.material_url(agent_id, MediaType::Video);
        let res: AddMaterialResponse = self
            .upload_from_reader(&url, MEDIA_FIELD, file_name, reader, DESCRIPTION_FIELD, description)
            .await?;
        Ok(res.check()?.media_id)
    }

    fn material_url(&self, agent_id: i64, media_type: MediaType) -> String {
        self.endpoint(&format!(
            "material/add_material?agentid={agent_id}&type={}&access_token=",
            media_type.as_str()
        ))
    }
}
