use crate::error::Error;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use tokio::io::{AsyncRead, AsyncReadExt};

// Wire layout of a body with both parts:
//
//  --BOUNDARY
//  Content-Disposition: form-data; name="FIELDNAME"; filename="FILENAME"
//  Content-Type: application/octet-stream
//
//  FILE-CONTENT
//  --BOUNDARY
//  Content-Disposition: form-data; name="FIELDNAME"
//
//  JSON-DESCRIPTION
//  --BOUNDARY--

/// A multipart body that can be turned into a fresh `Form` for every attempt.
///
/// Content is held in `Bytes`, so rebuilding the form only bumps a refcount.
#[derive(Debug, Clone)]
pub struct UploadBody {
    file_field: String,
    file_name: String,
    file_content: Bytes,
    extra_field: Option<(String, Bytes)>,
}

impl UploadBody {
    pub fn new(
        file_field: impl Into<String>,
        file_name: impl Into<String>,
        file_content: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_field: file_field.into(),
            file_name: file_name.into(),
            file_content: file_content.into(),
            extra_field: None,
        }
    }

    /// Reads the whole file part from `reader`.
    pub async fn from_reader<R>(
        file_field: impl Into<String>,
        file_name: impl Into<String>,
        reader: R,
    ) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = reader;
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .await
            .map_err(|err| Error::Multipart(format!("read file part: {err}")))?;
        Ok(Self::new(file_field, file_name, content))
    }

    /// Adds the second, plain-text part. Skipped when either name or value is empty.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        let name = name.into();
        let value = value.into();
        self.extra_field = if name.is_empty() || value.is_empty() {
            None
        } else {
            Some((name, value))
        };
        self
    }

    pub fn file_len(&self) -> usize {
        self.file_content.len()
    }

    pub fn has_extra_field(&self) -> bool {
        self.extra_field.is_some()
    }

    pub fn to_form(&self) -> Result<Form, Error> {
        let file_part = Part::stream_with_length(
            reqwest::Body::from(self.file_content.clone()),
            self.file_content.len() as u64,
        )
        .file_name(self.file_name.clone())
        .mime_str(mime::APPLICATION_OCTET_STREAM.as_ref())
        .map_err(|err| Error::Multipart(format!("file part: {err}")))?;

        let mut form = Form::new().part(self.file_field.clone(), file_part);

        if let Some((name, value)) = &self.extra_field {
            form = form.part(
                name.clone(),
                Part::stream_with_length(reqwest::Body::from(value.clone()), value.len() as u64),
            );
        }

        Ok(form)
    }
}
