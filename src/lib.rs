//! Multipart upload client for the corp messaging API.
//!
//! [`CorpClient::upload_from_reader`] is the general routine: it posts a file
//! part (and an optional string part) with the access token appended to the
//! URL, and retries once with a refreshed token when the vendor says the token
//! expired. The endpoint wrappers live in [`media`].

pub mod client;
pub mod config;
pub mod error;
pub mod media;
pub mod multipart;
pub mod token;

pub use client::CorpClient;
pub use config::Config;
pub use error::{ApiError, ErrCoded, Error};
pub use media::{MediaInfo, MediaType, VideoDescription};
pub use token::{AccessTokenServer, DefaultAccessTokenServer, StaticTokenServer};

#[cfg(test)]
mod tests;
