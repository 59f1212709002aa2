//! # contract: interfaces to the remote collaborators
//!
//! The pipelines in this crate never talk to the network directly. They go through two
//! traits, implemented by real clients in the `post-bucket` binary crate and by
//! `mockall` mocks in tests:
//!
//! - [`ArticleApi`]: the article publishing API (create / update / list published).
//! - [`ObjectStore`]: the content-hosting bucket that receives image uploads.
//!
//! Status-code interpretation lives in the implementors: a duplicate-title rejection on
//! create must surface as [`ApiError::Conflict`], every other non-success response as
//! [`ApiError::Status`] and connection-level failures as [`ApiError::Transport`].

#![allow(unused)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of a create or update call, sent wrapped as `{"article": { ... }}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticlePayload {
    pub title: String,
    pub body_markdown: String,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    pub canonical_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Passed through exactly as written in the front matter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<serde_json::Value>,
}

/// The remote representation of an article. Unknown response fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteArticle {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 422 on create: the remote already has an article with this title.
    #[error("remote rejected the article as a duplicate (422): {body}")]
    Conflict { body: String },

    #[error("remote responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),
}

/// Article publishing API.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArticleApi: Send + Sync {
    /// Create a new article. Success means the remote assigned an identifier.
    async fn create_article(&self, article: &ArticlePayload) -> Result<RemoteArticle, ApiError>;

    /// Replace the article identified by `id`.
    async fn update_article(
        &self,
        id: u64,
        article: &ArticlePayload,
    ) -> Result<RemoteArticle, ApiError>;

    /// Every article the authenticated user has published.
    async fn list_published(&self) -> Result<Vec<RemoteArticle>, ApiError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("image file {} could not be read: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("put_object failed for {bucket}/{key}: {message}")]
    Put {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Content-hosting bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the local file at `path` to `bucket` under `key` and return its public URL.
    async fn put_object(&self, path: &Path, bucket: &str, key: &str)
        -> Result<String, StorageError>;
}
