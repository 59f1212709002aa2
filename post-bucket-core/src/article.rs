//! Typed view over the front matter fields the sync pipeline consumes.

use serde_yaml::Value;
use thiserror::Error;

use crate::config::PublishConfig;
use crate::contract::ArticlePayload;
use crate::front_matter::Document;
use crate::slug::{canonical_url, SlugError};

pub const TITLE: &str = "title";
pub const DEV: &str = "dev";
pub const DRAFT: &str = "draft";
pub const SERIES: &str = "series";
pub const DESCRIPTION: &str = "description";
pub const TAGS: &str = "tags";
pub const DEV_ID: &str = "dev_id";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArticleError {
    #[error("front matter field `{0}` is required")]
    MissingField(&'static str),

    #[error("front matter field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(transparent)]
    Slug(#[from] SlugError),
}

/// Publish-relevant fields of one document.
///
/// `dev` and `draft` read as `false` when absent. `dev_id` is `None` when absent or
/// falsy (`null`, `false`, `0`, `""`).
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: Option<String>,
    pub dev: bool,
    pub draft: bool,
    pub series: Option<String>,
    pub description: Option<String>,
    pub tags: Option<serde_json::Value>,
    pub dev_id: Option<u64>,
}

impl Article {
    pub fn from_document(doc: &Document) -> Result<Self, ArticleError> {
        Ok(Self {
            title: text_field(doc, TITLE)?,
            dev: flag(doc, DEV)?,
            draft: flag(doc, DRAFT)?,
            series: text_field(doc, SERIES)?,
            description: text_field(doc, DESCRIPTION)?,
            tags: tags(doc)?,
            dev_id: dev_id(doc)?,
        })
    }

    pub fn title(&self) -> Result<&str, ArticleError> {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ArticleError::MissingField(TITLE))
    }

    /// Builds the create/update body for this article with `body` as its markdown.
    pub fn to_payload(
        &self,
        body: &str,
        config: &PublishConfig,
    ) -> Result<ArticlePayload, ArticleError> {
        let title = self.title()?;
        Ok(ArticlePayload {
            title: title.to_owned(),
            body_markdown: body.to_owned(),
            published: config.published,
            series: self.series.clone(),
            canonical_url: canonical_url(&config.site_url, title)?,
            description: self.description.clone(),
            tags: self.tags.clone(),
        })
    }
}

/// Reads a boolean field. Absent or `null` is `false`.
pub fn flag(doc: &Document, field: &'static str) -> Result<bool, ArticleError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(value)) => Ok(*value),
        Some(other) => Err(ArticleError::InvalidField {
            field,
            reason: format!("expected true or false, found {other:?}"),
        }),
    }
}

fn text_field(doc: &Document, field: &'static str) -> Result<Option<String>, ArticleError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(ArticleError::InvalidField {
            field,
            reason: format!("expected text, found {other:?}"),
        }),
    }
}

fn tags(doc: &Document) -> Result<Option<serde_json::Value>, ArticleError> {
    match doc.get(TAGS) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::to_value(value)
            .map(Some)
            .map_err(|e| ArticleError::InvalidField {
                field: TAGS,
                reason: e.to_string(),
            }),
    }
}

fn dev_id(doc: &Document) -> Result<Option<u64>, ArticleError> {
    let invalid = |reason: String| ArticleError::InvalidField {
        field: DEV_ID,
        reason,
    };
    match doc.get(DEV_ID) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0) => Ok(None),
            Some(id) => Ok(Some(id)),
            None => Err(invalid(format!("{n} is not a positive integer"))),
        },
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(|id| (id != 0).then_some(id))
            .map_err(|_| invalid(format!("{s:?} is not a numeric identifier"))),
        Some(other) => Err(invalid(format!("unexpected value {other:?}"))),
    }
}
