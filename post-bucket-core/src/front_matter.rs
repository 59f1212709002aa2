//! # front_matter: `---` delimited YAML header + markdown body codec
//!
//! A publishable document on disk looks like:
//!
//! ```text
//! ---
//! title: Hello
//! dev: false
//! ---
//!
//! Markdown body...
//! ```
//!
//! [`parse`] splits the text on the first two `---` delimiters, decodes the enclosed
//! region as a YAML mapping and trims the remainder into the body. [`serialize`] writes
//! the same shape back. The mapping is a [`serde_yaml::Mapping`], which keeps insertion
//! order: keys already present stay where they were, new keys are appended.
//!
//! A document that does not start with the delimiter is not an error; [`parse`] returns
//! `Ok(None)` and callers skip it.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, error};

/// Marker that opens and closes the front matter block.
pub const DELIMITER: &str = "---";

/// A parsed document: ordered front matter mapping plus the opaque markdown body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub front_matter: Mapping,
    pub body: String,
}

impl Document {
    pub fn new(front_matter: Mapping, body: impl Into<String>) -> Self {
        Self {
            front_matter,
            body: body.into(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.front_matter.get(key)
    }

    /// Sets `key`, keeping its position if it already exists and appending it otherwise.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.front_matter
            .insert(Value::String(key.to_owned()), value.into());
    }
}

/// Errors decoding or encoding the front matter block itself.
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("front matter block has no closing `---` delimiter")]
    Unterminated,

    #[error("front matter is not valid YAML: {0}")]
    Yaml(#[source] serde_yaml::Error),

    #[error("front matter must be a mapping of keys to values")]
    NotAMapping,

    #[error("front matter could not be encoded as YAML: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// File-level errors, always carrying the path they happened on.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid front matter in {}: {source}", path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parses a full document.
///
/// Returns `Ok(None)` when `text` does not begin with [`DELIMITER`].
pub fn parse(text: &str) -> Result<Option<Document>, FrontMatterError> {
    let Some(rest) = text.strip_prefix(DELIMITER) else {
        return Ok(None);
    };
    let end = rest.find(DELIMITER).ok_or(FrontMatterError::Unterminated)?;

    let front_matter = decode_block(&rest[..end])?;
    let body = rest[end + DELIMITER.len()..].trim().to_owned();

    Ok(Some(Document { front_matter, body }))
}

fn decode_block(block: &str) -> Result<Mapping, FrontMatterError> {
    if block.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(block).map_err(FrontMatterError::Yaml)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontMatterError::NotAMapping),
    }
}

/// Renders `doc` as delimiter, mapping, delimiter, blank line, body.
pub fn serialize(doc: &Document) -> Result<String, FrontMatterError> {
    let yaml = if doc.front_matter.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(&doc.front_matter).map_err(FrontMatterError::Serialize)?
    };

    let mut content = String::with_capacity(yaml.len() + doc.body.len() + 16);
    content.push_str(DELIMITER);
    content.push('\n');
    content.push_str(&yaml);
    if !yaml.is_empty() && !yaml.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(DELIMITER);
    content.push_str("\n\n");
    content.push_str(&doc.body);

    if !content.ends_with('\n') {
        content.push('\n');
    }

    Ok(content)
}

/// Reads and parses the document at `path`. `Ok(None)` means "no front matter".
pub fn read_document(path: &Path) -> Result<Option<Document>, DocumentError> {
    let text = fs::read_to_string(path).map_err(|source| {
        error!(path = %path.display(), error = %source, "Failed to read document");
        DocumentError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;

    parse(&text).map_err(|source| DocumentError::FrontMatter {
        path: path.to_path_buf(),
        source,
    })
}

/// Overwrites `path` in place with the serialized document.
pub fn write_document(path: &Path, doc: &Document) -> Result<(), DocumentError> {
    let content = serialize(doc).map_err(|source| DocumentError::FrontMatter {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, content).map_err(|source| {
        error!(path = %path.display(), error = %source, "Failed to write document");
        DocumentError::Write {
            path: path.to_path_buf(),
            source,
        }
    })?;

    debug!(path = %path.display(), "Document written");
    Ok(())
}
