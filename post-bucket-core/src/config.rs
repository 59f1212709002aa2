use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything the front matter sync pipeline needs for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Directory whose top-level files are articles.
    pub articles_dir: PathBuf,
    /// Base of the canonical URL, e.g. `https://example.com`.
    pub site_url: String,
    /// Value of the `published` flag sent with every create/update.
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

impl PublishConfig {
    pub fn trace_loaded(&self) {
        info!(
            articles_dir = %self.articles_dir.display(),
            site_url = %self.site_url,
            published = self.published,
            "Loaded PublishConfig"
        );
        debug!(?self, "PublishConfig loaded (full debug)");
    }
}

/// Everything the image relocation pipeline needs for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Directory walked recursively for `*.md` notes.
    pub notes_dir: PathBuf,
    /// Target bucket name.
    pub bucket: String,
    /// Directory that embedded image paths are relative to.
    pub attachments_dir: PathBuf,
}

impl ImageConfig {
    pub fn trace_loaded(&self) {
        info!(
            notes_dir = %self.notes_dir.display(),
            bucket = %self.bucket,
            attachments_dir = %self.attachments_dir.display(),
            "Loaded ImageConfig"
        );
    }
}
