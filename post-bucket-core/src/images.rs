//! # images: relocate embedded note images into the content bucket
//!
//! Walks a notes directory recursively and, for every `*.md` file, finds embedded image
//! references line by line:
//!
//! - wiki embeds: `![[attachments/diagram.png]]` (an Obsidian-style `|size` suffix is ignored)
//! - markdown images: `![alt text](diagram.png)`
//!
//! Each local image is uploaded through an [`ObjectStore`] under its file name, and the
//! reference is rewritten in place to `![title](public url)`. References that already
//! point at a remote URL are left alone, which makes a second run a no-op.
//!
//! A failed upload leaves that reference untouched and is recorded in the report; the rest
//! of the file and the rest of the batch carry on.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ImageConfig;
use crate::contract::{ObjectStore, StorageError};
use crate::front_matter::DocumentError;

static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[\[(?P<embed>.*?)\]\]|!\[(?P<alt>.*?)\]\((?P<src>.*?)\)")
        .expect("valid image reference regex")
});
static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[a-zA-Z0-9]+$").expect("valid extension regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Embed,
    Markdown,
}

/// A local image reference found in a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub kind: ReferenceKind,
    /// Alt text of the rewritten reference.
    pub title: String,
    /// Path relative to the attachments directory.
    pub path: String,
}

/// Parses one raw reference such as `![[a.png]]` or `![alt](a.png)`.
///
/// Returns `None` for anything that is not exactly one image reference, and for references
/// that already point at an `http(s)://` URL.
pub fn parse_reference(raw: &str) -> Option<ImageReference> {
    let caps = IMAGE_REF.captures(raw)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != raw.len() {
        return None;
    }

    let reference = if let Some(embed) = caps.name("embed") {
        let path = embed.as_str().split('|').next().unwrap_or_default().trim();
        ImageReference {
            kind: ReferenceKind::Embed,
            title: EXTENSION.replace(path, "").into_owned(),
            path: path.to_owned(),
        }
    } else {
        ImageReference {
            kind: ReferenceKind::Markdown,
            title: caps.name("alt").map_or("", |m| m.as_str()).to_owned(),
            path: caps.name("src").map_or("", |m| m.as_str()).trim().to_owned(),
        }
    };

    if reference.path.is_empty() {
        return None;
    }
    if is_remote(&reference.path) {
        debug!(path = %reference.path, "[IMAGES] Skipping remote image");
        return None;
    }
    Some(reference)
}

fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Object key for an image: its file name.
pub fn object_key(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned())
}

/// `https://{bucket}.s3.amazonaws.com/{key}` with spaces replaced by `+`.
pub fn public_url(bucket: &str, key: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{key}").replace(' ', "+")
}

#[derive(Debug)]
pub enum ReferenceOutcome {
    Relocated { url: String },
    Failed(StorageError),
}

#[derive(Debug)]
pub struct ReferenceReport {
    /// 1-based line number.
    pub line: usize,
    pub original: String,
    pub outcome: ReferenceOutcome,
}

#[derive(Debug)]
pub enum FileStatus {
    Unchanged,
    Rewritten,
    Failed(DocumentError),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub references: Vec<ReferenceReport>,
    pub status: FileStatus,
}

#[derive(Debug, Default)]
pub struct RelocationReport {
    pub files: Vec<FileReport>,
}

impl RelocationReport {
    pub fn relocated(&self) -> usize {
        self.references()
            .filter(|r| matches!(r.outcome, ReferenceOutcome::Relocated { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        let refs = self
            .references()
            .filter(|r| matches!(r.outcome, ReferenceOutcome::Failed(_)))
            .count();
        let files = self
            .files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed(_)))
            .count();
        refs + files
    }

    pub fn rewritten_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Rewritten))
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Images complete: {} relocated, {} failed, {} of {} files rewritten",
            self.relocated(),
            self.failed(),
            self.rewritten_files(),
            self.files.len()
        )
    }

    fn references(&self) -> impl Iterator<Item = &ReferenceReport> {
        self.files.iter().flat_map(|f| f.references.iter())
    }
}

/// Entrypoint: relocate the images of every note under `config.notes_dir`.
pub async fn relocate_images<S>(
    config: &ImageConfig,
    store: &S,
) -> Result<RelocationReport, DocumentError>
where
    S: ObjectStore + ?Sized,
{
    info!(dir = %config.notes_dir.display(), bucket = %config.bucket, "[IMAGES] Starting image relocation");

    let mut notes = Vec::new();
    collect_markdown(&config.notes_dir, &mut notes)?;
    debug!(count = notes.len(), "[IMAGES] Collected markdown files");

    let mut report = RelocationReport::default();
    for path in notes {
        let span = info_span!("note", path = %path.display());
        let file_report = relocate_file(config, store, &path).instrument(span).await;
        report.files.push(file_report);
    }

    info!(
        relocated = report.relocated(),
        failed = report.failed(),
        rewritten = report.rewritten_files(),
        "[IMAGES] Image relocation finished"
    );
    Ok(report)
}

/// Relocates the images of a single note, rewriting it only if something changed.
pub async fn relocate_file<S>(config: &ImageConfig, store: &S, path: &Path) -> FileReport
where
    S: ObjectStore + ?Sized,
{
    let mut references = Vec::new();

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(source) => {
            error!(error = %source, "[IMAGES] Could not read note");
            return FileReport {
                path: path.to_path_buf(),
                references,
                status: FileStatus::Failed(DocumentError::Read {
                    path: path.to_path_buf(),
                    source,
                }),
            };
        }
    };

    let mut relocated: HashMap<String, String> = HashMap::new();
    let mut rewritten = String::with_capacity(text.len());
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let spans: Vec<(usize, usize)> = IMAGE_REF
            .find_iter(line)
            .map(|m| (m.start(), m.end()))
            .collect();

        let mut last = 0;
        for (start, end) in spans {
            rewritten.push_str(&line[last..start]);
            last = end;

            let raw = &line[start..end];
            if let Some(replacement) = relocated.get(raw) {
                rewritten.push_str(replacement);
                continue;
            }
            match relocate_reference(config, store, raw, line_no, &mut references).await {
                Some(replacement) => {
                    rewritten.push_str(&replacement);
                    relocated.insert(raw.to_owned(), replacement);
                }
                None => rewritten.push_str(raw),
            }
        }
        rewritten.push_str(&line[last..]);
    }

    if rewritten == text {
        return FileReport {
            path: path.to_path_buf(),
            references,
            status: FileStatus::Unchanged,
        };
    }

    let status = match fs::write(path, &rewritten) {
        Ok(()) => {
            info!(count = relocated.len(), "[IMAGES] Note rewritten");
            FileStatus::Rewritten
        }
        Err(source) => {
            error!(error = %source, "[IMAGES] Could not write note");
            FileStatus::Failed(DocumentError::Write {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    FileReport {
        path: path.to_path_buf(),
        references,
        status,
    }
}

async fn relocate_reference<S>(
    config: &ImageConfig,
    store: &S,
    raw: &str,
    line: usize,
    references: &mut Vec<ReferenceReport>,
) -> Option<String>
where
    S: ObjectStore + ?Sized,
{
    let reference = parse_reference(raw)?;
    let local = config.attachments_dir.join(&reference.path);
    let key = object_key(&reference.path);
    debug!(line, local = %local.display(), key = %key, "[IMAGES][UPLOAD] Uploading image");

    match store.put_object(&local, &config.bucket, &key).await {
        Ok(url) => {
            let replacement = format!("![{}]({})", reference.title, url);
            info!(line, from = %raw, to = %replacement, "[IMAGES][UPLOAD] Image relocated");
            references.push(ReferenceReport {
                line,
                original: raw.to_owned(),
                outcome: ReferenceOutcome::Relocated { url },
            });
            Some(replacement)
        }
        Err(e) => {
            warn!(line, reference = %raw, error = %e, "[IMAGES][UPLOAD] Upload failed, leaving reference as is");
            references.push(ReferenceReport {
                line,
                original: raw.to_owned(),
                outcome: ReferenceOutcome::Failed(e),
            });
            None
        }
    }
}

/// Recursively collects `*.md` files under `dir`, skipping hidden entries and symlinked
/// directories. Output is sorted per directory.
fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DocumentError> {
    let read_err = |source| DocumentError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    entries.sort();

    for path in entries {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            if !path.is_symlink() {
                collect_markdown(&path, out)?;
            }
        } else if path.extension().is_some_and(|e| e == "md") {
            out.push(path);
        }
    }
    Ok(())
}
