//! High-level pipeline: synchronises a directory of front matter articles with the remote
//! article API.
//!
//! For every top-level file in [`PublishConfig::articles_dir`] the pipeline:
//!   - Parses the front matter (files without one are skipped)
//!   - Decides between skip, create and update from the `dev`, `draft` and `dev_id` fields
//!   - Calls the [`ArticleApi`] accordingly, reconciling by title when a create reports a
//!     duplicate
//!   - Persists `dev: true` (and `dev_id` when newly learned) back into the front matter
//!
//! # Major Types
//! - [`SyncDecision`]: what to do with one article, derived and never stored
//! - [`SyncOutcome`]: what happened remotely for one article
//! - [`SynchroniseReport`]: per-file status for the whole run
//!
//! # Error Handling
//! Nothing that goes wrong with one document stops the run. Parse, remote and write
//! failures end up as [`ArticleStatus`] entries in the report. Only failing to list the
//! directory itself is returned as an error.
//!
//! # Lifecycle
//! `dev` is a one-way completion flag: once `true` the document is never submitted again.
//! `dev_id` is only ever added or overwritten with the remote identifier, never removed.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::article::{self, Article, ArticleError, DEV, DEV_ID, DRAFT};
use crate::config::PublishConfig;
use crate::contract::{ApiError, ArticleApi, ArticlePayload, RemoteArticle};
use crate::front_matter::{self, Document, DocumentError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `dev: true`, the article went out on an earlier run.
    AlreadyPublished,
    /// `draft: true`.
    Draft,
    /// The file does not start with a front matter block.
    NoFrontMatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Skip(SkipReason),
    Create,
    /// The remote identifier is known locally.
    Update(u64),
}

/// Evaluate step on the raw front matter. Only `dev` and then `draft` are read, so an
/// article that is published or a draft is skipped whatever its other fields hold.
pub fn evaluate(doc: &Document) -> Result<Option<SkipReason>, ArticleError> {
    if article::flag(doc, DEV)? {
        return Ok(Some(SkipReason::AlreadyPublished));
    }
    if article::flag(doc, DRAFT)? {
        return Ok(Some(SkipReason::Draft));
    }
    Ok(None)
}

/// Evaluates `dev`, `draft` and `dev_id`, in that order.
pub fn decide(article: &Article) -> SyncDecision {
    if article.dev {
        SyncDecision::Skip(SkipReason::AlreadyPublished)
    } else if article.draft {
        SyncDecision::Skip(SkipReason::Draft)
    } else if let Some(id) = article.dev_id {
        SyncDecision::Update(id)
    } else {
        SyncDecision::Create
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
    /// Create hit a duplicate title; the existing article was found by title and updated.
    Reconciled,
}

impl SyncAction {
    /// Whether the identifier was learned during this sync rather than read from `dev_id`.
    pub fn learned_id(self) -> bool {
        !matches!(self, SyncAction::Updated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Synced { article_id: u64, action: SyncAction },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Article(#[from] ArticleError),

    #[error("create failed: {0}")]
    Create(#[source] ApiError),

    #[error("update of article {id} failed: {source}")]
    Update {
        id: u64,
        #[source]
        source: ApiError,
    },

    #[error("looking up published articles failed: {0}")]
    Lookup(#[source] ApiError),

    #[error("title {title:?} is taken remotely but no published article carries it")]
    NotFound { title: String },
}

/// Runs the remote half of the state machine for one parsed document.
///
/// Makes no remote call when the decision is a skip. The document itself is not touched;
/// see [`mark_synced`] for the persist step.
pub async fn sync_article<A>(
    api: &A,
    config: &PublishConfig,
    doc: &Document,
) -> Result<SyncOutcome, SyncError>
where
    A: ArticleApi + ?Sized,
{
    if let Some(reason) = evaluate(doc)? {
        debug!(?reason, "[SYNC] Evaluated article");
        return Ok(SyncOutcome::Skipped(reason));
    }

    let article = Article::from_document(doc)?;
    let decision = decide(&article);
    debug!(?decision, title = ?article.title, "[SYNC] Evaluated article");

    let known_id = match decision {
        SyncDecision::Skip(reason) => return Ok(SyncOutcome::Skipped(reason)),
        SyncDecision::Update(id) => Some(id),
        SyncDecision::Create => None,
    };

    let payload = article.to_payload(&doc.body, config)?;

    let (article_id, action) = match known_id {
        Some(id) => (update(api, id, &payload).await?.id, SyncAction::Updated),
        None => create_or_reconcile(api, &payload).await?,
    };

    Ok(SyncOutcome::Synced { article_id, action })
}

async fn update<A>(api: &A, id: u64, payload: &ArticlePayload) -> Result<RemoteArticle, SyncError>
where
    A: ArticleApi + ?Sized,
{
    match api.update_article(id, payload).await {
        Ok(updated) => {
            info!(article_id = updated.id, title = %payload.title, "[SYNC][REMOTE] Article updated");
            Ok(updated)
        }
        Err(source) => {
            error!(article_id = id, title = %payload.title, error = %source, "[SYNC][REMOTE] Update failed");
            Err(SyncError::Update { id, source })
        }
    }
}

async fn create_or_reconcile<A>(
    api: &A,
    payload: &ArticlePayload,
) -> Result<(u64, SyncAction), SyncError>
where
    A: ArticleApi + ?Sized,
{
    match api.create_article(payload).await {
        Ok(created) => {
            info!(article_id = created.id, title = %payload.title, "[SYNC][REMOTE] Article created");
            Ok((created.id, SyncAction::Created))
        }
        Err(ApiError::Conflict { body }) => {
            warn!(title = %payload.title, body = %body, "[SYNC][REMOTE] Title already exists remotely, reconciling by title");
            let existing = find_by_title(api, &payload.title).await?;
            update(api, existing.id, payload).await?;
            Ok((existing.id, SyncAction::Reconciled))
        }
        Err(e) => {
            error!(title = %payload.title, error = %e, "[SYNC][REMOTE] Create failed");
            Err(SyncError::Create(e))
        }
    }
}

/// Finds the caller's published article whose title matches `title` exactly.
pub async fn find_by_title<A>(api: &A, title: &str) -> Result<RemoteArticle, SyncError>
where
    A: ArticleApi + ?Sized,
{
    let published = api.list_published().await.map_err(|e| {
        error!(error = %e, "[SYNC][REMOTE] Listing published articles failed");
        SyncError::Lookup(e)
    })?;
    debug!(count = published.len(), "[SYNC][REMOTE] Fetched published articles");

    published
        .into_iter()
        .find(|a| a.title == title)
        .ok_or_else(|| SyncError::NotFound {
            title: title.to_owned(),
        })
}

/// Persist step: `dev: true`, plus `dev_id` when the identifier was newly learned.
pub fn mark_synced(doc: &mut Document, article_id: u64, action: SyncAction) {
    doc.set(DEV, true);
    if action.learned_id() {
        doc.set(DEV_ID, article_id);
    }
}

#[derive(Debug, Error)]
pub enum ArticleFailure {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[derive(Debug)]
pub enum ArticleStatus {
    Skipped(SkipReason),
    Synced { article_id: u64, action: SyncAction },
    Failed(ArticleFailure),
    /// The remote accepted the article but the front matter could not be written back.
    /// The next run falls back to reconcile-by-title for this document.
    WriteFailed { article_id: u64, error: DocumentError },
}

#[derive(Debug)]
pub struct ArticleReport {
    pub path: PathBuf,
    pub status: ArticleStatus,
}

#[derive(Debug, Default)]
pub struct SynchroniseReport {
    pub articles: Vec<ArticleReport>,
}

impl SynchroniseReport {
    pub fn synced(&self) -> usize {
        self.count(|s| matches!(s, ArticleStatus::Synced { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ArticleStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| {
            matches!(
                s,
                ArticleStatus::Failed(_) | ArticleStatus::WriteFailed { .. }
            )
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "Sync complete: {} synced, {} skipped, {} failed",
            self.synced(),
            self.skipped(),
            self.failed()
        )
    }

    fn count(&self, pred: impl Fn(&ArticleStatus) -> bool) -> usize {
        self.articles.iter().filter(|a| pred(&a.status)).count()
    }
}

/// Entrypoint: synchronise every top-level article in `config.articles_dir`, one at a time.
pub async fn synchronise<A>(
    config: &PublishConfig,
    api: &A,
) -> Result<SynchroniseReport, DocumentError>
where
    A: ArticleApi + ?Sized,
{
    info!(dir = %config.articles_dir.display(), "[SYNC] Starting article synchronisation");

    let files = list_articles(&config.articles_dir)?;
    let mut report = SynchroniseReport {
        articles: Vec::with_capacity(files.len()),
    };

    for path in files {
        let span = info_span!("article", path = %path.display());
        let status = synchronise_file(config, api, &path).instrument(span).await;
        report.articles.push(ArticleReport { path, status });
    }

    info!(
        synced = report.synced(),
        skipped = report.skipped(),
        failed = report.failed(),
        "[SYNC] Article synchronisation finished"
    );
    Ok(report)
}

/// Full pipeline for one file: read, decide, call remote, write back.
pub async fn synchronise_file<A>(config: &PublishConfig, api: &A, path: &Path) -> ArticleStatus
where
    A: ArticleApi + ?Sized,
{
    let mut doc = match front_matter::read_document(path) {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            warn!("[SYNC] No front matter, skipping");
            return ArticleStatus::Skipped(SkipReason::NoFrontMatter);
        }
        Err(e) => {
            error!(error = %e, "[SYNC] Could not load article");
            return ArticleStatus::Failed(e.into());
        }
    };

    let (article_id, action) = match sync_article(api, config, &doc).await {
        Ok(SyncOutcome::Skipped(reason)) => {
            debug!(?reason, "[SYNC] Skipped");
            return ArticleStatus::Skipped(reason);
        }
        Ok(SyncOutcome::Synced { article_id, action }) => (article_id, action),
        Err(e) => {
            error!(error = %e, "[SYNC] Article failed");
            return ArticleStatus::Failed(e.into());
        }
    };

    mark_synced(&mut doc, article_id, action);
    match front_matter::write_document(path, &doc) {
        Ok(()) => {
            info!(article_id, ?action, "[SYNC][WRITE] Front matter updated");
            ArticleStatus::Synced { article_id, action }
        }
        Err(error) => {
            error!(article_id, error = %error, "[SYNC][WRITE] Remote succeeded but front matter write failed");
            ArticleStatus::WriteFailed { article_id, error }
        }
    }
}

/// Regular, non-hidden files directly inside `dir`, sorted by path.
fn list_articles(dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let read_err = |source| DocumentError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
