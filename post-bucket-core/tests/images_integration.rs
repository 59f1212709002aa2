use std::fs;
use std::io;
use std::path::Path;

use post_bucket_core::config::ImageConfig;
use post_bucket_core::contract::{MockObjectStore, StorageError};
use post_bucket_core::images::{public_url, relocate_images, FileStatus, ReferenceOutcome};
use tempfile::{tempdir, TempDir};

const BUCKET: &str = "notes-bucket";

struct Vault {
    _root: TempDir,
    config: ImageConfig,
}

impl Vault {
    fn new() -> Self {
        let root = tempdir().unwrap();
        let notes_dir = root.path().join("notes");
        let attachments_dir = root.path().join("attachments");
        fs::create_dir_all(&notes_dir).unwrap();
        fs::create_dir_all(&attachments_dir).unwrap();
        Self {
            config: ImageConfig {
                notes_dir,
                bucket: BUCKET.to_owned(),
                attachments_dir,
            },
            _root: root,
        }
    }

    fn note(&self, rel: &str, content: &str) -> std::path::PathBuf {
        let path = self.config.notes_dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }
}

fn uploads_everything() -> MockObjectStore {
    let mut store = MockObjectStore::new();
    store
        .expect_put_object()
        .returning(|_path: &Path, bucket: &str, key: &str| Ok(public_url(bucket, key)));
    store
}

#[tokio::test]
async fn test_embeds_and_markdown_images_are_rewritten() {
    let vault = Vault::new();
    let note = vault.note(
        "post.md",
        "# Title\r\nIntro ![[pictures/my photo.png]] and more\r\n![Diagram](diagram.svg)\nplain line\n",
    );

    let mut store = MockObjectStore::new();
    let attachments = vault.config.attachments_dir.clone();
    store
        .expect_put_object()
        .withf(move |path: &Path, bucket: &str, key: &str| {
            bucket == BUCKET
                && path.starts_with(&attachments)
                && (key == "my photo.png" || key == "diagram.svg")
        })
        .times(2)
        .returning(|_, bucket, key| Ok(public_url(bucket, key)));

    let report = relocate_images(&vault.config, &store).await.unwrap();

    assert_eq!(
        fs::read_to_string(&note).unwrap(),
        "# Title\r\nIntro ![pictures/my photo](https://notes-bucket.s3.amazonaws.com/my+photo.png) and more\r\n![Diagram](https://notes-bucket.s3.amazonaws.com/diagram.svg)\nplain line\n"
    );
    assert_eq!(report.relocated(), 2);
    assert!(matches!(report.files[0].status, FileStatus::Rewritten));
    assert_eq!(report.files[0].references[0].line, 2);
}

#[tokio::test]
async fn test_failed_upload_keeps_original_reference() {
    let vault = Vault::new();
    let note = vault.note("post.md", "![[missing.png]] ![[present.png]]\n");

    let mut store = MockObjectStore::new();
    store
        .expect_put_object()
        .returning(|path: &Path, bucket: &str, key: &str| {
            if key == "missing.png" {
                Err(StorageError::Read {
                    path: path.to_path_buf(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                })
            } else {
                Ok(public_url(bucket, key))
            }
        });

    let report = relocate_images(&vault.config, &store).await.unwrap();

    assert_eq!(
        fs::read_to_string(&note).unwrap(),
        "![[missing.png]] ![present](https://notes-bucket.s3.amazonaws.com/present.png)\n"
    );
    assert_eq!(report.relocated(), 1);
    assert_eq!(report.failed(), 1);
    assert!(report.files[0]
        .references
        .iter()
        .any(|r| r.original == "![[missing.png]]"
            && matches!(r.outcome, ReferenceOutcome::Failed(_))));
}

#[tokio::test]
async fn test_remote_images_are_left_alone_and_file_not_rewritten() {
    let vault = Vault::new();
    let content =
        "![a](https://notes-bucket.s3.amazonaws.com/a.png)\n![b](https://example.com/b.png)\n";
    let note = vault.note("done.md", content);

    // No expectations: any upload panics.
    let store = MockObjectStore::new();

    let report = relocate_images(&vault.config, &store).await.unwrap();

    assert!(matches!(report.files[0].status, FileStatus::Unchanged));
    assert_eq!(fs::read_to_string(&note).unwrap(), content);
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let vault = Vault::new();
    let note = vault.note("post.md", "![[a.png]]\n");

    let store = uploads_everything();
    relocate_images(&vault.config, &store).await.unwrap();
    let after_first = fs::read_to_string(&note).unwrap();

    let idle = MockObjectStore::new();
    let report = relocate_images(&vault.config, &idle).await.unwrap();

    assert_eq!(report.relocated(), 0);
    assert_eq!(fs::read_to_string(&note).unwrap(), after_first);
}

#[tokio::test]
async fn test_repeated_reference_uploads_once() {
    let vault = Vault::new();
    let note = vault.note("post.md", "![[a.png]]\ntext\n![[a.png]] again\n");

    let mut store = MockObjectStore::new();
    store
        .expect_put_object()
        .times(1)
        .returning(|_, bucket, key| Ok(public_url(bucket, key)));

    relocate_images(&vault.config, &store).await.unwrap();

    let url = "https://notes-bucket.s3.amazonaws.com/a.png";
    assert_eq!(
        fs::read_to_string(&note).unwrap(),
        format!("![a]({url})\ntext\n![a]({url}) again\n")
    );
}

#[tokio::test]
async fn test_walk_is_recursive_and_only_touches_markdown() {
    let vault = Vault::new();
    let nested = vault.note("2024/march/deep.md", "![[deep.png]]\n");
    let text_file = vault.note("notes.txt", "![[ignored.png]]\n");
    let hidden = vault.note(".obsidian/cache.md", "![[hidden.png]]\n");

    let mut store = MockObjectStore::new();
    store
        .expect_put_object()
        .withf(|_, _, key| key == "deep.png")
        .times(1)
        .returning(|_, bucket, key| Ok(public_url(bucket, key)));

    let report = relocate_images(&vault.config, &store).await.unwrap();

    assert_eq!(report.files.len(), 1);
    assert!(fs::read_to_string(&nested).unwrap().contains("s3.amazonaws.com/deep.png"));
    assert_eq!(fs::read_to_string(&text_file).unwrap(), "![[ignored.png]]\n");
    assert_eq!(fs::read_to_string(&hidden).unwrap(), "![[hidden.png]]\n");
    assert_eq!(
        report.summary(),
        "Images complete: 1 relocated, 0 failed, 1 of 1 files rewritten"
    );
}
