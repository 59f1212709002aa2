//! S3 implementation of the core `ObjectStore` contract.
//!
//! Credentials come from the standard AWS environment variables. `AWS_ENDPOINT_URL` points
//! the client at an S3-compatible endpoint (path-style addressing) instead of AWS. Every
//! upload is bounded by an operation timeout, 30 seconds unless `POST_BUCKET_S3_TIMEOUT_SECS`
//! says otherwise.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use post_bucket_core::contract::{ObjectStore, StorageError};
use post_bucket_core::images::public_url;
use thiserror::Error;

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";
pub const ENV_TIMEOUT_SECS: &str = "POST_BUCKET_S3_TIMEOUT_SECS";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum S3ConfigError {
    #[error("S3 credentials are incomplete. Missing: {0}")]
    Incomplete(String),

    #[error("{ENV_TIMEOUT_SECS} must be a positive number of seconds, got {0:?}")]
    InvalidTimeout(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl S3Config {
    pub fn from_env() -> Result<Self, S3ConfigError> {
        parse_config(|key| std::env::var(key).ok())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<S3Config, S3ConfigError> {
    let read = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    };

    let access_key_id = read(ENV_ACCESS_KEY_ID);
    let secret_access_key = read(ENV_SECRET_ACCESS_KEY);

    let mut missing = Vec::new();
    if access_key_id.is_none() {
        missing.push(ENV_ACCESS_KEY_ID);
    }
    if secret_access_key.is_none() {
        missing.push(ENV_SECRET_ACCESS_KEY);
    }

    let timeout = match read(ENV_TIMEOUT_SECS) {
        None => DEFAULT_TIMEOUT,
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => return Err(S3ConfigError::InvalidTimeout(raw)),
        },
    };

    match (access_key_id, secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(S3Config {
            access_key_id,
            secret_access_key,
            session_token: read(ENV_SESSION_TOKEN),
            region: read(ENV_REGION).unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            endpoint_url: read(ENV_ENDPOINT_URL),
            timeout,
        }),
        _ => Err(S3ConfigError::Incomplete(missing.join(", "))),
    }
}

/// Image content type by file extension. `None` leaves the S3 default.
pub fn content_type(key: &str) -> Option<&'static str> {
    let ext = Path::new(key).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(config: &S3Config) -> Self {
        tracing::info!(
            region = %config.region,
            custom_endpoint = config.endpoint_url.is_some(),
            timeout_secs = config.timeout.as_secs(),
            "Initialized S3Store"
        );
        Self {
            client: Client::from_conf(client_config(config)),
        }
    }
}

fn client_config(config: &S3Config) -> aws_sdk_s3::Config {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        config.session_token.clone(),
        None,
        "post-bucket-env",
    );
    let timeouts = TimeoutConfig::builder()
        .operation_timeout(config.timeout)
        .build();

    let mut builder = aws_sdk_s3::config::Builder::new()
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .timeout_config(timeouts);
    if let Some(endpoint) = &config.endpoint_url {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }
    builder.build()
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, path: &Path, bucket: &str, key: &str) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| StorageError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(
            path = %path.display(),
            bucket,
            key,
            size = bytes.len(),
            "[IMAGES][UPLOAD] Putting object"
        );

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes));
        if let Some(content_type) = content_type(key) {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|e| StorageError::Put {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            message: DisplayErrorContext(&e).to_string(),
        })?;

        Ok(public_url(bucket, key))
    }
}
