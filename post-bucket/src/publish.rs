#![doc = "HTTP client for the article publishing API: implements the core `ArticleApi` contract on top of reqwest."]
//
//! # Article client
//!
//! [`ArticleClient`] talks to a DEV-compatible REST API:
//!
//! - `POST {api_url}/articles`: create. `201` is success, `422` means the title already exists.
//! - `PUT {api_url}/articles/{id}`: update. `200` is success.
//! - `GET {api_url}/articles/me/published?page=N&per_page=100`: paged listing, read until a
//!   short page comes back. A page identical to the previous one also ends the listing, and
//!   more than [`MAX_PAGES`] pages is an error.
//!
//! Every request carries the `api-key` header. Status interpretation lives here; the core
//! pipeline only ever sees [`ApiError`] variants.

use std::time::Duration;

use async_trait::async_trait;
use post_bucket_core::contract::{ApiError, ArticleApi, ArticlePayload, RemoteArticle};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;

use crate::credentials::ApiKey;

pub const API_KEY_HEADER: &str = "api-key";
pub const PAGE_SIZE: usize = 100;
/// Upper bound on listing requests; 100 000 articles.
pub const MAX_PAGES: usize = 1000;

#[derive(Serialize)]
struct ArticleEnvelope<'a> {
    article: &'a ArticlePayload,
}

pub struct ArticleClient {
    http: Client,
    api_url: String,
    api_key: ApiKey,
}

impl ArticleClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: ApiKey,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        let api_url = api_url.into().trim_end_matches('/').to_owned();
        tracing::info!(
            api_url = %api_url,
            timeout_secs = timeout.as_secs(),
            "Initialized ArticleClient"
        );
        Ok(Self {
            http,
            api_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}

#[async_trait]
impl ArticleApi for ArticleClient {
    async fn create_article(&self, article: &ArticlePayload) -> Result<RemoteArticle, ApiError> {
        tracing::info!(title = %article.title, "[SYNC][REMOTE] Creating article");
        let response = self
            .http
            .post(self.url("/articles"))
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&ArticleEnvelope { article })
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::CREATED => {
                let created = decode::<RemoteArticle>(response).await?;
                tracing::info!(article_id = created.id, "[SYNC][REMOTE] Article created");
                Ok(created)
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = body_text(response).await;
                tracing::warn!(title = %article.title, "[SYNC][REMOTE] Create rejected as duplicate");
                Err(ApiError::Conflict { body })
            }
            status => Err(unexpected(status, response).await),
        }
    }

    async fn update_article(
        &self,
        id: u64,
        article: &ArticlePayload,
    ) -> Result<RemoteArticle, ApiError> {
        tracing::info!(article_id = id, title = %article.title, "[SYNC][REMOTE] Updating article");
        let response = self
            .http
            .put(self.url(&format!("/articles/{id}")))
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&ArticleEnvelope { article })
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::OK => decode(response).await,
            status => Err(unexpected(status, response).await),
        }
    }

    async fn list_published(&self) -> Result<Vec<RemoteArticle>, ApiError> {
        let mut articles: Vec<RemoteArticle> = Vec::new();
        let mut previous_ids: Vec<u64> = Vec::new();
        for page in 1..=MAX_PAGES {
            tracing::debug!(page, "[SYNC][REMOTE] Listing published articles");
            let response = self
                .http
                .get(self.url("/articles/me/published"))
                .query(&[("page", page), ("per_page", PAGE_SIZE)])
                .header(API_KEY_HEADER, self.api_key.expose())
                .send()
                .await
                .map_err(transport)?;

            let batch: Vec<RemoteArticle> = match response.status() {
                StatusCode::OK => decode(response).await?,
                status => return Err(unexpected(status, response).await),
            };
            let ids: Vec<u64> = batch.iter().map(|a| a.id).collect();
            if !ids.is_empty() && ids == previous_ids {
                tracing::warn!(page, "[SYNC][REMOTE] Page repeats the previous one, stopping");
                return Ok(listed(articles));
            }
            let last_page = batch.len() < PAGE_SIZE;
            articles.extend(batch);
            if last_page {
                return Ok(listed(articles));
            }
            previous_ids = ids;
        }
        tracing::error!(max_pages = MAX_PAGES, "[SYNC][REMOTE] Published listing never ended");
        Err(ApiError::Transport(format!(
            "published article listing did not end within {MAX_PAGES} pages"
        )))
    }
}

fn listed(articles: Vec<RemoteArticle>) -> Vec<RemoteArticle> {
    tracing::info!(count = articles.len(), "[SYNC][REMOTE] Listed published articles");
    articles
}

fn transport(e: reqwest::Error) -> ApiError {
    tracing::error!(error = %e, "[SYNC][REMOTE] Request failed");
    ApiError::Transport(e.to_string())
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(transport)
}

async fn body_text(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

async fn unexpected(status: StatusCode, response: Response) -> ApiError {
    let body = body_text(response).await;
    tracing::error!(status = status.as_u16(), body = %body, "[SYNC][REMOTE] Unexpected response");
    ApiError::Status {
        status: status.as_u16(),
        body,
    }
}
