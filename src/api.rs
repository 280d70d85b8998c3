//! Karakeep REST API client.
//!
//! [`ListsApi`] is the seam between the triage core and the remote service:
//! the membership index and the triage session only ever talk to this trait,
//! so tests can substitute an in-process fake. [`KarakeepClient`] is the
//! real implementation over `reqwest`.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET` | `/lists` | All lists of the user |
//! | `GET` | `/lists/{listId}/bookmarks` | Bookmarks in a list (cursor paginated) |
//! | `PUT` | `/lists/{listId}/bookmarks/{bookmarkId}` | Attach a bookmark |
//! | `DELETE` | `/lists/{listId}/bookmarks/{bookmarkId}` | Detach a bookmark |
//! | `GET` | `/bookmarks?archived=false` | Unarchived bookmarks (cursor paginated) |
//!
//! # Status Mapping
//!
//! - 404 → [`ApiError::NotFound`]
//! - 409, or 400 whose body mentions "already" → [`ApiError::AlreadyMember`]
//! - any other non-2xx, and network errors → [`ApiError::Transport`]
//!
//! Nothing is retried here; that is the caller's call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{Bookmark, List};

/// Remote operations the triage core depends on.
#[async_trait]
pub trait ListsApi: Send + Sync {
    /// Every list of the authenticated user, manual and smart.
    async fn list_lists(&self) -> Result<Vec<List>, ApiError>;

    /// Ids of all bookmarks in `list_id`, following pagination to the end.
    async fn list_bookmarks_in_list(&self, list_id: &str) -> Result<Vec<String>, ApiError>;

    async fn attach_bookmark_to_list(&self, bookmark_id: &str, list_id: &str)
        -> Result<(), ApiError>;

    async fn detach_bookmark_from_list(
        &self,
        bookmark_id: &str,
        list_id: &str,
    ) -> Result<(), ApiError>;

    /// All unarchived bookmarks; the candidates for a triage queue.
    async fn list_inbox_bookmarks(&self) -> Result<Vec<Bookmark>, ApiError>;
}

// ============ Wire Types ============

#[derive(Debug, Deserialize)]
struct ListsPage {
    #[serde(default)]
    lists: Vec<List>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookmarksPage {
    #[serde(default)]
    bookmarks: Vec<BookmarkPayload>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookmarkPayload {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<ContentPayload>,
}

#[derive(Debug, Deserialize)]
struct ContentPayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl From<BookmarkPayload> for Bookmark {
    fn from(p: BookmarkPayload) -> Self {
        let (url, content_title) = match p.content {
            Some(c) => (c.url, c.title),
            None => (None, None),
        };
        Bookmark {
            id: p.id,
            title: p.title.or(content_title),
            url,
        }
    }
}

// ============ HTTP Client ============

/// [`ListsApi`] over HTTP with bearer-token authentication.
pub struct KarakeepClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    page_size: usize,
}

impl KarakeepClient {
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        page_size: usize,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            page_size: page_size.max(1),
        })
    }

    /// Build a client from configuration, resolving the token from the
    /// environment or the file.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let token = config.api.resolved_token()?;
        Ok(Self::new(
            &config.api.base_url,
            &token,
            Duration::from_secs(config.api.timeout_secs),
            config.crawl.page_size,
        )?)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<reqwest::Response, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(classify_status(status, &body, what))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = self
            .send(self.request(Method::GET, path).query(query), path)
            .await?;
        resp.json::<T>().await.map_err(|e| ApiError::Decode {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Drain a cursor-paginated bookmark endpoint.
    async fn collect_bookmark_pages(
        &self,
        path: &str,
        base_query: &[(&str, String)],
    ) -> Result<Vec<Bookmark>, ApiError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = base_query.to_vec();
            query.push(("limit", self.page_size.to_string()));
            if let Some(ref c) = cursor {
                query.push(("cursor", c.clone()));
            }

            let page: BookmarksPage = self.get_json(path, &query).await?;
            debug!(path, count = page.bookmarks.len(), "fetched bookmark page");
            out.extend(page.bookmarks.into_iter().map(Bookmark::from));

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }

        Ok(out)
    }

    async fn membership_call(
        &self,
        method: Method,
        bookmark_id: &str,
        list_id: &str,
    ) -> Result<(), ApiError> {
        let path = format!("/lists/{}/bookmarks/{}", list_id, bookmark_id);
        let what = format!("list {} or bookmark {}", list_id, bookmark_id);
        match self.send(self.request(method, &path), &what).await {
            Ok(_) => Ok(()),
            Err(ApiError::AlreadyMember { .. }) => Err(ApiError::AlreadyMember {
                bookmark_id: bookmark_id.to_string(),
                list_id: list_id.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Map a non-2xx status to a typed error. `what` names the resource for
/// not-found messages.
pub fn classify_status(status: StatusCode, body: &str, what: &str) -> ApiError {
    let mentions_already = body.to_ascii_lowercase().contains("already");
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(what.to_string()),
        StatusCode::CONFLICT => ApiError::AlreadyMember {
            bookmark_id: String::new(),
            list_id: String::new(),
        },
        StatusCode::BAD_REQUEST if mentions_already => ApiError::AlreadyMember {
            bookmark_id: String::new(),
            list_id: String::new(),
        },
        _ => ApiError::Transport {
            status: Some(status.as_u16()),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body.chars().take(200).collect()
            },
        },
    }
}

#[async_trait]
impl ListsApi for KarakeepClient {
    async fn list_lists(&self) -> Result<Vec<List>, ApiError> {
        let page: ListsPage = self.get_json("/lists", &[]).await?;
        Ok(page.lists)
    }

    async fn list_bookmarks_in_list(&self, list_id: &str) -> Result<Vec<String>, ApiError> {
        let path = format!("/lists/{}/bookmarks", list_id);
        let bookmarks = self
            .collect_bookmark_pages(&path, &[("includeContent", "false".to_string())])
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::NotFound(format!("list {}", list_id)),
                other => other,
            })?;
        Ok(bookmarks.into_iter().map(|b| b.id).collect())
    }

    async fn attach_bookmark_to_list(
        &self,
        bookmark_id: &str,
        list_id: &str,
    ) -> Result<(), ApiError> {
        self.membership_call(Method::PUT, bookmark_id, list_id).await
    }

    async fn detach_bookmark_from_list(
        &self,
        bookmark_id: &str,
        list_id: &str,
    ) -> Result<(), ApiError> {
        self.membership_call(Method::DELETE, bookmark_id, list_id)
            .await
    }

    async fn list_inbox_bookmarks(&self) -> Result<Vec<Bookmark>, ApiError> {
        self.collect_bookmark_pages("/bookmarks", &[("archived", "false".to_string())])
            .await
    }
}
