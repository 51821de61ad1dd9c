//! GitHub issues backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{most_recent, Issue, IssueComment, IssueTracker};
use crate::config::BootstrapConfig;
use crate::error::TrackerError;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size for listing endpoints (GitHub maximum).
const PER_PAGE: usize = 100;

const USER_AGENT: &str = concat!("bootstrap/", env!("CARGO_PKG_VERSION"));

/// Issue as returned by the REST API. Pull requests come back from the
/// issues endpoint too and carry a `pull_request` key.
#[derive(Debug, Deserialize)]
struct IssueResource {
    number: u64,
    title: String,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LabelResource {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommentResource {
    #[serde(default)]
    body: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
struct CreateIssueBody<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateCommentBody<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct EditIssueBody<'a> {
    state: &'a str,
}

impl From<IssueResource> for Issue {
    fn from(resource: IssueResource) -> Self {
        Self {
            number: resource.number,
            title: resource.title,
            created_at: resource.created_at,
        }
    }
}

/// GitHub REST client scoped to one repository.
#[derive(Clone)]
pub struct GitHubTracker {
    client: Client,
    base_url: String,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubTracker {
    /// Create a new tracker client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    /// Create a client for the configured repository, resolving the token.
    ///
    /// # Errors
    /// Returns error if no token is available or the HTTP client cannot be created.
    pub fn from_config(config: &BootstrapConfig) -> crate::error::Result<Self> {
        let token = config.load_token()?;
        Ok(Self::new(
            &config.tracker.api_url,
            token,
            &config.tracker.owner,
            &config.tracker.repo,
        )?)
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{path}", self.base_url, self.owner, self.repo)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Fetch every page of a listing endpoint.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, TrackerError> {
        let url = self.repo_url(path);
        let per_page = PER_PAGE.to_string();
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let page_str = page.to_string();
            debug!(url = %url, page, "GET request");

            let response = self
                .request(Method::GET, &url)
                .query(query)
                .query(&[("per_page", per_page.as_str()), ("page", page_str.as_str())])
                .send()
                .await?;

            let batch: Vec<T> = Self::handle_response(response).await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    /// Send a JSON body and decode the response.
    async fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = self.repo_url(path);
        debug!(url = %url, %method, "JSON request");

        let response = self.request(method, &url).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TrackerError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                TrackerError::Serialization(e)
            })
        } else {
            Err(TrackerError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl IssueTracker for GitHubTracker {
    async fn list_open_issues(&self) -> Result<Vec<Issue>, TrackerError> {
        let resources: Vec<IssueResource> = self.get_all("/issues", &[("state", "open")]).await?;
        Ok(resources
            .into_iter()
            .filter(|r| r.pull_request.is_none())
            .map(Issue::from)
            .collect())
    }

    async fn create_issue(&self, title: &str, body: &str) -> Result<Issue, TrackerError> {
        let resource: IssueResource = self
            .send_json(Method::POST, "/issues", &CreateIssueBody { title, body })
            .await?;
        info!(number = resource.number, title = %title, "Created GitHub issue");
        Ok(resource.into())
    }

    async fn list_labels(&self, issue: u64) -> Result<Vec<String>, TrackerError> {
        let labels: Vec<LabelResource> =
            self.get_all(&format!("/issues/{issue}/labels"), &[]).await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn latest_comment(&self, issue: u64) -> Result<Option<IssueComment>, TrackerError> {
        let comments: Vec<CommentResource> =
            self.get_all(&format!("/issues/{issue}/comments"), &[]).await?;
        Ok(most_recent(
            comments
                .into_iter()
                .map(|c| IssueComment {
                    body: c.body.unwrap_or_default(),
                    created_at: c.created_at,
                })
                .collect(),
        ))
    }

    async fn create_comment(&self, issue: u64, body: &str) -> Result<(), TrackerError> {
        let _: serde_json::Value = self
            .send_json(
                Method::POST,
                &format!("/issues/{issue}/comments"),
                &CreateCommentBody { body },
            )
            .await?;
        debug!(issue, "Posted issue comment");
        Ok(())
    }

    async fn close_issue(&self, issue: u64) -> Result<(), TrackerError> {
        let _: serde_json::Value = self
            .send_json(
                Method::PATCH,
                &format!("/issues/{issue}"),
                &EditIssueBody { state: "closed" },
            )
            .await?;
        info!(issue, "Closed GitHub issue");
        Ok(())
    }
}
