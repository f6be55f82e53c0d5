// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GitHub API client for user discovery and refresh.
//!
//! Handles:
//! - Quota lookups (`/rate_limit`, free of charge)
//! - User discovery pages (`/users?since=`)
//! - Per-user detail with star totals (one GraphQL query per user)
//! - Rate limit detection

use crate::error::{AppError, Result};
use crate::models::RemoteUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Users per discovery page (GitHub maximum).
pub const USERS_PER_PAGE: u32 = 100;

const USER_AGENT: &str = "gitstar-worker";

/// Owned repositories summed per detail fetch. Stars beyond the top 100
/// repositories are not counted; paging further would cost more than one
/// call per user.
const REPOSITORY_PAGE: usize = 100;

const USER_DETAIL_QUERY: &str = r#"query($login: String!) {
  repositoryOwner(login: $login) {
    __typename
    login
    avatarUrl
    ... on User { databaseId updatedAt }
    ... on Organization { databaseId updatedAt }
    repositories(first: 100, ownerAffiliations: OWNER, isFork: false, orderBy: {field: STARGAZERS, direction: DESC}) {
      nodes { stargazerCount }
    }
  }
}"#;

/// Remote calls the scan workers depend on.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// API calls left in the current quota window.
    async fn remaining_quota(&self) -> Result<u64>;

    /// Next page of users with `id > since`, ascending; empty when exhausted.
    async fn users_since(&self, since: u64) -> Result<Vec<RemoteUser>>;

    /// Full record for one user. Costs one API call.
    async fn fetch_detail(&self, user: &RemoteUser) -> Result<RemoteUser>;
}

/// GitHub API client.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    /// Create a new client authenticated with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::GitHubApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let quota_exhausted = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim() == "0");
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 || (status.as_u16() == 403 && quota_exhausted) {
                tracing::warn!(status = %status, "GitHub rate limit hit");
                return Err(AppError::GitHubApi(AppError::GITHUB_RATE_LIMIT.to_string()));
            }

            if status.as_u16() == 404 {
                return Err(AppError::NotFound(body));
            }

            return Err(AppError::GitHubApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::GitHubApi(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn remaining_quota(&self) -> Result<u64> {
        let limits: RateLimitResponse = self.get_json("/rate_limit", &[]).await?;
        Ok(limits.remaining())
    }

    async fn users_since(&self, since: u64) -> Result<Vec<RemoteUser>> {
        let users: Vec<GitHubUserSummary> = self
            .get_json(
                "/users",
                &[
                    ("since", since.to_string()),
                    ("per_page", USERS_PER_PAGE.to_string()),
                ],
            )
            .await?;

        Ok(users.into_iter().map(RemoteUser::from).collect())
    }

    async fn fetch_detail(&self, user: &RemoteUser) -> Result<RemoteUser> {
        let request = GraphQlRequest {
            query: USER_DETAIL_QUERY,
            variables: serde_json::json!({ "login": user.login }),
        };

        let response = self
            .http
            .post(format!("{}/graphql", self.base_url))
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::GitHubApi(e.to_string()))?;

        let body: GraphQlResponse<UserDetailData> = self.check_response_json(response).await?;
        body.into_user(user)
    }
}

/// `/rate_limit` response (only the fields we read).
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResources {
    pub core: RateLimitBucket,
    pub graphql: Option<RateLimitBucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitBucket {
    pub limit: u64,
    pub remaining: u64,
    /// Reset time (Unix seconds)
    pub reset: i64,
}

impl RateLimitResponse {
    /// Discovery spends REST quota and refresh spends GraphQL quota, so the
    /// smaller of the two bounds what a session can still do.
    pub fn remaining(&self) -> u64 {
        let core = self.resources.core.remaining;
        match &self.resources.graphql {
            Some(graphql) => core.min(graphql.remaining),
            None => core,
        }
    }
}

/// Entry of `GET /users`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUserSummary {
    pub id: u64,
    pub login: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub avatar_url: Option<String>,
}

impl From<GitHubUserSummary> for RemoteUser {
    fn from(summary: GitHubUserSummary) -> Self {
        Self {
            id: summary.id,
            login: summary.login,
            user_type: summary.user_type,
            avatar_url: summary.avatar_url,
            star_count: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphQlRequest {
    query: &'static str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailData {
    pub repository_owner: Option<UserDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(rename = "__typename")]
    pub typename: String,
    pub login: String,
    pub avatar_url: Option<String>,
    pub database_id: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryConnection {
    pub nodes: Vec<RepositoryStars>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStars {
    pub stargazer_count: u64,
}

impl GraphQlResponse<UserDetailData> {
    /// Convert to the refreshed user, checking it is still the same account.
    pub fn into_user(self, requested: &RemoteUser) -> Result<RemoteUser> {
        if let Some(err) = self.errors.iter().find(|e| e.error_type.as_deref() == Some("RATE_LIMITED")) {
            tracing::warn!(message = %err.message, "GitHub GraphQL rate limit hit");
            return Err(AppError::GitHubApi(AppError::GITHUB_RATE_LIMIT.to_string()));
        }

        let owner = self.data.and_then(|d| d.repository_owner);
        let detail = match owner {
            Some(detail) => detail,
            None if self.errors.iter().all(|e| e.error_type.as_deref() == Some("NOT_FOUND")) => {
                return Err(AppError::NotFound(format!("GitHub user {}", requested.login)));
            }
            None => {
                let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
                return Err(AppError::GitHubApi(format!(
                    "GraphQL error: {}",
                    messages.join("; ")
                )));
            }
        };

        // A login can be taken over by a different account after a rename
        if detail.database_id != Some(requested.id) {
            return Err(AppError::NotFound(format!(
                "GitHub user {} now belongs to another account",
                requested.login
            )));
        }

        let repositories = &detail.repositories.nodes;
        if repositories.len() >= REPOSITORY_PAGE {
            tracing::debug!(
                user_id = requested.id,
                login = %detail.login,
                "Star count covers only the top {} repositories",
                REPOSITORY_PAGE
            );
        }
        let star_count = repositories.iter().map(|r| r.stargazer_count).sum();

        Ok(RemoteUser {
            id: requested.id,
            login: detail.login,
            user_type: detail.typename,
            avatar_url: detail.avatar_url,
            star_count: Some(star_count),
            updated_at: detail.updated_at,
        })
    }
}
