// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GitHub adapter over the REST API.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use causeway_core::{
    CausewayError, CodeAdapter, CodeMatch, CommitInfo, ProviderKind, RepoInfo,
};
use serde::Deserialize;

use crate::http::{build_client, check_status, read_json, request_error};

const PROVIDER: ProviderKind = ProviderKind::Github;

/// Decrypted GitHub credential payload.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubCredentials {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub token: String,
    /// Organization or user the workspace's repositories live under.
    pub owner: String,
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

pub struct GithubAdapter {
    client: reqwest::Client,
    credentials: GithubCredentials,
}

impl GithubAdapter {
    pub fn new(credentials: GithubCredentials) -> Result<Self, CausewayError> {
        Ok(Self {
            client: build_client()?,
            credentials,
        })
    }

    fn url(&self, tail: &str) -> String {
        format!("{}{tail}", self.credentials.base_url.trim_end_matches('/'))
    }

    fn request(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(&self.credentials.token)
            .header("accept", "application/vnd.github+json")
    }
}

#[async_trait]
impl CodeAdapter for GithubAdapter {
    async fn list_repos(&self) -> Result<Vec<RepoInfo>, CausewayError> {
        let url = self.url(&format!(
            "/orgs/{}/repos?per_page=100&sort=pushed",
            self.credentials.owner
        ));
        let response = self
            .request(url)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let repos: Vec<WireRepo> = read_json(PROVIDER, response).await?;
        Ok(repos
            .into_iter()
            .map(|r| RepoInfo {
                name: r.name,
                default_branch: r.default_branch.unwrap_or_else(|| "main".to_string()),
                description: r.description,
            })
            .collect())
    }

    async fn read_file(
        &self,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, CausewayError> {
        let mut url = self.url(&format!(
            "/repos/{}/{repo}/contents/{path}",
            self.credentials.owner
        ));
        if let Some(git_ref) = git_ref {
            url.push_str(&format!("?ref={git_ref}"));
        }
        let response = self
            .request(url)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let file: WireContent = read_json(PROVIDER, response).await?;

        let encoded: String = file.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64.decode(&encoded).map_err(|e| CausewayError::Provider {
            message: format!("github content was not valid base64: {e}"),
            source: Some(Box::new(e)),
        })?;
        String::from_utf8(bytes).map_err(|e| CausewayError::Provider {
            message: format!("github content was not valid UTF-8: {e}"),
            source: Some(Box::new(e)),
        })
    }

    async fn search(
        &self,
        repo: Option<&str>,
        text: &str,
    ) -> Result<Vec<CodeMatch>, CausewayError> {
        let scope = match repo {
            Some(repo) => format!("repo:{}/{repo}", self.credentials.owner),
            None => format!("org:{}", self.credentials.owner),
        };
        let url = self.url(&format!("/search/code?q={}+{scope}&per_page=20", urlencode(text)));
        let response = self
            .request(url)
            .header("accept", "application/vnd.github.text-match+json")
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let results: WireSearch = read_json(PROVIDER, response).await?;

        Ok(results
            .items
            .into_iter()
            .map(|item| CodeMatch {
                repo: item.repository.name,
                path: item.path,
                snippet: item
                    .text_matches
                    .into_iter()
                    .next()
                    .map(|m| m.fragment)
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn list_commits(
        &self,
        repo: &str,
        branch: Option<&str>,
        limit: u32,
    ) -> Result<Vec<CommitInfo>, CausewayError> {
        let mut url = self.url(&format!(
            "/repos/{}/{repo}/commits?per_page={limit}",
            self.credentials.owner
        ));
        if let Some(branch) = branch {
            url.push_str(&format!("&sha={branch}"));
        }
        let response = self
            .request(url)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;
        let commits: Vec<WireCommit> = read_json(PROVIDER, response).await?;

        Ok(commits
            .into_iter()
            .map(|c| CommitInfo {
                sha: c.sha,
                author: c.commit.author.as_ref().and_then(|a| a.name.clone()),
                message: c.commit.message,
                committed_at: c
                    .commit
                    .author
                    .and_then(|a| a.date)
                    .unwrap_or_default(),
            })
            .collect())
    }
}

fn urlencode(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c.to_string(),
            ' ' => "+".to_string(),
            other => format!("%{:02X}", other as u32),
        })
        .collect()
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct WireRepo {
    name: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireSearch {
    #[serde(default)]
    items: Vec<WireSearchItem>,
}

#[derive(Debug, Deserialize)]
struct WireSearchItem {
    path: String,
    repository: WireSearchRepo,
    #[serde(default)]
    text_matches: Vec<WireTextMatch>,
}

#[derive(Debug, Deserialize)]
struct WireSearchRepo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireTextMatch {
    #[serde(default)]
    fragment: String,
}

#[derive(Debug, Deserialize)]
struct WireCommit {
    sha: String,
    commit: WireCommitDetail,
}

#[derive(Debug, Deserialize)]
struct WireCommitDetail {
    message: String,
    #[serde(default)]
    author: Option<WireCommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct WireCommitAuthor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    date: Option<String>,
}
