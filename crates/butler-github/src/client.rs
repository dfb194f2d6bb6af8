use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use butler_core::config::EXTERNAL_CALL_TIMEOUT_SECS;
use butler_core::RepoRef;
use serde_json::json;
use tracing::debug;

use crate::error::{GithubError, Result};
use crate::types::{
    ContentsResponse, ErrorResponse, FileContent, GitRefResponse, HtmlUrlResponse, RepoResponse,
    ReviewVerdict,
};

/// Capability set the action workflow executes against.
///
/// Every call takes the owner's decrypted token; mutating calls return the
/// `html_url` of whatever they created or touched, which is what ends up in
/// the user-facing result string.
#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn default_branch(&self, token: &str, repo: &RepoRef) -> Result<String>;

    async fn branch_sha(&self, token: &str, repo: &RepoRef, branch: &str) -> Result<String>;

    async fn get_file(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent>;

    async fn create_issue(
        &self,
        token: &str,
        repo: &RepoRef,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<String>;

    async fn comment_on_pr(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<String>;

    async fn assign_reviewers(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
        reviewers: &[String],
    ) -> Result<String>;

    async fn submit_review(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
        verdict: ReviewVerdict,
        body: &str,
    ) -> Result<String>;

    async fn dismiss_review(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
        review_id: u64,
        message: &str,
    ) -> Result<String>;

    async fn create_branch(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        from_sha: &str,
    ) -> Result<()>;

    /// Write one file on a branch. `base_sha` is required when the file
    /// already exists; GitHub rejects a stale or missing sha.
    #[allow(clippy::too_many_arguments)]
    async fn put_file(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        branch: &str,
        content_b64: &str,
        message: &str,
        base_sha: Option<&str>,
    ) -> Result<()>;

    async fn create_pull_request(
        &self,
        token: &str,
        repo: &RepoRef,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<String>;

    async fn merge_pull_request(&self, token: &str, repo: &RepoRef, number: u64)
        -> Result<String>;

    async fn update_pull_request_branch(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
    ) -> Result<String>;
}

/// GitHub REST v3 implementation.
pub struct GithubClient {
    http: reqwest::Client,
    base: String,
}

impl GithubClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(EXTERNAL_CALL_TIMEOUT_SECS))
            .user_agent("butler-gateway")
            .build()
            .unwrap_or_default();
        Self {
            http,
            base: api_base.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        token: &str,
    ) -> Result<reqwest::Response> {
        let resp = req
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| status.to_string());
        debug!(status = status.as_u16(), %message, "github api error");
        Err(GithubError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn html_url(&self, req: reqwest::RequestBuilder, token: &str) -> Result<String> {
        let resp: HtmlUrlResponse = self.send(req, token).await?.json().await?;
        Ok(resp.html_url)
    }
}

#[async_trait]
impl CodeHost for GithubClient {
    async fn default_branch(&self, token: &str, repo: &RepoRef) -> Result<String> {
        let url = self.url(&format!("/repos/{}/{}", repo.owner, repo.name));
        let resp: RepoResponse = self.send(self.http.get(url), token).await?.json().await?;
        Ok(resp.default_branch)
    }

    async fn branch_sha(&self, token: &str, repo: &RepoRef, branch: &str) -> Result<String> {
        let url = self.url(&format!(
            "/repos/{}/{}/git/ref/heads/{}",
            repo.owner, repo.name, branch
        ));
        let resp: GitRefResponse = self.send(self.http.get(url), token).await?.json().await?;
        Ok(resp.object.sha)
    }

    async fn get_file(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent> {
        let url = self.url(&format!(
            "/repos/{}/{}/contents/{}",
            repo.owner, repo.name, path
        ));
        let resp: ContentsResponse = self
            .send(self.http.get(url).query(&[("ref", git_ref)]), token)
            .await?
            .json()
            .await?;
        // The contents API base64-encodes with embedded newlines.
        let stripped: String = resp.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(stripped)
            .map_err(|e| GithubError::Decode(format!("bad base64 for {path}: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|_| GithubError::Decode(format!("{path} is not UTF-8 text")))?;
        Ok(FileContent {
            content,
            sha: resp.sha,
        })
    }

    async fn create_issue(
        &self,
        token: &str,
        repo: &RepoRef,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<String> {
        let url = self.url(&format!("/repos/{}/{}/issues", repo.owner, repo.name));
        let payload = json!({ "title": title, "body": body, "labels": labels });
        self.html_url(self.http.post(url).json(&payload), token).await
    }

    async fn comment_on_pr(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<String> {
        let url = self.url(&format!(
            "/repos/{}/{}/issues/{}/comments",
            repo.owner, repo.name, number
        ));
        self.html_url(self.http.post(url).json(&json!({ "body": body })), token)
            .await
    }

    async fn assign_reviewers(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
        reviewers: &[String],
    ) -> Result<String> {
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}/requested_reviewers",
            repo.owner, repo.name, number
        ));
        self.html_url(
            self.http.post(url).json(&json!({ "reviewers": reviewers })),
            token,
        )
        .await
    }

    async fn submit_review(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
        verdict: ReviewVerdict,
        body: &str,
    ) -> Result<String> {
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}/reviews",
            repo.owner, repo.name, number
        ));
        let payload = json!({ "event": verdict.as_event(), "body": body });
        self.html_url(self.http.post(url).json(&payload), token).await
    }

    async fn dismiss_review(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
        review_id: u64,
        message: &str,
    ) -> Result<String> {
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}/reviews/{}/dismissals",
            repo.owner, repo.name, number, review_id
        ));
        self.html_url(self.http.put(url).json(&json!({ "message": message })), token)
            .await
    }

    async fn create_branch(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        from_sha: &str,
    ) -> Result<()> {
        let url = self.url(&format!("/repos/{}/{}/git/refs", repo.owner, repo.name));
        let payload = json!({ "ref": format!("refs/heads/{branch}"), "sha": from_sha });
        self.send(self.http.post(url).json(&payload), token).await?;
        Ok(())
    }

    async fn put_file(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        branch: &str,
        content_b64: &str,
        message: &str,
        base_sha: Option<&str>,
    ) -> Result<()> {
        let url = self.url(&format!(
            "/repos/{}/{}/contents/{}",
            repo.owner, repo.name, path
        ));
        let mut payload = json!({
            "message": message,
            "content": content_b64,
            "branch": branch,
        });
        if let Some(sha) = base_sha {
            payload["sha"] = json!(sha);
        }
        self.send(self.http.put(url).json(&payload), token).await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        token: &str,
        repo: &RepoRef,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<String> {
        let url = self.url(&format!("/repos/{}/{}/pulls", repo.owner, repo.name));
        let payload = json!({ "title": title, "body": body, "head": head, "base": base });
        self.html_url(self.http.post(url).json(&payload), token).await
    }

    async fn merge_pull_request(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
    ) -> Result<String> {
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}/merge",
            repo.owner, repo.name, number
        ));
        self.send(self.http.put(url).json(&json!({})), token).await?;
        // The merge endpoint returns a commit sha, not a page; link the PR.
        Ok(format!(
            "https://github.com/{}/{}/pull/{}",
            repo.owner, repo.name, number
        ))
    }

    async fn update_pull_request_branch(
        &self,
        token: &str,
        repo: &RepoRef,
        number: u64,
    ) -> Result<String> {
        let url = self.url(&format!(
            "/repos/{}/{}/pulls/{}/update-branch",
            repo.owner, repo.name, number
        ));
        self.send(self.http.put(url).json(&json!({})), token).await?;
        Ok(format!(
            "https://github.com/{}/{}/pull/{}",
            repo.owner, repo.name, number
        ))
    }
}
