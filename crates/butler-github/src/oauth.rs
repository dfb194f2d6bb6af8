//! OAuth code exchange for the connect flow.
//!
//! The workflow crate owns the pending `github_oauth` row; this module only
//! turns an authorization code into an access token.

use std::time::Duration;

use async_trait::async_trait;
use butler_core::config::EXTERNAL_CALL_TIMEOUT_SECS;
use serde::Deserialize;
use serde_json::json;

use crate::error::{GithubError, Result};

#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange an authorization code for an access token.
    async fn exchange(&self, code: &str) -> Result<String>;

    /// The URL the user must visit to authorize, carrying our `state`.
    fn authorize_url(&self, state: &str) -> String;
}

pub struct GithubOauth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

impl GithubOauth {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(EXTERNAL_CALL_TIMEOUT_SECS))
            .user_agent("butler-gateway")
            .build()
            .unwrap_or_default();
        Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl TokenExchanger for GithubOauth {
    async fn exchange(&self, code: &str) -> Result<String> {
        let resp: AccessTokenResponse = self
            .http
            .post("https://github.com/login/oauth/access_token")
            .header("Accept", "application/json")
            .json(&json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
            }))
            .send()
            .await?
            .json()
            .await?;

        resp.access_token.ok_or_else(|| GithubError::Api {
            status: 400,
            message: resp
                .error_description
                .unwrap_or_else(|| "no access token in response".to_string()),
        })
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "https://github.com/login/oauth/authorize?client_id={}&scope=repo&state={}",
            self.client_id, state
        )
    }
}
