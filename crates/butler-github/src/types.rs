use serde::{Deserialize, Serialize};

/// A file fetched from the host: decoded content plus the blob sha that a
/// later write must present as its base.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub content: String,
    pub sha: String,
}

/// The three review verdicts GitHub accepts on submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approve,
    RequestChanges,
    Comment,
}

impl ReviewVerdict {
    /// The API's `event` field value.
    pub(crate) fn as_event(self) -> &'static str {
        match self {
            ReviewVerdict::Approve => "APPROVE",
            ReviewVerdict::RequestChanges => "REQUEST_CHANGES",
            ReviewVerdict::Comment => "COMMENT",
        }
    }
}

// --- REST response shapes (only the fields we read) ------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct RepoResponse {
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitRefResponse {
    pub object: GitRefObject,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitRefObject {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentsResponse {
    pub content: String,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HtmlUrlResponse {
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub message: Option<String>,
}
