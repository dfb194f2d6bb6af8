use butler_channels::Controls;
use butler_core::RepoRef;
use butler_github::ReviewVerdict;
use serde::{Deserialize, Serialize};

/// A typed intent arriving from the classification layer.
///
/// Repository mentions are raw strings here; [`crate::workflow`] resolves
/// them against the user's saved default (and updates the default when an
/// explicit mention differs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionIntent {
    CreateIssue {
        repo: Option<String>,
        title: String,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        labels: Vec<String>,
    },
    CommentOnPr {
        repo: Option<String>,
        number: u64,
        body: String,
    },
    AssignReviewers {
        repo: Option<String>,
        number: u64,
        reviewers: Vec<String>,
    },
    RequestChanges {
        repo: Option<String>,
        number: u64,
        #[serde(default)]
        body: Option<String>,
    },
    Approve {
        repo: Option<String>,
        number: u64,
        #[serde(default)]
        body: Option<String>,
    },
    CommentReview {
        repo: Option<String>,
        number: u64,
        body: String,
    },
    DismissReview {
        repo: Option<String>,
        number: u64,
        review_id: u64,
        #[serde(default)]
        message: Option<String>,
    },
    CreateBranch {
        repo: Option<String>,
        branch: String,
    },
    OpenPr {
        repo: Option<String>,
        title: String,
        #[serde(default)]
        body: Option<String>,
        head: String,
        #[serde(default)]
        base: Option<String>,
    },
    MergePr {
        repo: Option<String>,
        number: u64,
    },
    UpdatePrBranch {
        repo: Option<String>,
        number: u64,
    },
    EditCode {
        repo: Option<String>,
        /// Paths of the files to edit, relative to the repo root.
        files: Vec<String>,
        instructions: String,
        /// Commit straight to the default branch instead of opening a PR.
        #[serde(default)]
        direct_commit: bool,
    },
}

/// What a pending row stores. Tagged so the stored JSON stays readable and
/// the confirm dispatch is exhaustive at compile time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    Github(GithubAction),
    GithubOauth { state: String },
}

impl ActionPayload {
    /// Value of the `kind` column — the store's coarse discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionPayload::Github(_) => "github",
            ActionPayload::GithubOauth { .. } => "github_oauth",
        }
    }
}

/// A fully-resolved GitHub action, one variant per confirmable kind.
///
/// The three review verdicts share one variant because they differ only in
/// the `event` sent to the API; the intent layer still distinguishes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GithubAction {
    CreateIssue {
        repo: RepoRef,
        title: String,
        body: String,
        labels: Vec<String>,
    },
    CommentOnPr {
        repo: RepoRef,
        number: u64,
        body: String,
    },
    AssignReviewers {
        repo: RepoRef,
        number: u64,
        reviewers: Vec<String>,
    },
    SubmitReview {
        repo: RepoRef,
        number: u64,
        verdict: ReviewVerdict,
        body: String,
    },
    DismissReview {
        repo: RepoRef,
        number: u64,
        review_id: u64,
        message: String,
    },
    CreateBranch {
        repo: RepoRef,
        branch: String,
    },
    OpenPr {
        repo: RepoRef,
        title: String,
        body: String,
        head: String,
        base: Option<String>,
    },
    MergePr {
        repo: RepoRef,
        number: u64,
    },
    UpdatePrBranch {
        repo: RepoRef,
        number: u64,
    },
    EditCode {
        repo: RepoRef,
        summary: String,
        direct_commit: bool,
        /// Work branch name, chosen at propose time so the preview can show it.
        branch: String,
        files: Vec<PlannedFile>,
    },
}

/// One file of an edit-code proposal: the post-edit content (base64) plus
/// the blob sha the edit was computed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedFile {
    pub path: String,
    pub content_b64: String,
    pub base_sha: String,
}

/// A pending-action row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    /// Store-assigned, monotonic.
    pub id: i64,
    pub user_id: String,
    pub payload: ActionPayload,
    /// RFC3339, or None for rows that never expire.
    pub expires_at: Option<String>,
    pub created_at: String,
}

/// What `propose` hands back to the chat layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub pending_id: i64,
    /// Human-readable preview of what will happen on confirm.
    pub preview: String,
    /// Confirm/cancel buttons carrying the pending id.
    pub controls: Controls,
}
