//! Propose → confirm/cancel → execute.
//!
//! The workflow mediates between intent detection and side-effecting
//! execution with a mandatory human-in-the-loop gate. See the crate docs
//! for the state machine.

use std::sync::Arc;

use base64::Engine;
use butler_channels::{Button, Controls};
use butler_core::config::{EDIT_CODE_MAX_FILES, OAUTH_STATE_TTL_MINS, PENDING_ACTION_TTL_MINS};
use butler_core::RepoRef;
use butler_github::{CodeHost, ReviewVerdict, TokenExchanger};
use butler_users::{TokenSeal, UserStore};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::diff;
use crate::editor::CodeEditor;
use crate::error::{ActionError, Result};
use crate::store::PendingActionStore;
use crate::types::{
    ActionIntent, ActionPayload, GithubAction, PendingAction, PlannedFile, Proposal,
};

/// Cap on the preview body so chat messages stay readable.
const PREVIEW_DIFF_MAX_CHARS: usize = 1500;

pub struct ActionWorkflow {
    store: PendingActionStore,
    users: UserStore,
    seal: Arc<TokenSeal>,
    host: Arc<dyn CodeHost>,
    editor: Arc<dyn CodeEditor>,
    oauth: Arc<dyn TokenExchanger>,
}

impl ActionWorkflow {
    pub fn new(
        store: PendingActionStore,
        users: UserStore,
        seal: Arc<TokenSeal>,
        host: Arc<dyn CodeHost>,
        editor: Arc<dyn CodeEditor>,
        oauth: Arc<dyn TokenExchanger>,
    ) -> Self {
        Self {
            store,
            users,
            seal,
            host,
            editor,
            oauth,
        }
    }

    /// The store handle, for the scheduler's expiry sweep.
    pub fn store(&self) -> &PendingActionStore {
        &self.store
    }

    // --- propose -----------------------------------------------------------

    /// Turn a typed intent into a pending row plus a confirmable preview.
    ///
    /// User-input problems (no repo, empty title, too many files) and diff
    /// application failures return before any row is written.
    pub async fn propose(&self, user_id: &str, intent: ActionIntent) -> Result<Proposal> {
        let (action, preview) = self.build_action(user_id, intent).await?;

        let payload = ActionPayload::Github(action);
        let expires = Utc::now() + Duration::minutes(PENDING_ACTION_TTL_MINS);
        let row = self.store.create(user_id, &payload, Some(expires))?;

        info!(pending_id = row.id, user_id = %user_id, "action proposed");
        Ok(Proposal {
            pending_id: row.id,
            preview,
            controls: confirm_controls(row.id),
        })
    }

    // --- confirm / cancel --------------------------------------------------

    /// Execute a proposed action after ownership, expiry, and claim checks.
    ///
    /// The claim deletes the row before execution, so the action runs at
    /// most once and a failed external call leaves nothing confirmable.
    pub async fn confirm(&self, user_id: &str, id: i64) -> Result<String> {
        let row = self.load_owned(user_id, id)?;

        let action = match row.payload {
            ActionPayload::Github(action) => action,
            // Wrong discriminator — OAuth rows complete via their callback.
            ActionPayload::GithubOauth { .. } => return Err(ActionError::NotFound),
        };

        if is_expired(row.expires_at.as_deref(), Utc::now()) {
            self.store.delete(id)?;
            return Err(ActionError::Expired);
        }

        if !self.store.claim(id)? {
            // Lost the race to another confirm or a cancel.
            return Err(ActionError::NotFound);
        }

        let result = self.execute(user_id, action).await;
        if let Err(ref e) = result {
            if !e.is_user_error() {
                warn!(pending_id = id, user_id = %user_id, error = %e, "action execution failed");
            }
        }
        result
    }

    /// Ownership-checked delete. Acknowledges even when the row is already
    /// gone, so a double-tap on the cancel button reads fine.
    pub fn cancel(&self, user_id: &str, id: i64) -> Result<String> {
        match self.store.get(id)? {
            Some(row) if row.user_id == user_id => {
                self.store.delete(id)?;
                info!(pending_id = id, user_id = %user_id, "action cancelled");
            }
            _ => {}
        }
        Ok("Okay, cancelled. Nothing was done.".to_string())
    }

    // --- oauth connect flow ------------------------------------------------

    /// Start the connect flow: a short-lived pending row holding the OAuth
    /// `state`, and the URL the user must visit.
    pub fn begin_connect(&self, user_id: &str, display_name: &str) -> Result<String> {
        self.users.ensure(user_id, display_name)?;
        let state = Uuid::new_v4().simple().to_string();
        let payload = ActionPayload::GithubOauth {
            state: state.clone(),
        };
        let expires = Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINS);
        self.store.create(user_id, &payload, Some(expires))?;
        Ok(self.oauth.authorize_url(&state))
    }

    /// Finish the connect flow from the OAuth callback.
    pub async fn complete_connect(&self, state: &str, code: &str) -> Result<String> {
        let row = self
            .store
            .find_oauth_state(state)?
            .ok_or(ActionError::NotFound)?;

        if is_expired(row.expires_at.as_deref(), Utc::now()) {
            self.store.delete(row.id)?;
            return Err(ActionError::Expired);
        }

        let token = self.oauth.exchange(code).await?;
        self.users
            .store_github_token(&row.user_id, &token, &self.seal)?;
        self.store.delete(row.id)?;
        info!(user_id = %row.user_id, "github account connected");
        Ok("GitHub connected. You can now ask me to open issues and PRs.".to_string())
    }

    // --- internals ---------------------------------------------------------

    fn load_owned(&self, user_id: &str, id: i64) -> Result<PendingAction> {
        match self.store.get(id)? {
            Some(row) if row.user_id == user_id => Ok(row),
            // Absent and foreign rows are indistinguishable to the caller.
            _ => Err(ActionError::NotFound),
        }
    }

    /// Resolve repository coordinates for an intent.
    ///
    /// An explicit mention wins over the saved default and, when different,
    /// becomes the new default (last-used-repo tracking). With neither, the
    /// propose fails before any row exists.
    async fn resolve_repo(&self, user_id: &str, mention: Option<&str>) -> Result<RepoRef> {
        let user = self.users.ensure(user_id, "")?;

        if let Some(raw) = mention {
            let repo = RepoRef::parse(raw).ok_or_else(|| {
                ActionError::InvalidInput(format!(
                    "\"{raw}\" doesn't look like a repository — I need owner/name."
                ))
            })?;
            if user.default_repo.as_deref() != Some(repo.slug().as_str()) {
                self.users.set_default_repo(user_id, &repo.slug())?;
            }
            return Ok(repo);
        }

        user.default_repo
            .as_deref()
            .and_then(RepoRef::parse)
            .ok_or_else(|| {
                ActionError::InvalidInput(
                    "I don't know which repository you mean. Name one (owner/name) or set a default repo first."
                        .to_string(),
                )
            })
    }

    fn token(&self, user_id: &str) -> Result<String> {
        self.users
            .github_token(user_id, &self.seal)?
            .ok_or(ActionError::NotConnected)
    }

    /// Validate the intent, resolve its repo, and build the stored action
    /// plus its human-readable preview.
    async fn build_action(
        &self,
        user_id: &str,
        intent: ActionIntent,
    ) -> Result<(GithubAction, String)> {
        match intent {
            ActionIntent::CreateIssue {
                repo,
                title,
                body,
                labels,
            } => {
                if title.trim().is_empty() {
                    return Err(ActionError::InvalidInput(
                        "The issue needs a title.".to_string(),
                    ));
                }
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let body = body.unwrap_or_default();
                let mut preview = format!("Create issue in {repo}\n• Title: {title}");
                if !body.is_empty() {
                    preview.push_str(&format!("\n• Body: {body}"));
                }
                if !labels.is_empty() {
                    preview.push_str(&format!("\n• Labels: {}", labels.join(", ")));
                }
                Ok((
                    GithubAction::CreateIssue {
                        repo,
                        title,
                        body,
                        labels,
                    },
                    preview,
                ))
            }

            ActionIntent::CommentOnPr { repo, number, body } => {
                if body.trim().is_empty() {
                    return Err(ActionError::InvalidInput(
                        "What should the comment say?".to_string(),
                    ));
                }
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let preview = format!("Comment on {repo}#{number}\n• {body}");
                Ok((GithubAction::CommentOnPr { repo, number, body }, preview))
            }

            ActionIntent::AssignReviewers {
                repo,
                number,
                reviewers,
            } => {
                if reviewers.is_empty() {
                    return Err(ActionError::InvalidInput(
                        "Who should review it?".to_string(),
                    ));
                }
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let preview = format!(
                    "Request review on {repo}#{number} from {}",
                    reviewers.join(", ")
                );
                Ok((
                    GithubAction::AssignReviewers {
                        repo,
                        number,
                        reviewers,
                    },
                    preview,
                ))
            }

            ActionIntent::RequestChanges { repo, number, body } => {
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let body = body.unwrap_or_default();
                let preview = format!("Request changes on {repo}#{number}");
                Ok((
                    GithubAction::SubmitReview {
                        repo,
                        number,
                        verdict: ReviewVerdict::RequestChanges,
                        body,
                    },
                    preview,
                ))
            }

            ActionIntent::Approve { repo, number, body } => {
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let body = body.unwrap_or_default();
                let preview = format!("Approve {repo}#{number}");
                Ok((
                    GithubAction::SubmitReview {
                        repo,
                        number,
                        verdict: ReviewVerdict::Approve,
                        body,
                    },
                    preview,
                ))
            }

            ActionIntent::CommentReview { repo, number, body } => {
                if body.trim().is_empty() {
                    return Err(ActionError::InvalidInput(
                        "What should the review say?".to_string(),
                    ));
                }
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let preview = format!("Leave a review comment on {repo}#{number}\n• {body}");
                Ok((
                    GithubAction::SubmitReview {
                        repo,
                        number,
                        verdict: ReviewVerdict::Comment,
                        body,
                    },
                    preview,
                ))
            }

            ActionIntent::DismissReview {
                repo,
                number,
                review_id,
                message,
            } => {
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let message = message.unwrap_or_else(|| "Dismissed".to_string());
                let preview = format!("Dismiss review {review_id} on {repo}#{number}");
                Ok((
                    GithubAction::DismissReview {
                        repo,
                        number,
                        review_id,
                        message,
                    },
                    preview,
                ))
            }

            ActionIntent::CreateBranch { repo, branch } => {
                if branch.trim().is_empty() {
                    return Err(ActionError::InvalidInput(
                        "The branch needs a name.".to_string(),
                    ));
                }
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let preview = format!("Create branch `{branch}` in {repo}");
                Ok((GithubAction::CreateBranch { repo, branch }, preview))
            }

            ActionIntent::OpenPr {
                repo,
                title,
                body,
                head,
                base,
            } => {
                if title.trim().is_empty() || head.trim().is_empty() {
                    return Err(ActionError::InvalidInput(
                        "I need at least a title and a source branch for the PR.".to_string(),
                    ));
                }
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let body = body.unwrap_or_default();
                let base_label = base.as_deref().unwrap_or("default branch");
                let preview =
                    format!("Open PR in {repo}\n• {title}\n• {head} → {base_label}");
                Ok((
                    GithubAction::OpenPr {
                        repo,
                        title,
                        body,
                        head,
                        base,
                    },
                    preview,
                ))
            }

            ActionIntent::MergePr { repo, number } => {
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let preview = format!("Merge {repo}#{number}");
                Ok((GithubAction::MergePr { repo, number }, preview))
            }

            ActionIntent::UpdatePrBranch { repo, number } => {
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                let preview = format!("Update the branch of {repo}#{number}");
                Ok((GithubAction::UpdatePrBranch { repo, number }, preview))
            }

            ActionIntent::EditCode {
                repo,
                files,
                instructions,
                direct_commit,
            } => {
                let repo = self.resolve_repo(user_id, repo.as_deref()).await?;
                self.plan_edit(user_id, repo, files, instructions, direct_commit)
                    .await
            }
        }
    }

    /// The edit-code propose pipeline: fetch, edit, apply, stage.
    ///
    /// Everything here happens before a pending row exists — a diff that
    /// does not apply exactly aborts the proposal entirely.
    async fn plan_edit(
        &self,
        user_id: &str,
        repo: RepoRef,
        files: Vec<String>,
        instructions: String,
        direct_commit: bool,
    ) -> Result<(GithubAction, String)> {
        if files.is_empty() {
            return Err(ActionError::InvalidInput(
                "Which file(s) should I edit?".to_string(),
            ));
        }
        if files.len() > EDIT_CODE_MAX_FILES {
            return Err(ActionError::InvalidInput(format!(
                "I can edit at most {EDIT_CODE_MAX_FILES} files in one go; you named {}.",
                files.len()
            )));
        }
        if instructions.trim().is_empty() {
            return Err(ActionError::InvalidInput(
                "Tell me what to change.".to_string(),
            ));
        }

        let token = self.token(user_id)?;
        let default_branch = self.host.default_branch(&token, &repo).await?;

        let mut contents: Vec<(String, String)> = Vec::with_capacity(files.len());
        let mut shas: Vec<String> = Vec::with_capacity(files.len());
        for path in &files {
            let file = self
                .host
                .get_file(&token, &repo, path, &default_branch)
                .await?;
            contents.push((path.clone(), file.content));
            shas.push(file.sha);
        }

        let edits = self.editor.edit(&contents, &instructions).await?;
        if edits.is_empty() {
            return Err(ActionError::External(
                "the editor proposed no changes".to_string(),
            ));
        }

        let mut preview_diffs = String::new();
        for edit in &edits {
            let slot = contents
                .iter_mut()
                .find(|(path, _)| *path == edit.path)
                .ok_or_else(|| {
                    ActionError::DiffApply(format!("edit targets unknown file {}", edit.path))
                })?;
            slot.1 = diff::apply_diff(&slot.1, &edit.diff)?;
            preview_diffs.push_str(&format!("--- {}\n{}\n", edit.path, edit.diff));
        }

        let planned: Vec<PlannedFile> = contents
            .into_iter()
            .zip(shas)
            .map(|((path, content), base_sha)| PlannedFile {
                path,
                content_b64: base64::engine::general_purpose::STANDARD.encode(content),
                base_sha,
            })
            .collect();

        if preview_diffs.len() > PREVIEW_DIFF_MAX_CHARS {
            let mut cut = PREVIEW_DIFF_MAX_CHARS;
            while !preview_diffs.is_char_boundary(cut) {
                cut -= 1;
            }
            preview_diffs.truncate(cut);
            preview_diffs.push_str("\n… (truncated)");
        }

        let branch = format!("butler/edit-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let target = if direct_commit {
            format!("commit directly to `{default_branch}`")
        } else {
            format!("open a PR from `{branch}`")
        };
        let preview = format!(
            "Edit {} file(s) in {repo} and {target}:\n{preview_diffs}",
            planned.len()
        );

        Ok((
            GithubAction::EditCode {
                repo,
                summary: instructions,
                direct_commit,
                branch,
                files: planned,
            },
            preview,
        ))
    }

    /// Dispatch one confirmed action to the host. Exhaustive by
    /// construction — adding a variant fails compilation here.
    async fn execute(&self, user_id: &str, action: GithubAction) -> Result<String> {
        let token = self.token(user_id)?;
        match action {
            GithubAction::CreateIssue {
                repo,
                title,
                body,
                labels,
            } => {
                let url = self
                    .host
                    .create_issue(&token, &repo, &title, &body, &labels)
                    .await?;
                Ok(format!("Issue created: {url}"))
            }
            GithubAction::CommentOnPr { repo, number, body } => {
                let url = self.host.comment_on_pr(&token, &repo, number, &body).await?;
                Ok(format!("Comment posted: {url}"))
            }
            GithubAction::AssignReviewers {
                repo,
                number,
                reviewers,
            } => {
                let url = self
                    .host
                    .assign_reviewers(&token, &repo, number, &reviewers)
                    .await?;
                Ok(format!("Review requested: {url}"))
            }
            GithubAction::SubmitReview {
                repo,
                number,
                verdict,
                body,
            } => {
                let url = self
                    .host
                    .submit_review(&token, &repo, number, verdict, &body)
                    .await?;
                let what = match verdict {
                    ReviewVerdict::Approve => "PR approved",
                    ReviewVerdict::RequestChanges => "Changes requested",
                    ReviewVerdict::Comment => "Review comment posted",
                };
                Ok(format!("{what}: {url}"))
            }
            GithubAction::DismissReview {
                repo,
                number,
                review_id,
                message,
            } => {
                let url = self
                    .host
                    .dismiss_review(&token, &repo, number, review_id, &message)
                    .await?;
                Ok(format!("Review dismissed: {url}"))
            }
            GithubAction::CreateBranch { repo, branch } => {
                let default = self.host.default_branch(&token, &repo).await?;
                let sha = self.host.branch_sha(&token, &repo, &default).await?;
                self.host.create_branch(&token, &repo, &branch, &sha).await?;
                Ok(format!("Branch `{branch}` created from `{default}`."))
            }
            GithubAction::OpenPr {
                repo,
                title,
                body,
                head,
                base,
            } => {
                let base = match base {
                    Some(base) => base,
                    None => self.host.default_branch(&token, &repo).await?,
                };
                let url = self
                    .host
                    .create_pull_request(&token, &repo, &title, &body, &head, &base)
                    .await?;
                Ok(format!("PR opened: {url}"))
            }
            GithubAction::MergePr { repo, number } => {
                let url = self.host.merge_pull_request(&token, &repo, number).await?;
                Ok(format!("PR merged: {url}"))
            }
            GithubAction::UpdatePrBranch { repo, number } => {
                let url = self
                    .host
                    .update_pull_request_branch(&token, &repo, number)
                    .await?;
                Ok(format!("PR branch updated: {url}"))
            }
            GithubAction::EditCode {
                repo,
                summary,
                direct_commit,
                branch,
                files,
            } => {
                self.execute_edit(&token, repo, summary, direct_commit, branch, files)
                    .await
            }
        }
    }

    /// Commit staged file contents: either straight to the default branch,
    /// or branch → writes → PR.
    ///
    /// There is no rollback; if a write fails partway, earlier writes stay
    /// and the error names the file that failed.
    async fn execute_edit(
        &self,
        token: &str,
        repo: RepoRef,
        summary: String,
        direct_commit: bool,
        branch: String,
        files: Vec<PlannedFile>,
    ) -> Result<String> {
        let default_branch = self.host.default_branch(token, &repo).await?;
        let commit_message = format!("butler: {summary}");

        let target_branch = if direct_commit {
            default_branch.clone()
        } else {
            let tip = self.host.branch_sha(token, &repo, &default_branch).await?;
            self.host.create_branch(token, &repo, &branch, &tip).await?;
            branch.clone()
        };

        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            self.host
                .put_file(
                    token,
                    &repo,
                    &file.path,
                    &target_branch,
                    &file.content_b64,
                    &commit_message,
                    Some(&file.base_sha),
                )
                .await
                .map_err(|e| match e {
                    butler_github::GithubError::Timeout => ActionError::Timeout,
                    other => ActionError::External(format!(
                        "writing {} failed ({other}); {} of {total} file(s) were already written",
                        file.path, i
                    )),
                })?;
        }

        if direct_commit {
            Ok(format!(
                "Committed {total} file(s) to `{default_branch}` in {repo}."
            ))
        } else {
            let url = self
                .host
                .create_pull_request(token, &repo, &summary, "", &branch, &default_branch)
                .await?;
            Ok(format!("PR opened: {url}"))
        }
    }
}

fn confirm_controls(id: i64) -> Controls {
    Controls::row(vec![
        Button::new("✅ Confirm", format!("action:confirm:{id}")),
        Button::new("❌ Cancel", format!("action:cancel:{id}")),
    ])
}

fn is_expired(expires_at: Option<&str>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc) < now)
            .unwrap_or(true),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_expiry_never_expires() {
        assert!(!is_expired(None, Utc::now()));
    }

    #[test]
    fn garbage_expiry_counts_as_expired() {
        assert!(is_expired(Some("not-a-date"), Utc::now()));
    }
}
