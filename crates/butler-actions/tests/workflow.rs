//! End-to-end workflow tests against mock collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use butler_actions::{ActionError, ActionIntent, ActionPayload, ActionWorkflow, CodeEditor,
    FileEdit, GithubAction, PendingActionStore};
use butler_core::RepoRef;
use butler_github::{CodeHost, FileContent, GithubError, ReviewVerdict, TokenExchanger};
use butler_users::{TokenSeal, UserStore};
use chrono::{Duration, Utc};
use rusqlite::Connection;

const SEAL_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

#[derive(Default)]
struct MockHost {
    calls: Mutex<Vec<String>>,
    files: Mutex<HashMap<String, (String, String)>>,
    fail_put_path: Option<String>,
}

impl MockHost {
    fn with_file(self, path: &str, content: &str, sha: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (content.to_string(), sha.to_string()));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl CodeHost for MockHost {
    async fn default_branch(&self, _t: &str, _r: &RepoRef) -> Result<String, GithubError> {
        self.record("default_branch");
        Ok("main".to_string())
    }

    async fn branch_sha(&self, _t: &str, _r: &RepoRef, branch: &str) -> Result<String, GithubError> {
        self.record(format!("branch_sha:{branch}"));
        Ok("tip-sha".to_string())
    }

    async fn get_file(
        &self,
        _t: &str,
        _r: &RepoRef,
        path: &str,
        _g: &str,
    ) -> Result<FileContent, GithubError> {
        self.record(format!("get_file:{path}"));
        let files = self.files.lock().unwrap();
        let (content, sha) = files.get(path).cloned().ok_or(GithubError::Api {
            status: 404,
            message: "Not Found".to_string(),
        })?;
        Ok(FileContent { content, sha })
    }

    async fn create_issue(
        &self,
        _t: &str,
        repo: &RepoRef,
        _title: &str,
        _body: &str,
        _labels: &[String],
    ) -> Result<String, GithubError> {
        self.record("create_issue");
        Ok(format!("https://github.com/{}/issues/7", repo.slug()))
    }

    async fn comment_on_pr(
        &self,
        _t: &str,
        repo: &RepoRef,
        number: u64,
        _b: &str,
    ) -> Result<String, GithubError> {
        self.record("comment_on_pr");
        Ok(format!("https://github.com/{}/pull/{number}", repo.slug()))
    }

    async fn assign_reviewers(
        &self,
        _t: &str,
        repo: &RepoRef,
        number: u64,
        _rs: &[String],
    ) -> Result<String, GithubError> {
        self.record("assign_reviewers");
        Ok(format!("https://github.com/{}/pull/{number}", repo.slug()))
    }

    async fn submit_review(
        &self,
        _t: &str,
        repo: &RepoRef,
        number: u64,
        verdict: ReviewVerdict,
        _b: &str,
    ) -> Result<String, GithubError> {
        self.record(format!("submit_review:{verdict:?}"));
        Ok(format!("https://github.com/{}/pull/{number}", repo.slug()))
    }

    async fn dismiss_review(
        &self,
        _t: &str,
        repo: &RepoRef,
        number: u64,
        _id: u64,
        _m: &str,
    ) -> Result<String, GithubError> {
        self.record("dismiss_review");
        Ok(format!("https://github.com/{}/pull/{number}", repo.slug()))
    }

    async fn create_branch(
        &self,
        _t: &str,
        _r: &RepoRef,
        branch: &str,
        _sha: &str,
    ) -> Result<(), GithubError> {
        self.record(format!("create_branch:{branch}"));
        Ok(())
    }

    async fn put_file(
        &self,
        _t: &str,
        _r: &RepoRef,
        path: &str,
        branch: &str,
        _c: &str,
        _m: &str,
        _s: Option<&str>,
    ) -> Result<(), GithubError> {
        self.record(format!("put_file:{path}@{branch}"));
        if self.fail_put_path.as_deref() == Some(path) {
            return Err(GithubError::Api {
                status: 409,
                message: "sha mismatch".to_string(),
            });
        }
        Ok(())
    }

    async fn create_pull_request(
        &self,
        _t: &str,
        repo: &RepoRef,
        _title: &str,
        _body: &str,
        _head: &str,
        _base: &str,
    ) -> Result<String, GithubError> {
        self.record("create_pull_request");
        Ok(format!("https://github.com/{}/pull/42", repo.slug()))
    }

    async fn merge_pull_request(
        &self,
        _t: &str,
        repo: &RepoRef,
        number: u64,
    ) -> Result<String, GithubError> {
        self.record("merge_pull_request");
        Ok(format!("https://github.com/{}/pull/{number}", repo.slug()))
    }

    async fn update_pull_request_branch(
        &self,
        _t: &str,
        repo: &RepoRef,
        number: u64,
    ) -> Result<String, GithubError> {
        self.record("update_pull_request_branch");
        Ok(format!("https://github.com/{}/pull/{number}", repo.slug()))
    }
}

struct MockEditor {
    edits: Vec<FileEdit>,
}

#[async_trait]
impl CodeEditor for MockEditor {
    async fn edit(
        &self,
        _files: &[(String, String)],
        _instructions: &str,
    ) -> Result<Vec<FileEdit>, ActionError> {
        Ok(self
            .edits
            .iter()
            .map(|e| FileEdit {
                path: e.path.clone(),
                diff: e.diff.clone(),
            })
            .collect())
    }
}

struct MockExchanger;

#[async_trait]
impl TokenExchanger for MockExchanger {
    async fn exchange(&self, code: &str) -> Result<String, GithubError> {
        Ok(format!("gho_{code}"))
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://example.test/authorize?state={state}")
    }
}

struct Fixture {
    workflow: ActionWorkflow,
    users: UserStore,
    host: Arc<MockHost>,
    seal: Arc<TokenSeal>,
}

fn fixture_with(host: MockHost, edits: Vec<FileEdit>) -> Fixture {
    let store = PendingActionStore::new(Connection::open_in_memory().unwrap()).unwrap();
    let users = UserStore::new(Connection::open_in_memory().unwrap(), "UTC").unwrap();
    let seal = Arc::new(TokenSeal::from_hex_key(SEAL_KEY).unwrap());
    let host = Arc::new(host);
    let workflow = ActionWorkflow::new(
        store,
        users.clone(),
        Arc::clone(&seal),
        host.clone() as Arc<dyn CodeHost>,
        Arc::new(MockEditor { edits }),
        Arc::new(MockExchanger),
    );
    Fixture {
        workflow,
        users,
        host,
        seal,
    }
}

fn fixture() -> Fixture {
    fixture_with(MockHost::default(), vec![])
}

fn connect(f: &Fixture, user_id: &str) {
    f.users.ensure(user_id, "Test").unwrap();
    f.users
        .store_github_token(user_id, "gho_test", &f.seal)
        .unwrap();
}

fn issue_intent(repo: Option<&str>) -> ActionIntent {
    ActionIntent::CreateIssue {
        repo: repo.map(String::from),
        title: "Bug: crash on login".to_string(),
        body: None,
        labels: vec![],
    }
}

#[tokio::test]
async fn propose_returns_preview_and_confirm_buttons() {
    let f = fixture();
    connect(&f, "u1");

    let proposal = f
        .workflow
        .propose("u1", issue_intent(Some("acme/widgets")))
        .await
        .unwrap();

    assert!(proposal.preview.contains("Bug: crash on login"));
    assert!(proposal.preview.contains("acme/widgets"));
    let row = &proposal.controls.rows[0];
    assert_eq!(row[0].callback, format!("action:confirm:{}", proposal.pending_id));
    assert_eq!(row[1].callback, format!("action:cancel:{}", proposal.pending_id));
    // Nothing executed at propose time for a plain issue.
    assert!(f.host.calls().is_empty());
}

#[tokio::test]
async fn confirm_executes_once_then_row_is_gone() {
    let f = fixture();
    connect(&f, "u1");
    let proposal = f
        .workflow
        .propose("u1", issue_intent(Some("acme/widgets")))
        .await
        .unwrap();

    let msg = f.workflow.confirm("u1", proposal.pending_id).await.unwrap();
    assert!(msg.contains("https://github.com/acme/widgets/issues/7"));
    assert_eq!(f.host.calls(), vec!["create_issue"]);
    assert!(f.workflow.store().get(proposal.pending_id).unwrap().is_none());

    // Second confirm observes "not found" and triggers no second call.
    let err = f.workflow.confirm("u1", proposal.pending_id).await.unwrap_err();
    assert!(matches!(err, ActionError::NotFound));
    assert_eq!(f.host.calls().len(), 1);
}

#[tokio::test]
async fn expired_action_is_rejected_at_confirm_time_without_any_sweep() {
    let f = fixture();
    connect(&f, "u1");
    let payload = ActionPayload::Github(GithubAction::CreateIssue {
        repo: RepoRef::new("acme", "widgets"),
        title: "stale".to_string(),
        body: String::new(),
        labels: vec![],
    });
    let row = f
        .workflow
        .store()
        .create("u1", &payload, Some(Utc::now() - Duration::minutes(1)))
        .unwrap();

    let err = f.workflow.confirm("u1", row.id).await.unwrap_err();
    assert!(matches!(err, ActionError::Expired));
    assert!(f.host.calls().is_empty());
    assert!(f.workflow.store().get(row.id).unwrap().is_none());
}

#[tokio::test]
async fn other_users_cannot_confirm_or_cancel() {
    let f = fixture();
    connect(&f, "alice");
    let proposal = f
        .workflow
        .propose("alice", issue_intent(Some("acme/widgets")))
        .await
        .unwrap();

    let err = f.workflow.confirm("mallory", proposal.pending_id).await.unwrap_err();
    assert!(matches!(err, ActionError::NotFound));
    assert!(f.host.calls().is_empty());

    // Cancel by a non-owner acks politely but leaves the row alone.
    f.workflow.cancel("mallory", proposal.pending_id).unwrap();
    assert!(f.workflow.store().get(proposal.pending_id).unwrap().is_some());

    // The owner can still confirm.
    f.workflow.confirm("alice", proposal.pending_id).await.unwrap();
}

#[tokio::test]
async fn explicit_repo_mention_overrides_and_updates_default() {
    let f = fixture();
    connect(&f, "u1");
    f.users.set_default_repo("u1", "owner1/repo1").unwrap();

    let proposal = f
        .workflow
        .propose("u1", issue_intent(Some("owner2/repo2")))
        .await
        .unwrap();

    assert!(proposal.preview.contains("owner2/repo2"));
    let user = f.users.get("u1").unwrap().unwrap();
    assert_eq!(user.default_repo.as_deref(), Some("owner2/repo2"));

    match f
        .workflow
        .store()
        .get(proposal.pending_id)
        .unwrap()
        .unwrap()
        .payload
    {
        ActionPayload::Github(GithubAction::CreateIssue { repo, .. }) => {
            assert_eq!(repo.slug(), "owner2/repo2");
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn saved_default_is_used_when_no_repo_is_named() {
    let f = fixture();
    connect(&f, "u1");
    f.users.set_default_repo("u1", "acme/widgets").unwrap();

    let proposal = f.workflow.propose("u1", issue_intent(None)).await.unwrap();
    assert!(proposal.preview.contains("acme/widgets"));
}

#[tokio::test]
async fn missing_repo_fails_propose_without_creating_a_row() {
    let f = fixture();
    connect(&f, "u1");

    let err = f.workflow.propose("u1", issue_intent(None)).await.unwrap_err();
    assert!(matches!(err, ActionError::InvalidInput(_)));
    assert!(err.user_message().contains("default repo"));
    // No row was written: id 1 would have been the first.
    assert!(f.workflow.store().get(1).unwrap().is_none());
}

#[tokio::test]
async fn empty_title_fails_propose() {
    let f = fixture();
    connect(&f, "u1");
    let intent = ActionIntent::CreateIssue {
        repo: Some("acme/widgets".to_string()),
        title: "   ".to_string(),
        body: None,
        labels: vec![],
    };
    let err = f.workflow.propose("u1", intent).await.unwrap_err();
    assert!(matches!(err, ActionError::InvalidInput(_)));
}

#[tokio::test]
async fn confirm_without_credentials_reports_not_connected() {
    let f = fixture();
    f.users.ensure("u1", "Test").unwrap();

    let proposal = f
        .workflow
        .propose("u1", issue_intent(Some("acme/widgets")))
        .await
        .unwrap();
    let err = f.workflow.confirm("u1", proposal.pending_id).await.unwrap_err();
    assert!(matches!(err, ActionError::NotConnected));
    assert!(f.host.calls().is_empty());
}

fn edit_fixture(fail_put_path: Option<&str>, diff: &str) -> Fixture {
    let host = MockHost {
        fail_put_path: fail_put_path.map(String::from),
        ..Default::default()
    }
    .with_file("src/lib.rs", "fn main() {\n    old();\n}\n", "sha-lib");
    fixture_with(
        host,
        vec![FileEdit {
            path: "src/lib.rs".to_string(),
            diff: diff.to_string(),
        }],
    )
}

const GOOD_DIFF: &str = " fn main() {\n-    old();\n+    new();\n }";
const BAD_DIFF: &str = " fn main() {\n-    never_there();\n+    new();\n }";

#[tokio::test]
async fn edit_code_propose_stages_edited_content() {
    let f = edit_fixture(None, GOOD_DIFF);
    connect(&f, "u1");

    let intent = ActionIntent::EditCode {
        repo: Some("acme/widgets".to_string()),
        files: vec!["src/lib.rs".to_string()],
        instructions: "rename old() to new()".to_string(),
        direct_commit: false,
    };
    let proposal = f.workflow.propose("u1", intent).await.unwrap();
    assert!(proposal.preview.contains("src/lib.rs"));

    match f
        .workflow
        .store()
        .get(proposal.pending_id)
        .unwrap()
        .unwrap()
        .payload
    {
        ActionPayload::Github(GithubAction::EditCode { files, .. }) => {
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].base_sha, "sha-lib");
            let content = base64::engine::general_purpose::STANDARD
                .decode(&files[0].content_b64)
                .unwrap();
            assert_eq!(
                String::from_utf8(content).unwrap(),
                "fn main() {\n    new();\n}\n"
            );
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn edit_code_with_unmatched_context_fails_before_any_row() {
    let f = edit_fixture(None, BAD_DIFF);
    connect(&f, "u1");

    let intent = ActionIntent::EditCode {
        repo: Some("acme/widgets".to_string()),
        files: vec!["src/lib.rs".to_string()],
        instructions: "rename".to_string(),
        direct_commit: false,
    };
    let err = f.workflow.propose("u1", intent).await.unwrap_err();
    assert!(matches!(err, ActionError::DiffApply(_)));
    assert!(f.workflow.store().get(1).unwrap().is_none());
}

#[tokio::test]
async fn edit_code_rejects_too_many_files() {
    let f = fixture();
    connect(&f, "u1");
    let intent = ActionIntent::EditCode {
        repo: Some("acme/widgets".to_string()),
        files: (0..5).map(|i| format!("f{i}.rs")).collect(),
        instructions: "whatever".to_string(),
        direct_commit: false,
    };
    let err = f.workflow.propose("u1", intent).await.unwrap_err();
    assert!(matches!(err, ActionError::InvalidInput(_)));
}

#[tokio::test]
async fn confirmed_edit_branches_writes_and_opens_pr() {
    let f = edit_fixture(None, GOOD_DIFF);
    connect(&f, "u1");

    let intent = ActionIntent::EditCode {
        repo: Some("acme/widgets".to_string()),
        files: vec!["src/lib.rs".to_string()],
        instructions: "rename old() to new()".to_string(),
        direct_commit: false,
    };
    let proposal = f.workflow.propose("u1", intent).await.unwrap();
    let msg = f.workflow.confirm("u1", proposal.pending_id).await.unwrap();
    assert!(msg.contains("https://github.com/acme/widgets/pull/42"));

    let calls = f.host.calls();
    assert!(calls.iter().any(|c| c.starts_with("create_branch:butler/edit-")));
    assert!(calls.iter().any(|c| c.starts_with("put_file:src/lib.rs@butler/edit-")));
    assert_eq!(calls.last().unwrap(), "create_pull_request");
}

#[tokio::test]
async fn confirmed_direct_commit_skips_branch_and_pr() {
    let f = edit_fixture(None, GOOD_DIFF);
    connect(&f, "u1");

    let intent = ActionIntent::EditCode {
        repo: Some("acme/widgets".to_string()),
        files: vec!["src/lib.rs".to_string()],
        instructions: "rename".to_string(),
        direct_commit: true,
    };
    let proposal = f.workflow.propose("u1", intent).await.unwrap();
    let msg = f.workflow.confirm("u1", proposal.pending_id).await.unwrap();
    assert!(msg.contains("main"));

    let calls = f.host.calls();
    assert!(calls.contains(&"put_file:src/lib.rs@main".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("create_branch")));
    assert!(!calls.contains(&"create_pull_request".to_string()));
}

#[tokio::test]
async fn failed_write_names_the_file_and_leaves_no_pending_row() {
    let f = edit_fixture(Some("src/lib.rs"), GOOD_DIFF);
    connect(&f, "u1");

    let intent = ActionIntent::EditCode {
        repo: Some("acme/widgets".to_string()),
        files: vec!["src/lib.rs".to_string()],
        instructions: "rename".to_string(),
        direct_commit: true,
    };
    let proposal = f.workflow.propose("u1", intent).await.unwrap();
    let err = f.workflow.confirm("u1", proposal.pending_id).await.unwrap_err();
    assert!(err.user_message().contains("src/lib.rs"));
    // At-most-once: the row is gone even though execution failed.
    assert!(f.workflow.store().get(proposal.pending_id).unwrap().is_none());
    let retry = f.workflow.confirm("u1", proposal.pending_id).await.unwrap_err();
    assert!(matches!(retry, ActionError::NotFound));
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let f = fixture();
    connect(&f, "u1");
    let proposal = f
        .workflow
        .propose("u1", issue_intent(Some("acme/widgets")))
        .await
        .unwrap();

    let first = f.workflow.cancel("u1", proposal.pending_id).unwrap();
    let second = f.workflow.cancel("u1", proposal.pending_id).unwrap();
    assert_eq!(first, second);
    assert!(f.workflow.store().get(proposal.pending_id).unwrap().is_none());
}

#[tokio::test]
async fn oauth_connect_roundtrip_stores_token_and_consumes_state() {
    let f = fixture();

    let url = f.workflow.begin_connect("u7", "Grace").unwrap();
    let state = url.rsplit("state=").next().unwrap().to_string();

    let msg = f.workflow.complete_connect(&state, "authcode").await.unwrap();
    assert!(msg.contains("connected"));
    assert_eq!(
        f.users.github_token("u7", &f.seal).unwrap().as_deref(),
        Some("gho_authcode")
    );

    // The state is single-use.
    let err = f.workflow.complete_connect(&state, "authcode").await.unwrap_err();
    assert!(matches!(err, ActionError::NotFound));
}

#[tokio::test]
async fn oauth_unknown_state_is_rejected() {
    let f = fixture();
    let err = f.workflow.complete_connect("bogus", "code").await.unwrap_err();
    assert!(matches!(err, ActionError::NotFound));
}
