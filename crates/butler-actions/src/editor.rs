//! Code-editing collaborator: file contents + instructions in, diffs out.

use std::time::Duration;

use async_trait::async_trait;
use butler_core::config::{EditorConfig, EXTERNAL_CALL_TIMEOUT_SECS};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ActionError, Result};

/// One proposed edit: the target path and a V4A diff against its current
/// content. A single file may receive several edits.
#[derive(Debug, Clone, Deserialize)]
pub struct FileEdit {
    pub path: String,
    pub diff: String,
}

/// The editing collaborator. Opaque to the workflow: it sees file contents
/// and natural-language instructions, and answers with diffs that must
/// apply exactly or the whole proposal fails.
#[async_trait]
pub trait CodeEditor: Send + Sync {
    async fn edit(&self, files: &[(String, String)], instructions: &str) -> Result<Vec<FileEdit>>;
}

/// OpenAI-compatible chat-completions implementation.
pub struct LlmCodeEditor {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

const EDITOR_SYSTEM_PROMPT: &str = "You are a precise code editor. You receive files and an \
instruction. Respond with ONLY a JSON array of {\"path\", \"diff\"} objects. Each diff uses \
restricted unified-diff format: lines prefixed with ' ' (context), '+' (add), '-' (remove); \
hunks separated by '@@' lines. Context lines must be copied verbatim from the file.";

impl LlmCodeEditor {
    pub fn new(config: &EditorConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ActionError::InvalidInput("code editing is not configured".to_string())
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(EXTERNAL_CALL_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl CodeEditor for LlmCodeEditor {
    async fn edit(&self, files: &[(String, String)], instructions: &str) -> Result<Vec<FileEdit>> {
        let mut user_prompt = String::new();
        for (path, content) in files {
            user_prompt.push_str(&format!("=== {path} ===\n{content}\n\n"));
        }
        user_prompt.push_str(&format!("Instruction: {instructions}"));

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": EDITOR_SYSTEM_PROMPT },
                    { "role": "user", "content": user_prompt },
                ],
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ActionError::Timeout
                } else {
                    ActionError::External(format!("editor request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ActionError::External(format!(
                "editor returned status {status}"
            )));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ActionError::External(format!("bad editor response: {e}")))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        // Tolerate a markdown fence around the JSON array.
        let trimmed = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        serde_json::from_str::<Vec<FileEdit>>(trimmed)
            .map_err(|e| ActionError::External(format!("editor did not return diffs: {e}")))
    }
}
