use std::time::Duration;

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Message;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// §7 error taxonomy, restricted to what the backend client itself can
/// observe — the worker decides the user-visible text, this just
/// distinguishes the cases it needs to distinguish.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connect/read timeout")]
    Timeout,
    #[error("transport error: {0}")]
    Network(String),
    #[error("non-200 response {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed response body: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

impl BackendError {
    /// §7 user-visible text table.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Timeout => "无法连接... / AI 生成超时…".to_string(),
            BackendError::Network(_) => "后端服务连接中断".to_string(),
            BackendError::Http { status, body } => {
                let truncated: String = body.chars().take(100).collect();
                format!("API Error {status}: {truncated}")
            }
            BackendError::Malformed(_) => "系统内部处理错误".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
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

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    conversation_id: uuid::Uuid,
    messages: &'a [Message],
    files: Option<&'a [String]>,
}

/// Thin HTTP client for the two node-facing endpoints of §6.3. One instance
/// is shared across a worker's whole lifetime — `reqwest::Client` pools
/// connections internally, matching the teacher's convention of building
/// the client once in the deployment layer and handing out references.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new() -> BackendClient {
        BackendClient {
            http: reqwest::Client::new(),
        }
    }

    /// §4.3 step 4: relay each local upload to `{node_base}/upload`.
    pub async fn upload_files(
        &self,
        node_base: &str,
        file_paths: &[String],
    ) -> Result<Vec<String>, BackendError> {
        let mut form = multipart::Form::new();
        for path in file_paths {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| BackendError::Network(e.to_string()))?;
            let filename = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            let part = multipart::Part::bytes(bytes).file_name(filename);
            form = form.part("files", part);
        }

        let url = format!("{node_base}/upload");
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http { status, body });
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        if parsed.files.is_empty() {
            return Err(BackendError::Malformed("empty files array".to_string()));
        }
        Ok(parsed.files)
    }

    /// §4.3 step 6: the OpenAI-compatible chat-completions call.
    pub async fn chat_completions(
        &self,
        node_base: &str,
        model: &str,
        conversation_id: uuid::Uuid,
        messages: &[Message],
        files: Option<&[String]>,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let url = format!("{node_base}/v1/chat/completions");
        let body = ChatRequestBody {
            model,
            conversation_id,
            messages,
            files,
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http { status, body });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BackendError::Malformed("empty choices array".to_string()))
    }
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::new()
    }
}
