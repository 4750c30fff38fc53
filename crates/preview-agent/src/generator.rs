//! Regeneration over an OpenAI-compatible chat-completions endpoint.
//!
//! The model is asked to answer with a JSON document listing the files it
//! rewrote. Code fences and either a list of `{path, content}` objects or a
//! `path -> content` map are accepted.

use crate::config::AgentConfig;
use async_trait::async_trait;
use pipeline::files::GeneratedFile;
use pipeline::heal::{CodeGenerator, GeneratorError, RegenerationRequest, RegenerationResponse};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, info};

static FENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n(.*?)```").unwrap());

const SYSTEM_PROMPT: &str = r#"You repair React + TypeScript apps that failed automated verification.
Return ONLY a JSON object of the form:
{"files": [{"path": "src/App.tsx", "content": "..."}], "note": "one line on what changed"}
Rules:
- Return complete file contents, never diffs.
- Only return files you changed.
- Keep the default export of every component.
- Import only from react, react-dom, lucide-react or files in the project."#;

pub struct HttpCodeGenerator {
    config: AgentConfig,
    client: reqwest::Client,
}

impl HttpCodeGenerator {
    pub fn new(config: AgentConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GeneratorError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn request_body(&self, request: &RegenerationRequest) -> Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(request)},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }
}

#[async_trait]
impl CodeGenerator for HttpCodeGenerator {
    async fn regenerate(
        &self,
        request: &RegenerationRequest,
    ) -> Result<RegenerationResponse, GeneratorError> {
        let start = Instant::now();
        let mut http = self
            .client
            .post(self.config.completions_url())
            .json(&self.request_body(request));
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| {
            if e.is_timeout() {
                GeneratorError::Timeout(self.config.request_timeout_secs * 1000)
            } else {
                GeneratorError::Request(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Request(format!(
                "completion endpoint error ({}): {}",
                status, body
            )));
        }

        let resp_json: Value = response
            .json()
            .await
            .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("");
        debug!(chars = content.len(), "Completion received");

        let parsed = parse_files(content)?;
        info!(
            attempt = request.attempt_number,
            files = parsed.files.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Regeneration response parsed"
        );
        Ok(parsed)
    }
}

/// Prompt body for one regeneration attempt.
pub fn user_prompt(request: &RegenerationRequest) -> String {
    let mut prompt = format!(
        "## Original request\n\n{}\n\n## Attempt\n\n{}\n\n## Errors\n\n{}\n\n## Instructions\n\n{}\n",
        request.original_prompt,
        request.attempt_number,
        request.error_context,
        request.fix_prompt,
    );
    for file in &request.failed_files {
        prompt.push_str(&format!("\n### {}\n\n```{}\n{}\n```\n", file.path, file.language, file.content));
    }
    prompt
}

/// Extract the regenerated files from a completion.
pub fn parse_files(content: &str) -> Result<RegenerationResponse, GeneratorError> {
    let body = FENCE_PATTERN
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(content)
        .trim();

    let value: Value = serde_json::from_str(body)
        .map_err(|e| GeneratorError::InvalidResponse(format!("not JSON: {}", e)))?;

    let (files_value, note) = match &value {
        Value::Array(_) => (Some(&value), None),
        Value::Object(obj) => (
            obj.get("files"),
            obj.get("note").and_then(Value::as_str).map(str::to_string),
        ),
        _ => (None, None),
    };

    let files = match files_value {
        Some(Value::Array(items)) => items
            .iter()
            .map(file_from_entry)
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Object(map)) => map
            .iter()
            .map(|(path, content)| match content.as_str() {
                Some(text) => Ok(GeneratedFile::new(path.as_str(), text)),
                None => Err(GeneratorError::InvalidResponse(format!(
                    "content of {} is not a string",
                    path
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(GeneratorError::InvalidResponse(
                "missing \"files\" in completion".into(),
            ))
        }
    };

    if files.is_empty() {
        return Err(GeneratorError::InvalidResponse("completion returned no files".into()));
    }

    Ok(RegenerationResponse { files, note })
}

fn file_from_entry(entry: &Value) -> Result<GeneratedFile, GeneratorError> {
    let path = entry["path"].as_str();
    let content = entry["content"].as_str();
    match (path, content) {
        (Some(path), Some(content)) if !path.is_empty() => Ok(GeneratedFile::new(path, content)),
        _ => Err(GeneratorError::InvalidResponse(format!(
            "file entry needs string path and content: {}",
            entry
        ))),
    }
}
