use std::time::Duration;

/// OpenAI-compatible endpoint used to regenerate failing files.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Base URL, e.g. `http://localhost:8080/v1`
    pub url: String,
    pub model: String,
    /// Bearer token; local servers usually need none
    pub api_key: Option<String>,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl AgentConfig {
    /// Build from `PREVIEW_AGENT_*` values supplied by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: lookup("PREVIEW_AGENT_URL").unwrap_or_else(|| "http://localhost:8080/v1".into()),
            model: lookup("PREVIEW_AGENT_MODEL").unwrap_or_else(|| "qwen2.5-coder-32b".into()),
            api_key: lookup("PREVIEW_AGENT_API_KEY").filter(|k| !k.is_empty()),
            request_timeout_secs: lookup("PREVIEW_AGENT_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(180),
            temperature: lookup("PREVIEW_AGENT_TEMPERATURE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.2),
            max_tokens: lookup("PREVIEW_AGENT_MAX_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8192),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full chat-completions URL.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.url.trim_end_matches('/'))
    }
}
