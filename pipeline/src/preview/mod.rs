//! Headless preview renderer.
//!
//! ```text
//! PreviewService ─── owns ──► BrowserEngine (lazy, shared, Mutex-guarded slot)
//!      │                          │
//!      │  render(bundle, entry)   └─ open_page() ─► PreviewPage (one per call)
//!      ▼
//!   Harness (temp dir) ─► navigate ─► settle ─► drain events ─► DOM probe
//! ```
//!
//! Infrastructure problems (browser will not launch, page cannot be opened)
//! are [`PreviewServiceError`]s; the pipeline runner records them as a
//! [`PreviewIssueKind::RendererFailure`]. Problems with the app under preview
//! are [`PreviewIssue`]s inside an invalid [`PreviewResult`].

pub mod browser;
#[cfg(feature = "chromium")]
pub mod chromium;
pub mod harness;
pub mod service;

pub use browser::{BrowserEngine, BrowserLauncher, ConsoleLevel, DomSnapshot, PageEvent, PreviewPage};
pub use harness::Harness;
pub use service::PreviewService;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Attribute set on the error-boundary fallback element.
pub const ERROR_BOUNDARY_MARKER: &str = "data-preview-error-boundary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewIssueKind {
    ConsoleError,
    ReactError,
    NetworkError,
    UncaughtException,
    Timeout,
    /// The renderer could not complete its checks
    RendererFailure,
}

impl std::fmt::Display for PreviewIssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsoleError => write!(f, "console_error"),
            Self::ReactError => write!(f, "react_error"),
            Self::NetworkError => write!(f, "network_error"),
            Self::UncaughtException => write!(f, "uncaught_exception"),
            Self::Timeout => write!(f, "timeout"),
            Self::RendererFailure => write!(f, "renderer_failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewIssue {
    pub kind: PreviewIssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl PreviewIssue {
    pub fn new(kind: PreviewIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn render(&self) -> String {
        format!("[{}] {}", self.kind, self.message)
    }
}

impl PreviewResult {
    /// Invalid result for a render that never produced one.
    pub fn failed(issue: PreviewIssue) -> Self {
        Self {
            is_valid: false,
            errors: vec![issue],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub is_valid: bool,
    pub errors: Vec<PreviewIssue>,
    pub warnings: Vec<String>,
    pub console_messages: Vec<ConsoleMessage>,
}

/// Infrastructure failures of the preview service itself.
#[derive(Debug, thiserror::Error)]
pub enum PreviewServiceError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Browser page error: {0}")]
    Page(String),

    #[error("Preview harness I/O error: {0}")]
    Harness(#[from] std::io::Error),

    #[error("Bundle has no executable script (strategy: {0})")]
    NotRenderable(String),

    #[error("Preview backend unavailable: {0}")]
    Unavailable(String),
}

/// Preview renderer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub react_url: String,
    pub react_dom_url: String,
    /// Hosts whose failed loads are not reported as network errors
    pub cdn_hosts: Vec<String>,
    pub navigation_timeout_ms: u64,
    pub settle_ms: u64,
    pub launch_timeout_ms: u64,
    /// Visible-text phrases that indicate a failed render
    pub failure_markers: Vec<String>,
    /// Phrases removed from page text before markers are searched
    pub allowed_phrases: Vec<String>,
    pub chrome_executable: Option<PathBuf>,
    pub no_sandbox: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            react_url: "https://unpkg.com/react@18/umd/react.development.js".to_string(),
            react_dom_url: "https://unpkg.com/react-dom@18/umd/react-dom.development.js"
                .to_string(),
            cdn_hosts: ["unpkg.com", "cdn.jsdelivr.net", "esm.sh", "cdnjs.cloudflare.com"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            navigation_timeout_ms: 15_000,
            settle_ms: 3_000,
            launch_timeout_ms: 30_000,
            failure_markers: [
                "Something went wrong",
                "Uncaught Error",
                "Minified React error",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allowed_phrases: Vec::new(),
            chrome_executable: None,
            no_sandbox: false,
        }
    }
}

impl PreviewConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    /// Whether `url` is served from a known CDN host.
    pub fn is_cdn_url(&self, url: &str) -> bool {
        host_of(url).is_some_and(|host| {
            self.cdn_hosts
                .iter()
                .any(|cdn| host == cdn || host.ends_with(&format!(".{}", cdn)))
        })
    }
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}
