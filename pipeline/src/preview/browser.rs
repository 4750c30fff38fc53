//! Browser backend seam.
//!
//! The preview service only talks to these traits. The Chromium (CDP)
//! implementation lives in `chromium.rs`; tests drive the service with
//! scripted in-memory pages.

use super::{PreviewConfig, PreviewServiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleLevel {
    Log,
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Instrumentation captured from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Console { level: ConsoleLevel, text: String },
    Exception { message: String },
    RequestFailed { url: String, error: String },
}

/// Rendered page state read after the settle window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    /// Visible body text
    pub text: String,
    /// Whether the error-boundary fallback element is present
    pub boundary_tripped: bool,
}

/// Starts a browser.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        config: &PreviewConfig,
    ) -> Result<Arc<dyn BrowserEngine>, PreviewServiceError>;
}

/// A running browser shared by all renders.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a fresh, isolated page.
    async fn open_page(&self) -> Result<Box<dyn PreviewPage>, PreviewServiceError>;

    async fn close(&self) -> Result<(), PreviewServiceError>;
}

/// One page, owned by exactly one render call.
#[async_trait]
pub trait PreviewPage: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), PreviewServiceError>;

    /// Events captured since the last drain.
    fn drain_events(&mut self) -> Vec<PageEvent>;

    async fn probe_dom(&mut self) -> Result<DomSnapshot, PreviewServiceError>;

    async fn close(self: Box<Self>) -> Result<(), PreviewServiceError>;
}

/// Launcher used when no browser backend is compiled in.
pub struct UnavailableLauncher;

#[async_trait]
impl BrowserLauncher for UnavailableLauncher {
    async fn launch(
        &self,
        _config: &PreviewConfig,
    ) -> Result<Arc<dyn BrowserEngine>, PreviewServiceError> {
        Err(PreviewServiceError::Unavailable(
            "built without the `chromium` feature".to_string(),
        ))
    }
}

/// The launcher selected by cargo features.
pub fn default_launcher() -> Arc<dyn BrowserLauncher> {
    #[cfg(feature = "chromium")]
    {
        Arc::new(super::chromium::ChromiumLauncher)
    }
    #[cfg(not(feature = "chromium"))]
    {
        Arc::new(UnavailableLauncher)
    }
}

/// JavaScript evaluated in the page to build a [`DomSnapshot`].
pub fn dom_probe_script() -> String {
    format!(
        "(() => ({{ text: document.body ? document.body.innerText : '', boundaryTripped: !!document.querySelector('[{}]') }}))()",
        super::ERROR_BOUNDARY_MARKER
    )
}
