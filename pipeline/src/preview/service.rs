//! Preview service: owns the browser, renders bundles in isolated pages.

use super::browser::{default_launcher, BrowserEngine, BrowserLauncher, DomSnapshot, PageEvent, PreviewPage};
use super::harness::Harness;
use super::{
    ConsoleLevel, ConsoleMessage, PreviewConfig, PreviewIssue, PreviewIssueKind, PreviewResult,
    PreviewServiceError,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Renders bundles in a shared headless browser.
///
/// The browser is launched lazily on first use (or eagerly via
/// [`init`](Self::init)) and torn down by [`shutdown`](Self::shutdown).
/// Each render gets its own page and its own harness directory; neither
/// outlives the call, including when the render future is dropped.
pub struct PreviewService {
    config: PreviewConfig,
    launcher: Arc<dyn BrowserLauncher>,
    engine: Mutex<Option<Arc<dyn BrowserEngine>>>,
}

impl PreviewService {
    pub fn new(config: PreviewConfig) -> Self {
        Self::with_launcher(config, default_launcher())
    }

    pub fn with_launcher(config: PreviewConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            config,
            launcher,
            engine: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Launch the browser now instead of on first render.
    pub async fn init(&self) -> Result<(), PreviewServiceError> {
        self.engine().await.map(|_| ())
    }

    pub async fn is_running(&self) -> bool {
        self.engine.lock().await.is_some()
    }

    /// Close the browser. A later render relaunches it.
    pub async fn shutdown(&self) -> Result<(), PreviewServiceError> {
        let engine = self.engine.lock().await.take();
        match engine {
            Some(engine) => engine.close().await,
            None => Ok(()),
        }
    }

    async fn engine(&self) -> Result<Arc<dyn BrowserEngine>, PreviewServiceError> {
        let mut slot = self.engine.lock().await;
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let engine = tokio::time::timeout(
            self.config.launch_timeout(),
            self.launcher.launch(&self.config),
        )
        .await
        .map_err(|_| {
            PreviewServiceError::Launch(format!(
                "browser did not start within {}ms",
                self.config.launch_timeout_ms
            ))
        })??;
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Render a bundle script and report runtime failures.
    pub async fn render(
        &self,
        bundle: &str,
        entry_file: &str,
    ) -> Result<PreviewResult, PreviewServiceError> {
        let engine = self.engine().await?;
        let harness = Harness::create(&self.config, bundle, entry_file).await?;
        let mut page = PageGuard::new(engine.open_page().await?);
        let mut collector = IssueCollector::new(&self.config, entry_file);

        let navigation =
            tokio::time::timeout(self.config.navigation_timeout(), page.get()?.navigate(&harness.url()))
                .await;
        let timed_out = match navigation {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                page.close().await;
                return Err(e);
            }
            Err(_) => {
                collector.push(PreviewIssue::new(
                    PreviewIssueKind::Timeout,
                    format!(
                        "Page did not load within {}ms",
                        self.config.navigation_timeout_ms
                    ),
                ));
                true
            }
        };

        if !timed_out {
            tokio::time::sleep(self.config.settle()).await;
        }

        collector.absorb(page.get()?.drain_events());

        if !timed_out {
            match page.get()?.probe_dom().await {
                Ok(snapshot) => collector.scan_dom(&snapshot),
                Err(e) => {
                    tracing::warn!(error = %e, entry = entry_file, "DOM check failed");
                    collector.push(
                        PreviewIssue::new(
                            PreviewIssueKind::RendererFailure,
                            format!("DOM check did not complete: {}", e),
                        )
                        .with_source(entry_file),
                    );
                }
            }
        }

        page.close().await;
        drop(harness);

        let result = collector.finish();
        tracing::info!(
            entry = entry_file,
            valid = result.is_valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Preview render complete"
        );
        Ok(result)
    }
}

/// Closes its page when dropped without an explicit close.
struct PageGuard {
    page: Option<Box<dyn PreviewPage>>,
}

impl PageGuard {
    fn new(page: Box<dyn PreviewPage>) -> Self {
        Self { page: Some(page) }
    }

    fn get(&mut self) -> Result<&mut Box<dyn PreviewPage>, PreviewServiceError> {
        self.page
            .as_mut()
            .ok_or_else(|| PreviewServiceError::Page("page already closed".into()))
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::warn!(error = %e, "Failed to close preview page");
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        tracing::debug!(error = %e, "Deferred page close failed");
                    }
                });
            }
        }
    }
}

/// Turns page events and DOM state into a [`PreviewResult`].
struct IssueCollector<'a> {
    config: &'a PreviewConfig,
    entry_file: &'a str,
    result: PreviewResult,
}

impl<'a> IssueCollector<'a> {
    fn new(config: &'a PreviewConfig, entry_file: &'a str) -> Self {
        Self {
            config,
            entry_file,
            result: PreviewResult::default(),
        }
    }

    fn push(&mut self, issue: PreviewIssue) {
        self.result.errors.push(issue);
    }

    fn absorb(&mut self, events: Vec<PageEvent>) {
        for event in events {
            match event {
                PageEvent::Console { level, text } => {
                    match level {
                        ConsoleLevel::Error => self.push(
                            PreviewIssue::new(PreviewIssueKind::ConsoleError, text.clone())
                                .with_source(self.entry_file),
                        ),
                        ConsoleLevel::Warning => self.result.warnings.push(text.clone()),
                        _ => {}
                    }
                    self.result.console_messages.push(ConsoleMessage { level, text });
                }
                PageEvent::Exception { message } => self.push(
                    PreviewIssue::new(PreviewIssueKind::UncaughtException, message)
                        .with_source(self.entry_file),
                ),
                PageEvent::RequestFailed { url, error } => {
                    if self.config.is_cdn_url(&url) {
                        tracing::debug!(url = %url, "Ignoring failed CDN load");
                        continue;
                    }
                    self.push(
                        PreviewIssue::new(
                            PreviewIssueKind::NetworkError,
                            format!("Failed to load {}: {}", url, error),
                        )
                        .with_source(url),
                    );
                }
            }
        }
    }

    fn scan_dom(&mut self, snapshot: &DomSnapshot) {
        if snapshot.boundary_tripped {
            self.push(
                PreviewIssue::new(
                    PreviewIssueKind::ReactError,
                    format!("Error boundary rendered its fallback: {}", snippet(&snapshot.text)),
                )
                .with_source(self.entry_file),
            );
            return;
        }

        let mut text = snapshot.text.clone();
        for allowed in &self.config.allowed_phrases {
            text = text.replace(allowed.as_str(), "");
        }
        if let Some(marker) = self
            .config
            .failure_markers
            .iter()
            .find(|m| text.contains(m.as_str()))
        {
            self.push(
                PreviewIssue::new(
                    PreviewIssueKind::ReactError,
                    format!("Page shows failure text \"{}\"", marker),
                )
                .with_source(self.entry_file),
            );
        }
    }

    fn finish(mut self) -> PreviewResult {
        self.result.is_valid = self.result.errors.is_empty();
        self.result
    }
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(200).collect();
    if trimmed.chars().count() > 200 {
        out.push('…');
    }
    out
}
