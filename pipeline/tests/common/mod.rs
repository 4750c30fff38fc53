//! Shared fixtures: a scripted in-memory browser backend and fake
//! regeneration collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use pipeline::files::{FileSet, GeneratedFile};
use pipeline::heal::{CodeGenerator, GeneratorError, RegenerationRequest, RegenerationResponse};
use pipeline::preview::{
    BrowserEngine, BrowserLauncher, ConsoleLevel, DomSnapshot, PageEvent, PreviewPage,
};
use pipeline::{PreviewConfig, PreviewService, PreviewServiceError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a fake page reports after loading a harness.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    pub events: Vec<PageEvent>,
    pub dom: DomSnapshot,
    /// Never finish navigating
    pub hang: bool,
    /// Fail navigation with this error
    pub navigate_error: Option<String>,
    /// Fail the DOM check with this error
    pub dom_error: Option<String>,
}

impl Scripted {
    pub fn healthy() -> Self {
        Self {
            dom: DomSnapshot {
                text: "Hi".into(),
                boundary_tripped: false,
            },
            ..Self::default()
        }
    }

    pub fn navigate_error(error: &str) -> Self {
        Self {
            navigate_error: Some(error.into()),
            ..Self::healthy()
        }
    }

    pub fn dom_error(error: &str) -> Self {
        Self {
            dom_error: Some(error.into()),
            ..Self::healthy()
        }
    }

    pub fn console_error(text: &str) -> Self {
        Self {
            events: vec![PageEvent::Console {
                level: ConsoleLevel::Error,
                text: text.into(),
            }],
            ..Self::healthy()
        }
    }
}

pub type Script = Arc<dyn Fn(&str) -> Scripted + Send + Sync>;

/// Browser double. The script sees the full harness HTML of each page.
pub struct FakeBrowser {
    script: Script,
    /// Refuse every `open_page` with this error
    open_error: Option<String>,
    pub launches: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub pages_html: Mutex<Vec<String>>,
    pub harness_paths: Mutex<Vec<PathBuf>>,
}

impl FakeBrowser {
    pub fn new(script: impl Fn(&str) -> Scripted + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(script),
            open_error: None,
            launches: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            pages_html: Mutex::new(Vec::new()),
            harness_paths: Mutex::new(Vec::new()),
        })
    }

    pub fn healthy() -> Arc<Self> {
        Self::new(|_| Scripted::healthy())
    }

    /// Browser that launches but cannot open pages.
    pub fn refusing_pages(error: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(|_: &str| Scripted::healthy()),
            open_error: Some(error.to_string()),
            launches: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            pages_html: Mutex::new(Vec::new()),
            harness_paths: Mutex::new(Vec::new()),
        })
    }

    /// Console error whenever the harness contains `needle`.
    pub fn failing_on(needle: &'static str, error: &'static str) -> Arc<Self> {
        Self::new(move |html| {
            if html.contains(needle) {
                Scripted::console_error(error)
            } else {
                Scripted::healthy()
            }
        })
    }

    pub fn open_pages(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }

    pub fn service(self: &Arc<Self>, config: PreviewConfig) -> Arc<PreviewService> {
        Arc::new(PreviewService::with_launcher(
            config,
            Arc::new(FakeLauncher(Arc::clone(self))),
        ))
    }
}

/// Preview settings with no settle wait.
pub fn fast_preview_config() -> PreviewConfig {
    PreviewConfig {
        settle_ms: 0,
        navigation_timeout_ms: 2_000,
        ..PreviewConfig::default()
    }
}

struct FakeLauncher(Arc<FakeBrowser>);

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(
        &self,
        _config: &PreviewConfig,
    ) -> Result<Arc<dyn BrowserEngine>, PreviewServiceError> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeEngine(Arc::clone(&self.0))))
    }
}

struct FakeEngine(Arc<FakeBrowser>);

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn open_page(&self) -> Result<Box<dyn PreviewPage>, PreviewServiceError> {
        if let Some(error) = &self.0.open_error {
            return Err(PreviewServiceError::Page(error.clone()));
        }
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            browser: Arc::clone(&self.0),
            scripted: Scripted::default(),
        }))
    }

    async fn close(&self) -> Result<(), PreviewServiceError> {
        Ok(())
    }
}

struct FakePage {
    browser: Arc<FakeBrowser>,
    scripted: Scripted,
}

#[async_trait]
impl PreviewPage for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<(), PreviewServiceError> {
        let path = PathBuf::from(url.trim_start_matches("file://"));
        let html = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PreviewServiceError::Page(e.to_string()))?;
        self.browser.harness_paths.lock().unwrap().push(path);
        self.browser.pages_html.lock().unwrap().push(html.clone());
        self.scripted = (self.browser.script)(&html);
        if self.scripted.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        match &self.scripted.navigate_error {
            Some(error) => Err(PreviewServiceError::Page(error.clone())),
            None => Ok(()),
        }
    }

    fn drain_events(&mut self) -> Vec<PageEvent> {
        std::mem::take(&mut self.scripted.events)
    }

    async fn probe_dom(&mut self) -> Result<DomSnapshot, PreviewServiceError> {
        match &self.scripted.dom_error {
            Some(error) => Err(PreviewServiceError::Page(error.clone())),
            None => Ok(self.scripted.dom.clone()),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), PreviewServiceError> {
        self.browser.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Generator that answers every request with the same files, optionally
/// after a delay, and counts calls.
pub struct FixedGenerator {
    files: Vec<GeneratedFile>,
    delay: Option<Duration>,
    pub calls: AtomicU32,
    pub requests: Mutex<Vec<RegenerationRequest>>,
}

impl FixedGenerator {
    pub fn new(files: FileSet) -> Arc<Self> {
        Arc::new(Self {
            files: files.into_files(),
            delay: None,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(files: FileSet, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            files: files.into_files(),
            delay: Some(delay),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeGenerator for FixedGenerator {
    async fn regenerate(
        &self,
        request: &RegenerationRequest,
    ) -> Result<RegenerationResponse, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(RegenerationResponse::new(self.files.clone()))
    }
}

/// Generator that must never be called.
pub struct UnusedGenerator;

#[async_trait]
impl CodeGenerator for UnusedGenerator {
    async fn regenerate(
        &self,
        request: &RegenerationRequest,
    ) -> Result<RegenerationResponse, GeneratorError> {
        panic!("unexpected regeneration request: {:?}", request.fix_prompt);
    }
}

/// The canonical single-file app.
pub fn example_app() -> FileSet {
    FileSet::from_map([(
        "App.tsx",
        "import React from 'react'; export default function App(){return <div>Hi</div>}",
    )])
}
