//! Chromium backend over the DevTools protocol.

use super::browser::{
    dom_probe_script, BrowserEngine, BrowserLauncher, ConsoleLevel, DomSnapshot, PageEvent,
    PreviewPage,
};
use super::{PreviewConfig, PreviewServiceError};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{EventLoadingFailed, EventRequestWillBeSent};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

fn page_err(e: impl std::fmt::Display) -> PreviewServiceError {
    PreviewServiceError::Page(e.to_string())
}

pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(
        &self,
        config: &PreviewConfig,
    ) -> Result<Arc<dyn BrowserEngine>, PreviewServiceError> {
        let mut builder = BrowserConfig::builder().request_timeout(config.navigation_timeout());
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(PreviewServiceError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| PreviewServiceError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "CDP handler error");
                }
            }
        });

        tracing::info!("Headless Chromium launched");
        Ok(Arc::new(ChromiumEngine {
            browser: Mutex::new(Some(browser)),
            handler_task,
        }))
    }
}

pub struct ChromiumEngine {
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_page(&self) -> Result<Box<dyn PreviewPage>, PreviewServiceError> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard
                .as_ref()
                .ok_or_else(|| PreviewServiceError::Unavailable("browser is shut down".into()))?;
            browser.new_page("about:blank").await.map_err(page_err)?
        };
        Ok(Box::new(ChromiumPage::attach(page).await?))
    }

    async fn close(&self) -> Result<(), PreviewServiceError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map_err(|e| PreviewServiceError::Launch(e.to_string()));
        if let Err(e) = browser.wait().await {
            tracing::warn!(error = %e, "Waiting for Chromium to exit failed");
        }
        self.handler_task.abort();
        tracing::info!("Headless Chromium closed");
        closed.map(|_| ())
    }
}

enum NetworkEvent {
    Sent { id: String, url: String },
    Failed { id: String, error: String },
}

pub struct ChromiumPage {
    page: Option<Page>,
    events: mpsc::UnboundedReceiver<PageEvent>,
    network: mpsc::UnboundedReceiver<NetworkEvent>,
    request_urls: HashMap<String, String>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChromiumPage {
    async fn attach(page: Page) -> Result<Self, PreviewServiceError> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (net_tx, network) = mpsc::unbounded_channel();
        let mut tasks = Vec::new();

        let mut console = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(page_err)?;
        let tx = event_tx.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = console.next().await {
                let level = match event.r#type {
                    ConsoleApiCalledType::Error | ConsoleApiCalledType::Assert => ConsoleLevel::Error,
                    ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
                    ConsoleApiCalledType::Info => ConsoleLevel::Info,
                    ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
                    _ => ConsoleLevel::Log,
                };
                let text = event
                    .args
                    .iter()
                    .map(remote_text)
                    .collect::<Vec<_>>()
                    .join(" ");
                if tx.send(PageEvent::Console { level, text }).is_err() {
                    break;
                }
            }
        }));

        let mut exceptions = page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(page_err)?;
        let tx = event_tx;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                let details = &event.exception_details;
                let message = details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                if tx.send(PageEvent::Exception { message }).is_err() {
                    break;
                }
            }
        }));

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(page_err)?;
        let tx = net_tx.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let sent = NetworkEvent::Sent {
                    id: event.request_id.inner().clone(),
                    url: event.request.url.clone(),
                };
                if tx.send(sent).is_err() {
                    break;
                }
            }
        }));

        let mut failures = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(page_err)?;
        let tx = net_tx;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = failures.next().await {
                let failed = NetworkEvent::Failed {
                    id: event.request_id.inner().clone(),
                    error: event.error_text.clone(),
                };
                if tx.send(failed).is_err() {
                    break;
                }
            }
        }));

        Ok(Self {
            page: Some(page),
            events,
            network,
            request_urls: HashMap::new(),
            tasks,
        })
    }

    fn page(&self) -> Result<&Page, PreviewServiceError> {
        self.page
            .as_ref()
            .ok_or_else(|| PreviewServiceError::Page("page already closed".into()))
    }
}

fn remote_text(object: &RemoteObject) -> String {
    match &object.value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(value) => value.to_string(),
        None => object.description.clone().unwrap_or_default(),
    }
}

#[async_trait]
impl PreviewPage for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> Result<(), PreviewServiceError> {
        self.page()?.goto(url).await.map_err(page_err)?;
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<PageEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }

        // Failures are joined to request URLs only after every queued
        // `requestWillBeSent` has been seen.
        let mut failed = Vec::new();
        while let Ok(event) = self.network.try_recv() {
            match event {
                NetworkEvent::Sent { id, url } => {
                    self.request_urls.insert(id, url);
                }
                NetworkEvent::Failed { id, error } => failed.push((id, error)),
            }
        }
        for (id, error) in failed {
            let url = self
                .request_urls
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("request {}", id));
            drained.push(PageEvent::RequestFailed { url, error });
        }
        drained
    }

    async fn probe_dom(&mut self) -> Result<DomSnapshot, PreviewServiceError> {
        self.page()?
            .evaluate(dom_probe_script())
            .await
            .map_err(page_err)?
            .into_value::<DomSnapshot>()
            .map_err(page_err)
    }

    async fn close(mut self: Box<Self>) -> Result<(), PreviewServiceError> {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        match self.page.take() {
            Some(page) => page.close().await.map_err(page_err),
            None => Ok(()),
        }
    }
}
