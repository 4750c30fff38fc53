//! Bundles executed in a real headless Chromium.
//!
//! Needs a local Chrome/Chromium and network access for the React UMD
//! builds. Run with `cargo test --test chromium_test -- --ignored`.

#![cfg(feature = "chromium")]

mod common;

use common::example_app;
use pipeline::files::FileSet;
use pipeline::preview::chromium::ChromiumLauncher;
use pipeline::preview::ConsoleLevel;
use pipeline::{Bundler, PreviewConfig, PreviewResult, PreviewService};
use std::sync::Arc;

async fn render_in_chromium(files: &FileSet) -> PreviewResult {
    let artifact = Bundler::default().bundle(files, None).unwrap();
    let service =
        PreviewService::with_launcher(PreviewConfig::default(), Arc::new(ChromiumLauncher));
    let result = service
        .render(artifact.code().unwrap(), &artifact.entry_point)
        .await;
    service.shutdown().await.unwrap();
    result.unwrap()
}

#[tokio::test]
#[ignore = "requires a local Chromium and network access"]
async fn test_example_app_renders_without_console_errors() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    let result = render_in_chromium(&example_app()).await;
    assert!(result.is_valid, "{:?}", result.errors);
    assert!(result.errors.is_empty());
    assert!(
        result
            .console_messages
            .iter()
            .all(|m| m.level != ConsoleLevel::Error),
        "{:?}",
        result.console_messages
    );
}

#[tokio::test]
#[ignore = "requires a local Chromium and network access"]
async fn test_multi_module_app_renders() {
    let files = FileSet::from_map([
        (
            "src/main.tsx",
            "import React from 'react';\nimport { createRoot } from 'react-dom/client';\nimport App from './App';\nimport './index.css';\ncreateRoot(document.getElementById('root')!).render(<App />);\n",
        ),
        (
            "src/App.tsx",
            "import React, { useState } from 'react';\nimport { Counter } from '@/components/Counter';\nexport default function App() {\n  const [n] = useState(2);\n  return <main><Counter start={n} /></main>;\n}\n",
        ),
        (
            "src/components/Counter.tsx",
            "import React from 'react';\nexport function Counter({ start }: { start: number }) {\n  return <span>{start}</span>;\n}\n",
        ),
        ("src/index.css", "body { margin: 0; }"),
    ]);

    let result = render_in_chromium(&files).await;
    assert!(result.is_valid, "{:?}", result.errors);
}

#[tokio::test]
#[ignore = "requires a local Chromium and network access"]
async fn test_throwing_component_is_reported() {
    let files = FileSet::from_map([(
        "App.tsx",
        "import React from 'react';\nexport default function App() {\n  const items: string[] | undefined = undefined;\n  return <ul>{items!.map((i) => <li key={i}>{i}</li>)}</ul>;\n}\n",
    )]);

    let result = render_in_chromium(&files).await;
    assert!(!result.is_valid);
    assert!(!result.errors.is_empty());
}
