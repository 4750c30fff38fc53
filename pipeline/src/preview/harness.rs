//! Per-render HTML harness written to a call-owned temp directory.

use super::{PreviewConfig, ERROR_BOUNDARY_MARKER};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;

static SCRIPT_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(script)").unwrap());

/// A harness file on disk. The directory is removed when this is dropped.
pub struct Harness {
    dir: TempDir,
    path: PathBuf,
}

impl Harness {
    pub async fn create(
        config: &PreviewConfig,
        bundle: &str,
        entry_file: &str,
    ) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("preview-").tempdir()?;
        let path = dir.path().join("index.html");
        tokio::fs::write(&path, render_html(config, bundle, entry_file)).await?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// Neutralize `</script` so bundle text cannot terminate its script tag.
pub fn escape_inline_script(code: &str) -> String {
    SCRIPT_CLOSE.replace_all(code, "<\\/$1").into_owned()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const HOST_SETUP: &str = r#"window.__PREVIEW_EXTERNALS__ = (function () {
  var React = window.React;
  var ReactDOM = window.ReactDOM;
  function jsx(type, props, key) {
    return React.createElement(type, key === undefined ? props : Object.assign({}, props, { key: key }));
  }
  return {
    "react": React,
    "react-dom": ReactDOM,
    "react-dom/client": ReactDOM,
    "react/jsx-runtime": { jsx: jsx, jsxs: jsx, Fragment: React.Fragment }
  };
})();"#;

fn mount_script() -> String {
    format!(
        r#"(function () {{
  var React = window.React;
  var ReactDOM = window.ReactDOM;
  var entry = globalThis.__PREVIEW_ENTRY__;
  var Component = entry && (entry.__esModule ? entry.default : (entry.default || entry));
  var renderable = typeof Component === "function" ||
    (Component !== null && typeof Component === "object" && Component.$$typeof !== undefined);
  if (!renderable) return;
  class PreviewErrorBoundary extends React.Component {{
    constructor(props) {{
      super(props);
      this.state = {{ error: null }};
    }}
    static getDerivedStateFromError(error) {{
      return {{ error: error }};
    }}
    componentDidCatch(error) {{
      console.error("Preview render error: " + (error && error.message ? error.message : String(error)));
    }}
    render() {{
      if (this.state.error) {{
        return React.createElement(
          "div",
          {{ "{marker}": "true", role: "alert" }},
          "Render failed: " + (this.state.error.message || String(this.state.error))
        );
      }}
      return this.props.children;
    }}
  }}
  ReactDOM.createRoot(document.getElementById("root")).render(
    React.createElement(PreviewErrorBoundary, null, React.createElement(Component))
  );
}})();"#,
        marker = ERROR_BOUNDARY_MARKER
    )
}

/// Harness page: React UMD, host externals, the bundle, then a mount of the
/// entry's default export inside an error boundary.
pub fn render_html(config: &PreviewConfig, bundle: &str, entry_file: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Preview: {title}</title>
<script crossorigin src="{react}"></script>
<script crossorigin src="{react_dom}"></script>
<script>
{host}
</script>
</head>
<body>
<div id="root"></div>
<script>
{bundle}
</script>
<script>
{mount}
</script>
</body>
</html>
"#,
        title = escape_html(entry_file),
        react = escape_html(&config.react_url),
        react_dom = escape_html(&config.react_dom_url),
        host = HOST_SETUP,
        bundle = escape_inline_script(bundle),
        mount = mount_script(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_cannot_close_script_tag() {
        let escaped = escape_inline_script("const s = \"</script><script>alert(1)</SCRIPT>\";");
        assert!(!escaped.to_ascii_lowercase().contains("</script"));
        assert!(escaped.contains("<\\/script"));
        assert!(escaped.contains("<\\/SCRIPT"));
    }

    #[test]
    fn test_html_layout() {
        let config = PreviewConfig::default();
        let html = render_html(&config, "globalThis.__PREVIEW_ENTRY__ = {};", "src/App.tsx");
        let react = html.find(&config.react_url).unwrap();
        let host = html.find("__PREVIEW_EXTERNALS__").unwrap();
        let bundle = html.find("globalThis.__PREVIEW_ENTRY__ = {}").unwrap();
        let mount = html.find("PreviewErrorBoundary").unwrap();
        assert!(react < host && host < bundle && bundle < mount);
        assert!(html.contains(ERROR_BOUNDARY_MARKER));
        assert!(html.contains("<title>Preview: src/App.tsx</title>"));
    }

    #[tokio::test]
    async fn test_harness_dir_removed_on_drop() {
        let harness = Harness::create(&PreviewConfig::default(), "1;", "App.tsx")
            .await
            .unwrap();
        let dir = harness.dir().to_path_buf();
        assert!(harness.path().exists());
        assert!(harness.url().starts_with("file://"));
        drop(harness);
        assert!(!dir.exists());
    }
}
