//! Load a file set from disk: a project directory, or a JSON document in
//! the bundler request shape.

use crate::error::LoadError;
use ignore::WalkBuilder;
use pipeline::files::{FileSet, GeneratedFile};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Directories never part of a generated app's sources.
const SKIPPED_DIRS: &[&str] = &["node_modules", "dist", "build", "target"];

/// Load `path` as a directory tree or a JSON file.
pub fn load(path: &Path) -> Result<FileSet, LoadError> {
    let files = if path.is_dir() {
        load_dir(path)?
    } else {
        load_json(path)?
    };
    if files.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    Ok(files)
}

/// Walk a project directory, respecting .gitignore and skipping hidden
/// entries and build output.
pub fn load_dir(root: &Path) -> Result<FileSet, LoadError> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|t| t.is_dir()) && SKIPPED_DIRS.iter().any(|d| name == *d))
        })
        .build();

    let mut files = FileSet::new();
    for entry in walker.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match std::fs::read_to_string(path) {
            Ok(content) => files.insert(GeneratedFile::new(key, content)),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable file"),
        }
    }

    debug!(root = %root.display(), count = files.len(), "Loaded project directory");
    Ok(files)
}

/// Read a JSON file holding either a `path -> content` map or a list of
/// `{path, content}` objects.
pub fn load_json(path: &Path) -> Result<FileSet, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    files_from_value(value)
}

pub fn parse_json(content: &str) -> Result<FileSet, LoadError> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| LoadError::Shape(format!("not JSON: {}", e)))?;
    files_from_value(value)
}

fn files_from_value(value: Value) -> Result<FileSet, LoadError> {
    // Bundler request shape: {"files": {...}}
    let value = match value {
        Value::Object(mut obj) if obj.len() == 1 && obj.contains_key("files") => {
            obj.remove("files").unwrap_or(Value::Null)
        }
        other => other,
    };

    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(path, content)| match content {
                Value::String(text) => Ok(GeneratedFile::new(path, text)),
                _ => Err(LoadError::Shape(format!("content of {} is not a string", path))),
            })
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<GeneratedFile>(item.clone())
                    .map(|f| GeneratedFile::new(f.path, f.content))
                    .map_err(|e| LoadError::Shape(format!("invalid file entry {}: {}", item, e)))
            })
            .collect(),
        _ => Err(LoadError::Shape("expected a JSON object or array of files".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_map_and_list() {
        let map = parse_json(r#"{"src/App.tsx": "a", "./src/index.css": "b"}"#).unwrap();
        assert_eq!(map.paths().collect::<Vec<_>>(), vec!["src/App.tsx", "src/index.css"]);

        let list = parse_json(r#"[{"path": "App.tsx", "content": "x"}]"#).unwrap();
        assert_eq!(list.get("App.tsx").unwrap().content, "x");
    }

    #[test]
    fn test_parse_bundler_request_shape() {
        let files = parse_json(r#"{"files": {"main.tsx": "m"}}"#).unwrap();
        assert!(files.contains("main.tsx"));
    }

    #[test]
    fn test_parse_rejects_non_string_content() {
        assert!(matches!(parse_json(r#"{"App.tsx": 1}"#), Err(LoadError::Shape(_))));
        assert!(matches!(parse_json(r#""App.tsx""#), Err(LoadError::Shape(_))));
    }

    #[test]
    fn test_load_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        match load(&missing) {
            Err(LoadError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("unexpected {:?}", other.map(|f| f.len())),
        }

        let broken = dir.path().join("files.json");
        std::fs::write(&broken, "{not json").unwrap();
        let err = load(&broken).unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
        assert!(err.to_string().contains("files.json"));
    }
}
