//! Generated files and the in-memory virtual filesystem.
//!
//! A `FileSet` is the only source of truth for validation and bundling: no
//! disk I/O happens during resolution. Paths are normalized on insert so that
//! `./src/../App.tsx`, `/App.tsx` and `App.tsx` all name the same entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extensions scanned by the validators.
pub const CODE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Source language of a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Tsx,
    Typescript,
    Jsx,
    Javascript,
    Css,
    Json,
    Html,
    Markdown,
    #[default]
    Other,
}

impl Language {
    /// Infer the language from a path's extension.
    pub fn from_path(path: &str) -> Self {
        match extension(path) {
            Some("tsx") => Self::Tsx,
            Some("ts") | Some("mts") | Some("cts") => Self::Typescript,
            Some("jsx") => Self::Jsx,
            Some("js") | Some("mjs") | Some("cjs") => Self::Javascript,
            Some("css") => Self::Css,
            Some("json") => Self::Json,
            Some("html") | Some("htm") => Self::Html,
            Some("md") | Some("mdx") => Self::Markdown,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tsx => write!(f, "tsx"),
            Self::Typescript => write!(f, "typescript"),
            Self::Jsx => write!(f, "jsx"),
            Self::Javascript => write!(f, "javascript"),
            Self::Css => write!(f, "css"),
            Self::Json => write!(f, "json"),
            Self::Html => write!(f, "html"),
            Self::Markdown => write!(f, "markdown"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// One source file produced by the code-generation collaborator.
///
/// Values are never edited in place once validated: a repair produces a new
/// `GeneratedFile` via [`GeneratedFile::with_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub language: Language,
}

impl GeneratedFile {
    /// Create a file, inferring its language from the path.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = normalize_path(&path.into());
        let language = Language::from_path(&path);
        Self {
            path,
            content: content.into(),
            language,
        }
    }

    /// A new version of this file with different content.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            content: content.into(),
            language: self.language,
        }
    }

    /// Whether the validators scan this file.
    pub fn is_code(&self) -> bool {
        is_code_path(&self.path)
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }
}

/// Ordered virtual filesystem keyed by normalized path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSet {
    files: BTreeMap<String, GeneratedFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of files; later entries with the same path win.
    pub fn from_files(files: impl IntoIterator<Item = GeneratedFile>) -> Self {
        let mut set = Self::new();
        for file in files {
            set.insert(file);
        }
        set
    }

    /// Build from a `path -> content` map (the bundler request shape).
    pub fn from_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_files(map.into_iter().map(|(k, v)| GeneratedFile::new(k, v)))
    }

    /// Insert (or supersede) a file. Language is re-inferred when unknown.
    pub fn insert(&mut self, mut file: GeneratedFile) {
        file.path = normalize_path(&file.path);
        if file.language == Language::Other {
            file.language = Language::from_path(&file.path);
        }
        self.files.insert(file.path.clone(), file);
    }

    pub fn get(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.get(&normalize_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.values()
    }

    /// Files the validators scan.
    pub fn code_files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.values().filter(|f| f.is_code())
    }

    /// Copy of this set with `updates` superseding existing entries.
    pub fn overlay(&self, updates: impl IntoIterator<Item = GeneratedFile>) -> Self {
        let mut next = self.clone();
        for file in updates {
            next.insert(file);
        }
        next
    }

    pub fn into_files(self) -> Vec<GeneratedFile> {
        self.files.into_values().collect()
    }

    pub fn to_files(&self) -> Vec<GeneratedFile> {
        self.files.values().cloned().collect()
    }

    /// `path -> content` view.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|(k, v)| (k.clone(), v.content.clone()))
            .collect()
    }
}

impl FromIterator<GeneratedFile> for FileSet {
    fn from_iter<I: IntoIterator<Item = GeneratedFile>>(iter: I) -> Self {
        Self::from_files(iter)
    }
}

/// Normalize a virtual path: forward slashes, no leading `/` or `./`,
/// `.` segments dropped and `..` segments folded.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Directory portion of a normalized path (empty for root files).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Final segment of a path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Extension without the dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    name.rfind('.').map(|idx| &name[idx + 1..])
}

pub fn is_code_path(path: &str) -> bool {
    extension(path).is_some_and(|ext| CODE_EXTENSIONS.contains(&ext))
}

/// Join a relative specifier onto a base directory and normalize.
pub fn join_path(base_dir: &str, relative: &str) -> String {
    if base_dir.is_empty() {
        normalize_path(relative)
    } else {
        normalize_path(&format!("{base_dir}/{relative}"))
    }
}
