//! Virtual-filesystem module bundler.
//!
//! ```text
//! FileSet ──► entry detection ──► BFS over imports ──► strategy output
//!                                   │                   ├─ Script:  registry IIFE
//!                                   │                   └─ FileMap: files + manifest
//!                                   └─ Resolver (relative / alias / external)
//! ```
//!
//! A bundle either succeeds completely or fails with a [`BundleError`];
//! there is no partial artifact.

pub mod compile;
pub mod resolve;
pub mod runtime;

pub use resolve::{Resolution, Resolver, HOST_EXTERNALS};

use crate::files::FileSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Entry candidates, in precedence order.
pub const DEFAULT_ENTRY_CANDIDATES: &[&str] = &[
    "main.tsx",
    "src/main.tsx",
    "index.tsx",
    "src/index.tsx",
    "App.tsx",
    "src/App.tsx",
];

/// How the bundle is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStrategy {
    /// One self-executing script with a module registry
    #[default]
    Script,
    /// Resolved file map and dependency manifest for an in-browser bundler
    FileMap,
}

impl std::fmt::Display for BundleStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Script => write!(f, "script"),
            Self::FileMap => write!(f, "file_map"),
        }
    }
}

impl std::str::FromStr for BundleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "script" => Ok(Self::Script),
            "file_map" | "file-map" | "filemap" => Ok(Self::FileMap),
            other => Err(format!(
                "Invalid bundle strategy '{}'. Valid values: script, file_map",
                other
            )),
        }
    }
}

/// Bundler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub strategy: BundleStrategy,
    /// Import prefix → directory (`@/` → `src/`)
    pub aliases: BTreeMap<String, String>,
    pub entry_candidates: Vec<String>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            strategy: BundleStrategy::Script,
            aliases: BTreeMap::from([("@/".to_string(), "src/".to_string())]),
            entry_candidates: DEFAULT_ENTRY_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleErrorKind {
    ResolutionFailure,
    CompileFailure,
}

impl std::fmt::Display for BundleErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolutionFailure => write!(f, "resolution_failure"),
            Self::CompileFailure => write!(f, "compile_failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct BundleError {
    pub kind: BundleErrorKind,
    pub message: String,
    /// File that failed, when one is implicated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl BundleError {
    pub fn resolution(message: impl Into<String>) -> Self {
        Self {
            kind: BundleErrorKind::ResolutionFailure,
            message: message.into(),
            file: None,
        }
    }

    /// A project import that names no file in the set.
    pub fn unresolved_import(importer: &str, specifier: &str) -> Self {
        Self {
            kind: BundleErrorKind::ResolutionFailure,
            message: format!("Cannot resolve '{}' imported from {}", specifier, importer),
            file: Some(importer.to_string()),
        }
    }

    pub fn compile(file: &str, message: impl Into<String>) -> Self {
        Self {
            kind: BundleErrorKind::CompileFailure,
            message: message.into(),
            file: Some(file.to_string()),
        }
    }
}

/// Strategy-specific bundle payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BundleOutput {
    Script {
        code: String,
    },
    FileMap {
        files: BTreeMap<String, String>,
        /// package → version range
        dependencies: BTreeMap<String, String>,
    },
}

/// A complete bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleArtifact {
    pub entry_point: String,
    /// Sorted, de-duplicated external specifiers
    pub externalized: Vec<String>,
    /// Resolved local modules in discovery order
    pub modules: Vec<String>,
    #[serde(flatten)]
    pub output: BundleOutput,
}

impl BundleArtifact {
    /// Executable script, for the `Script` strategy.
    pub fn code(&self) -> Option<&str> {
        match &self.output {
            BundleOutput::Script { code } => Some(code),
            BundleOutput::FileMap { .. } => None,
        }
    }

    pub fn strategy(&self) -> BundleStrategy {
        match self.output {
            BundleOutput::Script { .. } => BundleStrategy::Script,
            BundleOutput::FileMap { .. } => BundleStrategy::FileMap,
        }
    }
}

pub struct Bundler {
    config: BundleConfig,
}

impl Default for Bundler {
    fn default() -> Self {
        Self::new(BundleConfig::default())
    }
}

impl Bundler {
    pub fn new(config: BundleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Pick the entry module: an override present in the set, else the first
    /// configured candidate that exists.
    pub fn detect_entry(
        &self,
        files: &FileSet,
        entry_override: Option<&str>,
    ) -> Result<String, BundleError> {
        if let Some(entry) = entry_override {
            if let Some(file) = files.get(entry) {
                return Ok(file.path.clone());
            }
            tracing::warn!(entry, "Entry override not in file set, falling back to detection");
        }

        self.config
            .entry_candidates
            .iter()
            .find_map(|candidate| files.get(candidate).map(|f| f.path.clone()))
            .ok_or_else(|| {
                BundleError::resolution(format!(
                    "No entry point found; expected one of: {}",
                    self.config.entry_candidates.join(", ")
                ))
            })
    }

    pub fn bundle(
        &self,
        files: &FileSet,
        entry_override: Option<&str>,
    ) -> Result<BundleArtifact, BundleError> {
        let entry = self.detect_entry(files, entry_override)?;
        let resolver = Resolver::new(files, &self.config.aliases);

        let mut queue = VecDeque::from([entry.clone()]);
        let mut seen = BTreeSet::from([entry.clone()]);
        let mut modules = Vec::new();
        let mut compiled = Vec::new();
        let mut externals = BTreeSet::new();

        while let Some(id) = queue.pop_front() {
            let file = files
                .get(&id)
                .ok_or_else(|| BundleError::resolution(format!("Module '{}' vanished from the file set", id)))?;

            let mut discovered = Vec::new();
            match self.config.strategy {
                BundleStrategy::Script => {
                    let mut resolve = |specifier: &str| {
                        let resolution = resolver.resolve(&id, specifier);
                        discovered.push(resolution.clone());
                        resolution
                    };
                    let body = compile::compile_module(file, &mut resolve)?;
                    compiled.push((id.clone(), body));
                }
                BundleStrategy::FileMap => {
                    if file.is_code() {
                        for specifier in compile::import_specifiers(&file.path, &file.content)? {
                            let resolution = resolver.resolve(&id, &specifier);
                            // The in-browser bundler would try to install it as a package.
                            if resolution.is_external() && resolver.is_local(&specifier) {
                                return Err(BundleError::unresolved_import(&id, &specifier));
                            }
                            discovered.push(resolution);
                        }
                    }
                }
            }

            for resolution in discovered {
                match resolution {
                    Resolution::Local(path) => {
                        if seen.insert(path.clone()) {
                            queue.push_back(path);
                        }
                    }
                    Resolution::External(name) => {
                        externals.insert(name);
                    }
                }
            }
            modules.push(id);
        }

        let output = match self.config.strategy {
            BundleStrategy::Script => BundleOutput::Script {
                code: runtime::render_script(&entry, &compiled),
            },
            BundleStrategy::FileMap => BundleOutput::FileMap {
                files: modules
                    .iter()
                    .filter_map(|m| files.get(m).map(|f| (m.clone(), f.content.clone())))
                    .collect(),
                dependencies: dependency_manifest(files, &externals, &self.config.aliases),
            },
        };

        let artifact = BundleArtifact {
            entry_point: entry,
            externalized: externals.into_iter().collect(),
            modules,
            output,
        };
        tracing::info!(
            entry = %artifact.entry_point,
            strategy = %self.config.strategy,
            modules = artifact.modules.len(),
            externals = artifact.externalized.len(),
            "Bundle complete"
        );
        Ok(artifact)
    }
}

/// Package → version for every bare external, taking versions from a
/// `package.json` in the set when present.
fn dependency_manifest(
    files: &FileSet,
    externals: &BTreeSet<String>,
    aliases: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let declared: BTreeMap<String, String> = files
        .get("package.json")
        .and_then(|f| serde_json::from_str::<serde_json::Value>(&f.content).ok())
        .map(|pkg| {
            ["dependencies", "devDependencies"]
                .iter()
                .filter_map(|key| pkg.get(key).and_then(|v| v.as_object()))
                .flat_map(|deps| {
                    deps.iter()
                        .filter_map(|(name, v)| v.as_str().map(|v| (name.clone(), v.to_string())))
                })
                .collect()
        })
        .unwrap_or_default();

    externals
        .iter()
        .filter(|spec| !resolve::is_local_specifier(spec, aliases))
        .map(|spec| resolve::package_name(spec).to_string())
        .map(|name| {
            let version = declared.get(&name).cloned().unwrap_or_else(|| "latest".to_string());
            (name, version)
        })
        .collect()
}
