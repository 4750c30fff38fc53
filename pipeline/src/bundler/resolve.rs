//! Import resolution against the virtual filesystem.
//!
//! Resolution never fails: anything that cannot be found in the file set is
//! treated as an external the host page must provide. Callers that need a
//! package manifest use [`is_local_specifier`] to tell a missing project
//! file apart from a package.

use crate::files::{join_path, normalize_path, parent_dir, FileSet};
use std::collections::BTreeMap;

/// Packages the preview host always provides as globals.
pub const HOST_EXTERNALS: &[&str] = &["react", "react-dom", "react-dom/client", "react/jsx-runtime"];

/// Extensions probed, in order, for extension-less specifiers.
pub const RESOLVE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "json", "css"];

/// Where an import specifier points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A file in the virtual filesystem (normalized path)
    Local(String),
    /// A package left to the host
    External(String),
}

impl Resolution {
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

pub struct Resolver<'a> {
    files: &'a FileSet,
    aliases: &'a BTreeMap<String, String>,
}

impl<'a> Resolver<'a> {
    pub fn new(files: &'a FileSet, aliases: &'a BTreeMap<String, String>) -> Self {
        Self { files, aliases }
    }

    /// Resolve `specifier` as imported from `importer`.
    pub fn resolve(&self, importer: &str, specifier: &str) -> Resolution {
        if HOST_EXTERNALS.contains(&specifier) {
            return Resolution::External(specifier.to_string());
        }

        if is_relative(specifier) {
            let base = if specifier.starts_with('/') {
                normalize_path(specifier)
            } else {
                join_path(parent_dir(importer), specifier)
            };
            return self
                .probe(&base)
                .map(Resolution::Local)
                .unwrap_or_else(|| Resolution::External(specifier.to_string()));
        }

        for (prefix, target) in self.aliases {
            if let Some(rest) = specifier.strip_prefix(prefix.as_str()) {
                // Projects generated without a src/ root still use the alias.
                let candidates = [join_path(target, rest), normalize_path(rest)];
                if let Some(found) = candidates.iter().find_map(|c| self.probe(c)) {
                    return Resolution::Local(found);
                }
                return Resolution::External(specifier.to_string());
            }
        }

        Resolution::External(specifier.to_string())
    }

    pub fn is_local(&self, specifier: &str) -> bool {
        is_local_specifier(specifier, self.aliases)
    }

    /// Exact path, then `path.<ext>`, then `path/index.<ext>`.
    fn probe(&self, base: &str) -> Option<String> {
        if !base.is_empty() && self.files.contains(base) {
            return Some(normalize_path(base));
        }
        RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| format!("{}.{}", base, ext))
            .chain(
                RESOLVE_EXTENSIONS
                    .iter()
                    .map(|ext| join_path(base, &format!("index.{}", ext))),
            )
            .find(|candidate| self.files.contains(candidate))
            .map(|candidate| normalize_path(&candidate))
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// Relative, absolute or alias-prefixed: the specifier names a project file
/// rather than a package.
pub fn is_local_specifier(specifier: &str, aliases: &BTreeMap<String, String>) -> bool {
    is_relative(specifier) || aliases.keys().any(|prefix| specifier.starts_with(prefix.as_str()))
}

/// npm package that provides an external specifier (`@scope/pkg/sub` →
/// `@scope/pkg`, `pkg/sub` → `pkg`).
pub fn package_name(specifier: &str) -> &str {
    let mut segments = specifier.splitn(3, '/');
    let first = segments.next().unwrap_or(specifier);
    if first.starts_with('@') {
        match segments.next() {
            Some(second) => &specifier[..first.len() + 1 + second.len()],
            None => first,
        }
    } else {
        first
    }
}
