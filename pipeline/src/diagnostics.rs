//! Diagnostic classification of pipeline failures.
//!
//! Normalizes validation findings, bundle errors and preview issues into
//! [`DiagnosticError`]s, picks the highest-priority category as the root
//! cause, and splits the file set into files to regenerate and files to keep.

use crate::bundler::{BundleError, BundleErrorKind};
use crate::files::{normalize_path, FileSet};
use crate::preview::{PreviewIssue, PreviewIssueKind};
use crate::validation::{FindingKind, ValidationFinding};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static COMPONENT_EXPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(element type is invalid|expected a string \(for built-in components\)|no default export|does not provide an export named|is not a valid react component)",
    )
    .unwrap()
});

static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(cannot find module|module not found|can't resolve|cannot resolve|failed to resolve|not provided by the preview host)")
        .unwrap()
});

static SYNTAX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(syntaxerror|unexpected token|unexpected end of|unterminated|missing closing tag|is never closed|invalid or unexpected)")
        .unwrap()
});

/// File paths mentioned in free-form error text.
static PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w@./-]+\.(?:tsx|ts|jsx|js|mjs|cjs|css|json)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rendered value is not a component (bad or missing default export)
    ComponentExport,
    /// Module could not be found or resolved
    ImportError,
    /// Source does not parse
    SyntaxError,
    /// Anything else thrown or logged at runtime
    RuntimeError,
    /// Output-validator convention violation
    QualityViolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
        }
    }
}

impl ErrorCategory {
    /// Lower is addressed first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::SyntaxError => 1,
            Self::ImportError => 2,
            Self::ComponentExport => 3,
            Self::RuntimeError => 4,
            Self::QualityViolation => 5,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::SyntaxError | Self::ComponentExport => Severity::Critical,
            Self::ImportError | Self::RuntimeError => Severity::Major,
            Self::QualityViolation => Severity::Minor,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ComponentExport => {
                "A component is not exported correctly: the rendered value is undefined or not a React component (check default vs named exports)"
            }
            Self::ImportError => {
                "An import cannot be resolved: the module path is wrong, the file is missing, or the package is not available"
            }
            Self::SyntaxError => {
                "The source does not parse: unbalanced JSX, an unterminated string, or invalid syntax"
            }
            Self::RuntimeError => "The app throws or logs an error while rendering",
            Self::QualityViolation => {
                "Generated code violates project conventions (placeholders, missing imports, accessibility, styling or validation rules)"
            }
        }
    }

    /// Classify free-form error text.
    pub fn from_message(message: &str) -> Self {
        if COMPONENT_EXPORT_PATTERN.is_match(message) {
            Self::ComponentExport
        } else if IMPORT_PATTERN.is_match(message) {
            Self::ImportError
        } else if SYNTAX_PATTERN.is_match(message) {
            Self::SyntaxError
        } else {
            Self::RuntimeError
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ComponentExport => write!(f, "component_export"),
            Self::ImportError => write!(f, "import_error"),
            Self::SyntaxError => write!(f, "syntax_error"),
            Self::RuntimeError => write!(f, "runtime_error"),
            Self::QualityViolation => write!(f, "quality_violation"),
        }
    }
}

/// Pipeline stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    Syntax,
    Quality,
    Bundle,
    Preview,
}

/// One classified error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticError {
    pub category: ErrorCategory,
    pub origin: ErrorOrigin,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl DiagnosticError {
    pub fn from_finding(finding: &ValidationFinding) -> Self {
        let (category, origin) = match finding.kind {
            kind if kind.is_syntax() => (ErrorCategory::SyntaxError, ErrorOrigin::Syntax),
            FindingKind::MissingImport => (ErrorCategory::ImportError, ErrorOrigin::Quality),
            _ => (ErrorCategory::QualityViolation, ErrorOrigin::Quality),
        };
        Self {
            category,
            origin,
            message: format!("[{}] {}", finding.kind, finding.message),
            file: Some(finding.file.clone()),
            line: finding.line,
        }
    }

    pub fn from_bundle_error(error: &BundleError) -> Self {
        let category = match error.kind {
            BundleErrorKind::CompileFailure => ErrorCategory::SyntaxError,
            BundleErrorKind::ResolutionFailure => ErrorCategory::ImportError,
        };
        Self {
            category,
            origin: ErrorOrigin::Bundle,
            message: error.to_string(),
            file: error.file.clone(),
            line: None,
        }
    }

    pub fn from_preview_issue(issue: &PreviewIssue) -> Self {
        let category = match issue.kind {
            PreviewIssueKind::Timeout
            | PreviewIssueKind::NetworkError
            | PreviewIssueKind::RendererFailure => ErrorCategory::RuntimeError,
            _ => ErrorCategory::from_message(&issue.message),
        };
        Self {
            category,
            origin: ErrorOrigin::Preview,
            message: issue.render(),
            file: None,
            line: None,
        }
    }

    pub fn render(&self) -> String {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => format!("{}:{}: {}", file, line, self.message),
            (Some(file), None) => format!("{}: {}", file, self.message),
            _ => self.message.clone(),
        }
    }
}

/// Classified failure of one pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub severity: Severity,
    pub category: ErrorCategory,
    pub priority: u8,
    pub root_cause: String,
    pub failed_files: Vec<String>,
    pub retained_files: Vec<String>,
    pub summary: String,
    pub errors: Vec<DiagnosticError>,
    /// Pass number the report was produced for (0 = initial pass)
    pub attempt: u32,
}

impl DiagnosticReport {
    /// Error text handed to the regeneration collaborator.
    pub fn error_context(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("- [{}] {}", e.category, e.render()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Targeted repair instructions.
    pub fn fix_prompt(&self) -> String {
        let mut prompt = format!(
            "The generated app failed verification.\n\nRoot cause ({}, {}): {}\n\nErrors:\n{}\n\nFix these files: {}\n",
            self.category,
            self.severity,
            self.root_cause,
            self.error_context(),
            self.failed_files.join(", "),
        );
        if !self.retained_files.is_empty() {
            prompt.push_str(&format!(
                "Leave these files unchanged unless the fix requires it: {}\n",
                self.retained_files.join(", ")
            ));
        }
        prompt.push_str("Return the complete contents of every file you change.\n");
        prompt
    }
}

/// Builds [`DiagnosticReport`]s.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticClassifier;

impl DiagnosticClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a non-empty set of errors against the file set they came
    /// from. Returns `None` when there is nothing to diagnose.
    pub fn diagnose(
        &self,
        errors: Vec<DiagnosticError>,
        files: &FileSet,
        entry: Option<&str>,
        attempt: u32,
    ) -> Option<DiagnosticReport> {
        let primary = errors.iter().min_by_key(|e| e.category.priority())?.clone();
        let category = primary.category;

        let mut failed: BTreeSet<String> = BTreeSet::new();
        for error in &errors {
            failed.extend(implicated_files(error, files));
        }
        if failed.is_empty() {
            match entry.and_then(|e| files.get(e)) {
                Some(file) => {
                    failed.insert(file.path.clone());
                }
                None => failed.extend(files.code_files().map(|f| f.path.clone())),
            }
        }

        let retained_files: Vec<String> = files
            .paths()
            .filter(|p| !failed.contains(*p))
            .map(String::from)
            .collect();
        let failed_files: Vec<String> = failed.into_iter().collect();

        let root_cause = format!("{} ({})", category.description(), primary.render());
        let summary = format!(
            "{} error(s); primary {} in {}",
            errors.len(),
            category,
            failed_files.join(", ")
        );

        tracing::info!(
            category = %category,
            errors = errors.len(),
            failed = failed_files.len(),
            retained = retained_files.len(),
            attempt,
            "Diagnosed pipeline failure"
        );

        Some(DiagnosticReport {
            severity: category.severity(),
            category,
            priority: category.priority(),
            root_cause,
            failed_files,
            retained_files,
            summary,
            errors,
            attempt,
        })
    }
}

/// Files named by the error directly or mentioned in its text.
fn implicated_files(error: &DiagnosticError, files: &FileSet) -> Vec<String> {
    let mut found = Vec::new();
    if let Some(file) = error.file.as_deref().and_then(|f| files.get(f)) {
        found.push(file.path.clone());
    }
    for m in PATH_PATTERN.find_iter(&error.message) {
        let mentioned = normalize_path(m.as_str());
        if let Some(file) = files.get(&mentioned) {
            found.push(file.path.clone());
            continue;
        }
        let suffix = format!("/{}", mentioned);
        let matches: Vec<&str> = files.paths().filter(|p| p.ends_with(&suffix)).collect();
        if let [only] = matches.as_slice() {
            found.push(only.to_string());
        }
    }
    found
}
