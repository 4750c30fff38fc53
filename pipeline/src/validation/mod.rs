//! Static validation of generated files.
//!
//! Two independent passes share the same finding model:
//! - [`SyntaxValidator`] repairs quote mismatches and reports structural defects
//! - [`OutputValidator`] lints for placeholders, conventions and accessibility
//!
//! Both delegate source inspection to a [`SourceAnalyzer`](crate::analyzer::SourceAnalyzer).

pub mod quality;
pub mod syntax;

pub use quality::{OutputValidator, QualityRules, SharedUtility};
pub use syntax::SyntaxValidator;

use crate::files::GeneratedFile;
use serde::{Deserialize, Serialize};

/// Kind of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MismatchedQuotes,
    UnterminatedString,
    MissingClosingTag,
    InvalidJsx,
    Placeholder,
    MissingImport,
    Accessibility,
    Validation,
    Styling,
    Quality,
    /// Non-blocking: `console.log` calls left in the file
    ConsoleLog,
    /// Non-blocking: loosely-typed `any` declarations
    AnyType,
}

impl FindingKind {
    /// Whether an un-fixed finding of this kind fails validation.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Self::ConsoleLog | Self::AnyType)
    }

    /// Whether this kind comes from the structural (syntax) pass.
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            Self::MismatchedQuotes
                | Self::UnterminatedString
                | Self::MissingClosingTag
                | Self::InvalidJsx
        )
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MismatchedQuotes => write!(f, "mismatched_quotes"),
            Self::UnterminatedString => write!(f, "unterminated_string"),
            Self::MissingClosingTag => write!(f, "missing_closing_tag"),
            Self::InvalidJsx => write!(f, "invalid_jsx"),
            Self::Placeholder => write!(f, "placeholder"),
            Self::MissingImport => write!(f, "missing_import"),
            Self::Accessibility => write!(f, "accessibility"),
            Self::Validation => write!(f, "validation"),
            Self::Styling => write!(f, "styling"),
            Self::Quality => write!(f, "quality"),
            Self::ConsoleLog => write!(f, "console_log"),
            Self::AnyType => write!(f, "any_type"),
        }
    }
}

/// A single issue found in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFinding {
    pub kind: FindingKind,
    pub message: String,
    pub file: String,
    /// 1-indexed line, when the finding has a location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub auto_fixed: bool,
}

impl ValidationFinding {
    pub fn new(kind: FindingKind, file: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: file.to_string(),
            line: None,
            auto_fixed: false,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn fixed(mut self) -> Self {
        self.auto_fixed = true;
        self
    }

    /// Blocking and not repaired.
    pub fn is_failure(&self) -> bool {
        self.kind.is_blocking() && !self.auto_fixed
    }

    /// `file:line: [kind] message`, the form fed to diagnostics and prompts.
    pub fn render(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{}: [{}] {}", self.file, line, self.kind, self.message),
            None => format!("{}: [{}] {}", self.file, self.kind, self.message),
        }
    }
}

/// Outcome of one validation pass over a file set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub findings: Vec<ValidationFinding>,
    /// New versions of files that were repaired during the pass
    pub fixed_files: Vec<GeneratedFile>,
}

impl ValidationResult {
    /// Build a result, deriving `is_valid` from the findings.
    pub fn from_findings(findings: Vec<ValidationFinding>, fixed_files: Vec<GeneratedFile>) -> Self {
        let is_valid = findings.iter().all(|f| !f.is_failure());
        Self {
            is_valid,
            findings,
            fixed_files,
        }
    }

    /// Findings that fail validation.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| f.is_failure())
    }

    /// Non-blocking warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| !f.kind.is_blocking())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Combine two passes; findings are additive and fixes accumulate.
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.findings.extend(other.findings);
        for fixed in other.fixed_files {
            self.fixed_files.retain(|f| f.path != fixed.path);
            self.fixed_files.push(fixed);
        }
        self.is_valid = self.findings.iter().all(|f| !f.is_failure());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_classification() {
        assert!(FindingKind::Placeholder.is_blocking());
        assert!(FindingKind::MissingClosingTag.is_blocking());
        assert!(!FindingKind::ConsoleLog.is_blocking());
        assert!(!FindingKind::AnyType.is_blocking());
    }

    #[test]
    fn test_is_valid_iff_blocking_findings_fixed() {
        let fixed = ValidationFinding::new(FindingKind::MismatchedQuotes, "App.tsx", "q")
            .at_line(1)
            .fixed();
        let warning = ValidationFinding::new(FindingKind::ConsoleLog, "App.tsx", "1 console.log");
        let result = ValidationResult::from_findings(vec![fixed.clone(), warning], vec![]);
        assert!(result.is_valid);

        let open = ValidationFinding::new(FindingKind::MissingClosingTag, "App.tsx", "<Foo>");
        let result = ValidationResult::from_findings(vec![fixed, open], vec![]);
        assert!(!result.is_valid);
        assert_eq!(result.failure_count(), 1);
    }

    #[test]
    fn test_serializes_camel_case() {
        let finding = ValidationFinding::new(FindingKind::Placeholder, "a.ts", "TODO").at_line(3);
        let result = ValidationResult::from_findings(vec![finding], vec![]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["findings"][0]["kind"], "placeholder");
        assert_eq!(json["findings"][0]["autoFixed"], false);
        assert_eq!(json["findings"][0]["line"], 3);
        assert!(json["fixedFiles"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_merge_replaces_fixed_versions() {
        let a = ValidationResult::from_findings(vec![], vec![GeneratedFile::new("a.ts", "v1")]);
        let b = ValidationResult::from_findings(vec![], vec![GeneratedFile::new("a.ts", "v2")]);
        let merged = a.merge(b);
        assert_eq!(merged.fixed_files.len(), 1);
        assert_eq!(merged.fixed_files[0].content, "v2");
        assert!(merged.is_valid);
    }
}
