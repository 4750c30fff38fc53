//! Syntax validator: quote repair plus structural defect detection.

use crate::analyzer::{heuristic::repair_import_quotes, SourceAnalyzer};
use crate::files::{FileSet, GeneratedFile};
use crate::validation::{FindingKind, ValidationFinding, ValidationResult};
use std::sync::Arc;

/// Repairs mismatched import quotes and reports structural defects.
///
/// Running the validator again over its own `fixed_files` yields no new
/// findings: the repair is deterministic and leaves balanced quotes behind.
pub struct SyntaxValidator {
    analyzer: Arc<dyn SourceAnalyzer>,
}

impl SyntaxValidator {
    pub fn new(analyzer: Arc<dyn SourceAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub fn validate(&self, files: &FileSet) -> ValidationResult {
        let mut findings = Vec::new();
        let mut fixed_files = Vec::new();

        for file in files.code_files() {
            let (file_findings, fixed) = self.validate_file(file);
            findings.extend(file_findings);
            fixed_files.extend(fixed);
        }

        let result = ValidationResult::from_findings(findings, fixed_files);
        tracing::debug!(
            analyzer = self.analyzer.name(),
            files = files.len(),
            fixed = result.fixed_files.len(),
            failures = result.failure_count(),
            "Syntax validation complete"
        );
        result
    }

    /// Validate one file, returning its findings and the repaired version if
    /// a repair was made.
    pub fn validate_file(
        &self,
        file: &GeneratedFile,
    ) -> (Vec<ValidationFinding>, Option<GeneratedFile>) {
        let mut findings = Vec::new();
        let mut repaired_lines = Vec::new();

        let fixed = repair_import_quotes(&file.content).map(|(content, lines)| {
            for &line in &lines {
                findings.push(
                    ValidationFinding::new(
                        FindingKind::MismatchedQuotes,
                        &file.path,
                        "Import path quotes did not match; closing quote rewritten",
                    )
                    .at_line(line)
                    .fixed(),
                );
            }
            repaired_lines = lines;
            file.with_content(content)
        });

        let current = fixed.as_ref().unwrap_or(file);
        findings.extend(
            self.analyzer
                .detect_syntax_issues(current)
                .into_iter()
                .filter(|f| {
                    !(f.kind == FindingKind::UnterminatedString
                        && f.line.is_some_and(|l| repaired_lines.contains(&l)))
                }),
        );

        (findings, fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{build_analyzer, AnalyzerKind};

    fn validators() -> Vec<SyntaxValidator> {
        vec![
            SyntaxValidator::new(build_analyzer(AnalyzerKind::Ast)),
            SyntaxValidator::new(build_analyzer(AnalyzerKind::Heuristic)),
        ]
    }

    #[test]
    fn test_quote_fix_is_auto_fixed_and_valid() {
        let files = FileSet::from_map([(
            "App.tsx",
            "import { Card } from './Card\";\nexport default function App() {\n  return <Card />;\n}\n",
        )]);
        for validator in validators() {
            let result = validator.validate(&files);
            assert!(result.is_valid, "{:?}", result.findings);
            assert_eq!(result.findings.len(), 1);
            assert!(result.findings[0].auto_fixed);
            assert_eq!(result.fixed_files.len(), 1);
            assert!(result.fixed_files[0]
                .content
                .starts_with("import { Card } from './Card';"));
        }
    }

    #[test]
    fn test_multiline_import_quote_fix() {
        let files = FileSet::from_map([(
            "App.tsx",
            "import {\n  Button,\n  Card,\n} from './ui\";\n\nexport default function App() {\n  return <Card><Button /></Card>;\n}\n",
        )]);
        for validator in validators() {
            let result = validator.validate(&files);
            assert!(result.is_valid, "{:?}", result.findings);
            assert_eq!(result.findings.len(), 1);
            assert_eq!(result.findings[0].kind, FindingKind::MismatchedQuotes);
            assert_eq!(result.findings[0].line, Some(4));
            assert!(result.findings[0].auto_fixed);
            assert!(result.fixed_files[0].content.contains("} from './ui';"));
        }
    }

    #[test]
    fn test_revalidating_fixed_output_is_clean() {
        let files = FileSet::from_map([(
            "src/main.tsx",
            "import App from \"./App';\nimport './index.css\";\nApp();\n",
        )]);
        for validator in validators() {
            let first = validator.validate(&files);
            let repaired = files.overlay(first.fixed_files.clone());
            let second = validator.validate(&repaired);
            assert!(second.findings.is_empty(), "{:?}", second.findings);
            assert!(second.fixed_files.is_empty());
        }
    }

    #[test]
    fn test_missing_closing_tag_cites_opening_line() {
        let files = FileSet::from_map([(
            "App.tsx",
            "export default function App() {\n  return (\n    <Panel>\n      <span>x</span>\n  );\n}\n",
        )]);
        for validator in validators() {
            let result = validator.validate(&files);
            assert!(!result.is_valid);
            let tag = result
                .findings
                .iter()
                .find(|f| f.kind == FindingKind::MissingClosingTag)
                .expect("tag finding");
            assert_eq!(tag.line, Some(3));
            assert!(!tag.auto_fixed);
        }
    }

    #[test]
    fn test_non_code_files_are_skipped() {
        let files = FileSet::from_map([("index.css", "a { content: \"x; }"), ("README.md", "it's <Foo>")]);
        let result = validators().remove(1).validate(&files);
        assert!(result.is_valid);
        assert!(result.findings.is_empty());
    }
}
