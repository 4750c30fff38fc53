//! Output validator: placeholder, convention, accessibility and styling lint.
//!
//! Checks are independent and additive. Nothing here rewrites content; the
//! result always carries an empty `fixed_files`.

use crate::analyzer::{line_of, SourceAnalyzer};
use crate::files::{FileSet, GeneratedFile, Language};
use crate::validation::{FindingKind, ValidationFinding, ValidationResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

static JSX_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</[A-Za-z][\w.]*\s*>|<[A-Za-z][\w.]*(?:\s[^<>]*)?/>|return\s*\(\s*<").unwrap()
});

static COMPONENT_RETURN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"return\s*\(?\s*<[A-Za-z>]").unwrap());

/// `import <bindings> from '<source>'`
static IMPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\bimport\s+(?:type\s+)?([^;'"]*?)\s*from\s*['"]([^'"]+)['"]"#).unwrap()
});

static FORM_USAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<form\b|\buseForm\s*(?:<[^>]*>)?\s*\(").unwrap());

static USE_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\buseForm\s*(?:<[^>]*>)?\s*\(").unwrap());

static CSS_IN_JS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bstyled\.\w+\s*`|\bstyled\(|\bcss\s*`|from\s*['"](?:styled-components|@emotion/[\w-]+)['"]"#,
    )
    .unwrap()
});

static CONSOLE_LOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bconsole\.log\s*\(").unwrap());

static ANY_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\s*any\b|\bas\s+any\b|<any>|\bany\[\]").unwrap());

/// A utility that must be imported from a fixed module when used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedUtility {
    pub name: String,
    pub module: String,
}

impl SharedUtility {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
        }
    }
}

/// Project conventions enforced by the output validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityRules {
    /// Upper-case markers match case-sensitively on word boundaries; phrases
    /// match case-insensitively.
    pub placeholder_markers: Vec<String>,
    pub shared_utilities: Vec<SharedUtility>,
    /// Design-system directory as it appears in paths
    pub design_system_dir: String,
    /// Import alias the design system must be reached through
    pub design_system_alias: String,
    pub schema_library: String,
    pub schema_resolver: String,
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            placeholder_markers: ["TODO", "FIXME", "HACK", "not implemented", "coming soon"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            shared_utilities: vec![SharedUtility::new("cn", "@/lib/utils")],
            design_system_dir: "components/ui".to_string(),
            design_system_alias: "@/components/ui".to_string(),
            schema_library: "zod".to_string(),
            schema_resolver: "zodResolver".to_string(),
        }
    }
}

/// A JSX-level defect located by an analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsxIssue {
    ImgWithoutAlt { line: usize },
    IconButtonWithoutLabel { line: usize },
    InlineStyle { line: usize },
    /// Raw `<button>`/`<input>` carrying its own classes
    RawControl { tag: String, line: usize },
}

/// Placeholder, file-type, import, form, styling and warning checks that do
/// not depend on how JSX is located.
pub fn text_findings(file: &GeneratedFile, rules: &QualityRules) -> Vec<ValidationFinding> {
    let content = &file.content;
    let mut findings = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if let Some(marker) = rules
            .placeholder_markers
            .iter()
            .find(|m| contains_marker(line, m))
        {
            findings.push(
                ValidationFinding::new(
                    FindingKind::Placeholder,
                    &file.path,
                    format!("Placeholder content ({}) left in generated code", marker),
                )
                .at_line(idx + 1),
            );
        }
    }

    findings.extend(file_type_findings(file));

    let imports = import_statements(content);

    for utility in &rules.shared_utilities {
        if uses_utility(content, &utility.name)
            && !imports.iter().any(|(bindings, _)| has_word(bindings, &utility.name))
            && !defines(content, &utility.name)
            && !is_module_file(&file.path, &utility.module)
        {
            findings.push(ValidationFinding::new(
                FindingKind::MissingImport,
                &file.path,
                format!(
                    "`{}` is used but not imported; add `import {{ {} }} from \"{}\"`",
                    utility.name, utility.name, utility.module
                ),
            ));
        }
    }

    for (_, source) in &imports {
        if source.starts_with('.') && source.contains(rules.design_system_dir.as_str()) {
            findings.push(ValidationFinding::new(
                FindingKind::Quality,
                &file.path,
                format!(
                    "Relative import '{}' into the design system; use the {}/... alias",
                    source, rules.design_system_alias
                ),
            ));
        }
    }

    if let Some(m) = FORM_USAGE.find(content) {
        let line = line_of(content, m.start());
        let has_schema = imports.iter().any(|(_, source)| {
            source == &rules.schema_library
                || source.starts_with(&format!("{}/", rules.schema_library))
        });
        if !has_schema {
            findings.push(
                ValidationFinding::new(
                    FindingKind::Validation,
                    &file.path,
                    format!("Form without {} schema validation", rules.schema_library),
                )
                .at_line(line),
            );
        }
        if USE_FORM.is_match(content) && !has_word(content, &rules.schema_resolver) {
            findings.push(
                ValidationFinding::new(
                    FindingKind::Validation,
                    &file.path,
                    format!("useForm is not wired to a schema via {}", rules.schema_resolver),
                )
                .at_line(line),
            );
        }
    }

    if let Some(m) = CSS_IN_JS.find(content) {
        findings.push(
            ValidationFinding::new(
                FindingKind::Styling,
                &file.path,
                "CSS-in-JS styling; use utility classes instead",
            )
            .at_line(line_of(content, m.start())),
        );
    }

    let logs = CONSOLE_LOG.find_iter(content).count();
    if logs > 0 {
        findings.push(ValidationFinding::new(
            FindingKind::ConsoleLog,
            &file.path,
            format!("{} console.log call(s) left in code", logs),
        ));
    }

    let anys = ANY_TYPE.find_iter(content).count();
    if anys > 0 {
        findings.push(ValidationFinding::new(
            FindingKind::AnyType,
            &file.path,
            format!("{} usage(s) of the `any` type", anys),
        ));
    }

    findings
}

/// Turn analyzer-located JSX issues into findings, honouring design-system
/// imports for raw controls.
pub fn jsx_findings(
    file: &GeneratedFile,
    rules: &QualityRules,
    issues: Vec<JsxIssue>,
) -> Vec<ValidationFinding> {
    let imports = import_statements(&file.content);
    let mut findings = Vec::new();

    for issue in issues {
        let finding = match issue {
            JsxIssue::ImgWithoutAlt { line } => ValidationFinding::new(
                FindingKind::Accessibility,
                &file.path,
                "<img> is missing an alt attribute",
            )
            .at_line(line),
            JsxIssue::IconButtonWithoutLabel { line } => ValidationFinding::new(
                FindingKind::Accessibility,
                &file.path,
                "Icon-only button needs an aria-label",
            )
            .at_line(line),
            JsxIssue::InlineStyle { line } => ValidationFinding::new(
                FindingKind::Styling,
                &file.path,
                "Inline style object; use utility classes instead",
            )
            .at_line(line),
            JsxIssue::RawControl { tag, line } => {
                let component = format!("{}/{}", rules.design_system_dir, tag);
                let imported = imports
                    .iter()
                    .any(|(_, source)| source.to_ascii_lowercase().ends_with(&component));
                if imported {
                    continue;
                }
                ValidationFinding::new(
                    FindingKind::Quality,
                    &file.path,
                    format!(
                        "Raw <{}> with custom classes; use the design-system component from {}/{}",
                        tag, rules.design_system_alias, tag
                    ),
                )
                .at_line(line)
            }
        };
        findings.push(finding);
    }

    findings
}

fn file_type_findings(file: &GeneratedFile) -> Option<ValidationFinding> {
    let content = &file.content;
    match file.language {
        Language::Tsx | Language::Jsx => None,
        Language::Typescript if !file.path.ends_with(".d.ts") => {
            JSX_MARKUP.find(content).map(|m| {
                ValidationFinding::new(
                    FindingKind::InvalidJsx,
                    &file.path,
                    "JSX in a .ts file; rename it to .tsx",
                )
                .at_line(line_of(content, m.start()))
            })
        }
        Language::Javascript => COMPONENT_RETURN.find(content).map(|m| {
            ValidationFinding::new(
                FindingKind::InvalidJsx,
                &file.path,
                "Component returns JSX outside a .tsx/.jsx file",
            )
            .at_line(line_of(content, m.start()))
        }),
        _ => None,
    }
}

/// `(bindings, source)` for each `import … from` statement.
fn import_statements(content: &str) -> Vec<(String, String)> {
    IMPORT_FROM
        .captures_iter(content)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

fn contains_marker(line: &str, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    let is_upper_marker = marker.chars().any(|c| c.is_alphabetic())
        && marker.chars().all(|c| !c.is_lowercase());
    if is_upper_marker {
        has_word(line, marker)
    } else {
        line.to_lowercase().contains(&marker.to_lowercase())
    }
}

/// Whole-word, case-sensitive occurrence.
fn has_word(haystack: &str, word: &str) -> bool {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    haystack.match_indices(word).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + word.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

fn uses_utility(content: &str, name: &str) -> bool {
    let call = format!("{}(", name);
    content.match_indices(&call).any(|(idx, _)| {
        !content[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.')
    })
}

fn defines(content: &str, name: &str) -> bool {
    ["function ", "const ", "let ", "var "]
        .iter()
        .any(|kw| has_word(content, &format!("{}{}", kw, name)))
}

fn is_module_file(path: &str, module: &str) -> bool {
    let stem = match path.rfind('.') {
        Some(idx) => &path[..idx],
        None => path,
    };
    let tail = module.trim_start_matches("@/");
    stem == tail || stem == format!("src/{}", tail) || stem.ends_with(&format!("/{}", tail))
}

/// Lints generated files against project conventions.
pub struct OutputValidator {
    analyzer: Arc<dyn SourceAnalyzer>,
    rules: QualityRules,
}

impl OutputValidator {
    pub fn new(analyzer: Arc<dyn SourceAnalyzer>, rules: QualityRules) -> Self {
        Self { analyzer, rules }
    }

    pub fn rules(&self) -> &QualityRules {
        &self.rules
    }

    /// Lint every code file in the set.
    pub fn validate(&self, files: &FileSet) -> ValidationResult {
        let mut findings = Vec::new();
        for file in files.code_files() {
            findings.extend(self.analyzer.detect_quality_issues(file, &self.rules));
        }

        let result = ValidationResult::from_findings(findings, Vec::new());
        tracing::debug!(
            analyzer = self.analyzer.name(),
            files = files.len(),
            failures = result.failure_count(),
            "Output validation complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::HeuristicAnalyzer;

    fn kinds(file: &GeneratedFile) -> Vec<FindingKind> {
        text_findings(file, &QualityRules::default())
            .into_iter()
            .map(|f| f.kind)
            .collect()
    }

    #[test]
    fn test_placeholder_markers() {
        let file = GeneratedFile::new(
            "App.tsx",
            "// TODO: wire up\nconst a = 'Coming Soon';\nconst todos = [];\nthrow new Error('Not implemented');\n",
        );
        let findings = text_findings(&file, &QualityRules::default());
        let lines: Vec<Option<usize>> = findings
            .iter()
            .filter(|f| f.kind == FindingKind::Placeholder)
            .map(|f| f.line)
            .collect();
        assert_eq!(lines, vec![Some(1), Some(2), Some(4)]);
    }

    #[test]
    fn test_jsx_in_ts_file() {
        let file = GeneratedFile::new("components/Card.ts", "export const Card = () => <div>hi</div>;\n");
        assert!(kinds(&file).contains(&FindingKind::InvalidJsx));

        let decl = GeneratedFile::new("types/global.d.ts", "declare const x: Array<string>;\n");
        assert!(!kinds(&decl).contains(&FindingKind::InvalidJsx));

        let js = GeneratedFile::new("Widget.js", "export function W() {\n  return (<p>x</p>);\n}\n");
        assert!(kinds(&js).contains(&FindingKind::InvalidJsx));
    }

    #[test]
    fn test_shared_utility_import() {
        let missing = GeneratedFile::new(
            "components/Box.tsx",
            "export const Box = () => <div className={cn('p-2')} />;\n",
        );
        assert!(kinds(&missing).contains(&FindingKind::MissingImport));

        let imported = GeneratedFile::new(
            "components/Box.tsx",
            "import { cn } from '@/lib/utils';\nexport const Box = () => <div className={cn('p-2')} />;\n",
        );
        assert!(!kinds(&imported).contains(&FindingKind::MissingImport));

        let defining = GeneratedFile::new(
            "src/lib/utils.ts",
            "export function cn(...c: string[]) { return c.join(' '); }\nexport const x = cn('a');\n",
        );
        assert!(!kinds(&defining).contains(&FindingKind::MissingImport));
    }

    #[test]
    fn test_relative_design_system_import() {
        let file = GeneratedFile::new(
            "pages/Home.tsx",
            "import { Button } from '../components/ui/button';\n",
        );
        assert!(kinds(&file).contains(&FindingKind::Quality));
    }

    #[test]
    fn test_form_requires_schema() {
        let bare = GeneratedFile::new(
            "Form.tsx",
            "import { useForm } from 'react-hook-form';\nconst f = useForm();\n",
        );
        let findings = text_findings(&bare, &QualityRules::default());
        assert_eq!(
            findings
                .iter()
                .filter(|f| f.kind == FindingKind::Validation)
                .count(),
            2
        );

        let wired = GeneratedFile::new(
            "Form.tsx",
            "import { z } from 'zod';\nimport { zodResolver } from '@hookform/resolvers/zod';\nconst f = useForm({ resolver: zodResolver(schema) });\n",
        );
        assert!(!kinds(&wired).contains(&FindingKind::Validation));
    }

    #[test]
    fn test_css_in_js_and_warnings() {
        let file = GeneratedFile::new(
            "Title.tsx",
            "import styled from 'styled-components';\nconst T = styled.h1`color: red;`;\nconsole.log(1);\nconsole.log(2);\nlet v: any = 1;\n",
        );
        let findings = text_findings(&file, &QualityRules::default());
        assert!(findings.iter().any(|f| f.kind == FindingKind::Styling));
        let logs = findings
            .iter()
            .find(|f| f.kind == FindingKind::ConsoleLog)
            .unwrap();
        assert!(logs.message.starts_with("2 "));
        assert!(!logs.is_failure());
        assert!(findings.iter().any(|f| f.kind == FindingKind::AnyType));
    }

    #[test]
    fn test_raw_control_respects_design_import() {
        let rules = QualityRules::default();
        let issue = || vec![JsxIssue::RawControl { tag: "button".into(), line: 3 }];

        let raw = GeneratedFile::new("A.tsx", "export const A = 1;\n");
        assert_eq!(jsx_findings(&raw, &rules, issue()).len(), 1);

        let with_import = GeneratedFile::new(
            "A.tsx",
            "import { Button } from '@/components/ui/button';\n",
        );
        assert!(jsx_findings(&with_import, &rules, issue()).is_empty());
    }

    #[test]
    fn test_clean_component_is_valid() {
        let files = FileSet::from_map([(
            "App.tsx",
            "export default function App() {\n  return <h1 className=\"text-xl\">Hello</h1>;\n}\n",
        )]);
        let validator = OutputValidator::new(Arc::new(HeuristicAnalyzer::new()), QualityRules::default());
        let result = validator.validate(&files);
        assert!(result.is_valid, "{:?}", result.findings);
        assert!(result.fixed_files.is_empty());
    }
}
