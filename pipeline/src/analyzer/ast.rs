//! Tree-sitter backed analyzer.
//!
//! Parses `.tsx/.jsx/.js` with the TSX grammar and `.ts` with the TypeScript
//! grammar. Quality checks walk JSX element nodes instead of pattern-matching
//! text, so attributes spread over several lines are seen as one element.

use super::heuristic::{scanner_syntax_findings, HeuristicAnalyzer};
use super::SourceAnalyzer;
use crate::files::{GeneratedFile, Language as FileLanguage};
use crate::validation::quality::{self, JsxIssue};
use crate::validation::{FindingKind, QualityRules, ValidationFinding};
use tree_sitter::{Language, LanguageError, Node, Parser, Tree};

pub struct AstAnalyzer {
    tsx: Language,
    typescript: Language,
}

impl AstAnalyzer {
    /// Load both grammars, failing if either is ABI-incompatible with the
    /// linked tree-sitter runtime.
    pub fn new() -> Result<Self, LanguageError> {
        let tsx: Language = tree_sitter_typescript::LANGUAGE_TSX.into();
        let typescript: Language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();

        let mut parser = Parser::new();
        parser.set_language(&tsx)?;
        parser.set_language(&typescript)?;

        Ok(Self { tsx, typescript })
    }

    fn grammar_for(&self, file: &GeneratedFile) -> &Language {
        match file.language {
            FileLanguage::Typescript => &self.typescript,
            _ => &self.tsx,
        }
    }

    fn parse(&self, file: &GeneratedFile) -> Option<Tree> {
        let mut parser = Parser::new();
        parser.set_language(self.grammar_for(file)).ok()?;
        parser.parse(&file.content, None)
    }

    fn collect_jsx(node: Node, src: &[u8], issues: &mut Vec<JsxIssue>) {
        match node.kind() {
            "jsx_opening_element" | "jsx_self_closing_element" => {
                Self::check_element(node, src, issues);
            }
            "jsx_element" => {
                if Self::is_unlabelled_icon_button(node, src) {
                    issues.push(JsxIssue::IconButtonWithoutLabel {
                        line: node.start_position().row + 1,
                    });
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            Self::collect_jsx(child, src, issues);
        }
    }

    fn check_element(node: Node, src: &[u8], issues: &mut Vec<JsxIssue>) {
        let Some(name) = element_name(node, src) else {
            return;
        };
        let line = node.start_position().row + 1;
        let attrs = attributes(node, src);
        let has_attr = |wanted: &str| attrs.iter().any(|(n, _)| n == wanted);
        let mut cursor = node.walk();
        let has_spread = node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "jsx_expression");

        if name == "img" && !has_attr("alt") && !has_spread {
            issues.push(JsxIssue::ImgWithoutAlt { line });
        }

        if (name == "button" || name == "input") && (has_attr("className") || has_attr("class")) {
            issues.push(JsxIssue::RawControl {
                tag: name.to_string(),
                line,
            });
        }

        for (attr, value) in &attrs {
            if attr == "style" && value.is_some_and(|v| is_object_expression(&v)) {
                issues.push(JsxIssue::InlineStyle {
                    line: value.map(|v| v.start_position().row + 1).unwrap_or(line),
                });
            }
        }
    }

    /// `<button>` / `<Button>` whose only content is a single component
    /// element and which carries no `aria-label`.
    fn is_unlabelled_icon_button(node: Node, src: &[u8]) -> bool {
        let Some(open) = node.child_by_field_name("open_tag") else {
            return false;
        };
        if !matches!(element_name(open, src), Some("button" | "Button")) {
            return false;
        }
        if attributes(open, src).iter().any(|(n, _)| n == "aria-label") {
            return false;
        }

        let mut cursor = node.walk();
        let content: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|c| !matches!(c.kind(), "jsx_opening_element" | "jsx_closing_element"))
            .filter(|c| {
                !(c.kind() == "jsx_text"
                    && c.utf8_text(src).map(|t| t.trim().is_empty()).unwrap_or(true))
            })
            .collect();

        match content.as_slice() {
            [only] if only.kind() == "jsx_self_closing_element" => element_name(*only, src)
                .is_some_and(|n| n.chars().next().is_some_and(|c| c.is_ascii_uppercase())),
            _ => false,
        }
    }
}

fn element_name<'a>(node: Node, src: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(src).ok())
}

/// `(name, value)` for each `jsx_attribute` child of an opening element.
fn attributes<'t>(node: Node<'t>, src: &[u8]) -> Vec<(String, Option<Node<'t>>)> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() == "jsx_attribute")
        .filter_map(|attr| {
            let name = attr.named_child(0)?.utf8_text(src).ok()?.to_string();
            Some((name, attr.named_child(1)))
        })
        .collect()
}

fn is_object_expression(value: &Node) -> bool {
    value.kind() == "jsx_expression"
        && value
            .named_child(0)
            .is_some_and(|inner| inner.kind() == "object")
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

impl SourceAnalyzer for AstAnalyzer {
    fn name(&self) -> &'static str {
        "ast"
    }

    fn detect_syntax_issues(&self, file: &GeneratedFile) -> Vec<ValidationFinding> {
        let Some(tree) = self.parse(file) else {
            tracing::debug!(file = %file.path, "tree-sitter produced no tree, using line scanners");
            return scanner_syntax_findings(file);
        };

        let root = tree.root_node();
        if !root.has_error() {
            return Vec::new();
        }

        let findings = scanner_syntax_findings(file);
        if !findings.is_empty() {
            return findings;
        }

        let Some(error) = first_error(root) else {
            return Vec::new();
        };
        let line = error.start_position().row + 1;
        let message = if error.is_missing() {
            format!("Missing `{}`", error.kind())
        } else {
            let snippet: String = error
                .utf8_text(file.content.as_bytes())
                .unwrap_or("")
                .chars()
                .take(40)
                .collect();
            format!("Unexpected syntax near `{}`", snippet.trim())
        };

        vec![ValidationFinding::new(FindingKind::InvalidJsx, &file.path, message).at_line(line)]
    }

    fn detect_quality_issues(
        &self,
        file: &GeneratedFile,
        rules: &QualityRules,
    ) -> Vec<ValidationFinding> {
        let issues = match self.parse(file) {
            Some(tree) => {
                let mut issues = Vec::new();
                Self::collect_jsx(tree.root_node(), file.content.as_bytes(), &mut issues);
                issues
            }
            None => HeuristicAnalyzer::new().jsx_issues(&file.content),
        };

        let mut findings = quality::text_findings(file, rules);
        findings.extend(quality::jsx_findings(file, rules, issues));
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> AstAnalyzer {
        AstAnalyzer::new().unwrap()
    }

    #[test]
    fn test_clean_parse_has_no_syntax_findings() {
        let file = GeneratedFile::new(
            "App.tsx",
            "import React, { useState } from 'react';\n\ninterface Props { title: string }\n\nexport default function App({ title }: Props) {\n  const [n, setN] = useState<number>(0);\n  return (\n    <main>\n      <h1>{title}</h1>\n      <Counter value={n} onChange={(v) => setN(v)} />\n    </main>\n  );\n}\n",
        );
        assert!(analyzer().detect_syntax_issues(&file).is_empty());
    }

    #[test]
    fn test_unclosed_component_classified_by_scanner() {
        let file = GeneratedFile::new(
            "App.tsx",
            "export default function App() {\n  return (\n    <Layout>\n      <p>hi</p>\n  );\n}\n",
        );
        let findings = analyzer().detect_syntax_issues(&file);
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::MissingClosingTag && f.line == Some(3)));
    }

    #[test]
    fn test_unexplained_parse_error_is_invalid_jsx() {
        let file = GeneratedFile::new("util.ts", "export const x = (1 + ;\n");
        let findings = analyzer().detect_syntax_issues(&file);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::InvalidJsx);
        assert_eq!(findings[0].line, Some(1));
    }

    #[test]
    fn test_ts_grammar_accepts_angle_bracket_casts() {
        let file = GeneratedFile::new("cast.ts", "const n = <number>value;\nexport default n;\n");
        assert!(analyzer().detect_syntax_issues(&file).is_empty());
    }

    #[test]
    fn test_multiline_jsx_quality_checks() {
        let file = GeneratedFile::new(
            "Hero.tsx",
            "export function Hero() {\n  return (\n    <section>\n      <img\n        src=\"/hero.png\"\n        className=\"w-full\"\n      />\n      <button onClick={close}>\n        <XIcon />\n      </button>\n      <div style={{ margin: 0 }} />\n      <button className=\"px-2\" aria-label=\"Go\">Go</button>\n    </section>\n  );\n}\n",
        );
        let findings = analyzer().detect_quality_issues(&file, &QualityRules::default());
        let at = |kind: FindingKind| -> Vec<Option<usize>> {
            findings
                .iter()
                .filter(|f| f.kind == kind)
                .map(|f| f.line)
                .collect()
        };
        assert_eq!(at(FindingKind::Accessibility), vec![Some(4), Some(8)]);
        assert_eq!(at(FindingKind::Styling), vec![Some(11)]);
        assert_eq!(at(FindingKind::Quality), vec![Some(12)]);
    }

    #[test]
    fn test_labelled_icon_button_passes() {
        let file = GeneratedFile::new(
            "Close.tsx",
            "export const Close = () => (\n  <button aria-label=\"Close\">\n    <XIcon />\n  </button>\n);\n",
        );
        let findings = analyzer().detect_quality_issues(&file, &QualityRules::default());
        assert!(findings.iter().all(|f| f.kind != FindingKind::Accessibility));
    }
}
