//! Heuristic source scanners.
//!
//! Line and character scanners approximating a parser. They back the
//! [`HeuristicAnalyzer`] directly and are used by the AST analyzer to
//! classify a failed parse.

use super::{line_of, SourceAnalyzer};
use crate::files::GeneratedFile;
use crate::validation::quality::{self, JsxIssue};
use crate::validation::{FindingKind, QualityRules, ValidationFinding};
use regex::Regex;
use std::sync::LazyLock;

/// `import … from <q>path<q>` / `export … from <q>path<q>` / `import <q>path<q>`
///
/// The binding clause may span lines (`import {\n  A,\n} from …`).
static IMPORT_QUOTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^(\s*(?:(?:import|export)\b[\w\s{},*$]*?\bfrom\s*|import\s*))(['"])([^'"\n]*)(['"])"#,
    )
    .unwrap()
});

static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<img\b[^>]*>").unwrap());

static ICON_ONLY_BUTTON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:button|Button)\b([^>]*)>\s*<[A-Z][\w.]*\b[^>]*/>\s*</(?:button|Button)>")
        .unwrap()
});

static INLINE_STYLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bstyle=\{\{").unwrap());

static RAW_CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(button|input)\b([^>]*)>").unwrap());

/// Rewrite mismatched import/export quotes so the closing quote matches the
/// opening one.
///
/// Returns the repaired content and the 1-indexed lines that changed, or
/// `None` when nothing needed repair.
pub fn repair_import_quotes(content: &str) -> Option<(String, Vec<usize>)> {
    let mut lines = Vec::new();
    for caps in IMPORT_QUOTES.captures_iter(content) {
        if caps[2] != caps[4] {
            let start = caps.get(2).map(|m| m.start()).unwrap_or(0);
            lines.push(line_of(content, start));
        }
    }
    if lines.is_empty() {
        return None;
    }

    let repaired = IMPORT_QUOTES.replace_all(content, |caps: &regex::Captures| {
        let open = &caps[2];
        format!("{}{}{}{}", &caps[1], open, &caps[3], open)
    });
    Some((repaired.into_owned(), lines))
}

/// Lines on which a single- or double-quoted string is still open at end of
/// line.
///
/// Escape-aware; template literals and block comments are tracked across
/// lines; `//` comment lines are skipped; a quote between two letters outside
/// a string (`Don't`) is read as an apostrophe.
pub fn unterminated_string_lines(content: &str) -> Vec<usize> {
    let mut flagged = Vec::new();
    let mut in_template = false;
    let mut in_block_comment = false;

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if !in_template
            && !in_block_comment
            && (trimmed.starts_with("//") || trimmed.starts_with('*'))
        {
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut in_string: Option<char> = None;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if in_block_comment {
                if c == '*' && next == Some('/') {
                    in_block_comment = false;
                    i += 1;
                }
            } else if in_template {
                if c == '\\' {
                    i += 1;
                } else if c == '`' {
                    in_template = false;
                }
            } else if let Some(quote) = in_string {
                if c == '\\' {
                    i += 1;
                } else if c == quote {
                    in_string = None;
                }
            } else {
                match c {
                    '/' if next == Some('/') => break,
                    '/' if next == Some('*') => {
                        in_block_comment = true;
                        i += 1;
                    }
                    '`' => in_template = true,
                    '\'' | '"' => {
                        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
                        let apostrophe = c == '\''
                            && prev.is_some_and(|p| p.is_alphabetic())
                            && next.is_some_and(|n| n.is_alphabetic());
                        if !apostrophe {
                            in_string = Some(c);
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }

        if in_string.is_some() {
            flagged.push(idx + 1);
        }
    }

    flagged
}

/// Component tags (`<Uppercase …>`) opened without a matching close.
///
/// Returns `(tag_name, opening_line)` in opening order. A closing tag pops
/// every frame above its opener, so `<A><B></A>` reports `B`. Self-closing
/// tags, TypeScript generics (`useState<User>`, `<T,>`) and `//` comments
/// are ignored.
pub fn unclosed_component_tags(content: &str) -> Vec<(String, usize)> {
    let bytes = content.as_bytes();
    let mut stack: Vec<(String, usize)> = Vec::new();
    let mut unclosed: Vec<(String, usize)> = Vec::new();
    let mut line = 1;
    let mut in_line_comment = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\n' {
            line += 1;
            in_line_comment = false;
            i += 1;
            continue;
        }
        if in_line_comment {
            i += 1;
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            in_line_comment = true;
            i += 2;
            continue;
        }
        if b != b'<' {
            i += 1;
            continue;
        }

        if bytes.get(i + 1) == Some(&b'/') {
            let (name, end) = read_tag_name(content, i + 2);
            if is_component_name(name) {
                if let Some(pos) = stack.iter().rposition(|(open, _)| open == name) {
                    unclosed.extend(stack.drain(pos + 1..));
                    stack.pop();
                }
            }
            i = end.max(i + 2);
            continue;
        }

        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        if prev.is_ascii_alphanumeric() || matches!(prev, b'_' | b'$' | b'.') {
            i += 1;
            continue;
        }

        let (name, name_end) = read_tag_name(content, i + 1);
        if !is_component_name(name) || is_generic_parameter(content, name_end) {
            i += 1;
            continue;
        }

        let open_line = line;
        match scan_tag_end(bytes, name_end) {
            Some(tag_end) => {
                line += tag_end.newlines;
                if !tag_end.self_closing {
                    stack.push((name.to_string(), open_line));
                }
                i = tag_end.index + 1;
            }
            None => {
                stack.push((name.to_string(), open_line));
                break;
            }
        }
    }

    unclosed.extend(stack);
    unclosed.sort_by_key(|(_, line)| *line);
    unclosed
}

struct TagEnd {
    index: usize,
    self_closing: bool,
    newlines: usize,
}

fn read_tag_name(content: &str, start: usize) -> (&str, usize) {
    let bytes = content.as_bytes();
    let mut end = start;
    while end < bytes.len()
        && (bytes[end].is_ascii_alphanumeric() || matches!(bytes[end], b'_' | b'$' | b'.'))
    {
        end += 1;
    }
    (content.get(start..end).unwrap_or(""), end)
}

fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn is_generic_parameter(content: &str, name_end: usize) -> bool {
    let rest = content.get(name_end..).unwrap_or("").trim_start();
    rest.starts_with(',') || rest.starts_with("extends ")
}

/// Find the `>` closing an opening tag, skipping braces and quoted values.
fn scan_tag_end(bytes: &[u8], from: usize) -> Option<TagEnd> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut newlines = 0;
    let mut last_significant = b' ';
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\n' {
            newlines += 1;
        }
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => {
                    return Some(TagEnd {
                        index: i,
                        self_closing: last_significant == b'/',
                        newlines,
                    });
                }
                b'<' if depth == 0 => return None,
                _ => {}
            }
        }
        if !b.is_ascii_whitespace() {
            last_significant = b;
        }
        i += 1;
    }
    None
}

/// Syntax findings from the line scanners alone.
pub fn scanner_syntax_findings(file: &GeneratedFile) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    for line in unterminated_string_lines(&file.content) {
        findings.push(
            ValidationFinding::new(
                FindingKind::UnterminatedString,
                &file.path,
                "String literal is not terminated on this line",
            )
            .at_line(line),
        );
    }

    for (tag, line) in unclosed_component_tags(&file.content) {
        findings.push(
            ValidationFinding::new(
                FindingKind::MissingClosingTag,
                &file.path,
                format!("<{}> opened on line {} is never closed", tag, line),
            )
            .at_line(line),
        );
    }

    findings
}

/// Regex/line-scan analyzer.
#[derive(Debug, Default, Clone)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn jsx_issues(&self, content: &str) -> Vec<JsxIssue> {
        let mut issues = Vec::new();

        for m in IMG_TAG.find_iter(content) {
            if !m.as_str().contains("alt=") {
                issues.push(JsxIssue::ImgWithoutAlt {
                    line: line_of(content, m.start()),
                });
            }
        }

        for caps in ICON_ONLY_BUTTON.captures_iter(content) {
            if !caps[1].contains("aria-label") {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
                issues.push(JsxIssue::IconButtonWithoutLabel {
                    line: line_of(content, start),
                });
            }
        }

        for m in INLINE_STYLE.find_iter(content) {
            issues.push(JsxIssue::InlineStyle {
                line: line_of(content, m.start()),
            });
        }

        for caps in RAW_CONTROL.captures_iter(content) {
            let attrs = &caps[2];
            if attrs.contains("className=") || attrs.contains("class=") {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
                issues.push(JsxIssue::RawControl {
                    tag: caps[1].to_string(),
                    line: line_of(content, start),
                });
            }
        }

        issues
    }
}

impl SourceAnalyzer for HeuristicAnalyzer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn detect_syntax_issues(&self, file: &GeneratedFile) -> Vec<ValidationFinding> {
        scanner_syntax_findings(file)
    }

    fn detect_quality_issues(
        &self,
        file: &GeneratedFile,
        rules: &QualityRules,
    ) -> Vec<ValidationFinding> {
        let mut findings = quality::text_findings(file, rules);
        findings.extend(quality::jsx_findings(file, rules, self.jsx_issues(&file.content)));
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_opening_quote_wins() {
        let (fixed, lines) = repair_import_quotes("import X from './a\"\n").unwrap();
        assert_eq!(fixed, "import X from './a'\n");
        assert_eq!(lines, vec![1]);

        let (fixed, _) = repair_import_quotes("import X from \"./a'\n").unwrap();
        assert_eq!(fixed, "import X from \"./a\"\n");
    }

    #[test]
    fn test_repair_export_and_side_effect_imports() {
        let src = "import './index.css\"\nexport { A } from \"./a'\n";
        let (fixed, lines) = repair_import_quotes(src).unwrap();
        assert_eq!(fixed, "import './index.css'\nexport { A } from \"./a\"\n");
        assert_eq!(lines, vec![1, 2]);
    }

    #[test]
    fn test_repair_multiline_import_clause() {
        let src = "import {\n  Button,\n  Card,\n} from './ui\";\nimport React from 'react';\n";
        let (fixed, lines) = repair_import_quotes(src).unwrap();
        assert_eq!(
            fixed,
            "import {\n  Button,\n  Card,\n} from './ui';\nimport React from 'react';\n"
        );
        assert_eq!(lines, vec![4]);
    }

    #[test]
    fn test_repair_ignores_from_in_jsx_text() {
        let src = "export default function App() {\n  return <p>Quote from \"Ada'</p>;\n}\n";
        assert!(repair_import_quotes(src).is_none());
    }

    #[test]
    fn test_repair_noop_on_balanced_quotes() {
        assert!(repair_import_quotes("import React from 'react';\n").is_none());
    }

    #[test]
    fn test_unterminated_string_detection() {
        let src = "const a = 'ok';\nconst b = \"broken;\nconst c = `multi\nline ' inside`;\n";
        assert_eq!(unterminated_string_lines(src), vec![2]);
    }

    #[test]
    fn test_unterminated_ignores_comments_and_apostrophes() {
        let src = "// it's a comment\n/* don't\n it's */\nconst s = \"it's fine\";\n";
        assert!(unterminated_string_lines(src).is_empty());
        assert!(unterminated_string_lines("<p>Don't stop</p>\n").is_empty());
    }

    #[test]
    fn test_unterminated_escaped_quote() {
        assert!(unterminated_string_lines("const s = 'a\\'b';\n").is_empty());
        assert_eq!(unterminated_string_lines("const s = 'a\\';\n"), vec![1]);
    }

    #[test]
    fn test_unclosed_component_reports_opening_line() {
        let src = "export default function App() {\n  return (\n    <Foo>\n      <div>hi</div>\n  );\n}\n";
        assert_eq!(unclosed_component_tags(src), vec![("Foo".to_string(), 3)]);
    }

    #[test]
    fn test_close_pops_frames_opened_inside() {
        let src = "<Page>\n  <Section>\n    <Card>\n</Page>\n";
        assert_eq!(
            unclosed_component_tags(src),
            vec![("Section".to_string(), 2), ("Card".to_string(), 3)]
        );
        assert_eq!(unclosed_component_tags("<A><B></A>"), vec![("B".to_string(), 1)]);
    }

    #[test]
    fn test_balanced_and_self_closing_tags() {
        let src = "<Layout title=\"x\">\n  <Icon size={4} />\n  <Card onClick={() => go(1)}>\n  </Card>\n</Layout>\n";
        assert!(unclosed_component_tags(src).is_empty());
    }

    #[test]
    fn test_generics_are_not_tags() {
        let src = "const [u, setU] = useState<User | null>(null);\nconst id = <T,>(x: T) => x;\n";
        assert!(unclosed_component_tags(src).is_empty());
    }

    #[test]
    fn test_multiline_attributes_keep_line_count() {
        let src = "<Modal\n  open={true}\n  onClose={() => {}}\n>\n  <Body>\n</Modal>\n";
        assert_eq!(unclosed_component_tags(src), vec![("Body".to_string(), 5)]);
    }

    #[test]
    fn test_heuristic_quality_jsx_checks() {
        let file = GeneratedFile::new(
            "Card.tsx",
            "export default function Card() {\n  return (\n    <div style={{ color: 'red' }}>\n      <img src=\"/a.png\" />\n      <button onClick={go}><XIcon /></button>\n    </div>\n  );\n}\n",
        );
        let findings =
            HeuristicAnalyzer::new().detect_quality_issues(&file, &QualityRules::default());
        let kinds: Vec<FindingKind> = findings.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == FindingKind::Accessibility)
                .count(),
            2
        );
        assert!(kinds.contains(&FindingKind::Styling));
    }
}
