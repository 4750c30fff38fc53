//! Per-module compilation.
//!
//! Each module is parsed and transpiled with oxc (TypeScript stripped, JSX
//! lowered to `React.createElement`), then re-parsed as plain JavaScript so
//! its `import`/`export` statements can be rewritten by span into calls
//! against the bundle's module registry:
//!
//! ```text
//! import React, { useState } from "react";
//!   → const __import_0 = __external("react");
//!     const React = __default(__import_0); const { useState } = __import_0;
//! export default function App() {}
//!   → __export(exports, { "default": () => App }); function App() {}
//! ```

use super::resolve::Resolution;
use super::BundleError;
use crate::files::{extension, GeneratedFile, Language};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, Declaration, ExportDefaultDeclarationKind, ImportDeclarationSpecifier,
    ModuleExportName, Statement,
};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{GetSpan, SourceType};
use oxc_transformer::{JsxOptions, JsxRuntime, TransformOptions, Transformer, TypeScriptOptions};
use std::path::Path;

/// Extensions treated as plain assets (exported as their path).
const ASSET_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "gif", "webp", "ico"];

fn source_type_for(path: &str) -> SourceType {
    match extension(path) {
        Some("ts") | Some("mts") | Some("cts") => SourceType::default()
            .with_module(true)
            .with_typescript(true),
        Some("tsx") => SourceType::default()
            .with_module(true)
            .with_typescript(true)
            .with_jsx(true),
        _ => SourceType::default().with_module(true).with_jsx(true),
    }
}

fn transform_options() -> TransformOptions {
    TransformOptions {
        typescript: TypeScriptOptions {
            only_remove_type_imports: true,
            ..TypeScriptOptions::default()
        },
        jsx: JsxOptions {
            jsx_plugin: true,
            runtime: JsxRuntime::Classic,
            development: false,
            ..JsxOptions::default()
        },
        ..TransformOptions::default()
    }
}

fn first_error<E: std::fmt::Display>(path: &str, errors: &[E]) -> BundleError {
    let detail = errors
        .iter()
        .map(|e| e.to_string())
        .take(3)
        .collect::<Vec<_>>()
        .join("; ");
    BundleError::compile(path, format!("Failed to compile {}: {}", path, detail))
}

/// TypeScript/JSX source → plain ES module JavaScript.
pub fn transpile(path: &str, source: &str) -> Result<String, BundleError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();
    if !ret.errors.is_empty() {
        return Err(first_error(path, &ret.errors));
    }
    let mut program = ret.program;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let ret = Transformer::new(&allocator, Path::new(path), &transform_options())
        .build_with_scoping(scoping, &mut program);
    if !ret.errors.is_empty() {
        return Err(first_error(path, &ret.errors));
    }

    Ok(Codegen::new().build(&program).code)
}

/// Import/export specifiers of a module, in source order, without
/// compiling it.
pub fn import_specifiers(path: &str, source: &str) -> Result<Vec<String>, BundleError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();
    if !ret.errors.is_empty() {
        return Err(first_error(path, &ret.errors));
    }

    let mut specifiers = Vec::new();
    for stmt in &ret.program.body {
        let source = match stmt {
            Statement::ImportDeclaration(decl) => Some(&decl.source),
            Statement::ExportNamedDeclaration(decl) => decl.source.as_ref(),
            Statement::ExportAllDeclaration(decl) => Some(&decl.source),
            _ => None,
        };
        if let Some(source) = source {
            specifiers.push(source.value.to_string());
        }
    }
    Ok(specifiers)
}

/// Compile one file into the body of a registry factory
/// `function (exports) { … }`.
pub fn compile_module(
    file: &GeneratedFile,
    resolve: &mut dyn FnMut(&str) -> Resolution,
) -> Result<String, BundleError> {
    match file.language {
        Language::Css => Ok(format!(
            "__injectStyle({}, {});",
            json_str(&file.path),
            json_str(&file.content)
        )),
        Language::Json => {
            let value: serde_json::Value = serde_json::from_str(&file.content).map_err(|e| {
                BundleError::compile(&file.path, format!("Invalid JSON in {}: {}", file.path, e))
            })?;
            Ok(format!("exports.default = {};", value))
        }
        _ if file.is_code() => {
            let js = transpile(&file.path, &file.content)?;
            rewrite_module_syntax(&file.path, &js, resolve)
        }
        _ if extension(&file.path).is_some_and(|ext| ASSET_EXTENSIONS.contains(&ext)) => {
            Ok(format!("exports.default = {};", json_str(&format!("/{}", file.path))))
        }
        _ => Ok(format!("exports.default = {};", json_str(&file.content))),
    }
}

/// Rewrite ES module syntax in already-transpiled JavaScript.
pub fn rewrite_module_syntax(
    path: &str,
    js: &str,
    resolve: &mut dyn FnMut(&str) -> Resolution,
) -> Result<String, BundleError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, js, SourceType::default().with_module(true)).parse();
    if !ret.errors.is_empty() {
        return Err(first_error(path, &ret.errors));
    }

    let mut edits: Vec<(u32, u32, String)> = Vec::new();
    let mut getters: Vec<(String, String)> = Vec::new();
    let mut temp = 0usize;
    let mut next_temp = |prefix: &str| {
        let name = format!("__{}_{}", prefix, temp);
        temp += 1;
        name
    };

    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                let span = decl.span;
                if decl.import_kind.is_type() {
                    edits.push((span.start, span.end, String::new()));
                    continue;
                }
                let target = registry_call(&resolve(decl.source.value.as_str()));
                let Some(specifiers) = &decl.specifiers else {
                    edits.push((span.start, span.end, format!("{};", target)));
                    continue;
                };

                let module = next_temp("import");
                let mut lines = vec![format!("const {} = {};", module, target)];
                let mut named = Vec::new();
                for spec in specifiers {
                    match spec {
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            lines.push(format!("const {} = __default({});", s.local.name, module));
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            lines.push(format!("const {} = {};", s.local.name, module));
                        }
                        ImportDeclarationSpecifier::ImportSpecifier(s) => {
                            if s.import_kind.is_type() {
                                continue;
                            }
                            let imported = export_name(&s.imported);
                            let local = s.local.name.to_string();
                            if imported == "default" {
                                lines.push(format!("const {} = __default({});", local, module));
                            } else if imported == local {
                                named.push(local);
                            } else {
                                named.push(format!("{}: {}", property_key(&imported), local));
                            }
                        }
                    }
                }
                if !named.is_empty() {
                    lines.push(format!("const {{ {} }} = {};", named.join(", "), module));
                }
                edits.push((span.start, span.end, lines.join(" ")));
            }
            Statement::ExportNamedDeclaration(decl) => {
                let span = decl.span;
                if decl.export_kind.is_type() {
                    edits.push((span.start, span.end, String::new()));
                    continue;
                }
                if let Some(declaration) = &decl.declaration {
                    for name in declared_names(declaration) {
                        getters.push((name.clone(), name));
                    }
                    edits.push((span.start, declaration.span().start, String::new()));
                } else if let Some(source) = &decl.source {
                    let module = next_temp("reexport");
                    let target = registry_call(&resolve(source.value.as_str()));
                    for spec in &decl.specifiers {
                        let local = export_name(&spec.local);
                        getters.push((
                            export_name(&spec.exported),
                            format!("{}[{}]", module, json_str(&local)),
                        ));
                    }
                    edits.push((span.start, span.end, format!("const {} = {};", module, target)));
                } else {
                    for spec in &decl.specifiers {
                        getters.push((export_name(&spec.exported), export_name(&spec.local)));
                    }
                    edits.push((span.start, span.end, String::new()));
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                let span = decl.span;
                let inner = decl.declaration.span();
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                        Some(f.id.as_ref().map(|id| id.name.to_string()))
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                        Some(c.id.as_ref().map(|id| id.name.to_string()))
                    }
                    _ => None,
                };
                match named {
                    Some(Some(name)) => {
                        getters.push(("default".to_string(), name));
                        edits.push((span.start, inner.start, String::new()));
                    }
                    Some(None) => {
                        edits.push((span.start, inner.start, "exports.default = ".to_string()));
                        edits.push((inner.end, inner.end, ";".to_string()));
                    }
                    None => {
                        edits.push((span.start, inner.start, "exports.default = ".to_string()));
                    }
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                let span = decl.span;
                if decl.export_kind.is_type() {
                    edits.push((span.start, span.end, String::new()));
                    continue;
                }
                let target = registry_call(&resolve(decl.source.value.as_str()));
                match &decl.exported {
                    Some(exported) => {
                        let module = next_temp("reexport");
                        getters.push((export_name(exported), module.clone()));
                        edits.push((span.start, span.end, format!("const {} = {};", module, target)));
                    }
                    None => {
                        edits.push((span.start, span.end, format!("__exportStar(exports, {});", target)));
                    }
                }
            }
            _ => {}
        }
    }

    edits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    let mut body = js.to_string();
    for (start, end, replacement) in edits {
        body.replace_range((start as usize)..(end as usize), &replacement);
    }

    if getters.is_empty() {
        return Ok(body);
    }
    let entries = getters
        .iter()
        .map(|(exported, local)| format!("{}: () => {}", json_str(exported), local))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("__export(exports, {{ {} }});\n{}", entries, body))
}

fn registry_call(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Local(id) => format!("__require({})", json_str(id)),
        Resolution::External(name) => format!("__external({})", json_str(name)),
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

fn declared_names(declaration: &Declaration) -> Vec<String> {
    let mut names = Vec::new();
    match declaration {
        Declaration::VariableDeclaration(var) => {
            for decl in &var.declarations {
                collect_binding_names(&decl.id, &mut names);
            }
        }
        Declaration::FunctionDeclaration(f) => {
            if let Some(id) = &f.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(c) => {
            if let Some(id) = &c.id {
                names.push(id.name.to_string());
            }
        }
        _ => {}
    }
    names
}

fn collect_binding_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_names(pattern, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => collect_binding_names(&assign.left, names),
    }
}

fn property_key(name: &str) -> String {
    let is_ident = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        name.to_string()
    } else {
        json_str(name)
    }
}

/// JSON string literal, valid as a JavaScript string literal.
pub(crate) fn json_str(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn externalize_all(spec: &str) -> Resolution {
        if spec.starts_with('.') {
            Resolution::Local(format!("src/{}.tsx", spec.trim_start_matches("./")))
        } else {
            Resolution::External(spec.to_string())
        }
    }

    #[test]
    fn test_transpile_strips_types_and_lowers_jsx() {
        let js = transpile(
            "App.tsx",
            "interface Props { n: number }\nexport default function App({ n }: Props) {\n  return <div className=\"x\">{n}</div>;\n}\n",
        )
        .unwrap();
        assert!(!js.contains("interface"));
        assert!(!js.contains(": Props"));
        assert!(js.contains("React.createElement"));
    }

    #[test]
    fn test_transpile_reports_syntax_errors() {
        let err = transpile("Broken.tsx", "export const x = (1 + ;\n").unwrap_err();
        assert_eq!(err.kind, super::super::BundleErrorKind::CompileFailure);
        assert_eq!(err.file.as_deref(), Some("Broken.tsx"));
    }

    #[test]
    fn test_rewrite_imports() {
        let mut resolve = externalize_all;
        let out = rewrite_module_syntax(
            "src/main.tsx",
            "import React, { useState as useS } from \"react\";\nimport * as Card from \"./Card\";\nimport \"./index\";\nuseS(Card);\n",
            &mut resolve,
        )
        .unwrap();
        assert!(out.contains("const __import_0 = __external(\"react\");"));
        assert!(out.contains("const React = __default(__import_0);"));
        assert!(out.contains("const { useState: useS } = __import_0;"));
        assert!(out.contains("const Card = __import_1;"));
        assert!(out.contains("__require(\"src/Card.tsx\")"));
        assert!(out.contains("__require(\"src/index.tsx\");"));
        assert!(!out.contains("import "));
    }

    #[test]
    fn test_rewrite_exports() {
        let mut resolve = externalize_all;
        let out = rewrite_module_syntax(
            "src/App.tsx",
            "export const a = 1, { b } = { b: 2 };\nexport function f() {}\nconst c = 3;\nexport { c as see };\nexport * from \"./util\";\nexport default function App() {}\n",
            &mut resolve,
        )
        .unwrap();
        assert!(out.starts_with("__export(exports, { \"a\": () => a, \"b\": () => b, \"f\": () => f, \"see\": () => c, \"default\": () => App });"));
        assert!(out.contains("__exportStar(exports, __require(\"src/util.tsx\"));"));
        assert!(out.contains("\nfunction App() {}"));
        assert!(!out.contains("export "));
    }

    #[test]
    fn test_rewrite_anonymous_default() {
        let mut resolve = externalize_all;
        let out =
            rewrite_module_syntax("a.js", "export default () => 1;\n", &mut resolve).unwrap();
        assert!(out.contains("exports.default = () => 1;"));
    }

    #[test]
    fn test_non_code_modules() {
        let mut resolve = externalize_all;
        let css = compile_module(&GeneratedFile::new("src/index.css", "body { margin: 0 }"), &mut resolve).unwrap();
        assert_eq!(css, "__injectStyle(\"src/index.css\", \"body { margin: 0 }\");");

        let json = compile_module(&GeneratedFile::new("data.json", "{\"a\": 1}"), &mut resolve).unwrap();
        assert_eq!(json, "exports.default = {\"a\":1};");

        let bad = compile_module(&GeneratedFile::new("data.json", "{oops"), &mut resolve);
        assert!(bad.is_err());
    }

    #[test]
    fn test_import_specifiers() {
        let specs = import_specifiers(
            "App.tsx",
            "import a from 'a';\nexport { b } from './b';\nexport * from './c';\nconst x = 1;\n",
        )
        .unwrap();
        assert_eq!(specs, vec!["a", "./b", "./c"]);
    }
}
