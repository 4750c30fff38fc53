//! Module registry runtime wrapped around compiled modules.

use super::compile::json_str;

const PRELUDE: &str = r#"(function () {
  "use strict";
  var __hostExternals = globalThis.__PREVIEW_EXTERNALS__ || {};
  var __cache = {};
  var __hasOwn = Object.prototype.hasOwnProperty;
  function __external(name) {
    if (__hasOwn.call(__hostExternals, name)) return __hostExternals[name];
    throw new Error("Cannot find module '" + name + "': not provided by the preview host");
  }
  function __require(id) {
    var cached = __cache[id];
    if (cached) return cached.exports;
    var factory = __definitions[id];
    if (!factory) throw new Error("Cannot find module '" + id + "'");
    var module = { exports: {} };
    Object.defineProperty(module.exports, "__esModule", { value: true });
    __cache[id] = module;
    factory(module.exports);
    return module.exports;
  }
  function __default(m) {
    if (m && m.__esModule) return m.default;
    return m && m.default !== undefined ? m.default : m;
  }
  function __export(target, getters) {
    for (var key in getters) {
      Object.defineProperty(target, key, { enumerable: true, get: getters[key] });
    }
  }
  function __exportStar(target, source) {
    Object.keys(source).forEach(function (key) {
      if (key === "default" || __hasOwn.call(target, key)) return;
      Object.defineProperty(target, key, {
        enumerable: true,
        get: function () { return source[key]; }
      });
    });
  }
  function __injectStyle(id, css) {
    if (typeof document === "undefined") return;
    var style = document.createElement("style");
    style.setAttribute("data-preview-module", id);
    style.textContent = css;
    document.head.appendChild(style);
  }
  var __definitions = {
"#;

/// Wrap compiled module bodies into one self-executing script.
///
/// The entry module's exports are published as `globalThis.__PREVIEW_ENTRY__`.
pub fn render_script(entry: &str, modules: &[(String, String)]) -> String {
    let mut out = String::from(PRELUDE);
    for (idx, (id, body)) in modules.iter().enumerate() {
        out.push_str(&format!("    {}: function (exports) {{\n", json_str(id)));
        // Bodies are emitted verbatim; re-indenting would alter template literals.
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("    }");
        if idx + 1 < modules.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("  };\n");
    out.push_str(&format!(
        "  globalThis.__PREVIEW_ENTRY__ = __require({});\n",
        json_str(entry)
    ));
    out.push_str("})();\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_shape() {
        let script = render_script(
            "src/main.tsx",
            &[
                ("src/main.tsx".to_string(), "__require(\"src/App.tsx\");".to_string()),
                ("src/App.tsx".to_string(), "exports.default = 1;".to_string()),
            ],
        );
        assert!(script.starts_with("(function () {"));
        assert!(script.contains("\"src/main.tsx\": function (exports) {"));
        assert!(script.contains("\"src/App.tsx\": function (exports) {"));
        assert!(script.contains("globalThis.__PREVIEW_ENTRY__ = __require(\"src/main.tsx\");"));
        assert!(script.trim_end().ends_with("})();"));
    }
}
