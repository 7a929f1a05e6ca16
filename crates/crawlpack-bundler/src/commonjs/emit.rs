//! Bundle rendering.
//!
//! The bundle is a script that evaluates to the entry's exports. Every
//! module body is wrapped in a `function (require, module, exports)` and
//! stored in a table next to its resolved dependency ids. Module bodies are
//! copied verbatim, one source line per generated line, so the source map is
//! a straight line-to-line mapping.

use std::path::PathBuf;
use std::sync::Arc;

use sourcemap::SourceMapBuilder;

use crate::error::BundleError;
use crate::source_map::{inline_map_comment, to_json};

const PRELUDE: &str = r#"(function (modules, entry) {
  var cache = {};
  function load(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    var record = modules[id];
    var module = (cache[id] = { exports: {} });
    function localRequire(name) {
      var deps = record[1];
      var dep = Object.prototype.hasOwnProperty.call(deps, name) ? deps[name] : null;
      if (dep === null) {
        var err = new Error("Cannot find module '" + name + "'");
        err.code = "MODULE_NOT_FOUND";
        throw err;
      }
      return load(dep);
    }
    record[0].call(module.exports, localRequire, module, module.exports);
    return module.exports;
  }
  var main = load(entry);
  if (typeof module === "object" && module !== null) module.exports = main;
  return main;
})({
"#;

const EPILOGUE: &str = "}, 0);\n";

/// One module as it goes into the bundle. Ids are positions in the slice.
#[derive(Debug)]
pub(crate) struct ModuleRecord {
    pub path: PathBuf,
    pub source: Arc<str>,
    /// Specifier to module id, `None` for ignored missing modules.
    pub deps: Vec<(String, Option<usize>)>,
}

/// Render `modules` (entry first) into bundle code with an inline map.
pub(crate) fn render(modules: &[ModuleRecord], file_name: &str) -> Result<String, BundleError> {
    let mut code = String::from(PRELUDE);
    let mut line = line_count(PRELUDE);
    let mut map = SourceMapBuilder::new(Some(file_name));

    for (id, module) in modules.iter().enumerate() {
        code.push_str(&format!("{id}: [function (require, module, exports) {{\n"));
        line += 1;

        let source_name = module.path.to_string_lossy();
        let source_id = map.add_source(source_name.as_ref().into());
        map.set_source_contents(source_id, Some(module.source.as_ref().into()));

        let body_lines = line_count(&module.source).max(1);
        for offset in 0..body_lines {
            map.add_raw(line + offset, 0, offset, 0, Some(source_id), None, false);
        }
        code.push_str(&module.source);
        if !module.source.ends_with('\n') {
            code.push('\n');
        }
        line += body_lines;

        code.push_str("}, ");
        code.push_str(&dependency_table(&module.deps)?);
        code.push_str("],\n");
        line += 1;
    }
    code.push_str(EPILOGUE);

    let map_json = to_json(&map.into_sourcemap())
        .map_err(|err| BundleError::SourceMap(err.to_string()))?;
    code.push_str(&inline_map_comment(&map_json));
    code.push('\n');
    Ok(code)
}

fn dependency_table(deps: &[(String, Option<usize>)]) -> Result<String, BundleError> {
    let table: serde_json::Map<String, serde_json::Value> = deps
        .iter()
        .map(|(specifier, id)| (specifier.clone(), serde_json::json!(id)))
        .collect();
    serde_json::to_string(&table).map_err(|err| BundleError::SourceMap(err.to_string()))
}

/// Lines occupied by `text` once it is newline terminated.
fn line_count(text: &str) -> u32 {
    let newlines = text.matches('\n').count() as u32;
    if text.is_empty() || text.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_map::extract_inline_map;
    use sourcemap::SourceMap;

    #[test]
    fn test_render_maps_module_lines() {
        let modules = vec![
            ModuleRecord {
                path: PathBuf::from("/src/main.js"),
                source: Arc::from("var x = require('./x');\nmodule.exports = x;"),
                deps: vec![("./x".to_string(), Some(1))],
            },
            ModuleRecord {
                path: PathBuf::from("/src/x.js"),
                source: Arc::from("module.exports = 1;\n"),
                deps: Vec::new(),
            },
        ];

        let code = render(&modules, "main.js").unwrap();
        assert!(code.contains(r#"}, {"./x":1}],"#));

        let extracted = extract_inline_map(&code).unwrap().unwrap();
        let map = SourceMap::from_slice(&extracted.map).unwrap();
        let sources: Vec<_> = map.sources().collect();
        assert_eq!(sources, vec!["/src/main.js", "/src/x.js"]);

        let first_body_line = line_count(PRELUDE) + 1;
        let token = map.lookup_token(first_body_line + 1, 0).unwrap();
        assert_eq!(token.get_source(), Some("/src/main.js"));
        assert_eq!(token.get_src_line(), 1);

        let lines: Vec<&str> = extracted.code.lines().collect();
        assert_eq!(lines[(first_body_line + 1) as usize], "module.exports = x;");
    }

    #[test]
    fn test_missing_dependency_is_null() {
        let modules = vec![ModuleRecord {
            path: PathBuf::from("/src/main.js"),
            source: Arc::from("require('fs');\n"),
            deps: vec![("fs".to_string(), None)],
        }];
        let code = render(&modules, "main.js").unwrap();
        assert!(code.contains(r#"{"fs":null}"#));
    }
}
