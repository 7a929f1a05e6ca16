//! The minifier capability.
//!
//! [`MinifyLevel`] uses a string-based API so it can come straight out of a
//! configuration file. [`OxcMinifier`] parses the emitted bundle, minifies it
//! and regenerates code; when the bundle has a map, the map produced by code
//! generation is composed onto it so the result still points at the original
//! modules.

use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier as OxcMinifierPass, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};
use sourcemap::SourceMap;

use crate::error::MinifyError;
use crate::source_map::{compose, to_json};

/// How aggressively to minify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinifyLevel {
    /// Remove whitespace and comments only.
    Whitespace,
    /// Syntax-level optimizations (identifiers preserved).
    Syntax,
    /// Full minification including identifier mangling.
    #[default]
    Identifiers,
}

impl MinifyLevel {
    /// Parse a minification level from a string.
    ///
    /// Accepts `whitespace`, `syntax` and `identifiers`, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "whitespace" => Ok(Self::Whitespace),
            "syntax" => Ok(Self::Syntax),
            "identifiers" | "true" => Ok(Self::Identifiers),
            _ => Err(format!(
                "invalid minify level '{s}', expected one of: whitespace, syntax, identifiers"
            )),
        }
    }

    fn options(self) -> MinifierOptions {
        match self {
            Self::Whitespace => MinifierOptions {
                mangle: None,
                compress: None,
            },
            Self::Syntax => MinifierOptions {
                mangle: None,
                compress: Some(CompressOptions::default()),
            },
            Self::Identifiers => MinifierOptions {
                mangle: Some(MangleOptions::default()),
                compress: Some(CompressOptions::default()),
            },
        }
    }
}

impl std::str::FromStr for MinifyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for MinifyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Whitespace => write!(f, "whitespace"),
            Self::Syntax => write!(f, "syntax"),
            Self::Identifiers => write!(f, "identifiers"),
        }
    }
}

/// Minified code and, when an input map was given, the composed map.
#[derive(Debug, Clone)]
pub struct MinifyOutput {
    pub code: String,
    pub map: Option<Vec<u8>>,
}

/// Minifies an emitted bundle.
pub trait Minifier: Send + Sync {
    /// Minify `code`. `map` is the bundle's source map JSON, if any;
    /// `file_name` names the artifact the result will be written to.
    fn minify(
        &self,
        code: &str,
        map: Option<&[u8]>,
        file_name: &str,
    ) -> Result<MinifyOutput, MinifyError>;
}

/// Default minifier built on `oxc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcMinifier {
    level: MinifyLevel,
}

impl OxcMinifier {
    pub fn new(level: MinifyLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> MinifyLevel {
        self.level
    }
}

impl Minifier for OxcMinifier {
    fn minify(
        &self,
        code: &str,
        map: Option<&[u8]>,
        file_name: &str,
    ) -> Result<MinifyOutput, MinifyError> {
        let inner = map.map(SourceMap::from_slice).transpose().map_err(|err| {
            MinifyError::SourceMap(format!("bundle map is not a valid source map: {err}"))
        })?;

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, code, SourceType::cjs()).parse();
        if !ret.errors.is_empty() {
            let message = ret
                .errors
                .iter()
                .map(|err| err.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MinifyError::Parse(message));
        }
        let mut program = ret.program;

        let minified = OxcMinifierPass::new(self.level.options()).minify(&allocator, &mut program);

        let options = CodegenOptions {
            source_map_path: inner.as_ref().map(|_| PathBuf::from(file_name)),
            ..CodegenOptions::minify()
        };
        let generated = Codegen::new()
            .with_options(options)
            .with_scoping(minified.scoping)
            .build(&program);

        let map = match (inner, generated.map) {
            (Some(inner), Some(outer)) => {
                let outer = SourceMap::from_slice(outer.to_json_string().as_bytes())
                    .map_err(|err| MinifyError::SourceMap(err.to_string()))?;
                Some(to_json(&compose(&outer, &inner, Some(file_name)))?)
            }
            _ => None,
        };

        Ok(MinifyOutput {
            code: generated.code,
            map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_levels() {
        assert_eq!(MinifyLevel::parse("whitespace").unwrap(), MinifyLevel::Whitespace);
        assert_eq!(MinifyLevel::parse("Syntax").unwrap(), MinifyLevel::Syntax);
        assert_eq!(MinifyLevel::parse("IDENTIFIERS").unwrap(), MinifyLevel::Identifiers);
        assert_eq!(MinifyLevel::parse("true").unwrap(), MinifyLevel::Identifiers);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(MinifyLevel::parse("none").is_err());
        assert!(MinifyLevel::parse("").is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for level in [MinifyLevel::Whitespace, MinifyLevel::Syntax, MinifyLevel::Identifiers] {
            assert_eq!(level.to_string().parse::<MinifyLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_minify_shrinks_code_without_map() {
        let code = "function add(first, second) {\n  // sum\n  return first + second;\n}\nmodule.exports = add;\n";
        let out = OxcMinifier::default().minify(code, None, "add.js").unwrap();
        assert!(out.code.len() < code.len());
        assert!(!out.code.contains("// sum"));
        assert!(out.map.is_none());
    }

    #[test]
    fn test_minify_reports_parse_errors() {
        let err = OxcMinifier::default().minify("var = ;", None, "bad.js").unwrap_err();
        assert!(matches!(err, MinifyError::Parse(_)));
    }
}
