//! Source map helpers shared by the bundler and the post-processing stages.
//!
//! Bundles carry their map inline as a base64 data URL on the last line.
//! The emit stage moves it into a sibling `.map` file and leaves a plain
//! reference comment behind; the minify stage strips that reference, composes
//! the minifier's map onto the bundle map and writes a new reference.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sourcemap::{SourceMap, SourceMapBuilder};

use crate::error::SourceMapError;

const MAP_URL_MARKERS: [&str; 2] = ["//# sourceMappingURL=", "//@ sourceMappingURL="];
const DATA_URL_PREFIX: &str = "data:application/json;";

/// Inline map moved out of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMap {
    /// The bundle without its map comment.
    pub code: String,
    /// Decoded map JSON.
    pub map: Vec<u8>,
}

/// Build the trailing comment that embeds `map_json` as a base64 data URL.
pub fn inline_map_comment(map_json: &[u8]) -> String {
    format!(
        "//# sourceMappingURL={}charset=utf-8;base64,{}",
        DATA_URL_PREFIX,
        STANDARD.encode(map_json)
    )
}

/// Split an inline data-URL map off the end of `code`.
///
/// Returns `Ok(None)` when the last non-empty line is not a map comment or
/// points at an external file.
pub fn extract_inline_map(code: &str) -> Result<Option<ExtractedMap>, SourceMapError> {
    let Some((start, url)) = trailing_map_url(code) else {
        return Ok(None);
    };
    let Some(params) = url.strip_prefix(DATA_URL_PREFIX) else {
        return Ok(None);
    };
    let Some((_, payload)) = params.split_once("base64,") else {
        return Err(SourceMapError::UnsupportedDataUrl(truncate(url)));
    };

    let map = STANDARD.decode(payload.trim())?;
    // Reject garbage before it lands on disk.
    SourceMap::from_slice(&map)?;

    Ok(Some(ExtractedMap {
        code: code[..start].to_string(),
        map,
    }))
}

/// Remove a trailing map reference comment of any kind.
pub fn strip_map_comment(code: &str) -> &str {
    match trailing_map_url(code) {
        Some((start, _)) => &code[..start],
        None => code,
    }
}

/// Append a reference to an external map file, keeping `code` newline
/// terminated.
pub fn with_map_reference(code: &str, map_file_name: &str) -> String {
    let mut out = String::with_capacity(code.len() + map_file_name.len() + 24);
    out.push_str(code);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("//# sourceMappingURL=");
    out.push_str(map_file_name);
    out.push('\n');
    out
}

/// Compose two maps: `outer` maps generated code to an intermediate file,
/// `inner` maps that intermediate file to the original sources.
///
/// Tokens of `outer` whose intermediate position falls on a line `inner`
/// does not map are dropped.
pub fn compose(outer: &SourceMap, inner: &SourceMap, file: Option<&str>) -> SourceMap {
    let mut builder = SourceMapBuilder::new(file);
    let mut source_ids: Vec<Option<u32>> = vec![None; inner.get_source_count() as usize];

    for token in outer.tokens() {
        if !token.has_source() {
            continue;
        }
        let (line, col) = (token.get_src_line(), token.get_src_col());
        let Some(original) = inner.lookup_token(line, col) else {
            continue;
        };
        if original.get_dst_line() != line || !original.has_source() {
            continue;
        }

        let inner_id = original.get_src_id();
        let source_id = match source_ids.get(inner_id as usize).copied().flatten() {
            Some(id) => id,
            None => {
                let Some(name) = original.get_source() else {
                    continue;
                };
                let id = builder.add_source(name.into());
                if let Some(contents) = inner.get_source_contents(inner_id) {
                    builder.set_source_contents(id, Some(contents.into()));
                }
                if let Some(slot) = source_ids.get_mut(inner_id as usize) {
                    *slot = Some(id);
                }
                id
            }
        };

        let name_id = token.get_name().map(|name| builder.add_name(name.into()));
        // Bundle mappings are column-preserving, so the offset into the
        // intermediate line carries over to the original line.
        let src_col = original.get_src_col() + (col - original.get_dst_col());
        builder.add_raw(
            token.get_dst_line(),
            token.get_dst_col(),
            original.get_src_line(),
            src_col,
            Some(source_id),
            name_id,
            false,
        );
    }

    builder.into_sourcemap()
}

/// Serialize a map to JSON bytes.
pub fn to_json(map: &SourceMap) -> Result<Vec<u8>, SourceMapError> {
    let mut bytes = Vec::new();
    map.to_writer(&mut bytes)?;
    Ok(bytes)
}

/// Byte offset of the trailing map comment line and its URL.
fn trailing_map_url(code: &str) -> Option<(usize, &str)> {
    let body = code.trim_end_matches(['\n', '\r', ' ', '\t']);
    let start = body.rfind('\n').map_or(0, |idx| idx + 1);
    let line = body[start..].trim_start();
    MAP_URL_MARKERS
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(|url| (start, url.trim()))
}

fn truncate(url: &str) -> String {
    url.chars().take(48).collect()
}
