//! Legacy manifest reading
//!
//! Reads `manifest.json` out of a legacy archive into a [`Node`] tree.
//! `serde_json` does the parsing; line/column positions for diagnostics are
//! then recovered by scanning the source for each member's quoted key.

use std::io::{Read, Seek};

use serde_json::Value;
use zip::ZipArchive;

use crate::error::ConvertError;
use crate::node::{Location, Mapping, Node, child_path, index_path};

/// Name of the manifest file, both inside archives and at package roots
pub const MANIFEST_FILE: &str = "manifest.json";

/// Read and parse the root manifest entry of an archive.
pub fn read_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Node, ConvertError> {
    let mut entry = match archive.by_name(MANIFEST_FILE) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ConvertError::ArchiveStructure(format!(
                "archive has no {MANIFEST_FILE}"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    entry.read_to_string(&mut content).map_err(|e| {
        ConvertError::malformed(format!("{MANIFEST_FILE} is not readable UTF-8: {e}"), None)
    })?;

    parse_manifest(&content)
}

/// Parse manifest JSON text into a located tree.
pub fn parse_manifest(source: &str) -> Result<Node, ConvertError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);

    let value: Value = serde_json::from_str(source).map_err(|e| {
        ConvertError::malformed(
            format!("invalid JSON: {e}"),
            Some(Location::new(e.line(), e.column(), "")),
        )
    })?;

    if !value.is_object() {
        return Err(ConvertError::malformed(
            "manifest root must be an object",
            Some(Location::new(1, 1, "")),
        ));
    }

    let locator = Locator::new(source);
    let start = source.find('{').unwrap_or(0);
    Ok(locator.build(value, start, start, String::new()))
}

/// Render a (possibly reduced) manifest back to JSON.
pub fn manifest_to_json(manifest: &Node) -> Result<String, ConvertError> {
    Ok(serde_json::to_string_pretty(&manifest.to_json_value())?)
}

struct Locator<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> Locator<'a> {
    fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    fn location(&self, offset: usize, path: String) -> Location {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = self.source[line_start..offset].chars().count() + 1;
        Location::new(line, column, path)
    }

    /// Find `"key"` followed by a colon within `from..to`.
    ///
    /// Returns the offsets of the opening quote and of the byte past the
    /// closing quote.
    fn find_key(&self, key: &str, from: usize, to: usize) -> Option<(usize, usize)> {
        let needle = serde_json::to_string(key).ok()?;
        let mut cursor = from;

        while let Some(relative) = self.source.get(cursor..to)?.find(&needle) {
            let at = cursor + relative;
            let after = at + needle.len();
            if self.source[after..to].trim_start().starts_with(':') {
                return Some((at, after));
            }
            cursor = after;
        }
        None
    }

    /// Offset of the first byte of the value at or after `from`, past any
    /// whitespace and the member colon.
    fn value_start(&self, from: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut i = from;
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b':') {
            i += 1;
        }
        i
    }

    /// Offset past any whitespace and one `,` at or after `from`.
    fn past_separator(&self, from: usize) -> usize {
        let at = self.skip_whitespace(from);
        if self.source.as_bytes().get(at) == Some(&b',') {
            at + 1
        } else {
            at
        }
    }

    fn skip_whitespace(&self, from: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut i = from;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    }

    /// Offset just past the value at or after `from`.
    fn value_end(&self, from: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(self.value_start(from)) {
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                continue;
            }

            match b {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    if depth == 0 {
                        return i;
                    }
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                b',' if depth == 0 => return i,
                _ => {}
            }
        }
        bytes.len()
    }

    /// Build the node for `value`, located at `offset`, whose source text
    /// begins at or after `from`.
    fn build(&self, value: Value, offset: usize, from: usize, path: String) -> Node {
        let location = self.location(offset, path.clone());

        let node = match value {
            Value::Object(map) => {
                let open = self.value_start(from);
                let close = self.value_end(from);
                let mut mapping = Mapping::new();
                // Members appear in source order; each search resumes past
                // the previous member's value
                let mut cursor = (open + 1).min(close);
                for (key, child) in map {
                    let child_node = match self.find_key(&key, cursor, close) {
                        Some((at, key_end)) => {
                            cursor = self.value_end(key_end);
                            self.build(child, at, key_end, child_path(&path, &key))
                        }
                        None => self.build(child, offset, close, child_path(&path, &key)),
                    };
                    mapping.push_unchecked(key, child_node);
                }
                mapping.into()
            }
            Value::Array(items) => {
                let mut cursor = self.value_start(from) + 1;
                let items = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let item_start = cursor;
                        cursor = self.past_separator(self.value_end(item_start));
                        self.build(item, offset, item_start, index_path(&path, i))
                    })
                    .collect();
                Node::sequence(items)
            }
            scalar => Node::from_json(scalar),
        };

        node.with_location(location)
    }
}
