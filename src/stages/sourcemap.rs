// src/stages/sourcemap.rs

//! Line-level source maps (revision 3) for concatenated bundles.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap<'a> {
    version: u8,
    file: &'a str,
    sources: &'a [String],
    sources_content: &'a [String],
    names: Vec<String>,
    mappings: String,
}

/// Collects sources and one mapping per generated line.
#[derive(Debug, Clone, Default)]
pub struct SourceMapBuilder {
    file: String,
    sources: Vec<String>,
    contents: Vec<String>,
    /// `(source index, source line)` for each generated line.
    lines: Vec<Option<(usize, usize)>>,
}

impl SourceMapBuilder {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    /// Register a source file; returns its index.
    pub fn add_source(&mut self, name: impl Into<String>, content: impl Into<String>) -> usize {
        self.sources.push(name.into());
        self.contents.push(content.into());
        self.sources.len() - 1
    }

    /// The next generated line comes from `line` (0-based) of `source`.
    pub fn push_mapped(&mut self, source: usize, line: usize) {
        self.lines.push(Some((source, line)));
    }

    /// The next generated line has no source (preamble, separators).
    pub fn push_unmapped(&mut self) {
        self.lines.push(None);
    }

    /// The `mappings` string: one segment at column 0 per mapped line.
    pub fn mappings(&self) -> String {
        let mut out = String::new();
        let mut prev_source = 0i64;
        let mut prev_line = 0i64;

        for (idx, entry) in self.lines.iter().enumerate() {
            if idx > 0 {
                out.push(';');
            }
            let Some((source, line)) = *entry else {
                continue;
            };
            let (source, line) = (source as i64, line as i64);
            encode_vlq(0, &mut out);
            encode_vlq(source - prev_source, &mut out);
            encode_vlq(line - prev_line, &mut out);
            encode_vlq(0, &mut out);
            prev_source = source;
            prev_line = line;
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        let raw = RawSourceMap {
            version: 3,
            file: &self.file,
            sources: &self.sources,
            sources_content: &self.contents,
            names: Vec::new(),
            mappings: self.mappings(),
        };
        Ok(serde_json::to_string(&raw)?)
    }

    /// `//# sourceMappingURL=data:...` comment embedding the whole map.
    pub fn inline_comment(&self) -> Result<String> {
        let json = self.to_json()?;
        Ok(format!(
            "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}",
            STANDARD.encode(json)
        ))
    }
}

/// Append `value` as a base64 VLQ.
pub fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };

    loop {
        let mut digit = (vlq & 0b1_1111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64_DIGITS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(v: i64) -> String {
        let mut s = String::new();
        encode_vlq(v, &mut s);
        s
    }

    #[test]
    fn vlq_known_values() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
    }

    #[test]
    fn mappings_are_relative_between_lines() {
        let mut map = SourceMapBuilder::new("app.js");
        let a = map.add_source("a.js", "x\ny");
        let b = map.add_source("b.js", "z");
        map.push_unmapped();
        map.push_mapped(a, 0);
        map.push_mapped(a, 1);
        map.push_mapped(b, 0);
        assert_eq!(map.mappings(), ";AAAA;AACA;ACDA");
    }

    #[test]
    fn json_has_expected_shape() {
        let mut map = SourceMapBuilder::new("app.js");
        let a = map.add_source("a.js", "x");
        map.push_mapped(a, 0);

        let value: serde_json::Value = serde_json::from_str(&map.to_json().unwrap()).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["file"], "app.js");
        assert_eq!(value["sources"][0], "a.js");
        assert_eq!(value["sourcesContent"][0], "x");
        assert_eq!(value["mappings"], "AAAA");
    }
}
