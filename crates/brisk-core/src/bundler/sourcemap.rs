//! Line-level V3 source maps for the development script bundle.

use serde::Serialize;

/// VLQ-encode a signed integer and append it to `out`.
fn vlq_encode(value: i64, out: &mut String) {
    const B64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    #[allow(clippy::cast_sign_loss)]
    let mut v = (if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    }) as u64;
    loop {
        let mut digit = (v & 0x1f) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0x20;
        }
        out.push(B64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceMapJson<'a> {
    version: u8,
    file: &'a str,
    sources: &'a [String],
    sources_content: &'a [String],
    names: [&'a str; 0],
    mappings: String,
}

/// Collects sources and line mappings while the bundle is written.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<String>,
    sources_content: Vec<String>,
    /// `(output_line, source_idx, source_line)`, zero-based.
    mappings: Vec<(u32, u32, u32)>,
}

impl SourceMapBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file and return its index.
    pub fn add_source(&mut self, path: &str, content: &str) -> u32 {
        let idx = self.sources.len() as u32;
        self.sources.push(path.to_string());
        self.sources_content.push(content.to_string());
        idx
    }

    /// Map `output_line` to the start of `source_line` in source `source_idx`.
    pub fn add_line_mapping(&mut self, output_line: u32, source_idx: u32, source_line: u32) {
        self.mappings.push((output_line, source_idx, source_line));
    }

    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Serialize as a V3 source map for `file`.
    #[must_use]
    pub fn generate(&self, file: &str) -> String {
        let mut mappings = String::new();
        let mut line: u32 = 0;
        let mut prev_source: i64 = 0;
        let mut prev_source_line: i64 = 0;

        let mut sorted = self.mappings.clone();
        sorted.sort_by_key(|m| m.0);

        let mut first_on_line = true;
        for (output_line, source_idx, source_line) in sorted {
            while line < output_line {
                mappings.push(';');
                line += 1;
                first_on_line = true;
            }
            if !first_on_line {
                continue;
            }
            first_on_line = false;

            vlq_encode(0, &mut mappings);
            vlq_encode(i64::from(source_idx) - prev_source, &mut mappings);
            vlq_encode(i64::from(source_line) - prev_source_line, &mut mappings);
            vlq_encode(0, &mut mappings);

            prev_source = i64::from(source_idx);
            prev_source_line = i64::from(source_line);
        }

        let json = SourceMapJson {
            version: 3,
            file,
            sources: &self.sources,
            sources_content: &self.sources_content,
            names: [],
            mappings,
        };
        serde_json::to_string(&json).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlq() {
        let mut out = String::new();
        for v in [0, 1, -1, 16, 1000] {
            vlq_encode(v, &mut out);
            out.push(' ');
        }
        assert_eq!(out, "A C D gB w+B ");
    }

    #[test]
    fn test_generate_line_mappings() {
        let mut builder = SourceMapBuilder::new();
        let a = builder.add_source("src/a.ts", "one\ntwo\n");
        let b = builder.add_source("src/b.ts", "three\n");
        builder.add_line_mapping(1, a, 0);
        builder.add_line_mapping(2, a, 1);
        builder.add_line_mapping(4, b, 0);

        let json: serde_json::Value = serde_json::from_str(&builder.generate("main.js")).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["file"], "main.js");
        assert_eq!(json["sources"][1], "src/b.ts");
        assert_eq!(json["sourcesContent"][0], "one\ntwo\n");
        assert_eq!(json["mappings"], ";AAAA;AACA;;ACDA");
    }
}
