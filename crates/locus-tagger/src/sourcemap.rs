//! Source map emission for pure insertions.
//!
//! The transforms here never delete or reorder source text; they only insert
//! strings at byte offsets. That makes the map easy to derive: every run of
//! copied original text gets one segment pointing at where the run started
//! in the original. Inserted text is left unmapped.

use facet::Facet;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Text inserted at `offset` (a byte offset into the original).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    pub offset: usize,
    pub text: String,
}

impl Edit {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            text: text.into(),
        }
    }
}

/// A version 3 source map.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
#[facet(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> Result<String, String> {
        facet_json::to_string(self).map_err(|e| format!("encode source map: {e}"))
    }
}

#[derive(Clone, Copy)]
struct Segment {
    gen_line: u32,
    gen_col: u32,
    orig_line: u32,
    orig_col: u32,
}

/// Positions are tracked in UTF-16 code units, as source map consumers expect.
struct MapWriter {
    out: String,
    segments: Vec<Segment>,
    gen_line: u32,
    gen_col: u32,
    orig_line: u32,
    orig_col: u32,
    needs_segment: bool,
}

impl MapWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            segments: Vec::new(),
            gen_line: 0,
            gen_col: 0,
            orig_line: 0,
            orig_col: 0,
            needs_segment: true,
        }
    }

    fn copy_original(&mut self, text: &str) {
        for ch in text.chars() {
            if self.needs_segment {
                self.segments.push(Segment {
                    gen_line: self.gen_line,
                    gen_col: self.gen_col,
                    orig_line: self.orig_line,
                    orig_col: self.orig_col,
                });
                self.needs_segment = false;
            }
            self.out.push(ch);
            if ch == '\n' {
                self.gen_line += 1;
                self.gen_col = 0;
                self.orig_line += 1;
                self.orig_col = 0;
                self.needs_segment = true;
            } else {
                self.gen_col += ch.len_utf16() as u32;
                self.orig_col += ch.len_utf16() as u32;
            }
        }
    }

    fn insert(&mut self, text: &str) {
        for ch in text.chars() {
            self.out.push(ch);
            if ch == '\n' {
                self.gen_line += 1;
                self.gen_col = 0;
            } else {
                self.gen_col += ch.len_utf16() as u32;
            }
        }
        self.needs_segment = true;
    }
}

/// Applies `edits` to `content` and returns the new text with its map.
///
/// Edits at the same offset are applied in the order given. Offsets that
/// do not fall on a char boundary or lie past the end are dropped.
pub fn apply_edits(content: &str, file: &str, mut edits: Vec<Edit>) -> (String, SourceMap) {
    edits.retain(|edit| edit.offset <= content.len() && content.is_char_boundary(edit.offset));
    edits.sort_by_key(|edit| edit.offset);

    let extra: usize = edits.iter().map(|edit| edit.text.len()).sum();
    let mut writer = MapWriter::with_capacity(content.len() + extra);
    let mut cursor = 0usize;
    for edit in &edits {
        writer.copy_original(&content[cursor..edit.offset]);
        writer.insert(&edit.text);
        cursor = edit.offset;
    }
    writer.copy_original(&content[cursor..]);

    let map = SourceMap {
        version: 3,
        file: file.to_string(),
        sources: vec![file.to_string()],
        sources_content: vec![content.to_string()],
        names: vec![],
        mappings: encode_mappings(&writer.segments),
    };
    (writer.out, map)
}

fn encode_mappings(segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut line = 0u32;
    let mut prev_gen_col = 0i64;
    let mut prev_orig_line = 0i64;
    let mut prev_orig_col = 0i64;
    let mut first_in_line = true;

    for segment in segments {
        while line < segment.gen_line {
            out.push(';');
            line += 1;
            prev_gen_col = 0;
            first_in_line = true;
        }
        if !first_in_line {
            out.push(',');
        }
        encode_vlq(&mut out, segment.gen_col as i64 - prev_gen_col);
        // Single source: index delta is always 0.
        encode_vlq(&mut out, 0);
        encode_vlq(&mut out, segment.orig_line as i64 - prev_orig_line);
        encode_vlq(&mut out, segment.orig_col as i64 - prev_orig_col);
        prev_gen_col = segment.gen_col as i64;
        prev_orig_line = segment.orig_line as i64;
        prev_orig_col = segment.orig_col as i64;
        first_in_line = false;
    }
    out
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        (((-value) << 1) | 1) as u64
    } else {
        (value << 1) as u64
    };
    loop {
        let mut digit = (vlq & 0b1_1111) as u8;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64_ALPHABET[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}
