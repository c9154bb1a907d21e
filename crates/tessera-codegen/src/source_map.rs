//! Source mapping: generated program line → originating block.
//!
//! Each entry covers the lines one statement block produced, from its
//! `highlightBlock` call to the end of its snippet. Nested statement inputs
//! produce entries inside their parent's range, so the innermost entry
//! containing a line names the block a runtime fault came from.

use serde::{Deserialize, Serialize};

/// A complete source map for one generated program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

/// One statement block → one range of generated lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    pub block_id: String,
    /// First generated line (1-based).
    pub start_line: u32,
    /// Last generated line (1-based, inclusive).
    pub end_line: u32,
}

impl SourceMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Push a new entry.
    pub fn push(&mut self, block_id: impl Into<String>, start_line: u32, end_line: u32) {
        self.entries.push(SourceMapEntry {
            block_id: block_id.into(),
            start_line,
            end_line,
        });
    }

    /// The innermost block whose range contains `line`.
    pub fn block_at_line(&self, line: u32) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| e.start_line <= line && line <= e.end_line)
            .min_by_key(|e| e.end_line - e.start_line)
            .map(|e| e.block_id.as_str())
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_json() {
        let mut sm = SourceMap::new();
        sm.push("a", 1, 2);
        sm.push("b", 3, 9);
        let sm2 = SourceMap::from_json(&sm.to_json()).expect("parse failed");
        assert_eq!(sm2, sm);
    }

    #[test]
    fn innermost_block_wins() {
        let mut sm = SourceMap::new();
        sm.push("inner", 4, 5);
        sm.push("outer", 3, 7);
        assert_eq!(sm.block_at_line(3), Some("outer"));
        assert_eq!(sm.block_at_line(5), Some("inner"));
        assert_eq!(sm.block_at_line(7), Some("outer"));
        assert_eq!(sm.block_at_line(8), None);
    }
}
