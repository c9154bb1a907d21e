//! Positions inside block snippets and generated programs.
//!
//! Every snippet is lexed as its own small source, so a [`Span`] is always
//! relative to the snippet it came from. The [`SourceFile`] name carries the
//! field path (`[2].js`, `[0].args0[1].min`) that locates the snippet within
//! the definition file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A range of characters, 1-based and inclusive at both ends.
///
/// Columns count characters, not bytes, so positions in snippets with
/// non-ASCII string literals still line up with what an editor shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "line")]
    pub start_line: u32,
    #[serde(rename = "column")]
    pub start_col: u32,
    pub end_line: u32,
    #[serde(rename = "end_column")]
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A single character position.
    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// `(line, column)` of the first character.
    pub fn start(&self) -> (u32, u32) {
        (self.start_line, self.start_col)
    }

    /// `(line, column)` of the last character.
    pub fn end(&self) -> (u32, u32) {
        (self.end_line, self.end_col)
    }

    /// The smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        let (start_line, start_col) = self.start().min(other.start());
        let (end_line, end_col) = self.end().max(other.end());
        Span::new(start_line, start_col, end_line, end_col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// A snippet or program text, named for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Field path of a snippet, or the program name.
    pub name: String,
    pub source: String,
    /// Byte offset at which each line starts.
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// Text of a 1-based line without its terminator.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = line_number.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map_or(self.source.len(), |&next| next - 1);
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    /// The text a span covers, for quoting in diagnostics.
    pub fn excerpt(&self, span: Span) -> Option<&str> {
        let start = self.offset(span.start_line, span.start_col)?;
        let last = self.offset(span.end_line, span.end_col)?;
        let end = last + self.source[last..].chars().next().map_or(0, char::len_utf8);
        self.source.get(start..end.max(start))
    }

    /// Byte offset of a 1-based character position.
    fn offset(&self, line: u32, col: u32) -> Option<usize> {
        let line_start = *self.line_starts.get(line.checked_sub(1)? as usize)?;
        let skip = col.checked_sub(1)? as usize;
        self.source[line_start..]
            .char_indices()
            .nth(skip)
            .map(|(i, _)| line_start + i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_across_lines() {
        let a = Span::new(1, 5, 1, 10);
        let b = Span::new(2, 3, 2, 8);
        assert_eq!(a.merge(b), Span::new(1, 5, 2, 8));
        assert_eq!(b.merge(a), Span::new(1, 5, 2, 8));
    }

    #[test]
    fn test_merge_same_line() {
        let merged = Span::new(1, 5, 1, 10).merge(Span::new(1, 3, 1, 8));
        assert_eq!(merged.start(), (1, 3));
        assert_eq!(merged.end(), (1, 10));
    }

    #[test]
    fn test_display_is_start_position() {
        assert_eq!(Span::new(3, 7, 3, 15).to_string(), "3:7");
    }

    #[test]
    fn test_snippet_lines() {
        let src = SourceFile::new("[0].js", "move();\r\nturn();\n");
        assert_eq!(src.line(1), Some("move();"));
        assert_eq!(src.line(2), Some("turn();"));
        assert_eq!(src.line(3), Some(""));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
    }

    #[test]
    fn test_excerpt_quotes_the_span() {
        let src = SourceFile::new("[3].js", "x = (a + b);\ngo();");
        assert_eq!(src.excerpt(Span::new(1, 6, 1, 10)), Some("a + b"));
        assert_eq!(src.excerpt(Span::new(1, 13, 2, 2)), Some("\ngo"));
        assert_eq!(src.excerpt(Span::point(2, 1)), Some("g"));
        assert_eq!(src.excerpt(Span::point(9, 1)), None);
    }

    #[test]
    fn test_excerpt_counts_characters() {
        let src = SourceFile::new("[0].js", "say('héllo', n);");
        assert_eq!(src.excerpt(Span::new(1, 5, 1, 11)), Some("'héllo'"));
        assert_eq!(src.excerpt(Span::point(1, 14)), Some("n"));
    }

    #[test]
    fn test_span_serializes_with_line_column_names() {
        let json = serde_json::to_string(&Span::new(2, 4, 2, 9)).unwrap();
        assert_eq!(json, r#"{"line":2,"column":4,"end_line":2,"end_column":9}"#);
    }
}
