use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors stored before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Block-script text failed to lex or parse.
    Syntax,
    /// A block definition record is malformed.
    Schema,
    /// A block tree could not be turned into a program.
    Compile,
}

/// Numeric error code (E100–E399).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNTERMINATED_STRING: Self = Self(101);
    pub const INVALID_NUMBER: Self = Self(102);
    pub const UNEXPECTED_CHARACTER: Self = Self(103);
    pub const UNTERMINATED_COMMENT: Self = Self(104);
    pub const UNSUPPORTED_STATEMENT: Self = Self(105);
    pub const ILLEGAL_BREAK: Self = Self(106);
    pub const ILLEGAL_RETURN: Self = Self(107);
    pub const INVALID_ASSIGNMENT_TARGET: Self = Self(108);
    pub const NESTING_TOO_DEEP: Self = Self(109);

    // ── Schema errors (E200–E299) ──
    pub const MISSING_FIELD: Self = Self(200);
    pub const UNKNOWN_FIELD: Self = Self(201);
    pub const INVALID_FIELD: Self = Self(202);
    pub const INVALID_SNIPPET: Self = Self(203);
    pub const NOT_SINGLE_EXPRESSION: Self = Self(204);
    pub const REDUNDANT_PARENS: Self = Self(205);
    pub const TEMPLATE_MISMATCH: Self = Self(206);
    pub const UNSUPPORTED_EXPRESSION: Self = Self(207);
    pub const INVALID_PLACEHOLDER: Self = Self(208);

    // ── Compile errors (E300–E399) ──
    pub const MISSING_BLOCK_DEFINITION: Self = Self(300);
    pub const RESERVED_IDENTIFIER: Self = Self(301);
    pub const TYPE_MISMATCH: Self = Self(302);
    pub const INVALID_CONNECTION: Self = Self(303);
    pub const MAX_INSTANCES_EXCEEDED: Self = Self(304);
    pub const INVALID_FIELD_VALUE: Self = Self(305);
    pub const DUPLICATE_REGISTRATION: Self = Self(306);
    pub const DUPLICATE_BLOCK_ID: Self = Self(307);
    pub const MALFORMED_WORKSPACE: Self = Self(308);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Syntax,
            200..=299 => ErrorCategory::Schema,
            300..=399 => ErrorCategory::Compile,
            _ => ErrorCategory::Syntax, // fallback
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A structured Tessera diagnostic.
///
/// Hosts render these; they must not parse free-form strings. `source`
/// names what was being read: a snippet's field path (`[3].js`), a whole
/// definition file, or the generated program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesseraError {
    /// Source name.
    pub source: String,
    /// Error code (e.g., E207).
    pub code: ErrorCode,
    /// Error severity.
    pub severity: Severity,
    /// Error category (derived from code).
    pub category: ErrorCategory,
    /// Human-readable error message.
    pub message: String,
    /// Source location.
    #[serde(flatten)]
    pub span: Span,
    /// The exact source line for context.
    pub source_line: String,
    /// Path to the offending field in a definition record (`[1].args0[0].min`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Optional fix suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl TesseraError {
    /// Create a new error.
    pub fn new(
        source: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            path: None,
            suggestion: None,
        }
    }

    /// Create an error about a record field that has no meaningful text position.
    pub fn at_path(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(path.clone(), code, message, Span::point(1, 1), "").with_path(path)
    }

    /// Attach the path of the field this error is about.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Downgrade to a warning.
    pub fn into_warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for TesseraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) if self.source_line.is_empty() => write!(
                f,
                "{}: {} [{}] {}",
                path, self.code, self.category, self.message
            ),
            _ => write!(
                f,
                "{}:{}: {} [{}] {}",
                self.source, self.span, self.code, self.category, self.message
            ),
        }
    }
}

impl std::error::Error for TesseraError {}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Schema => write!(f, "schema"),
            Self::Compile => write!(f, "compile"),
        }
    }
}

/// A batch of diagnostics from one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<TesseraError>,
    pub warnings: Vec<TesseraError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    /// Create an empty result (no errors).
    pub fn empty() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            total_errors: 0,
            total_warnings: 0,
        }
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the MAX_ERRORS limit.
    pub fn push_error(&mut self, error: TesseraError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Add a warning.
    pub fn push_warning(&mut self, warning: TesseraError) {
        self.warnings.push(warning);
        self.total_warnings += 1;
    }

    /// Move every diagnostic of `other` into `self`.
    pub fn extend(&mut self, other: CompileErrors) {
        // errors beyond the cap were only counted
        let uncounted = other.total_errors.saturating_sub(other.errors.len());
        for error in other.errors {
            self.push_error(error);
        }
        self.total_errors += uncounted;
        for warning in other.warnings {
            self.push_warning(warning);
        }
    }

    /// The first stored error, if any.
    pub fn first(&self) -> Option<&TesseraError> {
        self.errors.first()
    }
}

impl From<TesseraError> for CompileErrors {
    fn from(error: TesseraError) -> Self {
        let mut errors = CompileErrors::empty();
        errors.push_error(error);
        errors
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        if self.total_errors > self.errors.len() {
            write!(f, "\n... and {} more", self.total_errors - self.errors.len())?;
        }
        Ok(())
    }
}
