//! Block-script lexer: converts source text to a token stream.
//!
//! - Line (`//`) and block (`/* */`) comments are skipped
//! - Each token records whether a line break preceded it, for ASI
//! - `/` is lexed as a regular-expression literal where an operand is
//!   expected, so the parser can reject it by name
//! - Error recovery: collects up to 20 errors instead of stopping at the first

use tessera_types::{CompileErrors, ErrorCode, SourceFile, Span, TesseraError};

use crate::token::{Token, TokenKind};

/// The block-script lexer.
///
/// Converts source text into a vector of [`Token`]s, collecting up to
/// [`tessera_types::MAX_ERRORS`] errors along the way.
pub struct Lexer<'src> {
    /// The full source text.
    text: &'src str,
    /// The same text as bytes.
    source: &'src [u8],
    /// Source file for error reporting.
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based, in characters).
    col: u32,
    /// A line break was skipped since the last token.
    newline_pending: bool,
    /// The previous token can be followed by a binary operator.
    after_operand: bool,
    errors: CompileErrors,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    /// Errors encountered during lexing.
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source file.
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            text: &source_file.source,
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            newline_pending: false,
            after_operand: false,
            errors: CompileErrors::empty(),
        }
    }

    /// Lex the entire source file into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();

        loop {
            if self.errors.total_errors >= tessera_types::MAX_ERRORS {
                break;
            }
            let mut token = self.scan_token();
            token.newline_before = std::mem::take(&mut self.newline_pending);
            self.after_operand = token.kind.ends_operand();

            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        // Ensure token stream always ends with Eof
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // continuation bytes do not start a new column
            self.col += 1;
        }
        Some(ch)
    }

    /// Consume one whole (possibly multi-byte) character.
    fn advance_char(&mut self) -> Option<char> {
        let ch = self.text.get(self.pos..)?.chars().next()?;
        for _ in 0..ch.len_utf8() {
            self.advance();
        }
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = TesseraError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip whitespace and comments, noting line breaks.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | 0x0B | 0x0C) => {
                    self.advance();
                }
                Some(b'\n') => {
                    self.newline_pending = true;
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let start_line = self.line;
        let start_col = self.col;
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                None => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_COMMENT,
                        "Unterminated block comment",
                        span,
                    );
                    return;
                }
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.advance();
                    self.advance();
                    return;
                }
                Some(b'\n') => {
                    self.newline_pending = true;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Token {
        self.skip_trivia();

        // If we've hit the error cap, stop immediately
        if self.at_end() || self.errors.total_errors >= tessera_types::MAX_ERRORS {
            return Token::new(TokenKind::Eof, self.current_span());
        }

        let start_line = self.line;
        let start_col = self.col;
        let start_pos = self.pos;

        let Some(ch) = self.peek() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        match ch {
            b'"' | b'\'' => return self.scan_string(ch, start_line, start_col),
            b'0'..=b'9' => return self.scan_number(start_pos, start_line, start_col),
            b'.' if matches!(self.peek_at(1), Some(b'0'..=b'9')) => {
                return self.scan_number(start_pos, start_line, start_col)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => {
                return self.scan_identifier(start_pos, start_line, start_col)
            }
            b'/' if !self.after_operand => return self.scan_regex(start_line, start_col),
            _ => {}
        }

        let Some(kind) = self.scan_punctuator() else {
            let bad = self.advance_char().unwrap_or('\u{FFFD}');
            let span = self.span_from(start_line, start_col);
            self.emit_error(
                ErrorCode::UNEXPECTED_CHARACTER,
                format!("Unexpected character '{bad}'"),
                span,
            );
            // Error recovery: skip the character and try again
            return self.scan_token();
        };
        Token::new(kind, self.span_from(start_line, start_col))
    }

    /// Longest-match scan of operators and punctuation.
    fn scan_punctuator(&mut self) -> Option<TokenKind> {
        const TABLE: &[(&str, TokenKind)] = &[
            (">>>=", TokenKind::UShrEq),
            ("===", TokenKind::EqEqEq),
            ("!==", TokenKind::BangEqEq),
            (">>>", TokenKind::UShr),
            ("<<=", TokenKind::ShlEq),
            (">>=", TokenKind::ShrEq),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::BangEq),
            ("<=", TokenKind::LessEq),
            (">=", TokenKind::GreaterEq),
            ("<<", TokenKind::Shl),
            (">>", TokenKind::Shr),
            ("&&", TokenKind::AmpAmp),
            ("||", TokenKind::PipePipe),
            ("++", TokenKind::PlusPlus),
            ("--", TokenKind::MinusMinus),
            ("+=", TokenKind::PlusEq),
            ("-=", TokenKind::MinusEq),
            ("*=", TokenKind::StarEq),
            ("/=", TokenKind::SlashEq),
            ("%=", TokenKind::PercentEq),
            ("&=", TokenKind::AmpEq),
            ("|=", TokenKind::PipeEq),
            ("^=", TokenKind::CaretEq),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("&", TokenKind::Amp),
            ("|", TokenKind::Pipe),
            ("^", TokenKind::Caret),
            ("~", TokenKind::Tilde),
            ("!", TokenKind::Bang),
            ("<", TokenKind::Less),
            (">", TokenKind::Greater),
            ("=", TokenKind::Eq),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            (",", TokenKind::Comma),
            (";", TokenKind::Semicolon),
            (":", TokenKind::Colon),
            ("?", TokenKind::Question),
            (".", TokenKind::Dot),
        ];

        let rest = &self.source[self.pos..];
        let (text, kind) = TABLE
            .iter()
            .find(|(text, _)| rest.starts_with(text.as_bytes()))?;
        for _ in 0..text.len() {
            self.advance();
        }
        Some(kind.clone())
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, start_pos: usize, start_line: u32, start_col: u32) -> Token {
        let value = if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = &self.text[digits_start..self.pos];
            if digits.is_empty() {
                None
            } else {
                Some(
                    digits
                        .bytes()
                        .fold(0.0_f64, |acc, b| acc * 16.0 + f64::from(hex_value(b))),
                )
            }
        } else {
            let leading_zero = self.peek() == Some(b'0');
            self.skip_digits();
            let int_len = self.pos - start_pos;
            if self.peek() == Some(b'.') {
                self.advance();
                self.skip_digits();
            }
            if matches!(self.peek(), Some(b'e' | b'E')) {
                let save = (self.pos, self.line, self.col);
                self.advance();
                if matches!(self.peek(), Some(b'+' | b'-')) {
                    self.advance();
                }
                if matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.skip_digits();
                } else {
                    // not an exponent after all; leave `e` to fail below
                    (self.pos, self.line, self.col) = save;
                }
            }
            if leading_zero && int_len > 1 {
                None
            } else {
                self.text[start_pos..self.pos].parse::<f64>().ok()
            }
        };

        // `3in`, `1x`, `0x` are malformed
        let mut bad_suffix = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'$')
        {
            bad_suffix = true;
            self.advance();
        }

        let span = self.span_from(start_line, start_col);
        match value {
            Some(n) if !bad_suffix => Token::new(TokenKind::NumberLit(n), span),
            _ => {
                let text = self.text[start_pos..self.pos].to_string();
                self.emit_error(
                    ErrorCode::INVALID_NUMBER,
                    format!("Invalid number literal '{text}'"),
                    span,
                );
                Token::new(TokenKind::NumberLit(0.0), span)
            }
        }
    }

    fn skip_digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.advance();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self, start_pos: usize, start_line: u32, start_col: u32) -> Token {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$' {
                self.advance();
            } else {
                break;
            }
        }

        let span = self.span_from(start_line, start_col);
        let text = &self.text[start_pos..self.pos];
        let kind = TokenKind::from_keyword(text)
            .unwrap_or_else(|| TokenKind::Identifier(text.to_string()));

        Token::new(kind, span)
    }

    // ─────────────────────────────────────────────────────────────
    // String literals
    // ─────────────────────────────────────────────────────────────

    /// Scan a string literal delimited by `quote`.
    fn scan_string(&mut self, quote: u8, start_line: u32, start_col: u32) -> Token {
        self.advance(); // opening quote
        let mut buf = String::new();

        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "Unterminated string literal",
                        span,
                    );
                    return Token::new(TokenKind::StringLit(buf), span);
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Token::new(
                        TokenKind::StringLit(buf),
                        self.span_from(start_line, start_col),
                    );
                }
                Some(b'\\') => {
                    if let Some(escaped) = self.scan_escape_sequence() {
                        buf.push(escaped);
                    }
                }
                Some(_) => {
                    if let Some(ch) = self.advance_char() {
                        buf.push(ch);
                    }
                }
            }
        }
    }

    /// Scan an escape sequence starting at the `\`.
    /// Returns `None` for a line continuation or after an error.
    fn scan_escape_sequence(&mut self) -> Option<char> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // consume the '\'

        match self.peek() {
            None => None,
            Some(b'\n') => {
                self.advance();
                None
            }
            Some(b'x') => {
                self.advance();
                self.scan_hex_escape(2, start_line, start_col)
            }
            Some(b'u') => {
                self.advance();
                let first = self.scan_hex_code(4, start_line, start_col)?;
                if (0xD800..0xDC00).contains(&first)
                    && self.peek() == Some(b'\\')
                    && self.peek_at(1) == Some(b'u')
                {
                    self.advance();
                    self.advance();
                    let second = self.scan_hex_code(4, start_line, start_col)?;
                    let combined = 0x10000 + ((first - 0xD800) << 10) + (second.wrapping_sub(0xDC00) & 0x3FF);
                    return Some(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                }
                Some(char::from_u32(first).unwrap_or('\u{FFFD}'))
            }
            Some(_) => {
                let ch = self.advance_char()?;
                Some(match ch {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'b' => '\u{8}',
                    'f' => '\u{C}',
                    'v' => '\u{B}',
                    '0' => '\0',
                    // identity escape: \' \" \\ and anything else
                    other => other,
                })
            }
        }
    }

    fn scan_hex_escape(&mut self, len: usize, start_line: u32, start_col: u32) -> Option<char> {
        let code = self.scan_hex_code(len, start_line, start_col)?;
        char::from_u32(code)
    }

    fn scan_hex_code(&mut self, len: usize, start_line: u32, start_col: u32) -> Option<u32> {
        let mut code = 0u32;
        for _ in 0..len {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.advance();
                    code = code * 16 + u32::from(hex_value(c));
                }
                _ => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "Invalid hexadecimal escape sequence",
                        span,
                    );
                    return None;
                }
            }
        }
        Some(code)
    }

    // ─────────────────────────────────────────────────────────────
    // Regular expressions
    // ─────────────────────────────────────────────────────────────

    fn scan_regex(&mut self, start_line: u32, start_col: u32) -> Token {
        self.advance(); // opening '/'
        let body_start = self.pos;
        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNEXPECTED_CHARACTER,
                        "Unterminated regular expression",
                        span,
                    );
                    return Token::new(TokenKind::RegexLit(String::new()), span);
                }
                Some(b'\\') => {
                    self.advance();
                    self.advance_char();
                }
                Some(b'[') => {
                    in_class = true;
                    self.advance();
                }
                Some(b']') => {
                    in_class = false;
                    self.advance();
                }
                Some(b'/') if !in_class => break,
                Some(_) => {
                    self.advance_char();
                }
            }
        }
        let body = self.text[body_start..self.pos].to_string();
        self.advance(); // closing '/'
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.advance();
        }
        Token::new(TokenKind::RegexLit(body), self.span_from(start_line, start_col))
    }
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}
