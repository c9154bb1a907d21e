//! Token types for the block-script lexer.
//!
//! Defines [`TokenKind`] covering every lexeme of block script and
//! [`Token`], which pairs a kind with a source [`Span`].

use std::fmt;
use tessera_types::Span;

/// Words the lexer turns into keyword tokens.
///
/// Some of them (`this`, `new`, `switch`, ...) exist only so the parser can
/// reject them with a precise message instead of treating them as names.
pub const ALL_KEYWORDS: &[&str] = &[
    // Statements (10)
    "var", "if", "else", "while", "do", "for", "break", "continue", "return", "function",
    // Literals (3)
    "true", "false", "null",
    // Operators (3)
    "typeof", "void", "delete",
    // Outside the supported surface (13)
    "this", "new", "in", "instanceof", "switch", "case", "default", "try", "catch",
    "finally", "throw", "with", "debugger",
];

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// Source location.
    pub span: Span,
    /// A line terminator appeared between the previous token and this one.
    /// Drives automatic semicolon insertion.
    pub newline_before: bool,
}

impl Token {
    /// Create a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            newline_before: false,
        }
    }

    /// Returns `true` if this token is a keyword.
    pub fn is_keyword(&self) -> bool {
        self.kind.is_keyword()
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Keywords ──
    Var,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Return,
    Function,
    True,
    False,
    Null,
    Typeof,
    Void,
    Delete,
    This,
    New,
    In,
    Instanceof,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    With,
    Debugger,

    // ── Literals ──
    NumberLit(f64),
    StringLit(String),
    /// A regular-expression literal. Lexed so it can be rejected cleanly.
    RegexLit(String),
    Identifier(String),

    // ── Arithmetic ──
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,

    // ── Bitwise & shift ──
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    UShr,

    // ── Comparison ──
    Less,
    Greater,
    LessEq,
    GreaterEq,
    EqEq,
    BangEq,
    EqEqEq,
    BangEqEq,

    // ── Logical ──
    Bang,
    AmpAmp,
    PipePipe,

    // ── Assignment ──
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    ShlEq,
    ShrEq,
    UShrEq,
    AmpEq,
    PipeEq,
    CaretEq,

    // ── Punctuation ──
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Question,
    Dot,

    Eof,
}

impl TokenKind {
    /// Map a word to its keyword token, or `None` for plain identifiers.
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "function" => TokenKind::Function,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "typeof" => TokenKind::Typeof,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "this" => TokenKind::This,
            "new" => TokenKind::New,
            "in" => TokenKind::In,
            "instanceof" => TokenKind::Instanceof,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "throw" => TokenKind::Throw,
            "with" => TokenKind::With,
            "debugger" => TokenKind::Debugger,
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Var
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Return
                | TokenKind::Function
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Typeof
                | TokenKind::Void
                | TokenKind::Delete
                | TokenKind::This
                | TokenKind::New
                | TokenKind::In
                | TokenKind::Instanceof
                | TokenKind::Switch
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Try
                | TokenKind::Catch
                | TokenKind::Finally
                | TokenKind::Throw
                | TokenKind::With
                | TokenKind::Debugger
        )
    }

    /// Whether a `/` following this token divides (rather than starting a
    /// regular expression).
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::NumberLit(_)
                | TokenKind::StringLit(_)
                | TokenKind::RegexLit(_)
                | TokenKind::Identifier(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::This
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Var => "var",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Function => "function",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Typeof => "typeof",
            TokenKind::Void => "void",
            TokenKind::Delete => "delete",
            TokenKind::This => "this",
            TokenKind::New => "new",
            TokenKind::In => "in",
            TokenKind::Instanceof => "instanceof",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::With => "with",
            TokenKind::Debugger => "debugger",
            TokenKind::NumberLit(n) => return write!(f, "{n}"),
            TokenKind::StringLit(s) => return write!(f, "{s:?}"),
            TokenKind::RegexLit(s) => return write!(f, "/{s}/"),
            TokenKind::Identifier(s) => return write!(f, "{s}"),
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::UShr => ">>>",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::LessEq => "<=",
            TokenKind::GreaterEq => ">=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::EqEqEq => "===",
            TokenKind::BangEqEq => "!==",
            TokenKind::Bang => "!",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::ShlEq => "<<=",
            TokenKind::ShrEq => ">>=",
            TokenKind::UShrEq => ">>>=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Question => "?",
            TokenKind::Dot => ".",
            TokenKind::Eof => "end of input",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_keyword_recognises_all() {
        for kw in ALL_KEYWORDS {
            let kind = TokenKind::from_keyword(kw);
            assert!(kind.is_some(), "keyword {kw:?} not recognised");
            assert!(kind.unwrap().is_keyword());
        }
    }

    #[test]
    fn test_display_roundtrip_keywords() {
        for kw in ALL_KEYWORDS {
            let kind = TokenKind::from_keyword(kw).unwrap();
            assert_eq!(kind.to_string(), *kw);
        }
    }

    #[test]
    fn test_identifiers_are_not_keywords() {
        for word in ["undefined", "NaN", "Infinity", "state", "exit", "Var", "let"] {
            assert_eq!(TokenKind::from_keyword(word), None, "{word}");
        }
    }

    #[test]
    fn test_ends_operand() {
        assert!(TokenKind::Identifier("x".into()).ends_operand());
        assert!(TokenKind::RParen.ends_operand());
        assert!(!TokenKind::LParen.ends_operand());
        assert!(!TokenKind::Return.ends_operand());
        assert!(!TokenKind::Eq.ends_operand());
    }
}
