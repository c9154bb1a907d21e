//! Expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 14. `,`
//! 13. `=` and compound assignment (right-associative)
//! 12. `?:`
//! 11. `||`
//! 10. `&&`
//!  9. `|`
//!  8. `^`
//!  7. `&`
//!  6. `==`, `!=`, `===`, `!==`
//!  5. `<`, `>`, `<=`, `>=`
//!  4. `<<`, `>>`, `>>>`
//!  3. `+`, `-`
//!  2. `*`, `/`, `%`
//!  1. prefix unary and update, postfix update
//!  0. `.`, `[]`, `()`

use tessera_lexer::token::TokenKind;
use tessera_types::ast::*;
use tessera_types::{ErrorCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Points
    // ══════════════════════════════════════════════════════════════════════════

    /// `Expression = Assignment { "," Assignment }`
    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        let first = self.parse_assignment()?;
        if !self.check_exact(&TokenKind::Comma) {
            return Some(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_assignment()?);
        }
        let span = items[0].span.merge(self.previous_span());
        Some(Expr::new(ExprKind::Sequence(items), span))
    }

    /// `Assignment = Conditional [ AssignOp Assignment ]`
    pub(crate) fn parse_assignment(&mut self) -> Option<Expr> {
        let target = self.parse_conditional()?;
        let Some(op) = self.match_assign_op() else {
            return Some(target);
        };
        self.advance();
        let target = self.check_assignment_target(target)?;
        let value = self.nested(Self::parse_assignment)?;
        let span = target.span.merge(value.span);
        Some(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    fn match_assign_op(&self) -> Option<AssignOp> {
        Some(match self.peek_kind() {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            TokenKind::PercentEq => AssignOp::Mod,
            TokenKind::ShlEq => AssignOp::Shl,
            TokenKind::ShrEq => AssignOp::Shr,
            TokenKind::UShrEq => AssignOp::UShr,
            TokenKind::AmpEq => AssignOp::BitAnd,
            TokenKind::PipeEq => AssignOp::BitOr,
            TokenKind::CaretEq => AssignOp::BitXor,
            _ => return None,
        })
    }

    /// Only identifiers and member expressions can be assigned or updated.
    /// Redundant parentheses around them are dropped.
    fn check_assignment_target(&mut self, target: Expr) -> Option<Expr> {
        let inner = target.unparenthesized();
        match inner.kind {
            ExprKind::Identifier(_) | ExprKind::Member { .. } => Some(inner.clone()),
            _ => {
                self.error_at(
                    ErrorCode::INVALID_ASSIGNMENT_TARGET,
                    "invalid assignment target",
                    target.span,
                );
                None
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    /// `Conditional = LogicalOr [ "?" Assignment ":" Assignment ]`
    fn parse_conditional(&mut self) -> Option<Expr> {
        let test = self.parse_logical_or()?;
        if !self.eat(&TokenKind::Question) {
            return Some(test);
        }
        let consequent = self.nested(Self::parse_assignment)?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.nested(Self::parse_assignment)?;
        let span = test.span.merge(alternate.span);
        Some(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    /// `LogicalOr = LogicalAnd { "||" LogicalAnd }`
    fn parse_logical_or(&mut self) -> Option<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.parse_logical_and()?;
            left = logical(LogicalOp::Or, left, right);
        }
        Some(left)
    }

    /// `LogicalAnd = BitOr { "&&" BitOr }`
    fn parse_logical_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_bit_or()?;
        while self.eat(&TokenKind::AmpAmp) {
            let right = self.parse_bit_or()?;
            left = logical(LogicalOp::And, left, right);
        }
        Some(left)
    }

    /// Parse one left-associative binary level.
    fn parse_binary_level(
        &mut self,
        next: fn(&mut Self) -> Option<Expr>,
        op_for: fn(&TokenKind) -> Option<BinOp>,
    ) -> Option<Expr> {
        let mut left = next(self)?;
        while let Some(op) = op_for(self.peek_kind()) {
            self.advance();
            let right = next(self)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Some(left)
    }

    fn parse_bit_or(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_bit_xor, |k| {
            (k == &TokenKind::Pipe).then_some(BinOp::BitOr)
        })
    }

    fn parse_bit_xor(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_bit_and, |k| {
            (k == &TokenKind::Caret).then_some(BinOp::BitXor)
        })
    }

    fn parse_bit_and(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_equality, |k| {
            (k == &TokenKind::Amp).then_some(BinOp::BitAnd)
        })
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_relational, |k| match k {
            TokenKind::EqEq => Some(BinOp::Eq),
            TokenKind::BangEq => Some(BinOp::NotEq),
            TokenKind::EqEqEq => Some(BinOp::StrictEq),
            TokenKind::BangEqEq => Some(BinOp::StrictNotEq),
            _ => None,
        })
    }

    /// Relational operators; `in` and `instanceof` are rejected here.
    fn parse_relational(&mut self) -> Option<Expr> {
        let left = self.parse_binary_level(Self::parse_shift, |k| match k {
            TokenKind::Less => Some(BinOp::Less),
            TokenKind::Greater => Some(BinOp::Greater),
            TokenKind::LessEq => Some(BinOp::LessEq),
            TokenKind::GreaterEq => Some(BinOp::GreaterEq),
            _ => None,
        })?;
        if matches!(self.peek_kind(), TokenKind::In | TokenKind::Instanceof) {
            let kind = self.peek_kind().clone();
            self.unsupported_at_current(&format!("'{kind}'"));
            return None;
        }
        Some(left)
    }

    fn parse_shift(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_additive, |k| match k {
            TokenKind::Shl => Some(BinOp::Shl),
            TokenKind::Shr => Some(BinOp::Shr),
            TokenKind::UShr => Some(BinOp::UShr),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_multiplicative, |k| match k {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        self.parse_binary_level(Self::parse_unary, |k| match k {
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::Percent => Some(BinOp::Mod),
            _ => None,
        })
    }

    /// `Unary = UnaryOp Unary | ("++" | "--") Unary | Postfix`
    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::Void => UnaryOp::Void,
            TokenKind::Delete => UnaryOp::Delete,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.advance().kind == TokenKind::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                let operand = self.parse_nested_unary()?;
                let target = self.check_assignment_target(operand)?;
                let span = start.merge(target.span);
                return Some(Expr::new(
                    ExprKind::Update {
                        op,
                        prefix: true,
                        target: Box::new(target),
                    },
                    span,
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_nested_unary()?;
        let span = start.merge(operand.span);
        Some(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_nested_unary(&mut self) -> Option<Expr> {
        if !self.enter() {
            return None;
        }
        let operand = self.parse_unary();
        self.leave();
        operand
    }

    /// `Postfix = CallMember [ "++" | "--" ]` with no line break before the operator.
    fn parse_postfix(&mut self) -> Option<Expr> {
        let expr = self.parse_call_member()?;
        let op = match self.peek_kind() {
            TokenKind::PlusPlus if !self.newline_before() => UpdateOp::Increment,
            TokenKind::MinusMinus if !self.newline_before() => UpdateOp::Decrement,
            _ => return Some(expr),
        };
        self.advance();
        let target = self.check_assignment_target(expr)?;
        let span = target.span.merge(self.previous_span());
        Some(Expr::new(
            ExprKind::Update {
                op,
                prefix: false,
                target: Box::new(target),
            },
            span,
        ))
    }

    /// `CallMember = Primary { "." Name | "[" Expression "]" | "(" Args ")" }`
    fn parse_call_member(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_member_name()?;
                    let span = expr.span.merge(name.span);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property: MemberProperty::Named(name),
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.nested(Self::parse_expression)?;
                    self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property: MemberProperty::Computed(Box::new(index)),
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_list(&TokenKind::RParen)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Some(expr)
    }

    /// Comma-separated assignments up to `close`; a trailing comma is allowed.
    fn parse_list(&mut self, close: &TokenKind) -> Option<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.check_exact(close) {
            items.push(self.nested(Self::parse_assignment)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Some(items)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary Expressions
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::NumberLit(n) => ExprKind::Number(n),
            TokenKind::StringLit(s) => ExprKind::String(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Identifier(name) => match name.as_str() {
                "undefined" => ExprKind::Undefined,
                "NaN" => ExprKind::Number(f64::NAN),
                "Infinity" => ExprKind::Number(f64::INFINITY),
                _ => ExprKind::Identifier(name),
            },
            TokenKind::LParen => {
                self.advance();
                let inner = self.nested(Self::parse_expression)?;
                self.expect(&TokenKind::RParen)?;
                return Some(Expr::new(
                    ExprKind::Paren(Box::new(inner)),
                    start.merge(self.previous_span()),
                ));
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_list(&TokenKind::RBracket)?;
                return Some(Expr::new(
                    ExprKind::Array(items),
                    start.merge(self.previous_span()),
                ));
            }
            TokenKind::LBrace => return self.parse_object(start),
            TokenKind::This => return self.unsupported_at_current("'this'"),
            TokenKind::New => return self.unsupported_at_current("'new'"),
            TokenKind::Function => return self.unsupported_at_current("function expressions"),
            TokenKind::RegexLit(_) => {
                return self.unsupported_at_current("regular expression literals")
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected '{other}'"),
                );
                return None;
            }
        };
        self.advance();
        Some(Expr::new(kind, start))
    }

    /// `{ key: value, ... }`
    fn parse_object(&mut self, start: Span) -> Option<Expr> {
        self.advance(); // eat `{`
        let mut props = Vec::new();
        while !self.check_exact(&TokenKind::RBrace) {
            let key_span = self.current_span();
            let key = match self.peek_kind().clone() {
                TokenKind::Identifier(name) => PropertyKey::Identifier(name),
                TokenKind::StringLit(s) => PropertyKey::String(s),
                TokenKind::NumberLit(n) => PropertyKey::Number(n),
                kind if kind.is_keyword() => PropertyKey::Identifier(kind.to_string()),
                other => {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("expected property name, got '{other}'"),
                    );
                    return None;
                }
            };
            self.advance();
            self.expect(&TokenKind::Colon)?;
            let value = self.nested(Self::parse_assignment)?;
            let span = key_span.merge(value.span);
            props.push(Property { key, value, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(Expr::new(
            ExprKind::Object(props),
            start.merge(self.previous_span()),
        ))
    }

    fn unsupported_at_current(&mut self, what: &str) -> Option<Expr> {
        self.error_at_current(
            ErrorCode::UNSUPPORTED_EXPRESSION,
            format!("unsupported expression: {what}"),
        );
        None
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}
