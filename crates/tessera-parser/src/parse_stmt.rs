//! Statement parsing.

use crate::parser::Parser;
use tessera_lexer::token::TokenKind;
use tessera_types::ast::*;
use tessera_types::ErrorCode;

impl<'src> Parser<'src> {
    /// Parse statements until end of input.
    pub(crate) fn parse_program(&mut self) -> Option<Program> {
        let start = self.current_span();
        let mut body = Vec::new();
        while !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            match self.parse_statement() {
                Some(stmt) => body.push(stmt),
                None => self.synchronize(),
            }
        }
        if self.has_errors() {
            return None;
        }
        let span = start.merge(self.previous_span());
        Some(Program { body, span })
    }

    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        if !self.enter() {
            return None;
        }
        let stmt = self.parse_statement_inner();
        self.leave();
        stmt
    }

    fn parse_statement_inner(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::LBrace => {
                let body = self.parse_block_body()?;
                Some(Stmt::new(StmtKind::Block(body), start.merge(self.previous_span())))
            }
            TokenKind::Semicolon => {
                self.advance();
                Some(Stmt::new(StmtKind::Empty, start))
            }
            TokenKind::Var => {
                self.advance();
                let decls = self.parse_var_declarators()?;
                self.consume_semicolon();
                Some(Stmt::new(StmtKind::Var(decls), start.merge(self.previous_span())))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break | TokenKind::Continue => self.parse_jump(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Function => self.parse_function_decl().map(|decl| {
                let span = decl.span;
                Stmt::new(StmtKind::Function(decl), span)
            }),
            TokenKind::Switch
            | TokenKind::Case
            | TokenKind::Default
            | TokenKind::Try
            | TokenKind::Catch
            | TokenKind::Finally
            | TokenKind::Throw
            | TokenKind::With
            | TokenKind::Debugger => {
                let kind = self.peek_kind().clone();
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_STATEMENT,
                    format!("'{kind}' statements are not supported"),
                );
                None
            }
            TokenKind::Identifier(name) if self.look_ahead(1) == &TokenKind::Colon => {
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_STATEMENT,
                    format!("labelled statements are not supported ('{name}:')"),
                );
                None
            }
            _ => {
                let expr = self.parse_expression()?;
                if !self.consume_semicolon() {
                    return None;
                }
                Some(Stmt::new(StmtKind::Expr(expr), start.merge(self.previous_span())))
            }
        }
    }

    /// `{ stmts... }`
    pub(crate) fn parse_block_body(&mut self) -> Option<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check_exact(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(stmts)
    }

    /// `name [= init] {, name [= init]}` after `var`.
    fn parse_var_declarators(&mut self) -> Option<Vec<VarDeclarator>> {
        let mut decls = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            let span = name.span.merge(self.previous_span());
            decls.push(VarDeclarator { name, init, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Some(decls)
    }

    /// `( expr )` of if/while/do-while.
    fn parse_condition(&mut self) -> Option<Expr> {
        self.expect(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        Some(test)
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `if`
        let test = self.parse_condition()?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Some(Stmt::new(
            StmtKind::If {
                test,
                consequent,
                alternate,
            },
            start.merge(self.previous_span()),
        ))
    }

    /// Parse a loop body with `break`/`continue` allowed.
    fn parse_loop_body(&mut self) -> Option<Box<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body.map(Box::new)
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `while`
        let test = self.parse_condition()?;
        let body = self.parse_loop_body()?;
        Some(Stmt::new(
            StmtKind::While { test, body },
            start.merge(self.previous_span()),
        ))
    }

    fn parse_do_while(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `do`
        let body = self.parse_loop_body()?;
        self.expect(&TokenKind::While)?;
        let test = self.parse_condition()?;
        // the terminator after `do ... while (x)` is always optional
        self.eat(&TokenKind::Semicolon);
        Some(Stmt::new(
            StmtKind::DoWhile { body, test },
            start.merge(self.previous_span()),
        ))
    }

    /// `for ([init]; [test]; [update]) body`
    fn parse_for(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `for`
        self.expect(&TokenKind::LParen)?;

        let init = if self.check_exact(&TokenKind::Semicolon) {
            None
        } else if self.eat(&TokenKind::Var) {
            Some(ForInit::Var(self.parse_var_declarators()?))
        } else {
            Some(ForInit::Expr(self.parse_expression()?))
        };
        self.expect(&TokenKind::Semicolon)?;

        let test = if self.check_exact(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check_exact(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen)?;

        let body = self.parse_loop_body()?;
        Some(Stmt::new(
            StmtKind::For {
                init,
                test,
                update,
                body,
            },
            start.merge(self.previous_span()),
        ))
    }

    /// `break;` / `continue;`
    fn parse_jump(&mut self) -> Option<Stmt> {
        let token = self.advance();
        if self.loop_depth == 0 {
            self.error_at(
                ErrorCode::ILLEGAL_BREAK,
                format!("'{}' outside of a loop", token.kind),
                token.span,
            );
            return None;
        }
        if let TokenKind::Identifier(label) = self.peek_kind().clone() {
            if !self.newline_before() {
                self.error_at_current(
                    ErrorCode::UNSUPPORTED_STATEMENT,
                    format!("labelled '{}' is not supported ('{label}')", token.kind),
                );
                return None;
            }
        }
        self.consume_semicolon();
        let kind = if token.kind == TokenKind::Break {
            StmtKind::Break
        } else {
            StmtKind::Continue
        };
        Some(Stmt::new(kind, token.span.merge(self.previous_span())))
    }

    /// `return [expr];`: a line break right after `return` ends the statement.
    fn parse_return(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `return`
        if self.function_depth == 0 {
            self.error_at(
                ErrorCode::ILLEGAL_RETURN,
                "'return' outside of a function",
                start,
            );
            return None;
        }
        let value = if self.check_exact(&TokenKind::Semicolon)
            || self.check_exact(&TokenKind::RBrace)
            || self.at_end()
            || self.newline_before()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon();
        Some(Stmt::new(
            StmtKind::Return(value),
            start.merge(self.previous_span()),
        ))
    }

    /// `function name(a, b) { body }`
    fn parse_function_decl(&mut self) -> Option<FunctionDecl> {
        let start = self.advance().span; // eat `function`
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check_exact(&TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;

        let saved_loops = std::mem::take(&mut self.loop_depth);
        self.function_depth += 1;
        let body = self.parse_block_body();
        self.function_depth -= 1;
        self.loop_depth = saved_loops;

        Some(FunctionDecl {
            name,
            params,
            body: body?,
            span: start.merge(self.previous_span()),
        })
    }
}
