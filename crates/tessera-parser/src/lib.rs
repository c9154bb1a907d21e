//! Block-script parser: converts a token stream into an AST.

mod parse_expr;
mod parse_stmt;
mod parser;

pub use parser::{ParseResult, Parser, MAX_NESTING};

use tessera_lexer::Lexer;
use tessera_types::ast::{Expr, Program};
use tessera_types::{CompileErrors, SourceFile};

/// Lex and parse a whole script.
pub fn parse_program(source_file: &SourceFile) -> Result<Program, CompileErrors> {
    let lexed = Lexer::new(source_file).lex();
    if lexed.errors.has_errors() {
        return Err(lexed.errors);
    }
    let parsed = Parser::new(lexed.tokens, source_file).parse();
    match parsed.program {
        Some(program) if !parsed.errors.has_errors() => Ok(program),
        _ => Err(parsed.errors),
    }
}

/// Lex and parse text that must be exactly one expression.
pub fn parse_expression(source_file: &SourceFile) -> Result<Expr, CompileErrors> {
    let lexed = Lexer::new(source_file).lex();
    if lexed.errors.has_errors() {
        return Err(lexed.errors);
    }
    match Parser::new(lexed.tokens, source_file).parse_standalone_expression() {
        (Some(expr), _) => Ok(expr),
        (None, errors) => Err(errors),
    }
}
