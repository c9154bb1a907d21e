//! Statement printing.
//!
//! Statements are printed one per line into a [`CodeBuffer`]. Bodies of
//! `if`, `else` and loops are always braced, and every loop body starts
//! with the loop trap.

use tessera_types::ast::*;
use tessera_types::{Order, Side};

use crate::compiler::{CodeBuffer, EmitContext, Substitution};
use crate::error::CodegenResult;
use crate::expr::{emit_expr, splice};
use crate::guards;

/// Print a statement sequence at `indent`.
pub(crate) fn emit_stmts(
    stmts: &[Stmt],
    ctx: &EmitContext,
    out: &mut CodeBuffer,
    indent: usize,
) -> CodegenResult<()> {
    for stmt in stmts {
        emit_stmt(stmt, ctx, out, indent)?;
    }
    Ok(())
}

pub(crate) fn emit_stmt(
    stmt: &Stmt,
    ctx: &EmitContext,
    out: &mut CodeBuffer,
    indent: usize,
) -> CodegenResult<()> {
    match &stmt.kind {
        StmtKind::Var(decls) => {
            let decls = emit_declarators(decls, ctx)?;
            out.line(indent, format!("var {decls};"));
        }
        StmtKind::Expr(expr) => emit_expr_stmt(expr, ctx, out, indent)?,
        StmtKind::Block(body) => {
            out.line(indent, "{");
            emit_stmts(body, ctx, out, indent + 1)?;
            out.line(indent, "}");
        }
        StmtKind::If {
            test,
            consequent,
            alternate,
        } => emit_if(test, consequent, alternate.as_deref(), "", ctx, out, indent)?,
        StmtKind::While { test, body } => {
            let test = emit_expr(test, Order::NONE, Side::Left, ctx)?;
            out.line(indent, format!("while ({test}) {{"));
            emit_loop_body(body, ctx, out, indent + 1)?;
            out.line(indent, "}");
        }
        StmtKind::DoWhile { body, test } => {
            out.line(indent, "do {");
            emit_loop_body(body, ctx, out, indent + 1)?;
            let test = emit_expr(test, Order::NONE, Side::Left, ctx)?;
            out.line(indent, format!("}} while ({test});"));
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
        } => {
            let mut head = String::from("for (");
            match init {
                Some(ForInit::Var(decls)) => {
                    head.push_str("var ");
                    head.push_str(&emit_declarators(decls, ctx)?);
                }
                Some(ForInit::Expr(e)) => {
                    head.push_str(&emit_expr(e, Order::NONE, Side::Left, ctx)?)
                }
                None => {}
            }
            head.push(';');
            if let Some(test) = test {
                head.push(' ');
                head.push_str(&emit_expr(test, Order::NONE, Side::Left, ctx)?);
            }
            head.push(';');
            if let Some(update) = update {
                head.push(' ');
                head.push_str(&emit_expr(update, Order::NONE, Side::Left, ctx)?);
            }
            head.push_str(") {");
            out.line(indent, head);
            emit_loop_body(body, ctx, out, indent + 1)?;
            out.line(indent, "}");
        }
        StmtKind::Break => out.line(indent, "break;"),
        StmtKind::Continue => out.line(indent, "continue;"),
        StmtKind::Return(value) => match value {
            Some(value) => {
                let value = emit_expr(value, Order::NONE, Side::Left, ctx)?;
                out.line(indent, format!("return {value};"));
            }
            None => out.line(indent, "return;"),
        },
        StmtKind::Function(decl) => {
            let params: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
            out.line(
                indent,
                format!("function {}({}) {{", decl.name.name, params.join(", ")),
            );
            emit_stmts(&decl.body, ctx, out, indent + 1)?;
            out.line(indent, "}");
        }
        StmtKind::Empty => out.line(indent, ";"),
    }
    Ok(())
}

/// A statement-input placeholder standing alone splices in the nested
/// chain; any other expression prints as an expression statement.
fn emit_expr_stmt(
    expr: &Expr,
    ctx: &EmitContext,
    out: &mut CodeBuffer,
    indent: usize,
) -> CodegenResult<()> {
    let text = match expr.as_identifier().map(|name| ctx.placeholder(name)) {
        Some(sub) => match sub? {
            Some(Substitution::Statements(chain)) => {
                out.append(chain, indent);
                return Ok(());
            }
            Some(Substitution::Value(fragment)) | Some(Substitution::Field { fragment, .. }) => {
                splice(fragment, Order::NONE, Side::Left)
            }
            None => emit_expr(expr, Order::NONE, Side::Left, ctx)?,
        },
        None => emit_expr(expr, Order::NONE, Side::Left, ctx)?,
    };
    if text.starts_with('{') {
        // a leading brace would open a block
        out.line(indent, format!("({text});"));
    } else {
        out.line(indent, format!("{text};"));
    }
    Ok(())
}

fn emit_declarators(decls: &[VarDeclarator], ctx: &EmitContext) -> CodegenResult<String> {
    let mut parts = Vec::with_capacity(decls.len());
    for decl in decls {
        match &decl.init {
            Some(init) => {
                let init = emit_expr(init, Order::COMMA, Side::Right, ctx)?;
                parts.push(format!("{} = {init}", decl.name.name));
            }
            None => parts.push(decl.name.name.clone()),
        }
    }
    Ok(parts.join(", "))
}

fn emit_if(
    test: &Expr,
    consequent: &Stmt,
    alternate: Option<&Stmt>,
    prefix: &str,
    ctx: &EmitContext,
    out: &mut CodeBuffer,
    indent: usize,
) -> CodegenResult<()> {
    let test = emit_expr(test, Order::NONE, Side::Left, ctx)?;
    out.line(indent, format!("{prefix}if ({test}) {{"));
    emit_body(consequent, ctx, out, indent + 1)?;
    match alternate.map(|alt| (alt, &alt.kind)) {
        Some((
            _,
            StmtKind::If {
                test,
                consequent,
                alternate,
            },
        )) => emit_if(
            test,
            consequent,
            alternate.as_deref(),
            "} else ",
            ctx,
            out,
            indent,
        )?,
        Some((alt, _)) => {
            out.line(indent, "} else {");
            emit_body(alt, ctx, out, indent + 1)?;
            out.line(indent, "}");
        }
        None => out.line(indent, "}"),
    }
    Ok(())
}

/// Contents of a braced body: a block's statements, or the single statement.
fn emit_body(
    body: &Stmt,
    ctx: &EmitContext,
    out: &mut CodeBuffer,
    indent: usize,
) -> CodegenResult<()> {
    match &body.kind {
        StmtKind::Block(stmts) => emit_stmts(stmts, ctx, out, indent),
        _ => emit_stmt(body, ctx, out, indent),
    }
}

fn emit_loop_body(
    body: &Stmt,
    ctx: &EmitContext,
    out: &mut CodeBuffer,
    indent: usize,
) -> CodegenResult<()> {
    out.line(indent, guards::loop_trap());
    emit_body(body, ctx, out, indent)
}
