//! Expression printing.
//!
//! Snippet expressions are printed back to text with every `_ARG<n>`
//! placeholder replaced by its substitution. The snippet's own structure is
//! reproduced as parsed (explicit parentheses included); only spliced
//! fragments are parenthesised, according to the slot they land in.

use tessera_types::ast::*;
use tessera_types::block::{placeholder_index, ARG_PREFIX};
use tessera_types::literal::{format_number, quote_string};
use tessera_types::{needs_parens, Order, Side};

use crate::compiler::{EmitContext, Fragment, Substitution};
use crate::error::{CodegenError, CodegenResult};

/// Print `expr` for a slot of rank `slot` on `side` of its parent.
pub(crate) fn emit_expr(
    expr: &Expr,
    slot: Order,
    side: Side,
    ctx: &EmitContext,
) -> CodegenResult<String> {
    match &expr.kind {
        // ── Literals ──────────────────────────────────────────────────────
        ExprKind::Number(n) => Ok(format_number(*n)),
        ExprKind::String(s) => Ok(quote_string(&interpolate(s, ctx))),
        ExprKind::Bool(b) => Ok(b.to_string()),
        ExprKind::Null => Ok("null".into()),
        ExprKind::Undefined => Ok("undefined".into()),
        ExprKind::Array(items) => Ok(format!("[{}]", emit_list(items, ctx)?)),
        ExprKind::Object(props) => emit_object(props, ctx),

        // ── Identifiers & placeholders ───────────────────────────────────
        ExprKind::Identifier(name) => match ctx.placeholder(name)? {
            Some(Substitution::Value(fragment))
            | Some(Substitution::Field { fragment, .. }) => Ok(splice(fragment, slot, side)),
            Some(Substitution::Statements(_)) => Err(CodegenError::UnsupportedExpression {
                block_id: ctx.block_id.to_string(),
                message: format!("statement input {name} used as a value"),
            }),
            None => Ok(name.clone()),
        },

        // ── Member access & calls ────────────────────────────────────────
        ExprKind::Member { object, property } => {
            let mut obj = emit_expr(object, Order::MEMBER, Side::Left, ctx)?;
            if is_bare_integer(&obj) {
                // `1.x` would lex as a number
                obj = format!("({obj})");
            }
            match property {
                MemberProperty::Named(name) => Ok(format!("{obj}.{}", name.name)),
                MemberProperty::Computed(index) => Ok(format!(
                    "{obj}[{}]",
                    emit_expr(index, Order::NONE, Side::Left, ctx)?
                )),
            }
        }
        ExprKind::Call { callee, args } => Ok(format!(
            "{}({})",
            emit_expr(callee, Order::FUNCTION_CALL, Side::Left, ctx)?,
            emit_list(args, ctx)?
        )),

        // ── Operators ────────────────────────────────────────────────────
        ExprKind::Unary { op, operand } => {
            let inner = emit_expr(operand, Order::of_unary(*op), Side::Right, ctx)?;
            let clash = match op {
                UnaryOp::Neg => inner.starts_with('-'),
                UnaryOp::Plus => inner.starts_with('+'),
                _ => op.is_keyword(),
            };
            if clash {
                Ok(format!("{} {inner}", op.as_str()))
            } else {
                Ok(format!("{}{inner}", op.as_str()))
            }
        }
        ExprKind::Update { op, prefix, target } => {
            let target = emit_target(target, ctx)?;
            let op = op.as_str();
            if *prefix {
                Ok(format!("{op}{target}"))
            } else {
                Ok(format!("{target}{op}"))
            }
        }
        ExprKind::Binary { op, left, right } => {
            emit_infix(Order::of_binary(*op), op.as_str(), left, right, ctx)
        }
        ExprKind::Logical { op, left, right } => {
            emit_infix(Order::of_logical(*op), op.as_str(), left, right, ctx)
        }
        ExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => Ok(format!(
            "{} ? {} : {}",
            emit_expr(test, Order::CONDITIONAL, Side::Right, ctx)?,
            emit_expr(consequent, Order::ASSIGNMENT, Side::Left, ctx)?,
            emit_expr(alternate, Order::ASSIGNMENT, Side::Left, ctx)?
        )),
        ExprKind::Assign { op, target, value } => Ok(format!(
            "{} {} {}",
            emit_target(target, ctx)?,
            op.as_str(),
            emit_expr(value, Order::ASSIGNMENT, Side::Left, ctx)?
        )),
        ExprKind::Sequence(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let side = if i == 0 { Side::Left } else { Side::Right };
                parts.push(emit_expr(item, Order::COMMA, side, ctx)?);
            }
            Ok(parts.join(", "))
        }

        // ── Grouping ─────────────────────────────────────────────────────
        ExprKind::Paren(inner) => Ok(format!(
            "({})",
            emit_expr(inner, Order::NONE, Side::Left, ctx)?
        )),
    }
}

/// Text of `fragment` as it must appear in a slot of rank `slot`.
pub(crate) fn splice(fragment: &Fragment, slot: Order, side: Side) -> String {
    if needs_parens(slot, side, fragment.order) {
        format!("({})", fragment.code)
    } else {
        fragment.code.clone()
    }
}

fn emit_infix(
    order: Order,
    op: &str,
    left: &Expr,
    right: &Expr,
    ctx: &EmitContext,
) -> CodegenResult<String> {
    Ok(format!(
        "{} {op} {}",
        emit_expr(left, order, Side::Left, ctx)?,
        emit_expr(right, order, Side::Right, ctx)?
    ))
}

/// Assignment and update targets. A placeholder may only stand here when it
/// is a dropdown whose value is itself assignable.
fn emit_target(target: &Expr, ctx: &EmitContext) -> CodegenResult<String> {
    if let ExprKind::Identifier(name) = &target.kind {
        return match ctx.placeholder(name)? {
            Some(Substitution::Field {
                fragment,
                assignable: true,
                ..
            }) => Ok(fragment.code.clone()),
            Some(_) => Err(CodegenError::UnsupportedExpression {
                block_id: ctx.block_id.to_string(),
                message: format!("{name} cannot be assigned to"),
            }),
            None => Ok(name.clone()),
        };
    }
    emit_expr(target, Order::NONE, Side::Left, ctx)
}

fn emit_list(items: &[Expr], ctx: &EmitContext) -> CodegenResult<String> {
    let parts = items
        .iter()
        .map(|item| emit_expr(item, Order::COMMA, Side::Right, ctx))
        .collect::<CodegenResult<Vec<_>>>()?;
    Ok(parts.join(", "))
}

fn emit_object(props: &[Property], ctx: &EmitContext) -> CodegenResult<String> {
    if props.is_empty() {
        return Ok("{}".into());
    }
    let mut parts = Vec::with_capacity(props.len());
    for prop in props {
        let key = match &prop.key {
            PropertyKey::Identifier(name) => name.clone(),
            PropertyKey::String(s) => quote_string(s),
            PropertyKey::Number(n) => format_number(*n),
        };
        let value = emit_expr(&prop.value, Order::COMMA, Side::Right, ctx)?;
        parts.push(format!("{key}: {value}"));
    }
    Ok(format!("{{{}}}", parts.join(", ")))
}

fn is_bare_integer(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}

/// Replace field placeholders inside string literal text with the field's
/// raw text. Other `_ARG` text is left as written.
fn interpolate(text: &str, ctx: &EmitContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(ARG_PREFIX) {
        out.push_str(&rest[..pos]);
        let digits = rest[pos + ARG_PREFIX.len()..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let name = &rest[pos..pos + ARG_PREFIX.len() + digits];
        match placeholder_index(name).and_then(|i| ctx.subs.get(i)) {
            Some(Substitution::Field { raw, .. }) => out.push_str(raw),
            _ => out.push_str(name),
        }
        rest = &rest[pos + name.len()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::SourceFile;

    fn parse(source: &str) -> Expr {
        tessera_parser::parse_expression(&SourceFile::new("t.js", source)).unwrap()
    }

    fn value(code: &str, order: Order) -> Substitution {
        Substitution::Value(Fragment {
            code: code.into(),
            order,
        })
    }

    fn print(source: &str, subs: &[Substitution]) -> String {
        let ctx = EmitContext {
            block_id: "b",
            subs,
        };
        emit_expr(&parse(source), Order::NONE, Side::Left, &ctx).unwrap()
    }

    #[test]
    fn addition_inside_multiplication_is_wrapped() {
        let subs = [value("1 + 2", Order::ADDITION), value("3", Order::ATOMIC)];
        assert_eq!(print("_ARG0 * _ARG1", &subs), "(1 + 2) * 3");
    }

    #[test]
    fn multiplication_inside_addition_is_bare() {
        let subs = [value("1 * 2", Order::MULTIPLICATION), value("3", Order::ATOMIC)];
        assert_eq!(print("_ARG0 + _ARG1", &subs), "1 * 2 + 3");
    }

    #[test]
    fn right_operand_of_same_class_is_wrapped() {
        let subs = [value("a", Order::ATOMIC), value("b - c", Order::SUBTRACTION)];
        assert_eq!(print("_ARG0 - _ARG1", &subs), "a - (b - c)");
        let subs = [value("b - c", Order::SUBTRACTION), value("a", Order::ATOMIC)];
        assert_eq!(print("_ARG0 - _ARG1", &subs), "b - c - a");
    }

    #[test]
    fn call_arguments_take_anything_but_sequences() {
        let subs = [value("a = 1", Order::ASSIGNMENT), value("x, y", Order::COMMA)];
        assert_eq!(print("f(_ARG0, _ARG1)", &subs), "f(a = 1, (x, y))");
    }

    #[test]
    fn negation_of_negative_keeps_tokens_apart() {
        let subs = [value("-3", Order::UNARY_NEGATION)];
        assert_eq!(print("-_ARG0", &subs), "-(-3)");
        assert_eq!(print("- -x", &[]), "- -x");
    }

    #[test]
    fn integer_member_object_is_wrapped() {
        let subs = [value("12", Order::ATOMIC)];
        assert_eq!(print("_ARG0.toString()", &subs), "(12).toString()");
    }

    #[test]
    fn snippet_parentheses_are_kept() {
        assert_eq!(print("(a + b) * c", &[]), "(a + b) * c");
        assert_eq!(print("typeof x === 'number'", &[]), "typeof x === \"number\"");
    }

    #[test]
    fn field_text_is_interpolated_into_strings() {
        let subs = [Substitution::Field {
            fragment: Fragment {
                code: "\"Bob\"".into(),
                order: Order::ATOMIC,
            },
            raw: "Bob".into(),
            assignable: false,
        }];
        assert_eq!(print("'hi _ARG0, _ARG9'", &subs), "\"hi Bob, _ARG9\"");
    }

    #[test]
    fn unassignable_placeholder_target_is_rejected() {
        let subs = [value("1", Order::ATOMIC)];
        let ctx = EmitContext {
            block_id: "b",
            subs: &subs,
        };
        let err = emit_expr(&parse("_ARG0 = 2"), Order::NONE, Side::Left, &ctx).unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedExpression { .. }));
    }
}
