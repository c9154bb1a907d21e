//! Runtime guards and instrumentation.
//!
//! Every guard aborts through `exit(false, message)` with one of the fixed
//! messages below. Bound guards evaluate the guarded value once into the
//! `tmp` scratch variable and compose innermost-first: integer, then min,
//! then max.

use tessera_types::block::Bound;
use tessera_types::intrinsics::{EXIT, HIGHLIGHT_BLOCK, LOOP_TRAP, TMP};
use tessera_types::literal::quote_string;
use tessera_types::{Order, Side};

use crate::compiler::{EmitContext, Fragment};
use crate::error::CodegenResult;
use crate::expr::{emit_expr, splice};

pub const MISSING_PARAMETER: &str = "missing parameter: the block needs a value";
pub const NOT_INTEGER: &str = "the parameter must be an integer";
pub const BELOW_MIN: &str = "the parameter must be greater than or equal to ";
pub const ABOVE_MAX: &str = "the parameter must be less than or equal to ";
pub const INFINITE_LOOP: &str = "infinite loop";
pub const OUT_OF_INSTRUCTIONS: &str = "ran out of instructions before completing the level";

/// `exit(false, "<message>")`
pub(crate) fn abort(message: &str) -> String {
    format!("{EXIT}(false, {})", quote_string(message))
}

/// Trace hook placed before every statement block.
pub(crate) fn highlight(block_id: &str) -> String {
    format!("{HIGHLIGHT_BLOCK}({});", quote_string(block_id))
}

/// Budget check placed at the head of every loop body.
pub(crate) fn loop_trap() -> String {
    format!("if(--{LOOP_TRAP} === 0) {};", abort(INFINITE_LOOP))
}

/// Final statement of every program.
pub(crate) fn out_of_instructions() -> String {
    format!("{};", abort(OUT_OF_INSTRUCTIONS))
}

/// Substitute for an unconnected value input.
pub(crate) fn missing_parameter() -> Fragment {
    Fragment {
        code: abort(MISSING_PARAMETER),
        order: Order::FUNCTION_CALL,
    }
}

/// Wrap `value` in the guards its input declares.
pub(crate) fn apply(
    value: Fragment,
    integer: bool,
    min: Option<&Bound>,
    max: Option<&Bound>,
    ctx: &EmitContext,
) -> CodegenResult<Fragment> {
    let mut value = value;
    if integer {
        value = integer_guard(&value);
    }
    if let Some(min) = min {
        value = bound_guard(&value, ">=", min, BELOW_MIN, ctx)?;
    }
    if let Some(max) = max {
        value = bound_guard(&value, "<=", max, ABOVE_MAX, ctx)?;
    }
    Ok(value)
}

fn integer_guard(value: &Fragment) -> Fragment {
    let x = splice(value, Order::ASSIGNMENT, Side::Left);
    Fragment {
        code: format!(
            "({TMP} = {x}, {TMP} % 1 === 0 ? {TMP} : {})",
            abort(NOT_INTEGER)
        ),
        order: Order::ATOMIC,
    }
}

fn bound_guard(
    value: &Fragment,
    op: &str,
    bound: &Bound,
    message: &str,
    ctx: &EmitContext,
) -> CodegenResult<Fragment> {
    let x = splice(value, Order::ASSIGNMENT, Side::Left);
    let bound = Fragment {
        code: emit_expr(&bound.expr, Order::NONE, Side::Left, ctx)?,
        order: bound.order,
    };
    let limit = splice(&bound, Order::RELATIONAL, Side::Right);
    let shown = splice(&bound, Order::ADDITION, Side::Right);
    Ok(Fragment {
        code: format!(
            "(({TMP} = {x}) {op} {limit} ? {TMP} : {EXIT}(false, {} + {shown}))",
            quote_string(message)
        ),
        order: Order::ATOMIC,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_trap_text() {
        assert_eq!(
            loop_trap(),
            "if(--loopTrap === 0) exit(false, \"infinite loop\");"
        );
    }

    #[test]
    fn highlight_escapes_block_ids() {
        assert_eq!(highlight("a\"b"), "highlightBlock(\"a\\\"b\");");
    }

    #[test]
    fn integer_guard_evaluates_value_once() {
        let value = Fragment {
            code: "f()".into(),
            order: Order::FUNCTION_CALL,
        };
        let guarded = integer_guard(&value);
        assert_eq!(guarded.code.matches("f()").count(), 1);
        assert_eq!(guarded.order, Order::ATOMIC);
    }

    fn bound(source: &str, order: Order) -> Bound {
        Bound {
            source: source.into(),
            expr: tessera_parser::parse_expression(&tessera_types::SourceFile::new("t.js", source))
                .unwrap(),
            order,
        }
    }

    fn guarded(min: &Bound) -> String {
        let ctx = EmitContext {
            block_id: "b",
            subs: &[],
        };
        let value = Fragment {
            code: "0".into(),
            order: Order::ATOMIC,
        };
        bound_guard(&value, ">=", min, BELOW_MIN, &ctx).unwrap().code
    }

    #[test]
    fn conditional_bound_is_wrapped() {
        let code = guarded(&bound("state.hard ? 3 : 1", Order::CONDITIONAL));
        assert!(code.starts_with("((tmp = 0) >= (state.hard ? 3 : 1) ? tmp"), "{code}");
    }

    #[test]
    fn subtraction_bound_is_wrapped_in_the_message() {
        let code = guarded(&bound("state.limit - 1", Order::SUBTRACTION));
        assert!(code.contains(">= state.limit - 1 ?"), "{code}");
        assert!(code.ends_with("+ (state.limit - 1)))"), "{code}");
    }

    #[test]
    fn atomic_bound_is_bare() {
        let code = guarded(&bound("5", Order::ATOMIC));
        assert!(code.ends_with("+ 5))"), "{code}");
    }
}
