//! Operator precedence ranks.
//!
//! Every expression has an [`Order`]: the binding strength of its outermost
//! operator, lower binding tighter. Code generation splices fragments into
//! slots of a surrounding expression and consults [`needs_parens`] to decide
//! whether a fragment must be wrapped.
//!
//! The rank tables are exhaustive matches with no wildcard arm, so a new
//! operator cannot be added to the AST without being given a rank here.

use crate::ast::{BinOp, Expr, ExprKind, LogicalOp, UnaryOp, UpdateOp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Precedence rank of an expression's outermost operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Order(pub u16);

impl Order {
    pub const ATOMIC: Self = Self(0);
    pub const MEMBER: Self = Self(12);
    pub const FUNCTION_CALL: Self = Self(20);
    pub const INCREMENT: Self = Self(30);
    pub const DECREMENT: Self = Self(30);
    pub const BITWISE_NOT: Self = Self(41);
    pub const UNARY_PLUS: Self = Self(42);
    pub const UNARY_NEGATION: Self = Self(43);
    pub const LOGICAL_NOT: Self = Self(44);
    pub const TYPEOF: Self = Self(45);
    pub const VOID: Self = Self(46);
    pub const DELETE: Self = Self(47);
    pub const MULTIPLICATION: Self = Self(51);
    pub const DIVISION: Self = Self(52);
    pub const MODULUS: Self = Self(53);
    pub const SUBTRACTION: Self = Self(61);
    pub const ADDITION: Self = Self(62);
    pub const BITWISE_SHIFT: Self = Self(70);
    pub const RELATIONAL: Self = Self(80);
    pub const EQUALITY: Self = Self(90);
    pub const BITWISE_AND: Self = Self(100);
    pub const BITWISE_XOR: Self = Self(110);
    pub const BITWISE_OR: Self = Self(120);
    pub const LOGICAL_AND: Self = Self(130);
    pub const LOGICAL_OR: Self = Self(140);
    pub const CONDITIONAL: Self = Self(150);
    pub const ASSIGNMENT: Self = Self(160);
    pub const COMMA: Self = Self(180);
    pub const NONE: Self = Self(990);

    /// Operators in the same class share associativity behaviour.
    pub fn class(self) -> u16 {
        self.0 / 10
    }

    /// Rank of an expression's outermost operator.
    pub fn of(expr: &Expr) -> Order {
        match &expr.kind {
            ExprKind::Number(n) => {
                if *n < 0.0 {
                    Order::UNARY_NEGATION
                } else {
                    Order::ATOMIC
                }
            }
            ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Undefined
            | ExprKind::Identifier(_)
            | ExprKind::Array(_)
            | ExprKind::Object(_)
            | ExprKind::Paren(_) => Order::ATOMIC,
            ExprKind::Member { .. } => Order::MEMBER,
            ExprKind::Call { .. } => Order::FUNCTION_CALL,
            ExprKind::Unary { op, .. } => Order::of_unary(*op),
            ExprKind::Update { op, .. } => match op {
                UpdateOp::Increment => Order::INCREMENT,
                UpdateOp::Decrement => Order::DECREMENT,
            },
            ExprKind::Binary { op, .. } => Order::of_binary(*op),
            ExprKind::Logical { op, .. } => Order::of_logical(*op),
            ExprKind::Conditional { .. } => Order::CONDITIONAL,
            ExprKind::Assign { .. } => Order::ASSIGNMENT,
            ExprKind::Sequence(_) => Order::COMMA,
        }
    }

    pub fn of_unary(op: UnaryOp) -> Order {
        match op {
            UnaryOp::BitNot => Order::BITWISE_NOT,
            UnaryOp::Plus => Order::UNARY_PLUS,
            UnaryOp::Neg => Order::UNARY_NEGATION,
            UnaryOp::Not => Order::LOGICAL_NOT,
            UnaryOp::Typeof => Order::TYPEOF,
            UnaryOp::Void => Order::VOID,
            UnaryOp::Delete => Order::DELETE,
        }
    }

    pub fn of_binary(op: BinOp) -> Order {
        match op {
            BinOp::Mul => Order::MULTIPLICATION,
            BinOp::Div => Order::DIVISION,
            BinOp::Mod => Order::MODULUS,
            BinOp::Add => Order::ADDITION,
            BinOp::Sub => Order::SUBTRACTION,
            BinOp::Shl | BinOp::Shr | BinOp::UShr => Order::BITWISE_SHIFT,
            BinOp::Less | BinOp::Greater | BinOp::LessEq | BinOp::GreaterEq => Order::RELATIONAL,
            BinOp::Eq | BinOp::NotEq | BinOp::StrictEq | BinOp::StrictNotEq => Order::EQUALITY,
            BinOp::BitAnd => Order::BITWISE_AND,
            BinOp::BitXor => Order::BITWISE_XOR,
            BinOp::BitOr => Order::BITWISE_OR,
        }
    }

    pub fn of_logical(op: LogicalOp) -> Order {
        match op {
            LogicalOp::And => Order::LOGICAL_AND,
            LogicalOp::Or => Order::LOGICAL_OR,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the surrounding operator a slot sits on.
///
/// A left slot tolerates a fragment of the same class (left associativity);
/// a right slot does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Whether a fragment ranked `inner` must be parenthesised when spliced into
/// a slot of rank `outer` on the given side.
pub fn needs_parens(outer: Order, side: Side, inner: Order) -> bool {
    if inner == Order::ATOMIC || outer == Order::NONE {
        return false;
    }
    let chain = |o: Order| o == Order::MEMBER || o == Order::FUNCTION_CALL;
    if chain(outer) && chain(inner) {
        return false;
    }
    if outer == Order::LOGICAL_NOT && inner == Order::LOGICAL_NOT {
        return false;
    }
    match side {
        Side::Left => inner.class() > outer.class(),
        Side::Right => inner.class() >= outer.class(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Span;

    fn num(n: f64) -> Expr {
        Expr::new(ExprKind::Number(n), Span::point(1, 1))
    }

    #[test]
    fn test_every_binop_has_a_real_rank() {
        for op in BinOp::ALL {
            let order = Order::of_binary(op);
            assert!(order > Order::ATOMIC, "{} ranked atomic", op.as_str());
            assert!(order < Order::CONDITIONAL, "{} ranked too weak", op.as_str());
        }
        for op in UnaryOp::ALL {
            assert_eq!(Order::of_unary(op).class(), 4, "{}", op.as_str());
        }
    }

    #[test]
    fn test_negative_literal_ranks_as_negation() {
        assert_eq!(Order::of(&num(-3.0)), Order::UNARY_NEGATION);
        assert_eq!(Order::of(&num(3.0)), Order::ATOMIC);
    }

    #[test]
    fn test_addition_inside_multiplication_is_wrapped() {
        assert!(needs_parens(Order::MULTIPLICATION, Side::Left, Order::ADDITION));
        assert!(needs_parens(Order::MULTIPLICATION, Side::Right, Order::ADDITION));
        assert!(!needs_parens(Order::ADDITION, Side::Left, Order::MULTIPLICATION));
        assert!(!needs_parens(Order::ADDITION, Side::Right, Order::MULTIPLICATION));
    }

    #[test]
    fn test_same_class_only_wrapped_on_the_right() {
        // (a - b) - c needs nothing, a - (b - c) keeps its parens
        assert!(!needs_parens(Order::SUBTRACTION, Side::Left, Order::SUBTRACTION));
        assert!(needs_parens(Order::SUBTRACTION, Side::Right, Order::SUBTRACTION));
        assert!(needs_parens(Order::SUBTRACTION, Side::Right, Order::ADDITION));
    }

    #[test]
    fn test_member_and_call_chains() {
        assert!(!needs_parens(Order::MEMBER, Side::Left, Order::FUNCTION_CALL));
        assert!(!needs_parens(Order::FUNCTION_CALL, Side::Left, Order::MEMBER));
        assert!(needs_parens(Order::MEMBER, Side::Left, Order::ADDITION));
        assert!(needs_parens(Order::MEMBER, Side::Left, Order::UNARY_NEGATION));
    }

    #[test]
    fn test_none_and_atomic_never_wrap() {
        assert!(!needs_parens(Order::NONE, Side::Right, Order::COMMA));
        assert!(!needs_parens(Order::NONE, Side::Left, Order::NONE));
        assert!(!needs_parens(Order::MEMBER, Side::Left, Order::ATOMIC));
    }

    #[test]
    fn test_double_logical_not_kept_bare() {
        assert!(!needs_parens(Order::LOGICAL_NOT, Side::Right, Order::LOGICAL_NOT));
        assert!(needs_parens(Order::UNARY_NEGATION, Side::Right, Order::UNARY_NEGATION));
    }

    #[test]
    fn test_assignment_slots() {
        // a = b = c and a ? b : c ? d : e read correctly without parens
        assert!(!needs_parens(Order::ASSIGNMENT, Side::Left, Order::ASSIGNMENT));
        assert!(!needs_parens(Order::ASSIGNMENT, Side::Left, Order::CONDITIONAL));
        assert!(needs_parens(Order::CONDITIONAL, Side::Right, Order::CONDITIONAL));
        assert!(needs_parens(Order::COMMA, Side::Right, Order::COMMA));
        assert!(!needs_parens(Order::COMMA, Side::Right, Order::ASSIGNMENT));
    }
}
