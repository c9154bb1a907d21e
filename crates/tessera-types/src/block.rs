//! Validated block definitions.
//!
//! A [`BlockDefinition`] is what the validator produces from a raw record and
//! what the code generator consumes. Snippets are stored parsed, with every
//! `%N` already rewritten to its `_ARG<n>` placeholder.

use crate::ast::{Expr, Program};
use crate::Order;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of positional argument placeholders.
pub const ARG_PREFIX: &str = "_ARG";

/// Canonical placeholder name for the argument at `index`.
pub fn arg_name(index: usize) -> String {
    format!("{ARG_PREFIX}{index}")
}

/// Parse `_ARG<n>` back to `n`. Leading zeros and trailing text are rejected.
pub fn placeholder_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix(ARG_PREFIX)?;
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return None;
    }
    digits.parse().ok()
}

/// Output types an expression block can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Number,
    String,
    Array,
    Boolean,
}

impl ValueType {
    /// Parse an output type name. `Integer` is not an output type.
    pub fn from_name(name: &str) -> Option<ValueType> {
        match name {
            "Number" => Some(ValueType::Number),
            "String" => Some(ValueType::String),
            "Array" => Some(ValueType::Array),
            "Boolean" => Some(ValueType::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Number => "Number",
            ValueType::String => "String",
            ValueType::Array => "Array",
            ValueType::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `min`/`max` bound: the source text, its parsed form and its rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub source: String,
    pub expr: Expr,
    pub order: Order,
}

/// One `[label, value]` pair of a dropdown.
#[derive(Debug, Clone, PartialEq)]
pub struct DropdownOption {
    pub label: String,
    pub value: Bound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    /// A socket for an expression block.
    InputValue {
        check: ValueType,
        /// Set when the record said `Integer`.
        integer: bool,
        min: Option<Bound>,
        max: Option<Bound>,
    },
    /// A socket for a chain of statement blocks.
    InputStatement,
    FieldDropdown {
        options: Vec<DropdownOption>,
    },
    FieldNumber {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
        precision: Option<f64>,
    },
    FieldInput {
        text: String,
    },
}

impl ArgKind {
    /// Record spelling of this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgKind::InputValue { .. } => "input_value",
            ArgKind::InputStatement => "input_statement",
            ArgKind::FieldDropdown { .. } => "field_dropdown",
            ArgKind::FieldNumber { .. } => "field_number",
            ArgKind::FieldInput { .. } => "field_input",
        }
    }

    /// Fields are chosen in the editor; inputs take other blocks.
    pub fn is_field(&self) -> bool {
        matches!(
            self,
            ArgKind::FieldDropdown { .. } | ArgKind::FieldNumber { .. } | ArgKind::FieldInput { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockArg {
    /// `_ARG<index>`.
    pub name: String,
    pub kind: ArgKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockRole {
    Statement {
        previous: bool,
        next: bool,
        body: Program,
    },
    Expression {
        output: ValueType,
        expr: Expr,
        order: Order,
    },
}

/// Block colour: a hue number or a colour string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Colour {
    Hue(f64),
    Named(String),
}

/// A validated block type.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDefinition {
    pub type_name: String,
    pub message: String,
    pub args: Vec<BlockArg>,
    pub role: BlockRole,
    /// Snippet text after placeholder rewriting.
    pub js: String,
    pub inputs_inline: bool,
    pub colour: Colour,
    pub tooltip: String,
    pub help_url: String,
    pub max_instances: Option<u32>,
}

impl BlockDefinition {
    pub fn is_statement(&self) -> bool {
        matches!(self.role, BlockRole::Statement { .. })
    }

    /// Output type of an expression block.
    pub fn output(&self) -> Option<ValueType> {
        match &self.role {
            BlockRole::Expression { output, .. } => Some(*output),
            BlockRole::Statement { .. } => None,
        }
    }

    /// Look up an argument by its placeholder name.
    pub fn arg(&self, name: &str) -> Option<&BlockArg> {
        placeholder_index(name).and_then(|i| self.args.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_index_roundtrip() {
        for i in [0, 1, 9, 10, 42] {
            assert_eq!(placeholder_index(&arg_name(i)), Some(i));
        }
    }

    #[test]
    fn test_placeholder_index_rejects_lookalikes() {
        assert_eq!(placeholder_index("_ARG"), None);
        assert_eq!(placeholder_index("_ARG01"), None);
        assert_eq!(placeholder_index("_ARG1x"), None);
        assert_eq!(placeholder_index("ARG1"), None);
        assert_eq!(placeholder_index("_arg1"), None);
    }

    #[test]
    fn test_colour_untagged() {
        let hue: Colour = serde_json::from_str("210").unwrap();
        assert_eq!(hue, Colour::Hue(210.0));
        let named: Colour = serde_json::from_str("\"#a5745b\"").unwrap();
        assert_eq!(named, Colour::Named("#a5745b".into()));
    }
}
