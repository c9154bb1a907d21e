//! Block tree → program assembler.
//!
//! Orchestrates code generation:
//! 1. Check the tree as a whole (unique ids, registered types, instance caps)
//! 2. Walk every top-level statement chain in document order
//! 3. For each block, resolve its arguments into substitutions: generated
//!    code of child blocks (guarded), field literals, nested chains
//! 4. Print the block's snippet with those substitutions
//! 5. Append the out-of-instructions terminator and fingerprint the text

use std::collections::{BTreeMap, HashSet};

use tessera_types::ast::{Expr, ExprKind};
use tessera_types::block::{placeholder_index, ArgKind, BlockArg, BlockDefinition, BlockRole};
use tessera_types::literal::{format_number, quote_string};
use tessera_types::{Order, Side};
use tracing::debug;

use crate::error::{CodegenError, CodegenResult};
use crate::expr::emit_expr;
use crate::guards;
use crate::program::GeneratedProgram;
use crate::registry::BlockRegistry;
use crate::source_map::SourceMap;
use crate::stmt::emit_stmts;
use crate::workspace::{BlockNode, BlockTree, FieldValue, NodeId};

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Generate the program for a block tree.
pub fn generate(registry: &BlockRegistry, tree: &BlockTree) -> CodegenResult<GeneratedProgram> {
    Generator::new(registry, tree).run()
}

/// Generate the program for a serialised editor workspace.
pub fn generate_from_json(registry: &BlockRegistry, workspace: &str) -> CodegenResult<GeneratedProgram> {
    let tree = BlockTree::from_json(workspace)?;
    generate(registry, &tree)
}

// ══════════════════════════════════════════════════════════════════════════════
// Emission context
// ══════════════════════════════════════════════════════════════════════════════

/// Generated code together with the rank of its outermost operator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fragment {
    pub code: String,
    pub order: Order,
}

/// What an `_ARG<n>` placeholder is replaced with.
#[derive(Debug, Clone)]
pub(crate) enum Substitution {
    /// Code of the block plugged into a value input, or the missing guard.
    Value(Fragment),
    /// A field's literal. `raw` is interpolated into string literals.
    Field {
        fragment: Fragment,
        raw: String,
        assignable: bool,
    },
    /// A nested statement chain.
    Statements(CodeBuffer),
}

/// Per-block state threaded through the printers.
pub(crate) struct EmitContext<'a> {
    pub block_id: &'a str,
    /// Indexed by argument position.
    pub subs: &'a [Substitution],
}

impl EmitContext<'_> {
    /// Resolve `name` if it is a placeholder. Plain identifiers give `None`.
    pub(crate) fn placeholder(&self, name: &str) -> CodegenResult<Option<&Substitution>> {
        match placeholder_index(name) {
            None => Ok(None),
            Some(i) => match self.subs.get(i) {
                Some(sub) => Ok(Some(sub)),
                None => Err(CodegenError::UnsupportedExpression {
                    block_id: self.block_id.to_string(),
                    message: format!("placeholder {name} has no argument"),
                }),
            },
        }
    }
}

/// Indented lines plus the line ranges each statement block produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct CodeBuffer {
    lines: Vec<(usize, String)>,
    marks: Vec<(String, usize, usize)>,
}

impl CodeBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn line(&mut self, indent: usize, text: impl Into<String>) {
        self.lines.push((indent, text.into()));
    }

    /// Copy `other` in, shifted right by `indent` levels.
    pub(crate) fn append(&mut self, other: &CodeBuffer, indent: usize) {
        let offset = self.lines.len();
        self.lines
            .extend(other.lines.iter().map(|(i, text)| (i + indent, text.clone())));
        self.marks.extend(
            other
                .marks
                .iter()
                .map(|(id, start, end)| (id.clone(), start + offset, end + offset)),
        );
    }

    /// Record that lines `start..` up to now belong to `block_id`.
    pub(crate) fn mark(&mut self, block_id: &str, start: usize) {
        self.marks.push((block_id.to_string(), start, self.lines.len()));
    }

    pub(crate) fn finish(self) -> (String, SourceMap) {
        let mut code = String::new();
        for (indent, text) in &self.lines {
            for _ in 0..*indent {
                code.push_str("  ");
            }
            code.push_str(text);
            code.push('\n');
        }
        let mut map = SourceMap::new();
        for (id, start, end) in self.marks {
            map.push(id, start as u32 + 1, end as u32);
        }
        (code, map)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Generator
// ══════════════════════════════════════════════════════════════════════════════

struct Generator<'a> {
    registry: &'a BlockRegistry,
    tree: &'a BlockTree,
    /// Nodes already generated; a second visit means a shared child.
    visited: Vec<bool>,
}

impl<'a> Generator<'a> {
    fn new(registry: &'a BlockRegistry, tree: &'a BlockTree) -> Self {
        Self {
            registry,
            tree,
            visited: vec![false; tree.len()],
        }
    }

    fn run(mut self) -> CodegenResult<GeneratedProgram> {
        self.check_tree()?;

        let mut out = CodeBuffer::new();
        for &root in self.tree.roots() {
            let node = self.node(root)?;
            if !self.definition(node)?.is_statement() {
                debug!(block_id = %node.id, "skipping unattached expression block");
                continue;
            }
            let chain = self.statement_chain(root, false)?;
            out.append(&chain, 0);
        }
        out.line(0, guards::out_of_instructions());

        let (code, source_map) = out.finish();
        let program = GeneratedProgram::new(code, source_map);
        debug!(lines = program.line_count(), hash = %program.hash, "generated program");
        Ok(program)
    }

    // ── Whole-tree checks ────────────────────────────────────────────────

    fn check_tree(&self) -> CodegenResult<()> {
        let mut ids = HashSet::new();
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for node in self.tree.nodes() {
            if !ids.insert(node.id.as_str()) {
                return Err(CodegenError::DuplicateBlockId {
                    block_id: node.id.clone(),
                });
            }
            self.definition(node)?;
            *counts.entry(node.type_name.as_str()).or_default() += 1;
        }
        for (type_name, count) in counts {
            let max = self.registry.get(type_name).and_then(|d| d.max_instances);
            if let Some(max) = max {
                if count > max as usize {
                    return Err(CodegenError::MaxInstancesExceeded {
                        type_name: type_name.to_string(),
                        max,
                        count,
                    });
                }
            }
        }
        Ok(())
    }

    fn node(&self, id: NodeId) -> CodegenResult<&'a BlockNode> {
        self.tree.node(id).ok_or_else(|| {
            CodegenError::MalformedWorkspace(format!("dangling block reference #{}", id.0))
        })
    }

    fn definition(&self, node: &BlockNode) -> CodegenResult<&'a BlockDefinition> {
        self.registry
            .get(&node.type_name)
            .ok_or_else(|| CodegenError::MissingBlockDefinition {
                block_id: node.id.clone(),
                type_name: node.type_name.clone(),
            })
    }

    fn enter(&mut self, id: NodeId, node: &BlockNode) -> CodegenResult<()> {
        match self.visited.get_mut(id.0) {
            Some(seen) if !*seen => {
                *seen = true;
                Ok(())
            }
            _ => Err(CodegenError::InvalidConnection {
                block_id: node.id.clone(),
                message: "block is connected in more than one place".into(),
            }),
        }
    }

    // ── Statement blocks ─────────────────────────────────────────────────

    /// Generate a chain of statement blocks linked by `next`. `attached`
    /// chains hang off a statement input, so their head needs a previous
    /// connection too.
    fn statement_chain(&mut self, first: NodeId, attached: bool) -> CodegenResult<CodeBuffer> {
        let mut out = CodeBuffer::new();
        let mut current = Some(first);
        let mut needs_previous = attached;
        while let Some(id) = current {
            let node = self.node(id)?;
            self.enter(id, node)?;
            let def = self.definition(node)?;
            let BlockRole::Statement {
                previous,
                next,
                body,
            } = &def.role
            else {
                return Err(CodegenError::InvalidConnection {
                    block_id: node.id.clone(),
                    message: "a value block cannot be placed in a statement sequence".into(),
                });
            };
            if needs_previous && !previous {
                return Err(CodegenError::InvalidConnection {
                    block_id: node.id.clone(),
                    message: "block has no previous connection".into(),
                });
            }
            if node.next.is_some() && !next {
                return Err(CodegenError::InvalidConnection {
                    block_id: node.id.clone(),
                    message: "block has no next connection".into(),
                });
            }

            if node.enabled {
                let subs = self.substitutions(node, def)?;
                let ctx = EmitContext {
                    block_id: &node.id,
                    subs: &subs,
                };
                let start = out.len();
                out.line(0, guards::highlight(&node.id));
                emit_stmts(&body.body, &ctx, &mut out, 0)?;
                out.mark(&node.id, start);
                debug!(block_id = %node.id, block_type = %def.type_name, "generated statement block");
            } else {
                debug!(block_id = %node.id, "skipping disabled block");
            }

            needs_previous = true;
            current = node.next;
        }
        Ok(out)
    }

    // ── Expression blocks ────────────────────────────────────────────────

    fn expression_block(&mut self, id: NodeId) -> CodegenResult<Fragment> {
        let node = self.node(id)?;
        self.enter(id, node)?;
        let def = self.definition(node)?;
        let BlockRole::Expression { expr, order, .. } = &def.role else {
            return Err(CodegenError::InvalidConnection {
                block_id: node.id.clone(),
                message: "a statement block cannot be used as a value".into(),
            });
        };
        let subs = self.substitutions(node, def)?;
        let ctx = EmitContext {
            block_id: &node.id,
            subs: &subs,
        };
        let code = emit_expr(expr, Order::NONE, Side::Left, &ctx)?;
        // a snippet that is just a placeholder takes the rank of what fills it
        let order = match expr.as_identifier().map(|name| ctx.placeholder(name)) {
            Some(Ok(Some(Substitution::Value(f)))) => f.order,
            Some(Ok(Some(Substitution::Field { fragment, .. }))) => fragment.order,
            _ => *order,
        };
        Ok(Fragment { code, order })
    }

    // ── Arguments ────────────────────────────────────────────────────────

    fn substitutions(
        &mut self,
        node: &'a BlockNode,
        def: &'a BlockDefinition,
    ) -> CodegenResult<Vec<Substitution>> {
        for name in node.inputs.keys() {
            match def.arg(name) {
                Some(arg) if !arg.kind.is_field() => {}
                _ => {
                    return Err(CodegenError::InvalidConnection {
                        block_id: node.id.clone(),
                        message: format!("{name} is not an input of '{}'", def.type_name),
                    })
                }
            }
        }
        for name in node.fields.keys() {
            match def.arg(name) {
                Some(arg) if arg.kind.is_field() => {}
                _ => {
                    return Err(CodegenError::InvalidFieldValue {
                        block_id: node.id.clone(),
                        field: name.clone(),
                        message: format!("'{}' has no such field", def.type_name),
                    })
                }
            }
        }

        let mut subs = Vec::with_capacity(def.args.len());
        for arg in &def.args {
            subs.push(self.substitution(node, arg)?);
        }
        Ok(subs)
    }

    fn substitution(&mut self, node: &'a BlockNode, arg: &'a BlockArg) -> CodegenResult<Substitution> {
        let block_id = node.id.as_str();
        match &arg.kind {
            ArgKind::InputValue {
                check,
                integer,
                min,
                max,
            } => {
                let child = match node.inputs.get(&arg.name) {
                    Some(&child) if self.node(child)?.enabled => child,
                    _ => return Ok(Substitution::Value(guards::missing_parameter())),
                };
                let child_node = self.node(child)?;
                let Some(found) = self.definition(child_node)?.output() else {
                    return Err(CodegenError::InvalidConnection {
                        block_id: block_id.to_string(),
                        message: format!(
                            "statement block '{}' cannot be plugged into value input {}",
                            child_node.id, arg.name
                        ),
                    });
                };
                if found != *check {
                    return Err(CodegenError::TypeMismatch {
                        block_id: block_id.to_string(),
                        input: arg.name.clone(),
                        expected: *check,
                        found,
                    });
                }
                let value = self.expression_block(child)?;
                let ctx = EmitContext { block_id, subs: &[] };
                let guarded = guards::apply(value, *integer, min.as_ref(), max.as_ref(), &ctx)?;
                Ok(Substitution::Value(guarded))
            }
            ArgKind::InputStatement => match node.inputs.get(&arg.name) {
                Some(&child) => Ok(Substitution::Statements(self.statement_chain(child, true)?)),
                None => Ok(Substitution::Statements(CodeBuffer::new())),
            },
            ArgKind::FieldDropdown { options } => {
                let chosen = match node.fields.get(&arg.name) {
                    None => options.first(),
                    Some(value) => {
                        let wanted = match value {
                            FieldValue::Text(t) => t.clone(),
                            FieldValue::Number(n) => format_number(*n),
                        };
                        options.iter().find(|o| o.value.source == wanted)
                    }
                };
                let Some(option) = chosen else {
                    return Err(CodegenError::InvalidFieldValue {
                        block_id: block_id.to_string(),
                        field: arg.name.clone(),
                        message: "value is not one of the dropdown options".into(),
                    });
                };
                let ctx = EmitContext { block_id, subs: &[] };
                let code = emit_expr(&option.value.expr, Order::NONE, Side::Left, &ctx)?;
                let raw = match &option.value.expr.kind {
                    ExprKind::String(s) => s.clone(),
                    _ => option.value.source.clone(),
                };
                Ok(Substitution::Field {
                    fragment: Fragment {
                        code,
                        order: option.value.order,
                    },
                    raw,
                    assignable: is_assignable(&option.value.expr),
                })
            }
            ArgKind::FieldNumber {
                value, min, max, ..
            } => {
                let n = match node.fields.get(&arg.name) {
                    None => *value,
                    Some(FieldValue::Number(n)) => *n,
                    Some(FieldValue::Text(t)) => t.trim().parse::<f64>().map_err(|_| {
                        CodegenError::InvalidFieldValue {
                            block_id: block_id.to_string(),
                            field: arg.name.clone(),
                            message: format!("'{t}' is not a number"),
                        }
                    })?,
                };
                let out_of_range = !n.is_finite()
                    || min.is_some_and(|lo| n < lo)
                    || max.is_some_and(|hi| n > hi);
                if out_of_range {
                    return Err(CodegenError::InvalidFieldValue {
                        block_id: block_id.to_string(),
                        field: arg.name.clone(),
                        message: format!("{} is outside the allowed range", format_number(n)),
                    });
                }
                let text = format_number(n);
                let order = if n < 0.0 {
                    Order::UNARY_NEGATION
                } else {
                    Order::ATOMIC
                };
                Ok(Substitution::Field {
                    fragment: Fragment {
                        code: text.clone(),
                        order,
                    },
                    raw: text,
                    assignable: false,
                })
            }
            ArgKind::FieldInput { text } => {
                let text = match node.fields.get(&arg.name) {
                    None => text.clone(),
                    Some(FieldValue::Text(t)) => t.clone(),
                    Some(FieldValue::Number(n)) => format_number(*n),
                };
                Ok(Substitution::Field {
                    fragment: Fragment {
                        code: quote_string(&text),
                        order: Order::ATOMIC,
                    },
                    raw: text,
                    assignable: false,
                })
            }
        }
    }
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Identifier(_) | ExprKind::Member { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_buffer_indents_and_shifts_marks() {
        let mut inner = CodeBuffer::new();
        inner.line(0, "highlightBlock(\"c\");");
        inner.line(0, "turn();");
        inner.mark("c", 0);

        let mut outer = CodeBuffer::new();
        outer.line(0, "highlightBlock(\"p\");");
        outer.line(0, "while (x) {");
        outer.append(&inner, 1);
        outer.line(0, "}");
        outer.mark("p", 0);

        let (code, map) = outer.finish();
        assert_eq!(
            code,
            "highlightBlock(\"p\");\nwhile (x) {\n  highlightBlock(\"c\");\n  turn();\n}\n"
        );
        assert_eq!(map.block_at_line(3), Some("c"));
        assert_eq!(map.block_at_line(5), Some("p"));
    }
}
