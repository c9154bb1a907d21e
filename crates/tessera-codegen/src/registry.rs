//! The block registry: block type → validated definition.
//!
//! Populated once through [`RegistryBuilder`] and frozen into an immutable
//! [`BlockRegistry`] that code generation reads. Registering the same type
//! twice with the same definition is a no-op; with a different definition
//! it is a configuration error.

use std::collections::BTreeMap;
use std::sync::Arc;

use tessera_types::ast::*;
use tessera_types::block::{ArgKind, BlockDefinition, BlockRole};
use tessera_types::intrinsics;
use tracing::debug;

use crate::error::{CodegenError, CodegenResult};

/// Collects definitions before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    defs: BTreeMap<String, Arc<BlockDefinition>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one definition.
    pub fn register(&mut self, def: BlockDefinition) -> CodegenResult<()> {
        if let Some(identifier) = reserved_binding(&def) {
            return Err(CodegenError::ReservedIdentifierCollision {
                type_name: def.type_name.clone(),
                identifier,
            });
        }
        if let Some(existing) = self.defs.get(&def.type_name) {
            if **existing == def {
                return Ok(());
            }
            return Err(CodegenError::DuplicateRegistration {
                type_name: def.type_name.clone(),
            });
        }
        debug!(block_type = %def.type_name, args = def.args.len(), "registered block type");
        self.defs.insert(def.type_name.clone(), Arc::new(def));
        Ok(())
    }

    /// Register several definitions, stopping at the first failure.
    pub fn register_all(
        &mut self,
        defs: impl IntoIterator<Item = BlockDefinition>,
    ) -> CodegenResult<()> {
        for def in defs {
            self.register(def)?;
        }
        Ok(())
    }

    pub fn build(self) -> BlockRegistry {
        BlockRegistry { defs: self.defs }
    }
}

/// Immutable mapping from block type to definition.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    defs: BTreeMap<String, Arc<BlockDefinition>>,
}

impl BlockRegistry {
    pub fn get(&self, type_name: &str) -> Option<&BlockDefinition> {
        self.defs.get(type_name).map(|d| d.as_ref())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.defs.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in type-name order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.defs.values().map(|d| d.as_ref())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Reserved-name check
// ══════════════════════════════════════════════════════════════════════════════

struct Scan<'a> {
    def: &'a BlockDefinition,
    found: Option<String>,
}

/// First intrinsic name the definition binds or assigns, either in its
/// snippet or through a dropdown value that lands on an assignment target.
///
/// Reading intrinsics (calling `exit`, inspecting `state`) is allowed.
fn reserved_binding(def: &BlockDefinition) -> Option<String> {
    let mut scan = Scan { def, found: None };
    match &def.role {
        BlockRole::Statement { body, .. } => stmts(&body.body, &mut scan),
        BlockRole::Expression { expr: e, .. } => expr(e, &mut scan),
    }
    for arg in &def.args {
        if let ArgKind::FieldDropdown { options } = &arg.kind {
            for option in options {
                expr(&option.value.expr, &mut scan);
            }
        }
    }
    scan.found
}

fn check_name(name: &str, scan: &mut Scan<'_>) {
    if scan.found.is_none() && intrinsics::is_reserved(name) {
        scan.found = Some(name.to_string());
    }
}

/// An assigned name, or every option a dropdown placeholder may become.
fn check_target(target: &Expr, scan: &mut Scan<'_>) {
    let Some(name) = target.as_identifier() else {
        return;
    };
    check_name(name, scan);
    let def = scan.def;
    if let Some(ArgKind::FieldDropdown { options }) = def.arg(name).map(|a| &a.kind) {
        for option in options {
            if let Some(value) = option.value.expr.unparenthesized().as_identifier() {
                check_name(value, scan);
            }
        }
    }
}

fn stmts(list: &[Stmt], scan: &mut Scan<'_>) {
    for s in list {
        stmt(s, scan);
    }
}

fn stmt(s: &Stmt, scan: &mut Scan<'_>) {
    match &s.kind {
        StmtKind::Var(decls) => declarators(decls, scan),
        StmtKind::Expr(e) => expr(e, scan),
        StmtKind::Block(body) => stmts(body, scan),
        StmtKind::If {
            test,
            consequent,
            alternate,
        } => {
            expr(test, scan);
            stmt(consequent, scan);
            if let Some(alt) = alternate {
                stmt(alt, scan);
            }
        }
        StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
            expr(test, scan);
            stmt(body, scan);
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Var(decls)) => declarators(decls, scan),
                Some(ForInit::Expr(e)) => expr(e, scan),
                None => {}
            }
            for e in [test, update].into_iter().flatten() {
                expr(e, scan);
            }
            stmt(body, scan);
        }
        StmtKind::Return(value) => {
            if let Some(e) = value {
                expr(e, scan);
            }
        }
        StmtKind::Function(decl) => {
            check_name(&decl.name.name, scan);
            for p in &decl.params {
                check_name(&p.name, scan);
            }
            stmts(&decl.body, scan);
        }
        StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
    }
}

fn declarators(decls: &[VarDeclarator], scan: &mut Scan<'_>) {
    for d in decls {
        check_name(&d.name.name, scan);
        if let Some(init) = &d.init {
            expr(init, scan);
        }
    }
}

fn expr(e: &Expr, scan: &mut Scan<'_>) {
    match &e.kind {
        ExprKind::Number(_)
        | ExprKind::String(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Undefined
        | ExprKind::Identifier(_) => {}
        ExprKind::Array(items) | ExprKind::Sequence(items) => {
            for item in items {
                expr(item, scan);
            }
        }
        ExprKind::Object(props) => {
            for p in props {
                expr(&p.value, scan);
            }
        }
        ExprKind::Member { object, property } => {
            expr(object, scan);
            if let MemberProperty::Computed(index) = property {
                expr(index, scan);
            }
        }
        ExprKind::Call { callee, args } => {
            expr(callee, scan);
            for a in args {
                expr(a, scan);
            }
        }
        ExprKind::Unary { operand, .. } => expr(operand, scan),
        ExprKind::Update { target, .. } => {
            check_target(target, scan);
            expr(target, scan);
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            expr(left, scan);
            expr(right, scan);
        }
        ExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => {
            expr(test, scan);
            expr(consequent, scan);
            expr(alternate, scan);
        }
        ExprKind::Assign { target, value, .. } => {
            check_target(target, scan);
            expr(target, scan);
            expr(value, scan);
        }
        ExprKind::Paren(inner) => expr(inner, scan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::block::{arg_name, BlockArg, Bound, Colour, DropdownOption};
    use tessera_types::{Order, SourceFile, Span};

    fn statement_def(type_name: &str, body: Vec<Stmt>) -> BlockDefinition {
        BlockDefinition {
            type_name: type_name.into(),
            message: "do it".into(),
            args: vec![],
            role: BlockRole::Statement {
                previous: true,
                next: true,
                body: Program {
                    body,
                    span: Span::point(1, 1),
                },
            },
            js: String::new(),
            inputs_inline: true,
            colour: Colour::Hue(0.0),
            tooltip: String::new(),
            help_url: String::new(),
            max_instances: None,
        }
    }

    fn assign(target: &str) -> Stmt {
        let span = Span::point(1, 1);
        let e = Expr::new(
            ExprKind::Assign {
                op: AssignOp::Assign,
                target: Box::new(Expr::new(ExprKind::Identifier(target.into()), span)),
                value: Box::new(Expr::new(ExprKind::Number(1.0), span)),
            },
            span,
        );
        Stmt {
            kind: StmtKind::Expr(e),
            span,
        }
    }

    #[test]
    fn identical_reregistration_is_a_noop() {
        let mut b = RegistryBuilder::new();
        b.register(statement_def("move", vec![])).unwrap();
        b.register(statement_def("move", vec![])).unwrap();
        assert_eq!(b.build().len(), 1);
    }

    #[test]
    fn conflicting_reregistration_fails() {
        let mut b = RegistryBuilder::new();
        b.register(statement_def("move", vec![])).unwrap();
        let err = b
            .register(statement_def("move", vec![assign("x")]))
            .unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateRegistration { .. }));
    }

    #[test]
    fn assigning_an_intrinsic_is_rejected() {
        let mut b = RegistryBuilder::new();
        let err = b
            .register(statement_def("cheat", vec![assign("loopTrap")]))
            .unwrap_err();
        assert_eq!(
            err,
            CodegenError::ReservedIdentifierCollision {
                type_name: "cheat".into(),
                identifier: "loopTrap".into(),
            }
        );
    }

    #[test]
    fn declaring_an_intrinsic_is_rejected() {
        let sf = SourceFile::new("t.js", "function exit() {}");
        let prog = tessera_parser::parse_program(&sf).unwrap();
        let mut b = RegistryBuilder::new();
        let err = b
            .register(statement_def("shadow", prog.body))
            .unwrap_err();
        assert!(matches!(err, CodegenError::ReservedIdentifierCollision { identifier, .. } if identifier == "exit"));
    }

    #[test]
    fn calling_an_intrinsic_is_allowed() {
        let sf = SourceFile::new("t.js", "exit(state.x === 1, 'done');");
        let prog = tessera_parser::parse_program(&sf).unwrap();
        let mut b = RegistryBuilder::new();
        b.register(statement_def("finish", prog.body)).unwrap();
        assert!(b.build().contains("finish"));
    }

    fn parse_body(source: &str) -> Vec<Stmt> {
        tessera_parser::parse_program(&SourceFile::new("t.js", source))
            .unwrap()
            .body
    }

    fn dropdown(values: &[&str]) -> BlockArg {
        let options = values
            .iter()
            .map(|v| DropdownOption {
                label: v.to_string(),
                value: Bound {
                    source: v.to_string(),
                    expr: tessera_parser::parse_expression(&SourceFile::new("t.js", *v)).unwrap(),
                    order: Order::ATOMIC,
                },
            })
            .collect();
        BlockArg {
            name: arg_name(0),
            kind: ArgKind::FieldDropdown { options },
        }
    }

    #[test]
    fn dropdown_value_assigned_through_placeholder_is_rejected() {
        let mut def = statement_def("set_budget", parse_body("_ARG0 = 1e9;"));
        def.args = vec![dropdown(&["budget", "loopTrap"])];
        let err = RegistryBuilder::new().register(def).unwrap_err();
        assert!(matches!(err, CodegenError::ReservedIdentifierCollision { identifier, .. } if identifier == "loopTrap"));
    }

    #[test]
    fn dropdown_value_updated_through_placeholder_is_rejected() {
        let mut def = statement_def("bump", parse_body("_ARG0++;"));
        def.args = vec![dropdown(&["(tmp)"])];
        assert!(RegistryBuilder::new().register(def).is_err());
    }

    #[test]
    fn dropdown_value_that_assigns_is_rejected() {
        let mut def = statement_def("say", parse_body("log(_ARG0);"));
        def.args = vec![dropdown(&["state = 1"])];
        let err = RegistryBuilder::new().register(def).unwrap_err();
        assert!(matches!(err, CodegenError::ReservedIdentifierCollision { identifier, .. } if identifier == "state"));
    }

    #[test]
    fn dropdown_naming_an_intrinsic_may_be_read() {
        let mut def = statement_def("show", parse_body("log(_ARG0);"));
        def.args = vec![dropdown(&["state", "budget"])];
        RegistryBuilder::new().register(def).unwrap();
    }
}
