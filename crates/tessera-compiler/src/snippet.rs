//! Code snippets inside block definitions.
//!
//! A snippet is block-script text in which `%N` refers to the N-th
//! argument. Snippets are rewritten to use `_ARG<N-1>`, parsed, and then
//! checked for placeholder misuse.

use tessera_types::ast::*;
use tessera_types::block::{placeholder_index, ArgKind, BlockArg, ARG_PREFIX};
use tessera_types::intrinsics::{HIGHLIGHT_BLOCK, PAUSE};
use tessera_types::{CompileErrors, ErrorCode, SourceFile, Span, TesseraError};

// ══════════════════════════════════════════════════════════════════════════════
// Placeholder rewriting
// ══════════════════════════════════════════════════════════════════════════════

/// Rewrite every `%N` to `_ARG<N-1>`. Fails with the offending text for `%0`.
///
/// The rewrite is textual, so it also applies inside string literals.
pub fn rewrite_placeholders(js: &str) -> Result<String, String> {
    let mut out = String::with_capacity(js.len());
    let mut chars = js.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while let Some(&(j, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            end = j + 1;
            chars.next();
        }
        if end == start {
            out.push('%');
            continue;
        }
        let digits = &js[start..end];
        match digits.parse::<usize>() {
            Ok(n) if n >= 1 => {
                out.push_str(ARG_PREFIX);
                out.push_str(&(n - 1).to_string());
            }
            _ => return Err(format!("%{digits}")),
        }
    }
    Ok(out)
}

/// `%N` references in a `message0` template, as 1-based numbers.
pub fn template_refs(message: &str) -> Vec<usize> {
    let bytes = message.as_bytes();
    let mut refs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let digits = bytes[i + 1..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if digits > 0 {
                if let Ok(n) = message[i + 1..i + 1 + digits].parse() {
                    refs.push(n);
                }
                i += 1 + digits;
                continue;
            }
        }
        i += 1;
    }
    refs
}

// ══════════════════════════════════════════════════════════════════════════════
// Parsing
// ══════════════════════════════════════════════════════════════════════════════

/// Parse a statement-role snippet.
pub fn parse_statements(source: &SourceFile) -> Result<Program, CompileErrors> {
    tessera_parser::parse_program(source).map_err(|errs| with_path(errs, &source.name))
}

/// Parse text that must be exactly one expression, not a sequence and not
/// wrapped in parentheses. A trailing semicolon is allowed.
pub fn parse_single_expression(source: &SourceFile) -> Result<Expr, CompileErrors> {
    let program = parse_statements(source)?;
    let span = program.span;
    let mut body = program.body.into_iter();
    let (first, rest) = (body.next(), body.next());
    let expr = match (first, rest) {
        (
            Some(Stmt {
                kind: StmtKind::Expr(e),
                ..
            }),
            None,
        ) => e,
        (found, _) => {
            let span = found.map(|s| s.span).unwrap_or(span);
            let err = error(
                source,
                ErrorCode::NOT_SINGLE_EXPRESSION,
                "must be a single expression",
                span,
            );
            return Err(err.into());
        }
    };
    match &expr.kind {
        ExprKind::Paren(inner) => {
            let suggestion = match source.excerpt(inner.span) {
                Some(text) => format!("write `{text}` without the outer parentheses"),
                None => "remove the outer parentheses".to_string(),
            };
            Err(error(
                source,
                ErrorCode::REDUNDANT_PARENS,
                "expression must not be wrapped in parentheses",
                expr.span,
            )
            .with_suggestion(suggestion)
            .into())
        }
        ExprKind::Sequence(_) => Err(error(
            source,
            ErrorCode::NOT_SINGLE_EXPRESSION,
            "must be a single expression, not a comma sequence",
            expr.span,
        )
        .into()),
        _ => Ok(expr),
    }
}

fn error(
    source: &SourceFile,
    code: ErrorCode,
    message: impl Into<String>,
    span: Span,
) -> TesseraError {
    let line = source.line(span.start_line).unwrap_or("");
    TesseraError::new(&source.name, code, message, span, line).with_path(&source.name)
}

fn with_path(mut errors: CompileErrors, path: &str) -> CompileErrors {
    for err in &mut errors.errors {
        err.path = Some(path.to_string());
    }
    errors
}

// ══════════════════════════════════════════════════════════════════════════════
// Placeholder checks
// ══════════════════════════════════════════════════════════════════════════════

/// Where a checked snippet comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetRole {
    /// A statement block's code: statement inputs may stand alone.
    Statement,
    /// An expression block's code.
    Expression,
    /// A bound or dropdown value: no placeholders at all.
    Literal,
}

/// Walks a parsed snippet and reports every misused placeholder.
pub struct PlaceholderChecker<'a> {
    args: &'a [BlockArg],
    role: SnippetRole,
    source: &'a SourceFile,
    /// Enclosing function declarations. A called body runs without
    /// suspending, so nothing that suspends may be placed inside one.
    function_depth: u32,
    errors: CompileErrors,
}

impl<'a> PlaceholderChecker<'a> {
    pub fn new(args: &'a [BlockArg], role: SnippetRole, source: &'a SourceFile) -> Self {
        Self {
            args,
            role,
            source,
            function_depth: 0,
            errors: CompileErrors::empty(),
        }
    }

    pub fn check_program(mut self, program: &Program) -> CompileErrors {
        self.stmts(&program.body);
        self.errors
    }

    pub fn check_expr(mut self, expr: &Expr) -> CompileErrors {
        self.expr(expr);
        self.errors
    }

    fn report(&mut self, message: impl Into<String>, span: Span) {
        let err = error(self.source, ErrorCode::INVALID_PLACEHOLDER, message, span);
        self.errors.push_error(err);
    }

    /// The argument a placeholder names, reporting dangling references.
    fn resolve(&mut self, name: &str, span: Span) -> Option<&'a BlockArg> {
        let index = placeholder_index(name)?;
        if self.role == SnippetRole::Literal {
            self.report(format!("{name}: placeholders are not allowed here"), span);
            return None;
        }
        let args = self.args;
        match args.get(index) {
            Some(arg) => Some(arg),
            None => {
                self.report(
                    format!("%{} refers to a missing argument", index + 1),
                    span,
                );
                None
            }
        }
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Var(decls) => self.declarators(decls),
            StmtKind::Expr(expr) => match &expr.kind {
                ExprKind::Identifier(name) => {
                    // standing alone is the one place a statement input may go
                    if let Some(arg) = self.resolve(name, expr.span) {
                        let is_statement = matches!(arg.kind, ArgKind::InputStatement);
                        if is_statement && self.role != SnippetRole::Statement {
                            self.report(
                                format!("statement input {name} cannot be used in an expression block"),
                                expr.span,
                            );
                        } else if is_statement && self.function_depth > 0 {
                            self.report(
                                format!("statement input {name} cannot be used inside a function body"),
                                expr.span,
                            );
                        }
                    }
                }
                _ => self.expr(expr),
            },
            StmtKind::Block(body) => self.stmts(body),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.stmt(consequent);
                if let Some(alt) = alternate {
                    self.stmt(alt);
                }
            }
            StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
                self.expr(test);
                self.stmt(body);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::Var(decls)) => self.declarators(decls),
                    Some(ForInit::Expr(e)) => self.expr(e),
                    None => {}
                }
                for e in [test, update].into_iter().flatten() {
                    self.expr(e);
                }
                self.stmt(body);
            }
            StmtKind::Return(value) => {
                if let Some(e) = value {
                    self.expr(e);
                }
            }
            StmtKind::Function(decl) => {
                self.binding(&decl.name);
                for param in &decl.params {
                    self.binding(param);
                }
                self.function_depth += 1;
                self.stmts(&decl.body);
                self.function_depth -= 1;
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
        }
    }

    fn declarators(&mut self, decls: &[VarDeclarator]) {
        for decl in decls {
            self.binding(&decl.name);
            if let Some(init) = &decl.init {
                self.expr(init);
            }
        }
    }

    fn binding(&mut self, ident: &Ident) {
        if placeholder_index(&ident.name).is_some() {
            self.report(
                format!("{} cannot be used as a declared name", ident.name),
                ident.span,
            );
        }
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Number(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Undefined => {}
            ExprKind::String(text) => self.string(text, expr.span),
            ExprKind::Identifier(name) => {
                if let Some(arg) = self.resolve(name, expr.span) {
                    if matches!(arg.kind, ArgKind::InputStatement) {
                        self.report(
                            format!("statement input {name} can only stand alone as a statement"),
                            expr.span,
                        );
                    }
                }
            }
            ExprKind::Array(items) | ExprKind::Sequence(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::Object(props) => {
                for prop in props {
                    self.expr(&prop.value);
                }
            }
            ExprKind::Member { object, property } => {
                self.expr(object);
                if let MemberProperty::Computed(index) = property {
                    self.expr(index);
                }
            }
            ExprKind::Call { callee, args } => {
                if self.function_depth > 0 {
                    self.suspending_call(callee);
                }
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Update { target, .. } => self.target(target),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
            }
            ExprKind::Assign { target, value, .. } => {
                self.target(target);
                self.expr(value);
            }
            ExprKind::Paren(inner) => self.expr(inner),
        }
    }

    /// Only a dropdown whose options are all assignable may be a target.
    fn target(&mut self, target: &Expr) {
        let ExprKind::Identifier(name) = &target.kind else {
            self.expr(target);
            return;
        };
        let Some(arg) = self.resolve(name, target.span) else {
            return;
        };
        let assignable = match &arg.kind {
            ArgKind::FieldDropdown { options } => options.iter().all(|o| {
                matches!(
                    o.value.expr.kind,
                    ExprKind::Identifier(_) | ExprKind::Member { .. }
                )
            }),
            _ => false,
        };
        if !assignable {
            self.report(
                format!(
                    "{name} cannot be assigned to: only a dropdown whose values are all variables or properties can"
                ),
                target.span,
            );
        }
    }

    fn suspending_call(&mut self, callee: &Expr) {
        let Some(name) = callee.as_identifier() else {
            return;
        };
        if name == HIGHLIGHT_BLOCK || name == PAUSE {
            let err = error(
                self.source,
                ErrorCode::INVALID_SNIPPET,
                format!("{name}() cannot be called inside a function body"),
                callee.span,
            );
            self.errors.push_error(err);
        }
    }

    /// Inputs have no text form, so they cannot appear inside strings.
    fn string(&mut self, text: &str, span: Span) {
        let mut rest = text;
        while let Some(pos) = rest.find(ARG_PREFIX) {
            let digits = rest[pos + ARG_PREFIX.len()..]
                .bytes()
                .take_while(u8::is_ascii_digit)
                .count();
            let name = &rest[pos..pos + ARG_PREFIX.len() + digits];
            if let Some(arg) = self.resolve(name, span) {
                if !arg.kind.is_field() {
                    self.report(
                        format!("input {name} cannot be used inside a string"),
                        span,
                    );
                }
            }
            rest = &rest[pos + name.len()..];
        }
    }
}
