//! Core expression and statement evaluator.
//!
//! Expressions and function bodies are evaluated recursively. Top-level code
//! is driven op by op from [`crate::interpreter`], which calls back in here
//! for each op.

use std::rc::Rc;

use tracing::trace;

use tessera_types::ast::*;
use tessera_types::literal::format_number;

use crate::builtins;
use crate::config::RunConfig;
use crate::env::{self, Scope, ScopeRef};
use crate::error::EvalError;
use crate::interpreter::Verdict;
use crate::value::{array_index, Closure, Intrinsic, Method, Native, Object, Value};

/// Largest array a script may grow by index or `length` assignment.
const MAX_ARRAY_LEN: usize = 1 << 24;

/// Why evaluation stopped early.
#[derive(Debug)]
pub(crate) enum Signal {
    /// `exit` was called; the verdict is set.
    Exit,
    Fault(EvalError),
}

impl From<EvalError> for Signal {
    fn from(e: EvalError) -> Self {
        Signal::Fault(e)
    }
}

pub(crate) type Flow<T> = Result<T, Signal>;

/// How a statement finished.
pub(crate) enum Completion {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// An assignable location.
enum Place {
    Name(String),
    Property(Value, String),
}

/// The evaluator: global scope, counters and the run's observable state.
pub(crate) struct Evaluator {
    pub global: ScopeRef,
    gas: u64,
    gas_limit: u64,
    depth: usize,
    max_depth: usize,
    pub highlighted: Option<String>,
    pub verdict: Option<Verdict>,
    suspend_requested: bool,
}

impl Evaluator {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            global: Scope::global(),
            gas: 0,
            gas_limit: config.max_micro_steps,
            depth: 0,
            max_depth: config.max_call_depth,
            highlighted: None,
            verdict: None,
            suspend_requested: false,
        }
    }

    /// Micro-steps consumed so far.
    pub fn steps(&self) -> u64 {
        self.gas
    }

    /// Whether a suspension point was hit since the last call.
    pub fn take_suspend(&mut self) -> bool {
        std::mem::take(&mut self.suspend_requested)
    }

    /// Consume one micro-step.
    pub fn tick(&mut self) -> Flow<()> {
        if self.gas >= self.gas_limit {
            return Err(EvalError::GasExhausted {
                limit: self.gas_limit,
            }
            .into());
        }
        self.gas += 1;
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Hoisting
    // ══════════════════════════════════════════════════════════════════════

    /// Bind every `var` name and function declaration of a function body.
    pub fn hoist(&self, stmts: &[Stmt], scope: &ScopeRef) {
        for stmt in stmts {
            self.hoist_stmt(stmt, scope);
        }
    }

    fn hoist_stmt(&self, stmt: &Stmt, scope: &ScopeRef) {
        match &stmt.kind {
            StmtKind::Var(decls) => hoist_declarators(decls, scope),
            StmtKind::Block(body) => self.hoist(body, scope),
            StmtKind::If {
                consequent,
                alternate,
                ..
            } => {
                self.hoist_stmt(consequent, scope);
                if let Some(alt) = alternate {
                    self.hoist_stmt(alt, scope);
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                self.hoist_stmt(body, scope)
            }
            StmtKind::For { init, body, .. } => {
                if let Some(ForInit::Var(decls)) = init {
                    hoist_declarators(decls, scope);
                }
                self.hoist_stmt(body, scope);
            }
            StmtKind::Function(decl) => {
                let closure = Closure {
                    decl: Rc::new(decl.clone()),
                    scope: Rc::clone(scope),
                };
                env::declare(scope, &decl.name.name, Value::Function(Rc::new(closure)));
            }
            StmtKind::Expr(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Return(_)
            | StmtKind::Empty => {}
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    pub fn exec_stmts(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Flow<Completion> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Flow<Completion> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Var(decls) => {
                self.declarators(decls, scope)?;
                Ok(Completion::Normal)
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Completion::Normal)
            }
            StmtKind::Block(body) => self.exec_stmts(body, scope),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec_stmt(consequent, scope)
                } else if let Some(alt) = alternate {
                    self.exec_stmt(alt, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            StmtKind::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::DoWhile { body, test } => {
                loop {
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if !self.eval(test, scope)?.truthy() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::Var(decls)) => self.declarators(decls, scope)?,
                    Some(ForInit::Expr(e)) => {
                        self.eval(e, scope)?;
                    }
                    None => {}
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, scope)?;
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::Break => Ok(Completion::Break),
            StmtKind::Continue => Ok(Completion::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(e) => self.eval(e, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            // hoisted
            StmtKind::Function(_) | StmtKind::Empty => Ok(Completion::Normal),
        }
    }

    /// Run the initialisers of a `var` statement; the names are hoisted.
    pub fn declarators(&mut self, decls: &[VarDeclarator], scope: &ScopeRef) -> Flow<()> {
        for decl in decls {
            if let Some(init) = &decl.init {
                let value = self.eval(init, scope)?;
                env::assign(scope, &decl.name.name, value);
            }
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    pub fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Flow<Value> {
        self.tick()?;
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::string(s.as_str())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),

            ExprKind::Identifier(name) => self.read_name(name, scope),

            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::Object(props) => {
                let mut object = Object::default();
                for prop in props {
                    let value = self.eval(&prop.value, scope)?;
                    let key = match &prop.key {
                        PropertyKey::Identifier(k) | PropertyKey::String(k) => k.clone(),
                        PropertyKey::Number(n) => format_number(*n),
                    };
                    object.set(&key, value);
                }
                Ok(Value::object(object))
            }

            ExprKind::Member { object, property } => {
                let target = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                Ok(get_member(&target, &key)?)
            }
            ExprKind::Call { callee, args } => {
                let function = self.eval(callee, scope)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                self.call(&function, values, callee)
            }

            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            ExprKind::Update {
                op,
                prefix,
                target,
            } => {
                let place = self.place(target, scope)?;
                let old = self.read(&place, scope)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.write(place, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                Ok(binary(*op, &l, &r))
            }
            ExprKind::Logical { op, left, right } => {
                let l = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.truthy(),
                    LogicalOp::Or => l.truthy(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(right, scope)
                }
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let place = self.place(target, scope)?;
                let result = match op.binary() {
                    None => self.eval(value, scope)?,
                    Some(bin) => {
                        let old = self.read(&place, scope)?;
                        let rhs = self.eval(value, scope)?;
                        binary(bin, &old, &rhs)
                    }
                };
                self.write(place, result.clone(), scope)?;
                Ok(result)
            }
            ExprKind::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(item, scope)?;
                }
                Ok(last)
            }
            ExprKind::Paren(inner) => self.eval(inner, scope),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &ScopeRef) -> Flow<Value> {
        match op {
            UnaryOp::Typeof => {
                // `typeof undeclared` is not an error
                if let ExprKind::Identifier(name) = &operand.unparenthesized().kind {
                    if env::lookup(scope, name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                let v = self.eval(operand, scope)?;
                Ok(Value::string(v.type_of()))
            }
            UnaryOp::Delete => self.delete(operand, scope),
            UnaryOp::Neg => Ok(Value::Number(-self.eval(operand, scope)?.to_number())),
            UnaryOp::Plus => Ok(Value::Number(self.eval(operand, scope)?.to_number())),
            UnaryOp::Not => Ok(Value::Bool(!self.eval(operand, scope)?.truthy())),
            UnaryOp::BitNot => Ok(Value::Number(f64::from(!self.eval(operand, scope)?.to_int32()))),
            UnaryOp::Void => {
                self.eval(operand, scope)?;
                Ok(Value::Undefined)
            }
        }
    }

    fn delete(&mut self, operand: &Expr, scope: &ScopeRef) -> Flow<Value> {
        match &operand.unparenthesized().kind {
            ExprKind::Member { object, property } => {
                let target = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                match &target {
                    Value::Object(obj) => obj.borrow_mut().remove(&key),
                    Value::Array(items) => {
                        let mut items = items.borrow_mut();
                        if let Some(slot) = array_index(&key).and_then(|i| items.get_mut(i)) {
                            *slot = Value::Undefined;
                        }
                    }
                    v if v.is_nullish() => {
                        return Err(EvalError::Type(format!(
                            "cannot delete property '{key}' of {}",
                            v.to_js_string()
                        ))
                        .into())
                    }
                    _ => {}
                }
                Ok(Value::Bool(true))
            }
            // declared bindings cannot be deleted
            ExprKind::Identifier(_) => Ok(Value::Bool(false)),
            _ => {
                self.eval(operand, scope)?;
                Ok(Value::Bool(true))
            }
        }
    }

    fn property_key(&mut self, property: &MemberProperty, scope: &ScopeRef) -> Flow<String> {
        match property {
            MemberProperty::Named(ident) => Ok(ident.name.clone()),
            MemberProperty::Computed(expr) => Ok(self.eval(expr, scope)?.to_js_string()),
        }
    }

    // ── Places ───────────────────────────────────────────────────────────

    fn read_name(&self, name: &str, scope: &ScopeRef) -> Flow<Value> {
        env::lookup(scope, name).ok_or_else(|| EvalError::Reference(name.to_string()).into())
    }

    fn place(&mut self, target: &Expr, scope: &ScopeRef) -> Flow<Place> {
        match &target.unparenthesized().kind {
            ExprKind::Identifier(name) => Ok(Place::Name(name.clone())),
            ExprKind::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                Ok(Place::Property(object, key))
            }
            _ => Err(EvalError::Type("invalid assignment target".into()).into()),
        }
    }

    fn read(&mut self, place: &Place, scope: &ScopeRef) -> Flow<Value> {
        match place {
            Place::Name(name) => self.read_name(name, scope),
            Place::Property(object, key) => Ok(get_member(object, key)?),
        }
    }

    fn write(&mut self, place: Place, value: Value, scope: &ScopeRef) -> Flow<()> {
        match place {
            Place::Name(name) => {
                env::assign(scope, &name, value);
                Ok(())
            }
            Place::Property(object, key) => Ok(set_member(&object, &key, value)?),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Calls
    // ══════════════════════════════════════════════════════════════════════

    fn call(&mut self, function: &Value, args: Vec<Value>, callee: &Expr) -> Flow<Value> {
        match function {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Native(native) => match native.as_ref() {
                Native::Intrinsic(intrinsic) => self.intrinsic(*intrinsic, &args),
                Native::Method { this, method } => Ok(builtins::call_method(this, *method, &args)?),
            },
            _ => Err(EvalError::Type(format!("{} is not a function", describe(callee))).into()),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Flow<Value> {
        if self.depth >= self.max_depth {
            return Err(EvalError::Range("maximum call stack size exceeded".into()).into());
        }
        let scope = Scope::child(&closure.scope);
        let mut args = args.into_iter();
        for param in &closure.decl.params {
            env::declare(&scope, &param.name, args.next().unwrap_or(Value::Undefined));
        }
        self.hoist(&closure.decl.body, &scope);

        self.depth += 1;
        let completion = self.exec_stmts(&closure.decl.body, &scope);
        self.depth -= 1;
        match completion? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    fn intrinsic(&mut self, intrinsic: Intrinsic, args: &[Value]) -> Flow<Value> {
        match intrinsic {
            Intrinsic::HighlightBlock => {
                let id = args.first().map(Value::to_js_string).unwrap_or_default();
                trace!(block = %id, "highlight");
                self.highlighted = Some(id);
                self.suspend_requested = true;
                Ok(Value::Undefined)
            }
            Intrinsic::Pause => {
                trace!("pause");
                self.suspend_requested = true;
                Ok(Value::Undefined)
            }
            Intrinsic::Exit => {
                let correct = args.first().is_some_and(Value::truthy);
                let message = args
                    .get(1)
                    .filter(|m| !matches!(m, Value::Undefined))
                    .map(Value::to_js_string);
                self.verdict = Some(Verdict { correct, message });
                Err(Signal::Exit)
            }
        }
    }
}

fn hoist_declarators(decls: &[VarDeclarator], scope: &ScopeRef) {
    for decl in decls {
        env::declare_hoisted(scope, &decl.name.name);
    }
}

/// How a failed callee reads in an error message.
fn describe(callee: &Expr) -> String {
    match &callee.unparenthesized().kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::Member {
            property: MemberProperty::Named(ident),
            ..
        } => ident.name.clone(),
        _ => "expression".into(),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Properties
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) fn get_member(target: &Value, key: &str) -> Result<Value, EvalError> {
    let bound = |method: Method| {
        Value::native(Native::Method {
            this: target.clone(),
            method,
        })
    };
    let value = match target {
        Value::Undefined | Value::Null => {
            return Err(EvalError::Type(format!(
                "cannot read property '{key}' of {}",
                target.to_js_string()
            )))
        }
        Value::Array(items) => {
            if key == "length" {
                Value::Number(items.borrow().len() as f64)
            } else if let Some(i) = array_index(key) {
                items.borrow().get(i).cloned().unwrap_or(Value::Undefined)
            } else {
                Method::lookup(target, key).map_or(Value::Undefined, bound)
            }
        }
        Value::String(s) => {
            if key == "length" {
                Value::Number(s.chars().count() as f64)
            } else if let Some(i) = array_index(key) {
                s.chars()
                    .nth(i)
                    .map_or(Value::Undefined, |c| Value::string(c.to_string()))
            } else {
                Method::lookup(target, key).map_or(Value::Undefined, bound)
            }
        }
        Value::Object(obj) => obj.borrow().get(key).cloned().unwrap_or(Value::Undefined),
        _ => Method::lookup(target, key).map_or(Value::Undefined, bound),
    };
    Ok(value)
}

pub(crate) fn set_member(target: &Value, key: &str, value: Value) -> Result<(), EvalError> {
    match target {
        Value::Undefined | Value::Null => Err(EvalError::Type(format!(
            "cannot set property '{key}' of {}",
            target.to_js_string()
        ))),
        Value::Array(items) => {
            if key == "length" {
                let n = value.to_number();
                let len = n as usize;
                if n < 0.0 || n.fract() != 0.0 || len > MAX_ARRAY_LEN {
                    return Err(EvalError::Range("invalid array length".into()));
                }
                items.borrow_mut().resize(len, Value::Undefined);
            } else if let Some(i) = array_index(key) {
                if i >= MAX_ARRAY_LEN {
                    return Err(EvalError::Range("invalid array length".into()));
                }
                let mut items = items.borrow_mut();
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = value;
            }
            Ok(())
        }
        Value::Object(obj) => {
            obj.borrow_mut().set(key, value);
            Ok(())
        }
        // primitives and functions drop property writes
        _ => Ok(()),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) fn binary(op: BinOp, l: &Value, r: &Value) -> Value {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(l.to_number(), r.to_number()));
    let int = |f: fn(i32, i32) -> i32| Value::Number(f64::from(f(l.to_int32(), r.to_int32())));
    let shift = r.to_uint32() & 31;
    match op {
        BinOp::Add => {
            let (a, b) = (l.to_primitive(), r.to_primitive());
            if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
                Value::string(a.to_js_string() + &b.to_js_string())
            } else {
                Value::Number(a.to_number() + b.to_number())
            }
        }
        BinOp::Sub => num(|a, b| a - b),
        BinOp::Mul => num(|a, b| a * b),
        BinOp::Div => num(|a, b| a / b),
        BinOp::Mod => num(|a, b| a % b),
        BinOp::Shl => Value::Number(f64::from(l.to_int32().wrapping_shl(shift))),
        BinOp::Shr => Value::Number(f64::from(l.to_int32() >> shift)),
        BinOp::UShr => Value::Number(f64::from(l.to_uint32() >> shift)),
        BinOp::Less => Value::Bool(compare(l, r).is_some_and(|o| o.is_lt())),
        BinOp::Greater => Value::Bool(compare(l, r).is_some_and(|o| o.is_gt())),
        BinOp::LessEq => Value::Bool(compare(l, r).is_some_and(|o| o.is_le())),
        BinOp::GreaterEq => Value::Bool(compare(l, r).is_some_and(|o| o.is_ge())),
        BinOp::Eq => Value::Bool(l.loose_equals(r)),
        BinOp::NotEq => Value::Bool(!l.loose_equals(r)),
        BinOp::StrictEq => Value::Bool(l.strict_equals(r)),
        BinOp::StrictNotEq => Value::Bool(!l.strict_equals(r)),
        BinOp::BitAnd => int(|a, b| a & b),
        BinOp::BitXor => int(|a, b| a ^ b),
        BinOp::BitOr => int(|a, b| a | b),
    }
}

/// Relational comparison; `None` when either side is NaN.
fn compare(l: &Value, r: &Value) -> Option<std::cmp::Ordering> {
    match (l.to_primitive(), r.to_primitive()) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}
