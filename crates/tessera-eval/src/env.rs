//! Scope chain for the interpreter.
//!
//! Scopes are function-level: the global scope, plus one per active call.
//! Closures keep their defining scope alive through a shared reference.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::value::Value;

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Default)]
pub struct Scope {
    bindings: BTreeMap<String, Value>,
    parent: Option<ScopeRef>,
}

impl Scope {
    /// A fresh global scope.
    pub fn global() -> ScopeRef {
        Rc::new(RefCell::new(Scope::default()))
    }

    /// A function scope nested in `parent`.
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: BTreeMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    /// Bindings of this scope only, in name order.
    pub fn bindings(&self) -> &BTreeMap<String, Value> {
        &self.bindings
    }
}

/// Bind `name` in `scope` itself, replacing any previous value.
pub fn declare(scope: &ScopeRef, name: &str, value: Value) {
    scope.borrow_mut().bindings.insert(name.to_string(), value);
}

/// Hoisted `var`: bind to `undefined` unless already bound here.
pub fn declare_hoisted(scope: &ScopeRef, name: &str) {
    scope
        .borrow_mut()
        .bindings
        .entry(name.to_string())
        .or_insert(Value::Undefined);
}

/// Look `name` up from `scope` outward.
pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut current = Rc::clone(scope);
    loop {
        let parent = {
            let s = current.borrow();
            if let Some(v) = s.bindings.get(name) {
                return Some(v.clone());
            }
            s.parent.clone()
        };
        current = parent?;
    }
}

/// Assign to the nearest binding of `name`. An undeclared name becomes a
/// new global.
pub fn assign(scope: &ScopeRef, name: &str, value: Value) {
    let mut current = Rc::clone(scope);
    loop {
        let parent = {
            let mut s = current.borrow_mut();
            if let Some(slot) = s.bindings.get_mut(name) {
                *slot = value;
                return;
            }
            match s.parent.clone() {
                Some(parent) => parent,
                None => {
                    s.bindings.insert(name.to_string(), value);
                    return;
                }
            }
        };
        current = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let global = Scope::global();
        declare(&global, "x", Value::Number(1.0));
        let inner = Scope::child(&global);
        declare(&inner, "y", Value::Number(2.0));
        assert!(matches!(lookup(&inner, "x"), Some(Value::Number(n)) if n == 1.0));
        assert!(lookup(&global, "y").is_none());
    }

    #[test]
    fn assign_updates_nearest_binding() {
        let global = Scope::global();
        declare(&global, "x", Value::Number(1.0));
        let inner = Scope::child(&global);
        declare(&inner, "x", Value::Number(2.0));
        assign(&inner, "x", Value::Number(3.0));
        assert!(matches!(lookup(&global, "x"), Some(Value::Number(n)) if n == 1.0));
        assert!(matches!(lookup(&inner, "x"), Some(Value::Number(n)) if n == 3.0));
    }

    #[test]
    fn assign_to_undeclared_creates_global() {
        let global = Scope::global();
        let inner = Scope::child(&global);
        assign(&inner, "fresh", Value::Bool(true));
        assert!(global.borrow().bindings().contains_key("fresh"));
    }

    #[test]
    fn hoisting_keeps_existing_value() {
        let global = Scope::global();
        declare(&global, "x", Value::Number(5.0));
        declare_hoisted(&global, "x");
        declare_hoisted(&global, "y");
        assert!(matches!(lookup(&global, "x"), Some(Value::Number(n)) if n == 5.0));
        assert!(matches!(lookup(&global, "y"), Some(Value::Undefined)));
    }
}
