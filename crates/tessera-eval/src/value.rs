//! Runtime values and the script-level conversions between them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tessera_types::ast::FunctionDecl;
use tessera_types::literal::format_number;

use crate::env::ScopeRef;

/// Nested arrays and objects deeper than this are cut off when converted.
const MAX_CONVERT_DEPTH: usize = 32;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<Object>>;

/// A runtime value. Arrays, objects and functions have reference semantics.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Closure>),
    Native(Rc<Native>),
}

/// A plain object. Properties keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct Object {
    props: Vec<(String, Value)>,
}

impl Object {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        match self.props.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.props.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.props.retain(|(k, _)| k != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A script function together with the scope it was declared in.
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub scope: ScopeRef,
}

/// Host-implemented callables.
#[derive(Debug)]
pub enum Native {
    Intrinsic(Intrinsic),
    /// A built-in method already bound to its receiver.
    Method { this: Value, method: Method },
}

/// The functions every run starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    HighlightBlock,
    Pause,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    // arrays
    Push,
    Pop,
    Shift,
    Unshift,
    ArrayIndexOf,
    Join,
    ArraySlice,
    Concat,
    Reverse,
    // strings
    CharAt,
    StringIndexOf,
    StringSlice,
    Substring,
    ToUpperCase,
    ToLowerCase,
    Split,
    // any primitive
    ToString,
}

impl Method {
    /// The built-in method `name` on `receiver`, if there is one.
    pub fn lookup(receiver: &Value, name: &str) -> Option<Method> {
        let method = match (receiver, name) {
            (Value::Array(_), "push") => Method::Push,
            (Value::Array(_), "pop") => Method::Pop,
            (Value::Array(_), "shift") => Method::Shift,
            (Value::Array(_), "unshift") => Method::Unshift,
            (Value::Array(_), "indexOf") => Method::ArrayIndexOf,
            (Value::Array(_), "join") => Method::Join,
            (Value::Array(_), "slice") => Method::ArraySlice,
            (Value::Array(_), "concat") => Method::Concat,
            (Value::Array(_), "reverse") => Method::Reverse,
            (Value::String(_), "charAt") => Method::CharAt,
            (Value::String(_), "indexOf") => Method::StringIndexOf,
            (Value::String(_), "slice") => Method::StringSlice,
            (Value::String(_), "substring") => Method::Substring,
            (Value::String(_), "toUpperCase") => Method::ToUpperCase,
            (Value::String(_), "toLowerCase") => Method::ToLowerCase,
            (Value::String(_), "split") => Method::Split,
            (
                Value::Array(_) | Value::String(_) | Value::Number(_) | Value::Bool(_),
                "toString",
            ) => Method::ToString,
            _ => return None,
        };
        Some(method)
    }
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn native(native: Native) -> Value {
        Value::Native(Rc::new(native))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    /// `typeof` result.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) | Value::Object(_) => string_to_number(&self.to_js_string()),
            Value::Function(_) | Value::Native(_) => f64::NAN,
        }
    }

    /// Arrays and objects become strings; everything else is unchanged.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Native(_) => {
                Value::string(self.to_js_string())
            }
            other => other.clone(),
        }
    }

    pub fn to_js_string(&self) -> String {
        self.display(0)
    }

    fn display(&self, depth: usize) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => {
                if depth >= MAX_CONVERT_DEPTH {
                    return String::new();
                }
                join(&items.borrow(), ",", depth + 1)
            }
            Value::Object(_) => "[object Object]".into(),
            Value::Function(f) => format!("function {}() {{ [code] }}", f.decl.name.name),
            Value::Native(_) => "function () { [native code] }".into(),
        }
    }

    pub fn to_int32(&self) -> i32 {
        to_uint32(self.to_number()) as i32
    }

    pub fn to_uint32(&self) -> u32 {
        to_uint32(self.to_number())
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Number(a), Value::String(_)) => *a == other.to_number(),
            (Value::String(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (Value::Number(_) | Value::String(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_equals(&other.to_primitive())
            }
            (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::String(_)) => {
                self.to_primitive().loose_equals(other)
            }
            _ => self.strict_equals(other),
        }
    }

    /// Plain data view for hosts. Functions become descriptive strings and
    /// non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.json(0)
    }

    fn json(&self, depth: usize) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_json(*n),
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(items) => {
                if depth >= MAX_CONVERT_DEPTH {
                    return Json::Null;
                }
                Json::Array(items.borrow().iter().map(|v| v.json(depth + 1)).collect())
            }
            Value::Object(obj) => {
                if depth >= MAX_CONVERT_DEPTH {
                    return Json::Null;
                }
                let map = obj
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.json(depth + 1)))
                    .collect();
                Json::Object(map)
            }
            Value::Function(f) => Json::String(format!("[function {}]", f.decl.name.name)),
            Value::Native(_) => Json::String("[native function]".into()),
        }
    }

    /// Deep-copy host data into fresh runtime values.
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::string(s.as_str()),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => {
                let mut obj = Object::default();
                for (k, v) in map {
                    obj.set(k, Value::from_json(v));
                }
                Value::object(obj)
            }
        }
    }
}

impl fmt::Debug for Value {
    // closures can reach themselves through their scope, so never recurse into one
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => write!(f, "{:?}", items.borrow()),
            Value::Object(obj) => f.debug_map().entries(obj.borrow().iter()).finish(),
            Value::Function(c) => write!(f, "[function {}]", c.decl.name.name),
            Value::Native(n) => write!(f, "[native {n:?}]"),
        }
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({})", self.decl.name.name)
    }
}

fn number_json(n: f64) -> serde_json::Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        // -0 reads back as 0
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// `Array.prototype.join`: `undefined` and `null` elements print as empty.
pub fn join(items: &[Value], separator: &str, depth: usize) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        if !item.is_nullish() {
            out.push_str(&item.display(depth));
        }
    }
    out
}

/// Script `Number(string)`.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        if hex.is_empty() {
            return f64::NAN;
        }
        return hex.chars().try_fold(0.0, |acc, c| {
            c.to_digit(16).map(|d| acc * 16.0 + f64::from(d))
        })
        .unwrap_or(f64::NAN);
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // rules out the spellings Rust accepts but scripts do not (`inf`, `nan`)
    let numeric = t
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !numeric || !t.bytes().any(|b| b.is_ascii_digit()) {
        return f64::NAN;
    }
    t.parse().unwrap_or(f64::NAN)
}

fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc().rem_euclid(4_294_967_296.0);
    m as u32
}

/// The array index a property key names, if it is a canonical index.
pub fn array_index(key: &str) -> Option<usize> {
    let index: u32 = key.parse().ok()?;
    (index.to_string() == key).then_some(index as usize)
}
