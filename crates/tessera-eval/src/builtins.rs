//! Built-in string and array methods.
//!
//! Strings are indexed by character, not by UTF-16 unit.

use crate::error::{EvalError, EvalResult};
use crate::value::{join, Method, Value};

pub(crate) fn call_method(this: &Value, method: Method, args: &[Value]) -> EvalResult<Value> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    match (method, this) {
        (Method::ToString, v) => Ok(Value::string(v.to_js_string())),

        // ── Arrays ───────────────────────────────────────────────────────
        (Method::Push, Value::Array(items)) => {
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Ok(Value::Number(items.len() as f64))
        }
        (Method::Pop, Value::Array(items)) => {
            Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined))
        }
        (Method::Shift, Value::Array(items)) => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Ok(Value::Undefined)
            } else {
                Ok(items.remove(0))
            }
        }
        (Method::Unshift, Value::Array(items)) => {
            let mut items = items.borrow_mut();
            items.splice(0..0, args.iter().cloned());
            Ok(Value::Number(items.len() as f64))
        }
        (Method::ArrayIndexOf, Value::Array(items)) => {
            let items = items.borrow();
            let needle = arg(0);
            let from = relative(&arg(1), items.len(), 0);
            let found = items[from..]
                .iter()
                .position(|v| v.strict_equals(&needle))
                .map_or(-1.0, |i| (from + i) as f64);
            Ok(Value::Number(found))
        }
        (Method::Join, Value::Array(items)) => {
            let separator = match arg(0) {
                Value::Undefined => ",".to_string(),
                sep => sep.to_js_string(),
            };
            Ok(Value::string(join(&items.borrow(), &separator, 1)))
        }
        (Method::ArraySlice, Value::Array(items)) => {
            let items = items.borrow();
            let (start, end) = range(&arg(0), &arg(1), items.len());
            Ok(Value::array(items[start..end].to_vec()))
        }
        (Method::Concat, Value::Array(items)) => {
            let mut out = items.borrow().clone();
            for a in args {
                match a {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    v => out.push(v.clone()),
                }
            }
            Ok(Value::array(out))
        }
        (Method::Reverse, Value::Array(items)) => {
            items.borrow_mut().reverse();
            Ok(this.clone())
        }

        // ── Strings ──────────────────────────────────────────────────────
        (Method::CharAt, Value::String(s)) => {
            let index = to_integer(&arg(0));
            let c = (index >= 0.0)
                .then(|| s.chars().nth(index as usize))
                .flatten()
                .map(String::from)
                .unwrap_or_default();
            Ok(Value::string(c))
        }
        (Method::StringIndexOf, Value::String(s)) => {
            let chars: Vec<char> = s.chars().collect();
            let needle: Vec<char> = arg(0).to_js_string().chars().collect();
            let from = (to_integer(&arg(1)).max(0.0) as usize).min(chars.len());
            let found = if needle.is_empty() {
                Some(from)
            } else {
                (from..chars.len())
                    .find(|&i| chars[i..].starts_with(&needle))
            };
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }
        (Method::StringSlice, Value::String(s)) => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = range(&arg(0), &arg(1), chars.len());
            Ok(Value::string(chars[start..end].iter().collect::<String>()))
        }
        (Method::Substring, Value::String(s)) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len();
            let clamp = |v: &Value, default: usize| match v {
                Value::Undefined => default,
                v => (to_integer(v).max(0.0) as usize).min(len),
            };
            let (a, b) = (clamp(&arg(0), 0), clamp(&arg(1), len));
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Ok(Value::string(chars[start..end].iter().collect::<String>()))
        }
        (Method::ToUpperCase, Value::String(s)) => Ok(Value::string(s.to_uppercase())),
        (Method::ToLowerCase, Value::String(s)) => Ok(Value::string(s.to_lowercase())),
        (Method::Split, Value::String(s)) => {
            let limit = match arg(1) {
                Value::Undefined => usize::MAX,
                v => v.to_uint32() as usize,
            };
            let parts: Vec<Value> = match arg(0) {
                Value::Undefined => vec![Value::String(s.clone())],
                sep => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::string).collect()
                    }
                }
            };
            Ok(Value::array(parts.into_iter().take(limit).collect()))
        }

        (method, receiver) => Err(EvalError::Type(format!(
            "{method:?} cannot be called on {}",
            receiver.type_of()
        ))),
    }
}

/// `ToIntegerOrInfinity`, with NaN as 0.
fn to_integer(v: &Value) -> f64 {
    let n = v.to_number();
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// A relative index as taken by `slice` and `indexOf`: negative counts from
/// the end, the result is clamped to `0..=len`.
fn relative(v: &Value, len: usize, default: usize) -> usize {
    if matches!(v, Value::Undefined) {
        return default;
    }
    let n = to_integer(v);
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

/// `slice(start, end)` bounds; an empty range when `end` precedes `start`.
fn range(start: &Value, end: &Value, len: usize) -> (usize, usize) {
    let start = relative(start, len, 0);
    let end = relative(end, len, len);
    (start, end.max(start))
}
