//! Block definition validation.
//!
//! Raw definition records are JSON objects in the editor's block format plus
//! a `js` snippet. Each record is checked independently; a bad record is
//! rejected with every problem found in it and does not affect the others.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use tessera_types::block::{
    arg_name, ArgKind, BlockArg, BlockDefinition, BlockRole, Bound, Colour, DropdownOption,
    ValueType,
};
use tessera_types::literal::format_number;
use tessera_types::{CompileErrors, ErrorCode, Order, SourceFile, Span, TesseraError};

use crate::snippet::{
    parse_single_expression, parse_statements, rewrite_placeholders, template_refs,
    PlaceholderChecker, SnippetRole,
};

const BASE_FIELDS: &[&str] = &[
    "type",
    "message0",
    "args0",
    "inputsInline",
    "colour",
    "tooltip",
    "helpUrl",
    "maxInstances",
];
const STATEMENT_FIELDS: &[&str] = &["js", "previousStatement", "nextStatement"];
const EXPRESSION_FIELDS: &[&str] = &["js", "output"];

/// Source name used for errors about the definition file as a whole.
pub const DEFINITIONS_SOURCE: &str = "definitions";

/// Definitions that passed, and diagnostics for those that did not.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub definitions: Vec<BlockDefinition>,
    pub errors: CompileErrors,
}

impl ValidationOutcome {
    pub fn is_clean(&self) -> bool {
        !self.errors.has_errors()
    }
}

/// Validate a JSON array of definition records.
pub fn validate_blocks(json: &str) -> ValidationOutcome {
    let records = match serde_json::from_str::<Value>(json) {
        Ok(Value::Array(records)) => records,
        Ok(other) => {
            let err = TesseraError::at_path(
                ErrorCode::INVALID_FIELD,
                DEFINITIONS_SOURCE,
                format!("expected an array of block definitions, got {}", kind(&other)),
            );
            return ValidationOutcome {
                definitions: Vec::new(),
                errors: err.into(),
            };
        }
        Err(e) => {
            let span = Span::point(e.line() as u32, e.column() as u32);
            let line = json.lines().nth(e.line().saturating_sub(1)).unwrap_or("");
            let err = TesseraError::new(
                DEFINITIONS_SOURCE,
                ErrorCode::INVALID_FIELD,
                format!("definitions are not valid JSON: {e}"),
                span,
                line,
            );
            return ValidationOutcome {
                definitions: Vec::new(),
                errors: err.into(),
            };
        }
    };
    validate_records(&records)
}

/// Validate already-parsed records.
pub fn validate_records(records: &[Value]) -> ValidationOutcome {
    let mut definitions = Vec::with_capacity(records.len());
    let mut errors = CompileErrors::empty();
    for (index, record) in records.iter().enumerate() {
        match validate_block(index, record) {
            Ok(def) => {
                debug!(index, block = %def.type_name, "validated block definition");
                definitions.push(def);
            }
            Err(errs) => {
                warn!(
                    index,
                    errors = errs.total_errors,
                    "rejected block definition"
                );
                errors.extend(errs);
            }
        }
    }
    ValidationOutcome {
        definitions,
        errors,
    }
}

/// Validate the record at position `index` of a definition file.
pub fn validate_block(index: usize, record: &Value) -> Result<BlockDefinition, CompileErrors> {
    let mut validator = BlockValidator {
        errors: CompileErrors::empty(),
    };
    match validator.block(format!("[{index}]"), record) {
        Ok(def) if !validator.errors.has_errors() => Ok(def),
        _ => Err(validator.errors),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Record walking
// ══════════════════════════════════════════════════════════════════════════════

/// The problem has already been recorded.
#[derive(Debug, Clone, Copy)]
struct Reported;

type Field<T> = Result<T, Reported>;

/// A JSON object plus the path that leads to it.
struct Record<'v> {
    map: &'v Map<String, Value>,
    path: String,
}

impl<'v> Record<'v> {
    fn get(&self, key: &str) -> Option<&'v Value> {
        self.map.get(key)
    }

    fn path_of(&self, key: &str) -> String {
        format!("{}.{key}", self.path)
    }
}

enum Shape {
    Statement { previous: bool, next: bool },
    Expression(ValueType),
}

struct BlockValidator {
    errors: CompileErrors,
}

impl BlockValidator {
    fn fail(&mut self, code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Reported {
        self.errors
            .push_error(TesseraError::at_path(code, path, message));
        Reported
    }

    fn absorb(&mut self, errors: CompileErrors) -> Reported {
        self.errors.extend(errors);
        Reported
    }

    fn check(&mut self, errors: CompileErrors) -> Field<()> {
        if errors.has_errors() {
            Err(self.absorb(errors))
        } else {
            Ok(())
        }
    }

    fn record<'v>(&mut self, value: &'v Value, path: String) -> Field<Record<'v>> {
        match value {
            Value::Object(map) => Ok(Record { map, path }),
            other => {
                let message = format!("expected an object, got {}", kind(other));
                Err(self.fail(ErrorCode::INVALID_FIELD, path, message))
            }
        }
    }

    fn allow_only(&mut self, rec: &Record<'_>, allowed: &[&str]) {
        for key in rec.map.keys() {
            if !allowed.contains(&key.as_str()) {
                self.fail(
                    ErrorCode::UNKNOWN_FIELD,
                    rec.path_of(key),
                    format!("unknown field `{key}`"),
                );
            }
        }
    }

    // ── Typed field readers ──────────────────────────────────────────────

    fn required_str(&mut self, rec: &Record<'_>, key: &str) -> Field<String> {
        match rec.get(key) {
            None => Err(self.fail(
                ErrorCode::MISSING_FIELD,
                rec.path_of(key),
                format!("missing field `{key}`"),
            )),
            Some(value) => self.string(rec, key, value),
        }
    }

    fn str_or(&mut self, rec: &Record<'_>, key: &str, default: &str) -> Field<String> {
        match rec.get(key) {
            None => Ok(default.to_string()),
            Some(value) => self.string(rec, key, value),
        }
    }

    fn string(&mut self, rec: &Record<'_>, key: &str, value: &Value) -> Field<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of(key),
                format!("expected a string, got {}", kind(other)),
            )),
        }
    }

    fn bool_or(&mut self, rec: &Record<'_>, key: &str, default: bool) -> Field<bool> {
        match rec.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of(key),
                format!("expected a boolean, got {}", kind(other)),
            )),
        }
    }

    fn opt_number(&mut self, rec: &Record<'_>, key: &str) -> Field<Option<f64>> {
        match rec.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) => Ok(Some(v)),
                None => Err(self.fail(
                    ErrorCode::INVALID_FIELD,
                    rec.path_of(key),
                    "number is out of range",
                )),
            },
            Some(other) => Err(self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of(key),
                format!("expected a number, got {}", kind(other)),
            )),
        }
    }

    /// `previousStatement` / `nextStatement`: present means `null`.
    fn connection(&mut self, rec: &Record<'_>, key: &str) -> Field<bool> {
        match rec.get(key) {
            None => Ok(false),
            Some(Value::Null) => Ok(true),
            Some(other) => Err(self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of(key),
                format!("`{key}` must be null, got {}", kind(other)),
            )),
        }
    }

    fn colour(&mut self, rec: &Record<'_>) -> Field<Colour> {
        match rec.get("colour") {
            None => Err(self.fail(
                ErrorCode::MISSING_FIELD,
                rec.path_of("colour"),
                "missing field `colour`",
            )),
            Some(Value::Number(n)) => Ok(Colour::Hue(n.as_f64().unwrap_or_default())),
            Some(Value::String(s)) => Ok(Colour::Named(s.clone())),
            Some(other) => Err(self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of("colour"),
                format!("expected a hue number or a colour string, got {}", kind(other)),
            )),
        }
    }

    fn max_instances(&mut self, rec: &Record<'_>) -> Field<Option<u32>> {
        match rec.get("maxInstances") {
            None => Ok(None),
            Some(Value::Number(n)) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(v) => Ok(Some(v)),
                None => Err(self.fail(
                    ErrorCode::INVALID_FIELD,
                    rec.path_of("maxInstances"),
                    format!("`maxInstances` must be a non-negative integer, got {n}"),
                )),
            },
            Some(other) => Err(self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of("maxInstances"),
                format!("expected a number, got {}", kind(other)),
            )),
        }
    }

    // ── The record ───────────────────────────────────────────────────────

    fn block(&mut self, path: String, value: &Value) -> Field<BlockDefinition> {
        let rec = self.record(value, path)?;
        let is_expression = rec.map.contains_key("output");
        let role_fields = if is_expression {
            EXPRESSION_FIELDS
        } else {
            STATEMENT_FIELDS
        };
        self.allow_only(&rec, &[BASE_FIELDS, role_fields].concat());

        // read every field before bailing so one pass reports them all
        let type_name = self.required_str(&rec, "type").and_then(|name| {
            if name.trim().is_empty() {
                Err(self.fail(
                    ErrorCode::INVALID_FIELD,
                    rec.path_of("type"),
                    "block type must not be empty",
                ))
            } else {
                Ok(name)
            }
        });
        let message = self.required_str(&rec, "message0");
        let inputs_inline = self.bool_or(&rec, "inputsInline", true);
        let colour = self.colour(&rec);
        let tooltip = self.required_str(&rec, "tooltip");
        let help_url = self.str_or(&rec, "helpUrl", "");
        let max_instances = self.max_instances(&rec);
        let args = self.args(&rec);
        let js = self.required_str(&rec, "js");
        let shape = if is_expression {
            self.output(&rec).map(Shape::Expression)
        } else {
            let previous = self.connection(&rec, "previousStatement");
            let next = self.connection(&rec, "nextStatement");
            previous.and_then(|previous| next.map(|next| Shape::Statement { previous, next }))
        };

        let type_name = type_name?;
        let message = message?;
        let inputs_inline = inputs_inline?;
        let colour = colour?;
        let tooltip = tooltip?;
        let help_url = help_url?;
        let max_instances = max_instances?;
        let args = args?;
        let js = js?;
        let shape = shape?;

        self.template(&rec, &message, args.len());
        let (js, role) = self.snippet(&rec, &js, &args, shape)?;

        Ok(BlockDefinition {
            type_name,
            message,
            args,
            role,
            js,
            inputs_inline,
            colour,
            tooltip,
            help_url,
            max_instances,
        })
    }

    fn output(&mut self, rec: &Record<'_>) -> Field<ValueType> {
        let name = self.required_str(rec, "output")?;
        ValueType::from_name(&name).ok_or_else(|| {
            self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of("output"),
                format!("unknown output type `{name}`; expected Number, String, Array or Boolean"),
            )
        })
    }

    /// Every argument must be referenced by `message0` exactly once.
    fn template(&mut self, rec: &Record<'_>, message: &str, arg_count: usize) {
        let path = rec.path_of("message0");
        let mut uses = vec![0usize; arg_count];
        for n in template_refs(message) {
            match n.checked_sub(1).and_then(|i| uses.get_mut(i)) {
                Some(count) => *count += 1,
                None => {
                    self.fail(
                        ErrorCode::TEMPLATE_MISMATCH,
                        path.clone(),
                        format!("%{n} does not refer to an argument (block has {arg_count})"),
                    );
                }
            }
        }
        for (i, count) in uses.into_iter().enumerate() {
            let message = match count {
                0 => format!("argument %{} is not used in the message", i + 1),
                1 => continue,
                _ => format!("argument %{} is used more than once in the message", i + 1),
            };
            self.fail(ErrorCode::TEMPLATE_MISMATCH, path.clone(), message);
        }
    }

    fn snippet(
        &mut self,
        rec: &Record<'_>,
        js: &str,
        args: &[BlockArg],
        shape: Shape,
    ) -> Field<(String, BlockRole)> {
        let path = rec.path_of("js");
        if js.trim().is_empty() {
            return Err(self.fail(ErrorCode::INVALID_SNIPPET, path, "snippet is empty"));
        }
        let text = rewrite_placeholders(js.trim()).map_err(|bad| {
            self.fail(
                ErrorCode::INVALID_PLACEHOLDER,
                path.clone(),
                format!("{bad} is not a placeholder; arguments are numbered from %1"),
            )
        })?;
        let source = SourceFile::new(path, text.clone());
        let role = match shape {
            Shape::Statement { previous, next } => {
                let body = parse_statements(&source).map_err(|e| self.absorb(e))?;
                let errs = PlaceholderChecker::new(args, SnippetRole::Statement, &source)
                    .check_program(&body);
                self.check(errs)?;
                BlockRole::Statement {
                    previous,
                    next,
                    body,
                }
            }
            Shape::Expression(output) => {
                let expr = parse_single_expression(&source).map_err(|e| self.absorb(e))?;
                let errs = PlaceholderChecker::new(args, SnippetRole::Expression, &source)
                    .check_expr(&expr);
                self.check(errs)?;
                let order = Order::of(&expr);
                BlockRole::Expression {
                    output,
                    expr,
                    order,
                }
            }
        };
        Ok((text, role))
    }

    // ── Arguments ────────────────────────────────────────────────────────

    fn args(&mut self, rec: &Record<'_>) -> Field<Vec<BlockArg>> {
        let path = rec.path_of("args0");
        let items = match rec.get("args0") {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                let message = format!("expected an array, got {}", kind(other));
                return Err(self.fail(ErrorCode::INVALID_FIELD, path, message));
            }
        };
        let mut args = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match self.arg(format!("{path}[{i}]"), i, item) {
                Ok(arg) => args.push(arg),
                Err(Reported) => ok = false,
            }
        }
        if ok {
            Ok(args)
        } else {
            Err(Reported)
        }
    }

    fn arg(&mut self, path: String, index: usize, value: &Value) -> Field<BlockArg> {
        let rec = self.record(value, path)?;
        let type_name = self.required_str(&rec, "type")?;
        let name = arg_name(index);
        if let Some(given) = rec.get("name") {
            if given.as_str() != Some(name.as_str()) {
                self.fail(
                    ErrorCode::INVALID_FIELD,
                    rec.path_of("name"),
                    format!("argument name must be `{name}` or omitted"),
                );
            }
        }

        let kind = match type_name.as_str() {
            "input_value" => {
                self.allow_only(&rec, &["type", "name", "check", "min", "max"]);
                let check = self.required_str(&rec, "check").and_then(|check| {
                    if check == "Integer" {
                        return Ok((ValueType::Number, true));
                    }
                    match ValueType::from_name(&check) {
                        Some(ty) => Ok((ty, false)),
                        None => Err(self.fail(
                            ErrorCode::INVALID_FIELD,
                            rec.path_of("check"),
                            format!("unknown input type `{check}`"),
                        )),
                    }
                });
                let min = self.bound(&rec, "min");
                let max = self.bound(&rec, "max");
                let (check, integer) = check?;
                ArgKind::InputValue {
                    check,
                    integer,
                    min: min?,
                    max: max?,
                }
            }
            "input_statement" => {
                self.allow_only(&rec, &["type", "name"]);
                ArgKind::InputStatement
            }
            "field_dropdown" => {
                self.allow_only(&rec, &["type", "name", "options"]);
                ArgKind::FieldDropdown {
                    options: self.options(&rec)?,
                }
            }
            "field_number" => {
                self.allow_only(&rec, &["type", "name", "value", "min", "max", "precision"]);
                self.field_number(&rec)?
            }
            "field_input" => {
                self.allow_only(&rec, &["type", "name", "text"]);
                ArgKind::FieldInput {
                    text: self.str_or(&rec, "text", "")?,
                }
            }
            other => {
                return Err(self.fail(
                    ErrorCode::INVALID_FIELD,
                    rec.path_of("type"),
                    format!("unknown argument type `{other}`"),
                ))
            }
        };
        Ok(BlockArg { name, kind })
    }

    fn field_number(&mut self, rec: &Record<'_>) -> Field<ArgKind> {
        let value = self.opt_number(rec, "value");
        let min = self.opt_number(rec, "min");
        let max = self.opt_number(rec, "max");
        let precision = self.opt_number(rec, "precision");
        let (value, min, max, precision) = (value?.unwrap_or(0.0), min?, max?, precision?);

        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(self.fail(
                    ErrorCode::INVALID_FIELD,
                    rec.path_of("min"),
                    format!("min ({}) is greater than max ({})", format_number(lo), format_number(hi)),
                ));
            }
        }
        let below = min.is_some_and(|lo| value < lo);
        let above = max.is_some_and(|hi| value > hi);
        if below || above {
            return Err(self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of("value"),
                format!("default value {} is outside the field's range", format_number(value)),
            ));
        }
        if precision.is_some_and(|p| p <= 0.0) {
            return Err(self.fail(
                ErrorCode::INVALID_FIELD,
                rec.path_of("precision"),
                "precision must be positive",
            ));
        }
        Ok(ArgKind::FieldNumber {
            value,
            min,
            max,
            precision,
        })
    }

    /// An optional `min`/`max` expression. Numbers are taken as their text.
    fn bound(&mut self, rec: &Record<'_>, key: &str) -> Field<Option<Bound>> {
        let text = match rec.get(key) {
            None => return Ok(None),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) => format_number(v),
                None => n.to_string(),
            },
            Some(other) => {
                let message = format!("expected an expression string, got {}", kind(other));
                return Err(self.fail(ErrorCode::INVALID_FIELD, rec.path_of(key), message));
            }
        };
        self.literal(rec.path_of(key), &text).map(Some)
    }

    fn options(&mut self, rec: &Record<'_>) -> Field<Vec<DropdownOption>> {
        let path = rec.path_of("options");
        let items = match rec.get("options") {
            None => {
                return Err(self.fail(ErrorCode::MISSING_FIELD, path, "missing field `options`"))
            }
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) => {
                return Err(self.fail(
                    ErrorCode::INVALID_FIELD,
                    path,
                    "a dropdown needs at least one option",
                ))
            }
            Some(other) => {
                let message = format!("expected an array, got {}", kind(other));
                return Err(self.fail(ErrorCode::INVALID_FIELD, path, message));
            }
        };

        let mut options = Vec::with_capacity(items.len());
        let mut ok = true;
        for (k, item) in items.iter().enumerate() {
            let item_path = format!("{path}[{k}]");
            let pair = match item.as_array().map(Vec::as_slice) {
                Some([Value::String(label), Value::String(value)]) => {
                    Some((label.clone(), value.clone()))
                }
                Some([Value::String(label), Value::Number(n)]) => {
                    Some((label.clone(), n.as_f64().map(format_number).unwrap_or_else(|| n.to_string())))
                }
                _ => None,
            };
            let Some((label, text)) = pair else {
                self.fail(
                    ErrorCode::INVALID_FIELD,
                    item_path,
                    "an option must be a [label, value] pair of strings",
                );
                ok = false;
                continue;
            };
            match self.literal(format!("{item_path}[1]"), &text) {
                Ok(value) => options.push(DropdownOption { label, value }),
                Err(Reported) => ok = false,
            }
        }
        if ok {
            Ok(options)
        } else {
            Err(Reported)
        }
    }

    /// A placeholder-free single expression.
    fn literal(&mut self, path: String, text: &str) -> Field<Bound> {
        let rewritten = rewrite_placeholders(text.trim()).map_err(|bad| {
            self.fail(
                ErrorCode::INVALID_PLACEHOLDER,
                path.clone(),
                format!("{bad}: placeholders are not allowed here"),
            )
        })?;
        let source = SourceFile::new(path, rewritten.clone());
        let expr = parse_single_expression(&source).map_err(|e| self.absorb(e))?;
        let errs = PlaceholderChecker::new(&[], SnippetRole::Literal, &source).check_expr(&expr);
        self.check(errs)?;
        let order = Order::of(&expr);
        Ok(Bound {
            source: rewritten,
            expr,
            order,
        })
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Re-serialisation
// ══════════════════════════════════════════════════════════════════════════════

/// The editor-facing record for a validated definition.
///
/// Arguments carry their `_ARG<n>` names and `js` holds the rewritten
/// snippet, so feeding the output back through [`validate_block`] yields an
/// equal definition.
pub fn to_blockly_json(def: &BlockDefinition) -> Value {
    let mut obj = Map::new();
    obj.insert("type".into(), json!(def.type_name));
    obj.insert("message0".into(), json!(def.message));
    if !def.args.is_empty() {
        let args = def.args.iter().map(arg_json).collect::<Vec<_>>();
        obj.insert("args0".into(), Value::Array(args));
    }
    obj.insert("inputsInline".into(), json!(def.inputs_inline));
    let colour = match &def.colour {
        Colour::Hue(hue) => json!(hue),
        Colour::Named(name) => json!(name),
    };
    obj.insert("colour".into(), colour);
    obj.insert("tooltip".into(), json!(def.tooltip));
    obj.insert("helpUrl".into(), json!(def.help_url));
    if let Some(max) = def.max_instances {
        obj.insert("maxInstances".into(), json!(max));
    }
    match &def.role {
        BlockRole::Statement { previous, next, .. } => {
            if *previous {
                obj.insert("previousStatement".into(), Value::Null);
            }
            if *next {
                obj.insert("nextStatement".into(), Value::Null);
            }
        }
        BlockRole::Expression { output, .. } => {
            obj.insert("output".into(), json!(output.as_str()));
        }
    }
    obj.insert("js".into(), json!(def.js));
    Value::Object(obj)
}

fn arg_json(arg: &BlockArg) -> Value {
    let mut obj = Map::new();
    obj.insert("type".into(), json!(arg.kind.type_name()));
    obj.insert("name".into(), json!(arg.name));
    match &arg.kind {
        ArgKind::InputValue {
            check,
            integer,
            min,
            max,
        } => {
            let check = if *integer { "Integer" } else { check.as_str() };
            obj.insert("check".into(), json!(check));
            if let Some(min) = min {
                obj.insert("min".into(), json!(min.source));
            }
            if let Some(max) = max {
                obj.insert("max".into(), json!(max.source));
            }
        }
        ArgKind::InputStatement => {}
        ArgKind::FieldDropdown { options } => {
            let options = options
                .iter()
                .map(|o| json!([o.label, o.value.source]))
                .collect::<Vec<_>>();
            obj.insert("options".into(), Value::Array(options));
        }
        ArgKind::FieldNumber {
            value,
            min,
            max,
            precision,
        } => {
            obj.insert("value".into(), json!(value));
            for (key, v) in [("min", min), ("max", max), ("precision", precision)] {
                if let Some(v) = v {
                    obj.insert(key.into(), json!(v));
                }
            }
        }
        ArgKind::FieldInput { text } => {
            obj.insert("text".into(), json!(text));
        }
    }
    Value::Object(obj)
}
