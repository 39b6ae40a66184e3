//! Registered functions callable from expressions.
use crate::engine::{EvaluationContext, is_truthy, value_to_string};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};
use std::collections::HashMap;

/// The signature of a function callable from an expression.
pub type ExprFunction = fn(e_ctx: &EvaluationContext, args: Vec<Value>) -> Value;

/// Function table consulted at load time (name resolution) and at render time.
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
    functions: HashMap<String, ExprFunction>,
}

impl FunctionRegistry {
    /// An empty registry with no built-ins.
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registers a function, replacing any previous one of the same name.
    pub fn register(&mut self, name: &str, func: ExprFunction) {
        self.functions.insert(name.to_lowercase(), func);
    }

    /// Finds a function by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&ExprFunction> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn arg_str(args: &[Value], i: usize) -> String {
    args.get(i).map(value_to_string).unwrap_or_default()
}

fn arg_f64(args: &[Value], i: usize) -> Option<f64> {
    match args.get(i)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(' ', "").replace(',', ".").parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn upper(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    args.first()
        .and_then(|v| v.as_str())
        .map(|s| s.to_uppercase().into())
        .unwrap_or(Value::Null)
}

fn lower(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    args.first()
        .and_then(|v| v.as_str())
        .map(|s| s.to_lowercase().into())
        .unwrap_or(Value::Null)
}

fn trim(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    arg_str(&args, 0).trim().into()
}

fn concat(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    args.iter().map(value_to_string).collect::<String>().into()
}

fn contains(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::Array(items)), Some(needle)) => items.contains(needle).into(),
        (Some(Value::String(h)), Some(n)) => h.contains(&value_to_string(n)).into(),
        _ => false.into(),
    }
}

fn count(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    match args.first() {
        Some(Value::Array(arr)) => json!(arr.len()),
        Some(Value::Object(obj)) => json!(obj.len()),
        _ => json!(0),
    }
}

fn position(e_ctx: &EvaluationContext, _args: Vec<Value>) -> Value {
    json!(e_ctx.loop_position.unwrap_or(0).saturating_add(1))
}

fn equals(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    if args.len() != 2 {
        return json!(false);
    }
    json!(value_to_string(&args[0]) == value_to_string(&args[1]))
}

fn not(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    json!(!args.first().is_some_and(is_truthy))
}

fn empty(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    json!(args.first().map_or(true, |v| value_to_string(v).trim().is_empty()))
}

/// `default(value, fallback)`: the fallback when `value` renders as empty text.
fn default(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    let mut args = args.into_iter();
    let value = args.next().unwrap_or(Value::Null);
    let fallback = args.next().unwrap_or(Value::Null);
    if value_to_string(&value).trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// `date(value, format[, input_format])`: reformats an ISO date or date-time.
/// Unparseable input is returned unchanged.
fn date(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    let raw = arg_str(&args, 0);
    let out_format = args
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or("%d.%m.%Y")
        .to_string();
    let input = raw.trim();
    if input.is_empty() {
        return Value::String(String::new());
    }

    if let Some(in_format) = args.get(2).and_then(Value::as_str) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, in_format) {
            return dt.format(&out_format).to_string().into();
        }
        if let Ok(d) = NaiveDate::parse_from_str(input, in_format) {
            return d.format(&out_format).to_string().into();
        }
        return raw.into();
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return dt.format(&out_format).to_string().into();
        }
    }
    let date_part = input.get(..10).unwrap_or(input);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(d) => d.format(&out_format).to_string().into(),
        Err(_) => raw.into(),
    }
}

/// `number(value, decimals)`: fixed-point rendering, empty for non-numbers.
fn number(_e_ctx: &EvaluationContext, args: Vec<Value>) -> Value {
    let decimals = arg_f64(&args, 1).unwrap_or(0.0).clamp(0.0, 10.0) as usize;
    match arg_f64(&args, 0) {
        Some(n) => format!("{:.*}", decimals, n).into(),
        None => Value::String(String::new()),
    }
}

impl Default for FunctionRegistry {
    /// A registry populated with every built-in function.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register("upper", upper);
        registry.register("lower", lower);
        registry.register("trim", trim);
        registry.register("concat", concat);
        registry.register("contains", contains);
        registry.register("count", count);
        registry.register("position", position);
        registry.register("equals", equals);
        registry.register("not", not);
        registry.register("empty", empty);
        registry.register("default", default);
        registry.register("date", date);
        registry.register("number", number);
        registry
    }
}
