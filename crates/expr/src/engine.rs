//! Evaluation of parsed expressions against a JSON record.
use crate::ast::{Expression, PathSegment, Selection};
use crate::error::ExprError;
use crate::functions::FunctionRegistry;
use serde_json::Value;
use std::collections::HashMap;

/// Everything an expression can see while it is evaluated.
#[derive(Clone)]
pub struct EvaluationContext<'a> {
    pub context_node: &'a Value,
    pub variables: &'a HashMap<String, Value>,
    pub functions: &'a FunctionRegistry,
    pub loop_position: Option<usize>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        context_node: &'a Value,
        variables: &'a HashMap<String, Value>,
        functions: &'a FunctionRegistry,
    ) -> Self {
        Self {
            context_node,
            variables,
            functions,
            loop_position: None,
        }
    }

    /// The same context rebound to another node, e.g. a field value for `convert`.
    pub fn with_node(&self, node: &'a Value) -> Self {
        Self {
            context_node: node,
            ..self.clone()
        }
    }
}

pub fn evaluate(expr: &Expression, e_ctx: &EvaluationContext) -> Result<Value, ExprError> {
    match expr {
        Expression::Literal(val) => Ok(val.clone()),
        Expression::Selection(sel) => Ok(select_first(sel, e_ctx.context_node, e_ctx.variables)
            .cloned()
            .unwrap_or(Value::Null)),
        Expression::FunctionCall { name, args } => {
            let function = e_ctx
                .functions
                .get(name)
                .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            let evaluated_args = args
                .iter()
                .map(|arg| evaluate(arg, e_ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(function(e_ctx, evaluated_args))
        }
        Expression::Not(inner) => Ok(Value::Bool(!is_truthy(&evaluate(inner, e_ctx)?))),
    }
}

/// `false`, `null`, `0`, `""`, `"0"` and empty arrays/objects are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// String form used when a value is drawn as text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

pub fn evaluate_as_bool(expr: &Expression, e_ctx: &EvaluationContext) -> Result<bool, ExprError> {
    Ok(is_truthy(&evaluate(expr, e_ctx)?))
}

pub fn evaluate_as_string(
    expr: &Expression,
    e_ctx: &EvaluationContext,
) -> Result<String, ExprError> {
    Ok(value_to_string(&evaluate(expr, e_ctx)?))
}

pub fn select<'a>(
    sel: &Selection,
    context: &'a Value,
    variables: &'a HashMap<String, Value>,
) -> Vec<&'a Value> {
    select_first(sel, context, variables).into_iter().collect()
}

pub fn select_first<'a>(
    sel: &Selection,
    context: &'a Value,
    variables: &'a HashMap<String, Value>,
) -> Option<&'a Value> {
    match sel {
        Selection::CurrentContext => Some(context),
        Selection::Variable(name) => variables.get(name),
        Selection::Path(segments) => select_path(context, segments),
    }
}

/// Walks key/index segments from `root`.
pub fn select_path<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| match segment {
        PathSegment::Key(k) => current.get(k),
        PathSegment::Index(i) => current.get(i),
    })
}
