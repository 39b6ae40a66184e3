//! Expressions used by form configurations.
//!
//! Attribute values such as `convert`, `visible` and `condition` are small
//! expressions: paths into the current JSON record (`@customer.name`,
//! `items[0].price`, `.`), user parameters (`$company`), literals, function
//! calls (`upper(name)`) and negation (`!paid`). They are parsed once when a
//! configuration loads and evaluated for every record.

pub mod ast;
pub mod engine;
pub mod error;
pub mod functions;
mod parser;

pub use ast::{Expression, PathSegment, Selection};
pub use engine::{
    EvaluationContext, evaluate, evaluate_as_bool, evaluate_as_string, is_truthy, select,
    select_first, select_path, value_to_string,
};
pub use error::ExprError;
pub use functions::{ExprFunction, FunctionRegistry};
pub use parser::parse_expression;

/// Parses an expression and checks that every function it calls is registered.
pub fn compile(input: &str, functions: &FunctionRegistry) -> Result<Expression, ExprError> {
    let expr = parse_expression(input)?;
    if let Some(unknown) = expr
        .function_names()
        .into_iter()
        .find(|name| !functions.contains(name))
    {
        return Err(ExprError::UnknownFunction(unknown.to_string()));
    }
    Ok(expr)
}
