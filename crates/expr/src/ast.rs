//! Syntax tree for attribute expressions.
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A string, number, boolean or null literal.
    Literal(Value),
    /// Data taken from the current record or a user parameter.
    Selection(Selection),
    /// A call to a registered function.
    FunctionCall { name: String, args: Vec<Expression> },
    /// Truthiness negation (`!expr`).
    Not(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// An object key (e.g., `.name`).
    Key(String),
    /// An array index (e.g., `[0]`).
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The current record itself (`.`).
    CurrentContext,
    /// A user parameter (`$name`).
    Variable(String),
    /// Key/index lookups from the current record.
    Path(Vec<PathSegment>),
}

impl Expression {
    /// Shorthand for a key path such as `customer.name`.
    pub fn path<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expression::Selection(Selection::Path(
            keys.into_iter().map(|k| PathSegment::Key(k.into())).collect(),
        ))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    /// Names of every function called anywhere in the expression.
    pub fn function_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_function_names(&mut names);
        names
    }

    fn collect_function_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expression::FunctionCall { name, args } => {
                out.push(name);
                for arg in args {
                    arg.collect_function_names(out);
                }
            }
            Expression::Not(inner) => inner.collect_function_names(out),
            Expression::Literal(_) | Expression::Selection(_) => {}
        }
    }
}
