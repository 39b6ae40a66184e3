//! A `nom` parser for attribute expressions.
use crate::ast::{Expression, PathSegment, Selection};
use crate::error::ExprError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, char, digit1, multispace0, u64 as nom_u64},
    combinator::{map, map_res, not, opt, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};
use serde_json::{Value, json};

pub fn parse_expression(input: &str) -> Result<Expression, ExprError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(ExprError::Parse {
            input: input.to_string(),
            message: format!("unexpected trailing input '{}'", rem),
        }),
        Err(e) => Err(ExprError::Parse {
            input: input.to_string(),
            message: e.to_string(),
        }),
    }
}

fn expression(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        negation,
        map(literal, Expression::Literal),
        function_call,
        map(selection, Expression::Selection),
    )))
    .parse(input)
}

fn negation(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('!'), expression), |e| {
        Expression::Not(Box::new(e))
    })
    .parse(input)
}

// --- Literals ---

/// A keyword that is not the prefix of a longer identifier (`true` but not `trueish`).
fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(identifier_tail))
}

fn identifier_tail(input: &str) -> IResult<&str, &str> {
    nom::bytes::complete::take_while1(|c: char| c.is_alphanumeric() || c == '_').parse(input)
}

fn boolean(input: &str) -> IResult<&str, Value> {
    alt((
        map(keyword("true"), |_| json!(true)),
        map(keyword("false"), |_| json!(false)),
    ))
    .parse(input)
}

fn null(input: &str) -> IResult<&str, Value> {
    map(keyword("null"), |_| Value::Null).parse(input)
}

fn string_literal(input: &str) -> IResult<&str, Value> {
    alt((
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
    ))
    .map(|s: &str| json!(s))
    .parse(input)
}

/// Decimal numbers. Integers stay integers so `count` results compare cleanly.
fn number(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize((opt(char('-')), digit1, opt(pair(char('.'), digit1)))),
        |s: &str| -> Result<Value, std::num::ParseFloatError> {
            if let Ok(i) = s.parse::<i64>() {
                return Ok(json!(i));
            }
            s.parse::<f64>().map(Value::from)
        },
    )
    .parse(input)
}

fn literal(input: &str) -> IResult<&str, Value> {
    alt((null, boolean, number, string_literal)).parse(input)
}

// --- Selections ---

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn key_segment(input: &str) -> IResult<&str, PathSegment> {
    map(preceded(char('.'), identifier), |s| {
        PathSegment::Key(s.to_string())
    })
    .parse(input)
}

fn index_segment(input: &str) -> IResult<&str, PathSegment> {
    map(delimited(char('['), ws(nom_u64), char(']')), |i| {
        PathSegment::Index(i as usize)
    })
    .parse(input)
}

fn full_path(input: &str) -> IResult<&str, Selection> {
    map(
        pair(identifier, many0(alt((key_segment, index_segment)))),
        |(start, rest)| {
            let mut segments = vec![PathSegment::Key(start.to_string())];
            segments.extend(rest);
            Selection::Path(segments)
        },
    )
    .parse(input)
}

fn selection(input: &str) -> IResult<&str, Selection> {
    alt((
        map(preceded(char('$'), identifier), |name| {
            Selection::Variable(name.to_string())
        }),
        preceded(char('@'), full_path),
        full_path,
        map(char('.'), |_| Selection::CurrentContext),
    ))
    .parse(input)
}

// --- Function calls ---

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = delimited(
        char('('),
        separated_list0(char(','), expression),
        ws(char(')')),
    )
    .parse(input)?;

    Ok((
        input,
        Expression::FunctionCall {
            name: name.to_string(),
            args,
        },
    ))
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_prefixed_and_bare_paths_are_equal() {
        assert_eq!(
            parse_expression("@customer.name").unwrap(),
            parse_expression("customer.name").unwrap()
        );
    }

    #[test]
    fn test_indexed_path() {
        let expr = parse_expression("customer.addresses[1].city").unwrap();
        assert_eq!(
            expr,
            Expression::Selection(Selection::Path(vec![
                PathSegment::Key("customer".into()),
                PathSegment::Key("addresses".into()),
                PathSegment::Index(1),
                PathSegment::Key("city".into()),
            ]))
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse_expression("42").unwrap(), Expression::Literal(json!(42)));
        assert_eq!(parse_expression("-1.5").unwrap(), Expression::Literal(json!(-1.5)));
        assert_eq!(parse_expression("''").unwrap(), Expression::Literal(json!("")));
        assert_eq!(parse_expression("\"a b\"").unwrap(), Expression::Literal(json!("a b")));
        assert_eq!(parse_expression("null").unwrap(), Expression::Literal(Value::Null));
    }

    #[test]
    fn test_keywords_do_not_swallow_identifiers() {
        assert_eq!(
            parse_expression("trueish").unwrap(),
            Expression::path(["trueish"])
        );
        assert_eq!(parse_expression("info").unwrap(), Expression::path(["info"]));
    }

    #[test]
    fn test_negation_and_variables() {
        let expr = parse_expression("!$draft").unwrap();
        assert_eq!(
            expr,
            Expression::Not(Box::new(Expression::Selection(Selection::Variable(
                "draft".into()
            ))))
        );
    }

    #[test]
    fn test_nested_call_collects_function_names() {
        let expr = parse_expression("concat('No ', upper( id ), default(x, '-'))").unwrap();
        assert_eq!(expr.function_names(), vec!["concat", "upper", "default"]);
    }

    #[test]
    fn test_trailing_input_is_an_error() {
        assert!(matches!(
            parse_expression("a b"),
            Err(ExprError::Parse { .. })
        ));
        assert!(parse_expression("upper(").is_err());
    }
}
