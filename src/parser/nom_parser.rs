//! Parser for parameter validation rules.
//!
//! A rule is a short expression attached to a parameter definition:
//!
//! ```raw
//! required
//! min(0)
//! max(10.5)
//! range(1, 5)
//! length(1, 32)
//! one_of("left", "right", up, 3, true)
//! ```
//!
//! Bare identifiers inside `one_of` are shorthand for string literals.
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0, none_of, space0},
    combinator::{all_consuming, map, recognize, value},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};
use serde_json::Value;

#[derive(Debug, PartialEq, Clone)]
pub enum Rule {
    Required,
    Min(f64),
    Max(f64),
    Range(f64, f64),
    /// Inclusive bounds on the length of a string or an array.
    Length(usize, usize),
    OneOf(Vec<Value>),
}

impl Rule {
    /// `None` means the parameter has neither a value nor a default. Only
    /// `Required` rejects that; every other rule applies to present values.
    pub fn check(&self, value: Option<&Value>) -> bool {
        let value = match value {
            None | Some(Value::Null) => return !matches!(self, Rule::Required),
            Some(value) => value,
        };
        match self {
            Rule::Required => true,
            Rule::Min(min) => value.as_f64().map_or(false, |v| v >= *min),
            Rule::Max(max) => value.as_f64().map_or(false, |v| v <= *max),
            Rule::Range(min, max) => value
                .as_f64()
                .map_or(false, |v| *min <= v && v <= *max),
            Rule::Length(min, max) => {
                let len = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Array(a) => a.len(),
                    _ => return false,
                };
                *min <= len && len <= *max
            }
            Rule::OneOf(options) => options.iter().any(|option| loosely_equal(option, value)),
        }
    }
}

/// Numbers compare by value so that `one_of(1, 2)` accepts `2.0`.
fn loosely_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => lhs == rhs,
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn open_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('('), space0))(i)
}

fn close_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char(')'), space0))(i)
}

fn comma(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char(','), space0))(i)
}

fn number(i: &str) -> IResult<&str, f64> {
    delimited(space0, double, space0)(i)
}

fn count(i: &str) -> IResult<&str, usize> {
    let (r, n) = number(i)?;
    if n < 0. || n.fract() != 0. {
        return Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((r, n as usize))
}

fn str_literal(input: &str) -> IResult<&str, Value> {
    let (r, val) = delimited(
        preceded(multispace0, char('\"')),
        many0(none_of("\"")),
        terminated(char('"'), multispace0),
    )(input)?;
    Ok((
        r,
        Value::String(
            val.iter()
                .collect::<String>()
                .replace("\\\\", "\\")
                .replace("\\n", "\n"),
        ),
    ))
}

fn literal(i: &str) -> IResult<&str, Value> {
    delimited(
        space0,
        alt((
            str_literal,
            map(identifier, |s: &str| match s {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s.to_owned()),
            }),
            map(double, |n: f64| serde_json::json!(n)),
        )),
        space0,
    )(i)
}

fn args<'src, O>(
    arg: fn(&'src str) -> IResult<&'src str, O>,
) -> impl FnMut(&'src str) -> IResult<&'src str, (O, O)> {
    delimited(open_paren, separated_pair(arg, comma, arg), close_paren)
}

fn range_rule(i: &str) -> IResult<&str, Rule> {
    map(preceded(tag("range"), args(number)), |(min, max)| {
        Rule::Range(min, max)
    })(i)
}

fn length_rule(i: &str) -> IResult<&str, Rule> {
    map(preceded(tag("length"), args(count)), |(min, max)| {
        Rule::Length(min, max)
    })(i)
}

fn one_of_rule(i: &str) -> IResult<&str, Rule> {
    map(
        preceded(
            tag("one_of"),
            delimited(open_paren, separated_list1(comma, literal), close_paren),
        ),
        Rule::OneOf,
    )(i)
}

fn min_rule(i: &str) -> IResult<&str, Rule> {
    map(
        preceded(tag("min"), delimited(open_paren, number, close_paren)),
        Rule::Min,
    )(i)
}

fn max_rule(i: &str) -> IResult<&str, Rule> {
    map(
        preceded(tag("max"), delimited(open_paren, number, close_paren)),
        Rule::Max,
    )(i)
}

pub fn parse_rule(i: &str) -> IResult<&str, Rule> {
    delimited(
        space0,
        alt((
            range_rule,
            length_rule,
            one_of_rule,
            min_rule,
            max_rule,
            value(Rule::Required, tag("required")),
        )),
        space0,
    )(i)
}

/// Parses a whole rule string, rejecting trailing garbage.
pub fn parse_rule_str(source: &str) -> Option<Rule> {
    all_consuming(parse_rule)(source.trim())
        .ok()
        .map(|(_, rule)| rule)
}
