//! Predicate shorthand parser using nom.
//!
//! Turns short expressions (as typed on the command line) into predicates.
//!
//! # Syntax Overview
//!
//! ```text
//! age >= 21                 comparison (=, ==, <>, !=, >, >=, <, <=)
//! name ~ ann                contains search   (~^ prefix, ~$ suffix)
//! role in (admin, 'mod')    IN list           (notin for NOT IN)
//! price between 10 and 20   BETWEEN
//! note is null              IS NULL           (is not null, is empty, is not empty)
//! ```

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, value},
    multi::separated_list0,
    sequence::{delimited, preceded, tuple},
};

use crate::ast::{Comparator, Comparison, Predicate, SearchAnchor, Value};
use crate::error::{FilterError, FilterResult};

/// Parse one predicate expression.
pub fn parse_predicate(input: &str) -> FilterResult<Predicate> {
    let input = input.trim();

    match parse_expr(input) {
        Ok(("", predicate)) => Ok(predicate),
        Ok((remaining, _)) => Err(FilterError::parse(
            input.len() - remaining.len(),
            format!("Unexpected trailing content: '{}'", remaining),
        )),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(FilterError::parse(
            input.len() - e.input.len(),
            format!("Parse failed near '{}'", e.input),
        )),
        Err(nom::Err::Incomplete(_)) => {
            Err(FilterError::parse(input.len(), "Incomplete expression"))
        }
    }
}

/// Parse several expressions; the resulting list is joined with AND.
pub fn parse_predicates<S: AsRef<str>>(inputs: &[S]) -> FilterResult<Vec<Predicate>> {
    inputs.iter().map(|s| parse_predicate(s.as_ref())).collect()
}

/// Everything after the column name.
#[derive(Debug, Clone, PartialEq)]
enum Tail {
    Is { negated: bool, empty: bool },
    In { negated: bool, values: Vec<Value> },
    Between(Value, Value),
    Search(SearchAnchor, String),
    Compare(Comparator, Value),
}

impl Tail {
    fn into_predicate(self, column: &str) -> Predicate {
        let column = column.to_string();
        match self {
            Tail::Is { negated, empty: false } => Predicate::Where(Comparison {
                column,
                comparer: if negated { Comparator::NotEq } else { Comparator::Eq },
                value: Value::Null,
            }),
            Tail::Is { negated: false, empty: true } => Predicate::Empty { column },
            Tail::Is { negated: true, empty: true } => Predicate::Contains { column },
            Tail::In { negated: false, values } => Predicate::In {
                column,
                value: Value::Array(values),
            },
            Tail::In { negated: true, values } => Predicate::NotIn {
                column,
                value: Value::Array(values),
            },
            Tail::Between(a, b) => Predicate::Between { column, a, b },
            Tail::Search(anchor, term) => Predicate::Search {
                column,
                value: Some(term),
                operator: anchor,
            },
            Tail::Compare(comparer, value) => Predicate::Where(Comparison {
                column,
                comparer,
                value,
            }),
        }
    }
}

fn parse_expr(input: &str) -> IResult<&str, Predicate> {
    let (input, column) = parse_column(input)?;
    let (input, _) = multispace0(input)?;
    let (input, tail) = alt((
        parse_is,
        parse_in,
        parse_between,
        parse_search,
        parse_compare,
    ))(input)?;

    Ok((input, tail.into_predicate(column)))
}

/// Column names may be qualified (`u.name`) or carry the language marker (`name§`).
fn parse_column(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.' || c == '§')(input)
}

/// `is [not] null` / `is [not] empty`
fn parse_is(input: &str) -> IResult<&str, Tail> {
    let (input, _) = tag_no_case("is")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, negated) = opt(tuple((tag_no_case("not"), multispace1)))(input)?;
    let (input, empty) = alt((
        value(false, tag_no_case("null")),
        value(true, tag_no_case("empty")),
    ))(input)?;

    Ok((
        input,
        Tail::Is {
            negated: negated.is_some(),
            empty,
        },
    ))
}

/// `in (a, b)` / `notin (a, b)`
fn parse_in(input: &str) -> IResult<&str, Tail> {
    let (input, negated) = alt((
        value(true, tag_no_case("notin")),
        value(false, tag_no_case("in")),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, values) = delimited(
        char('('),
        separated_list0(delimited(multispace0, char(','), multispace0), parse_value),
        preceded(multispace0, char(')')),
    )(input)?;

    Ok((input, Tail::In { negated, values }))
}

/// `between a and b`
fn parse_between(input: &str) -> IResult<&str, Tail> {
    let (input, _) = tag_no_case("between")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, low) = parse_value(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("and")(input)?;
    let (input, high) = parse_value(input)?;

    Ok((input, Tail::Between(low, high)))
}

/// `~ term`, `~^ term` (begins with), `~$ term` (ends with)
fn parse_search(input: &str) -> IResult<&str, Tail> {
    let (input, _) = char('~')(input)?;
    let (input, anchor) = opt(alt((
        value(SearchAnchor::Beg, char('^')),
        value(SearchAnchor::End, char('$')),
    )))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, term) = alt((parse_quoted, map(parse_word, str::to_string)))(input)?;

    Ok((
        input,
        Tail::Search(anchor.unwrap_or(SearchAnchor::Contains), term),
    ))
}

fn parse_compare(input: &str) -> IResult<&str, Tail> {
    let (input, comparer) = alt((
        value(Comparator::Gte, tag(">=")),
        value(Comparator::Lte, tag("<=")),
        value(Comparator::NotEq, tag("<>")),
        value(Comparator::NotEq, tag("!=")),
        value(Comparator::Eq, tag("==")),
        value(Comparator::Gt, char('>')),
        value(Comparator::Lt, char('<')),
        value(Comparator::Eq, char('=')),
    ))(input)?;
    let (input, value) = parse_value(input)?;

    Ok((input, Tail::Compare(comparer, value)))
}

/// A quoted string or a bare word; bare words may be numbers, booleans or null.
fn parse_value(input: &str) -> IResult<&str, Value> {
    let (input, _) = multispace0(input)?;

    alt((map(parse_quoted, Value::String), map(parse_word, word_value)))(input)
}

fn parse_word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '@' | '+'))(
        input,
    )
}

fn word_value(word: &str) -> Value {
    match word.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    let numeric = word
        .trim_start_matches('-')
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit());
    if numeric {
        if let Ok(n) = word.parse::<i64>() {
            return Value::Int(n);
        }
        if let Ok(n) = word.parse::<f64>() {
            return Value::Float(n);
        }
    }
    Value::String(word.to_string())
}

/// Single-quoted string; `''` inside stands for one quote.
fn parse_quoted(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('\'')(input)?;
    let mut out = String::new();

    loop {
        let (r, chunk) = take_while(|c: char| c != '\'')(rest)?;
        out.push_str(chunk);
        let (r, _) = char('\'')(r)?;
        match r.strip_prefix('\'') {
            Some(after) => {
                out.push('\'');
                rest = after;
            }
            None => return Ok((r, out)),
        }
    }
}
