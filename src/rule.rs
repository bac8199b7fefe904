//! Boolean rules over blackboard variables, used by `expression` conditions.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0, none_of},
    combinator::{all_consuming, map, opt, recognize},
    multi::many0,
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded},
    IResult,
};
use serde_json::Value;
use std::cmp::Ordering;

use crate::{error::RuleError, Blackboard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            _ => return None,
        })
    }

    /// Applies the operator. Equality treats numbers and numeric strings alike;
    /// ordering is only defined between two numbers or two strings.
    pub fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            Self::Eq => loose_eq(lhs, rhs),
            Self::Ne => !loose_eq(lhs, rhs),
            Self::Lt => loose_cmp(lhs, rhs) == Some(Ordering::Less),
            Self::Le => matches!(
                loose_cmp(lhs, rhs),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt => loose_cmp(lhs, rhs) == Some(Ordering::Greater),
            Self::Ge => matches!(
                loose_cmp(lhs, rhs),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// A parsed condition rule.
///
/// ```raw
/// expr    = or
/// or      = and ( "||" and )*
/// and     = unary ( "&&" unary )*
/// unary   = "!" unary | compare
/// compare = operand [ ("==" | "!=" | "<=" | ">=" | "<" | ">") operand ]
/// operand = number | "string" | true | false | null | identifier | "(" expr ")"
/// ```
///
/// ```rust
/// # use behavior_tree_sim::{Blackboard, Rule};
/// let rule = Rule::parse("hp > 20 && !dead").unwrap();
/// let mut bb = Blackboard::new();
/// bb.set("hp", 50);
/// assert!(rule.test(&bb));
/// bb.set("dead", true);
/// assert!(!rule.test(&bb));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Literal(Value),
    Var(String),
    Not(Box<Rule>),
    And(Box<Rule>, Box<Rule>),
    Or(Box<Rule>, Box<Rule>),
    Compare(CompareOp, Box<Rule>, Box<Rule>),
}

impl Rule {
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        match all_consuming(ws(or_expr))(source) {
            Ok((_, rule)) => Ok(rule),
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(RuleError {
                source_text: source.to_owned(),
                rest: e.input.to_owned(),
            }),
            Err(nom::Err::Incomplete(_)) => Err(RuleError {
                source_text: source.to_owned(),
                rest: String::new(),
            }),
        }
    }

    pub fn eval(&self, bb: &Blackboard) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Var(key) => bb.get(key).cloned().unwrap_or(Value::Null),
            Self::Not(rule) => Value::Bool(!rule.test(bb)),
            Self::And(lhs, rhs) => Value::Bool(lhs.test(bb) && rhs.test(bb)),
            Self::Or(lhs, rhs) => Value::Bool(lhs.test(bb) || rhs.test(bb)),
            Self::Compare(op, lhs, rhs) => Value::Bool(op.apply(&lhs.eval(bb), &rhs.eval(bb))),
        }
    }

    pub fn test(&self, bb: &Blackboard) -> bool {
        truthy(&self.eval(bb))
    }
}

/// `null`, `false`, `0` and `""` are false, everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(_), Value::Number(_) | Value::String(_))
        | (Value::String(_), Value::Number(_)) => match (as_number(lhs), as_number(rhs)) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
        _ => lhs == rhs,
    }
}

fn loose_cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            as_number(lhs)?.partial_cmp(&as_number(rhs)?)
        }
        _ => None,
    }
}

fn ws<'src, O>(
    f: impl FnMut(&'src str) -> IResult<&'src str, O>,
) -> impl FnMut(&'src str) -> IResult<&'src str, O> {
    delimited(multispace0, f, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn var_or_keyword(i: &str) -> IResult<&str, Rule> {
    let (i, name) = identifier(i)?;
    let rule = match name {
        "true" => Rule::Literal(Value::Bool(true)),
        "false" => Rule::Literal(Value::Bool(false)),
        "null" => Rule::Literal(Value::Null),
        _ => Rule::Var(name.to_owned()),
    };
    Ok((i, rule))
}

fn num_literal(i: &str) -> IResult<&str, Rule> {
    let (r, text) = recognize_float(i)?;
    let value = if let Ok(int) = text.parse::<i64>() {
        Value::from(int)
    } else {
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| {
                nom::Err::Failure(nom::error::Error::new(i, nom::error::ErrorKind::Float))
            })?
    };
    Ok((r, Rule::Literal(value)))
}

fn str_literal(i: &str) -> IResult<&str, Rule> {
    let (r, val) = delimited(char('"'), many0(none_of("\"")), char('"'))(i)?;
    Ok((
        r,
        Rule::Literal(Value::String(
            val.iter()
                .collect::<String>()
                .replace("\\\\", "\\")
                .replace("\\n", "\n"),
        )),
    ))
}

fn operand(i: &str) -> IResult<&str, Rule> {
    ws(alt((
        num_literal,
        str_literal,
        delimited(char('('), or_expr, char(')')),
        var_or_keyword,
    )))(i)
}

fn compare_op(i: &str) -> IResult<&str, CompareOp> {
    let (i, token) = alt((
        tag("=="),
        tag("!="),
        tag("<="),
        tag(">="),
        tag("<"),
        tag(">"),
    ))(i)?;
    // Every token above is known to `from_token`
    let op = CompareOp::from_token(token).ok_or_else(|| {
        nom::Err::Failure(nom::error::Error::new(i, nom::error::ErrorKind::Tag))
    })?;
    Ok((i, op))
}

fn compare(i: &str) -> IResult<&str, Rule> {
    let (i, lhs) = operand(i)?;
    let (i, rhs) = opt(pair(ws(compare_op), operand))(i)?;
    Ok((
        i,
        match rhs {
            Some((op, rhs)) => Rule::Compare(op, Box::new(lhs), Box::new(rhs)),
            None => lhs,
        },
    ))
}

fn unary(i: &str) -> IResult<&str, Rule> {
    alt((
        map(preceded(ws(char('!')), unary), |rule| {
            Rule::Not(Box::new(rule))
        }),
        compare,
    ))(i)
}

fn and_expr(i: &str) -> IResult<&str, Rule> {
    let (i, first) = unary(i)?;
    let (i, rest) = many0(preceded(ws(tag("&&")), unary))(i)?;
    Ok((
        i,
        rest.into_iter()
            .fold(first, |acc, rule| Rule::And(Box::new(acc), Box::new(rule))),
    ))
}

fn or_expr(i: &str) -> IResult<&str, Rule> {
    let (i, first) = and_expr(i)?;
    let (i, rest) = many0(preceded(ws(tag("||")), and_expr))(i)?;
    Ok((
        i,
        rest.into_iter()
            .fold(first, |acc, rule| Rule::Or(Box::new(acc), Box::new(rule))),
    ))
}
