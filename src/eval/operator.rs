use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt},
    sequence::{pair, separated_pair},
    IResult,
};

use crate::{PromptError, PromptResult};

/// Fixed operator spellings. Every alias maps onto one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::EnumIter)]
pub enum Keyword {
    #[strum(
        to_string = "one_of",
        serialize = "choice",
        serialize = "select",
        serialize = "any",
        serialize = "any_of",
        serialize = "pick_one"
    )]
    OneOf,
    #[strum(to_string = "#")]
    Literal,
    #[strum(to_string = "==", serialize = "=", serialize = "equals", serialize = "eq")]
    Equals,
    #[strum(
        to_string = "!=",
        serialize = "not_equals",
        serialize = "neq",
        serialize = "<>"
    )]
    NotEquals,
    #[strum(to_string = ">", serialize = "gt")]
    Greater,
    #[strum(to_string = "<", serialize = "lt")]
    Less,
    #[strum(to_string = ">=", serialize = "gte")]
    GreaterEqual,
    #[strum(to_string = "<=", serialize = "lte")]
    LessEqual,
    #[strum(to_string = "in")]
    In,
    #[strum(to_string = "not_in")]
    NotIn,
    #[strum(to_string = "has")]
    Has,
    #[strum(to_string = "not_has")]
    NotHas,
    #[strum(to_string = "case")]
    Case,
    #[strum(to_string = "*")]
    Eval,
    #[strum(to_string = "!")]
    Coalesce,
    #[strum(to_string = "^")]
    Except,
    #[strum(to_string = "maybe", serialize = "?")]
    Maybe,
    #[strum(to_string = "repeat", serialize = "x")]
    Repeat,
    #[strum(to_string = "set", serialize = "store", serialize = ":=")]
    Store,
    #[strum(to_string = "track", serialize = "tk")]
    Track,
    #[strum(to_string = "optional", serialize = "opt")]
    Optional,
    #[strum(to_string = "error")]
    Error,
    #[strum(to_string = "ignore", serialize = "ign", serialize = "empty")]
    Ignore,
    #[strum(to_string = "comment", serialize = "//")]
    Comment,
    #[strum(to_string = "cond", serialize = "if")]
    Cond,
    #[strum(to_string = "echo", serialize = "print")]
    Echo,
    #[strum(to_string = "hook")]
    Hook,
    #[strum(to_string = "inc")]
    Increment,
    #[strum(to_string = "dec")]
    Decrement,
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

impl Comparison {
    pub fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Greater => left > right,
            Comparison::Less => left < right,
            Comparison::GreaterEqual => left >= right,
            Comparison::LessEqual => left <= right,
        }
    }
}

/// A parsed operator head, the part of an expression before the first `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    OneOf,
    Exclusive { prefix: String },
    GlobalExclusive { prefix: String },
    Static { prefix: String },
    Literal,
    Equals { negated: bool },
    Compare(Comparison),
    In { negated: bool },
    Has { negated: bool },
    Case,
    Eval,
    Coalesce,
    Index(usize),
    Except,
    Maybe { chance: Option<usize> },
    Repeat,
    Store { prefix: String },
    Track,
    Optional,
    Error,
    Ignore,
    Comment,
    Cond,
    Echo,
    Hook,
    Increment,
    Decrement,
    Add,
    Subtract,
}

impl From<Keyword> for Operator {
    fn from(keyword: Keyword) -> Self {
        match keyword {
            Keyword::OneOf => Operator::OneOf,
            Keyword::Literal => Operator::Literal,
            Keyword::Equals => Operator::Equals { negated: false },
            Keyword::NotEquals => Operator::Equals { negated: true },
            Keyword::Greater => Operator::Compare(Comparison::Greater),
            Keyword::Less => Operator::Compare(Comparison::Less),
            Keyword::GreaterEqual => Operator::Compare(Comparison::GreaterEqual),
            Keyword::LessEqual => Operator::Compare(Comparison::LessEqual),
            Keyword::In => Operator::In { negated: false },
            Keyword::NotIn => Operator::In { negated: true },
            Keyword::Has => Operator::Has { negated: false },
            Keyword::NotHas => Operator::Has { negated: true },
            Keyword::Case => Operator::Case,
            Keyword::Eval => Operator::Eval,
            Keyword::Coalesce => Operator::Coalesce,
            Keyword::Except => Operator::Except,
            Keyword::Maybe => Operator::Maybe { chance: None },
            Keyword::Repeat => Operator::Repeat,
            Keyword::Store => Operator::Store {
                prefix: String::new(),
            },
            Keyword::Track => Operator::Track,
            Keyword::Optional => Operator::Optional,
            Keyword::Error => Operator::Error,
            Keyword::Ignore => Operator::Ignore,
            Keyword::Comment => Operator::Comment,
            Keyword::Cond => Operator::Cond,
            Keyword::Echo => Operator::Echo,
            Keyword::Hook => Operator::Hook,
            Keyword::Increment => Operator::Increment,
            Keyword::Decrement => Operator::Decrement,
            Keyword::Add => Operator::Add,
            Keyword::Subtract => Operator::Subtract,
        }
    }
}

impl FromStr for Operator {
    type Err = PromptError;

    fn from_str(head: &str) -> PromptResult<Self> {
        if let Ok(keyword) = Keyword::from_str(head) {
            return Ok(keyword.into());
        }
        if let Ok((_, operator)) = parse_parametric(head) {
            return Ok(operator);
        }
        if let Some(prefix) = head.strip_suffix("@@") {
            return Ok(Operator::GlobalExclusive {
                prefix: prefix.to_string(),
            });
        }
        if let Some(prefix) = head.strip_suffix('@') {
            return Ok(Operator::Exclusive {
                prefix: prefix.to_string(),
            });
        }
        if let Some(prefix) = head.strip_suffix('$') {
            return Ok(Operator::Static {
                prefix: prefix.to_string(),
            });
        }
        if head.ends_with('?') {
            return Ok(Operator::Maybe { chance: None });
        }
        Err(PromptError::UnknownOperator(head.to_string()))
    }
}

impl Operator {
    /// Human readable name used in arity errors.
    pub fn label(&self) -> &'static str {
        match self {
            Operator::OneOf => "One-of",
            Operator::Exclusive { .. } => "Exclusive",
            Operator::GlobalExclusive { .. } => "Global exclusive",
            Operator::Static { .. } => "Static",
            Operator::Literal => "Literal",
            Operator::Equals { .. } => "Equality",
            Operator::Compare(_) => "Quantitative",
            Operator::In { .. } => "In",
            Operator::Has { .. } => "Has",
            Operator::Case => "Case",
            Operator::Eval => "Eval",
            Operator::Coalesce => "Coalesce",
            Operator::Index(_) => "Index",
            Operator::Except => "Except",
            Operator::Maybe { .. } => "Maybe",
            Operator::Repeat => "Repeat",
            Operator::Store { .. } => "Store",
            Operator::Track => "Track",
            Operator::Optional => "Optional",
            Operator::Error => "Error",
            Operator::Ignore => "Ignore",
            Operator::Comment => "Comment",
            Operator::Cond => "Conditional",
            Operator::Echo => "Echo",
            Operator::Hook => "Hook",
            Operator::Increment => "Increment",
            Operator::Decrement => "Decrement",
            Operator::Add => "Sum",
            Operator::Subtract => "Subtract",
        }
    }
}

// `<int>` index, `<int>?` chance, `<prefix>,set` scoped store
fn parse_parametric(input: &str) -> IResult<&str, Operator> {
    all_consuming(alt((parse_numeric, parse_prefixed_store)))(input)
}

fn parse_numeric(input: &str) -> IResult<&str, Operator> {
    map(
        pair(map_res(digit1, str::parse::<usize>), opt(char('?'))),
        |(number, question)| match question {
            Some(_) => Operator::Maybe {
                chance: Some(number),
            },
            None => Operator::Index(number),
        },
    )(input)
}

fn parse_prefixed_store(input: &str) -> IResult<&str, Operator> {
    map(
        separated_pair(
            take_till(|c: char| c == ','),
            char(','),
            alt((tag("set"), tag("store"), tag(":="))),
        ),
        |(prefix, _): (&str, &str)| Operator::Store {
            prefix: prefix.to_string(),
        },
    )(input)
}
