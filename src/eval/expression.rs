use std::fmt;

use rand::Rng;
use tracing::debug;

use super::evaluator::Evaluator;
use super::operator::{Comparison, Operator};
use super::selection::comma_list;
use crate::scanner::{contains_top_level, split_once_top_level, split_top_level, splitn_top_level};
use crate::{PromptError, PromptResult};

const DEFAULT_CHANCE: usize = 50;

/// Numeric operand of `+`, `-`, `inc` and `dec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn parse(text: &str) -> Option<Number> {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            return Some(Number::Integer(i));
        }
        text.parse::<f64>().ok().filter(|f| f.is_finite()).map(Number::Float)
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

fn eval_add(left: Number, right: Number) -> Number {
    match (left, right) {
        (Number::Integer(l), Number::Integer(r)) => match l.checked_add(r) {
            Some(sum) => Number::Integer(sum),
            None => Number::Float(l as f64 + r as f64),
        },
        (l, r) => Number::Float(l.as_f64() + r.as_f64()),
    }
}

fn eval_subtract(left: Number, right: Number) -> Number {
    match (left, right) {
        (Number::Integer(l), Number::Integer(r)) => match l.checked_sub(r) {
            Some(diff) => Number::Integer(diff),
            None => Number::Float(l as f64 - r as f64),
        },
        (l, r) => Number::Float(l.as_f64() - r.as_f64()),
    }
}

/// Splits off the operator head. `:=` is recognised even though it contains
/// the separator itself.
fn split_head(content: &str) -> Option<(String, &str)> {
    let (head, tail) = split_once_top_level(content, ':')?;
    if let Some(rest) = tail.strip_prefix("=:") {
        if head.trim().is_empty() || head.trim_end().ends_with(',') {
            return Some((format!("{}:=", head.trim()), rest));
        }
    }
    Some((head.to_string(), tail))
}

impl Evaluator<'_> {
    /// Routes the content of one bracket expression to its handler.
    pub(crate) fn eval_expression(&mut self, content: &str) -> PromptResult<String> {
        let Some((head, argument)) = split_head(content) else {
            if contains_top_level(content, '|') {
                return self.select_one_of(&split_top_level(content, '|'));
            }
            return self.eval_lookup(content.trim());
        };
        let head = if head.contains('{') {
            self.resolve(&head)?
        } else {
            head
        };
        let operator: Operator = head.trim().parse()?;
        debug!("{} operator on '{}'", operator.label(), argument);
        self.eval_operator(operator, argument)
    }

    fn eval_lookup(&mut self, key: &str) -> PromptResult<String> {
        if let Some(stripped) = key.strip_suffix('?') {
            if !stripped.is_empty() && !self.ctx.contains_key(key) {
                return self.eval_maybe(None, stripped);
            }
        }
        self.select_normal(key)
    }

    fn eval_operator(&mut self, operator: Operator, argument: &str) -> PromptResult<String> {
        match operator {
            Operator::OneOf => self.select_one_of(&split_top_level(argument, '|')),
            Operator::Exclusive { prefix } => self.select_exclusive(argument.trim(), &prefix),
            Operator::GlobalExclusive { prefix } => self.select_global(argument.trim(), &prefix),
            Operator::Static { prefix } => self.select_static(argument.trim(), &prefix),
            Operator::Literal => eval_literal(argument),
            Operator::Equals { negated } => self.eval_equals(argument, negated),
            Operator::Compare(comparison) => self.eval_compare(argument, comparison),
            Operator::In { negated } => self.eval_in(argument, negated),
            Operator::Has { negated } => self.eval_has(argument, negated),
            Operator::Case => self.eval_case(argument),
            Operator::Eval => {
                let key = self.resolve(argument)?;
                self.select_normal(key.trim())
            }
            Operator::Coalesce => self.eval_coalesce(argument),
            Operator::Index(index) => {
                let parts = splitn_top_level(argument, '|', 2);
                let default = parts.get(1).copied().unwrap_or_default();
                self.select_index(parts[0].trim(), index, default)
            }
            Operator::Except => {
                let parts = fields(argument, 2, 3, "Except", "key|exclude|default")?;
                let default = parts.get(2).copied().unwrap_or_default();
                self.select_except(parts[0].trim(), parts[1], default)
            }
            Operator::Maybe { chance } => self.eval_maybe(chance, argument),
            Operator::Repeat => self.eval_repeat(argument),
            Operator::Store { prefix } => {
                let parts = fields(argument, 2, 2, "Store", "key|text")?;
                let value = self.resolve(parts[1])?;
                let key = format!("{}{}", prefix, parts[0].trim());
                self.ctx.store_static(key, value.trim().to_string())?;
                Ok(String::new())
            }
            Operator::Track => {
                let parts = fields(argument, 2, 2, "Track", "name|text")?;
                let value = self.resolve(parts[1])?.trim().to_string();
                self.ctx.track(parts[0].trim(), value.clone())?;
                Ok(value)
            }
            Operator::Optional => {
                let parts = fields(argument, 2, 2, "Optional", "key|default")?;
                let key = parts[0].trim();
                if self.ctx.contains_key(key) {
                    self.select_normal(key)
                } else {
                    self.resolve(parts[1])
                }
            }
            Operator::Error => {
                let parts = fields(argument, 2, 2, "Error", "key|value")?;
                let value = self.select_normal(parts[0].trim())?.trim().to_string();
                let expected = parts[1].trim();
                if value == expected {
                    return Err(PromptError::Triggered {
                        value,
                        expected: expected.to_string(),
                    });
                }
                Ok(String::new())
            }
            Operator::Ignore => {
                self.resolve(argument)?;
                Ok(String::new())
            }
            Operator::Comment => Ok(String::new()),
            Operator::Cond => self.eval_cond(argument),
            Operator::Echo => {
                let text = self.resolve(argument)?;
                let echo = &self.ctx.config.echo;
                self.ctx.echo.emit(&echo.begin);
                self.ctx.echo.emit(&text);
                self.ctx.echo.emit(&echo.end);
                Ok(String::new())
            }
            Operator::Hook => {
                let parts = fields(argument, 2, 2, "Hook", "name|text")?;
                let name = parts[0].trim();
                let hook = self
                    .ctx
                    .hooks
                    .get(name)
                    .cloned()
                    .ok_or_else(|| PromptError::HookNotFound(name.to_string()))?;
                let text = self.resolve(parts[1])?;
                Ok(hook(&text))
            }
            Operator::Increment => self.eval_counter(argument, 1),
            Operator::Decrement => self.eval_counter(argument, -1),
            Operator::Add => {
                let (left, right) = self.numeric_operands(argument, "Sum")?;
                Ok(eval_add(left, right).to_string())
            }
            Operator::Subtract => {
                let (left, right) = self.numeric_operands(argument, "Subtract")?;
                Ok(eval_subtract(left, right).to_string())
            }
        }
    }

    // Resolves a literal argument when it contains an expression.
    fn literal(&mut self, raw: &str) -> PromptResult<String> {
        Ok(self.resolve(raw)?.trim().to_string())
    }

    fn branch(&mut self, parts: &[&str], index: usize) -> PromptResult<String> {
        match parts.get(index) {
            Some(text) => self.resolve(text),
            None => Ok(String::new()),
        }
    }

    fn eval_equals(&mut self, argument: &str, negated: bool) -> PromptResult<String> {
        let parts = fields(argument, 2, 4, "Equality", "key|value|true|false")?;
        let value = self.select_normal(parts[0].trim())?;
        let expected = self.literal(parts[1])?;
        let holds = (value.trim() == expected) != negated;
        self.branch(&parts, if holds { 2 } else { 3 })
    }

    fn eval_compare(&mut self, argument: &str, comparison: Comparison) -> PromptResult<String> {
        let parts = fields(argument, 2, 4, "Quantitative", "key|value|true|false")?;
        let value = self.select_normal(parts[0].trim())?;
        let expected = self.literal(parts[1])?;
        let (left, right) = match (value.trim().parse::<f64>(), expected.parse::<f64>()) {
            (Ok(l), Ok(r)) => (l, r),
            _ => {
                return Err(PromptError::NonNumeric {
                    left: value.trim().to_string(),
                    right: expected,
                })
            }
        };
        let holds = comparison.holds(left, right);
        self.branch(&parts, if holds { 2 } else { 3 })
    }

    fn eval_in(&mut self, argument: &str, negated: bool) -> PromptResult<String> {
        let parts = fields(argument, 2, 4, "In", "key|list|true|false")?;
        let value = self.select_normal(parts[0].trim())?;
        let list = comma_list(&self.literal(parts[1])?);
        let holds = list.iter().any(|v| v == value.trim()) != negated;
        self.branch(&parts, if holds { 2 } else { 3 })
    }

    fn eval_has(&mut self, argument: &str, negated: bool) -> PromptResult<String> {
        let parts = fields(argument, 2, 4, "Has", "key|substrings|true|false")?;
        let value = self.select_normal(parts[0].trim())?;
        let needles = comma_list(&self.literal(parts[1])?);
        let holds = needles.iter().all(|n| value.contains(n.as_str())) != negated;
        self.branch(&parts, if holds { 2 } else { 3 })
    }

    fn eval_case(&mut self, argument: &str) -> PromptResult<String> {
        let parts = splitn_top_level(argument, '|', 4);
        let value = self.select_normal(parts[0].trim())?;
        let prefix = match parts.get(1) {
            Some(prefix) => self.resolve(prefix)?,
            None => String::new(),
        };
        let cases = match parts.get(3) {
            Some(list) => comma_list(&self.literal(list)?),
            None => Vec::new(),
        };
        match cases.iter().find(|c| !c.is_empty() && value.contains(c.as_str())) {
            Some(case) => Ok(format!("{}{}", prefix, case)),
            None => self.branch(&parts, 2),
        }
    }

    fn eval_coalesce(&mut self, argument: &str) -> PromptResult<String> {
        let parts = split_top_level(argument, '|');
        if parts.len() < 2 {
            return Err(arity("Coalesce", "value1|value2|...", argument));
        }
        for part in parts {
            let value = self.resolve(part)?;
            if !value.trim().is_empty() {
                return Ok(value.trim().to_string());
            }
        }
        Ok(String::new())
    }

    /// Rolls first and only then resolves, so a miss leaves no side effects.
    pub(crate) fn eval_maybe(
        &mut self,
        chance: Option<usize>,
        argument: &str,
    ) -> PromptResult<String> {
        let (chance, target) = match (chance, split_once_top_level(argument, '|')) {
            (None, Some((chance, target))) => {
                let chance = chance.trim().parse::<usize>().map_err(|_| {
                    PromptError::syntax(format!(
                        "Chance value must be an integer: '{}'",
                        chance.trim()
                    ))
                })?;
                (chance, target.trim())
            }
            (chance, _) => (chance.unwrap_or(DEFAULT_CHANCE), argument.trim()),
        };
        let roll = self.ctx.rng.gen_range(1..=100);
        if roll > chance {
            return Ok(String::new());
        }
        self.select_normal(target)
    }

    fn eval_repeat(&mut self, argument: &str) -> PromptResult<String> {
        let parts = fields(argument, 2, 2, "Repeat", "count|text")?;
        let count = parts[0].trim().parse::<usize>().map_err(|_| {
            PromptError::syntax(format!(
                "Repeat count must be an integer: '{}'",
                parts[0].trim()
            ))
        })?;
        let max = self.ctx.config.max_repeat;
        if count > max {
            return Err(PromptError::ResourceExhausted(format!(
                "Repeat operator count exceeds maximum of {}.",
                max
            )));
        }
        let mut output = String::new();
        for _ in 0..count {
            output.push_str(&self.resolve(parts[1])?);
        }
        Ok(output)
    }

    fn eval_cond(&mut self, argument: &str) -> PromptResult<String> {
        let parts = fields(argument, 3, 3, "Conditional", "key|value|text")?;
        if parts[1].contains('{') || parts[1].contains('}') {
            return Err(PromptError::syntax(format!(
                "Conditional operator value cannot contain '{{' characters: '{}'",
                argument
            )));
        }
        let value = self.select_normal(parts[0].trim())?;
        if value.trim() == parts[1].trim() {
            self.resolve(parts[2])
        } else {
            Ok(String::new())
        }
    }

    fn eval_counter(&mut self, argument: &str, delta: i64) -> PromptResult<String> {
        let name = self.literal(argument)?;
        let current = match self.ctx.statics.get(&name) {
            Some(value) => value.trim().parse::<i64>().map_err(|_| PromptError::NonNumeric {
                left: value.clone(),
                right: delta.to_string(),
            })?,
            None => 0,
        };
        let next = current.saturating_add(delta).to_string();
        self.ctx.store_static(name, next.clone())?;
        Ok(next)
    }

    fn numeric_operands(
        &mut self,
        argument: &str,
        operator: &'static str,
    ) -> PromptResult<(Number, Number)> {
        let parts = fields(argument, 2, 2, operator, "left|right")?;
        let left = self.literal(parts[0])?;
        let right = self.literal(parts[1])?;
        match (Number::parse(&left), Number::parse(&right)) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(PromptError::NonNumeric { left, right }),
        }
    }
}

fn eval_literal(argument: &str) -> PromptResult<String> {
    if argument.contains('{') || argument.contains('}') {
        return Err(PromptError::syntax(format!(
            "Literal operator '#' cannot contain '{{' or '}}' characters: '{}'",
            argument
        )));
    }
    Ok(argument.to_string())
}

/// Splits `argument` on top-level `|` into at most `max` fields, the last one
/// keeping any remaining separators.
fn fields<'s>(
    argument: &'s str,
    min: usize,
    max: usize,
    operator: &'static str,
    format: &'static str,
) -> PromptResult<Vec<&'s str>> {
    let parts = splitn_top_level(argument, '|', max);
    if parts.len() < min {
        return Err(arity(operator, format, argument));
    }
    Ok(parts)
}

fn arity(operator: &'static str, format: &'static str, argument: &str) -> PromptError {
    PromptError::Arity {
        operator,
        format,
        argument: argument.to_string(),
    }
}
