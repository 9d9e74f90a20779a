//! Bracket scanning for template text.
//!
//! The scanner never interprets operators. It only answers three questions:
//! where the next `{...}` expression is, whether a string is balanced, and
//! where an argument list may be split without cutting a nested expression.

use crate::{PromptError, PromptResult};

const CONTEXT_RADIUS: usize = 10;

/// Byte range of one bracket expression, braces included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn inner<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start + 1..self.end - 1]
    }
}

/// Returns the span opened by the first `{` and closed by its matching `}`.
///
/// `None` when the text has no complete expression.
pub fn scan(text: &str) -> Option<Span> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(Span {
                        start,
                        end: start + offset + 1,
                    });
                }
            }
            _ => {}
        }
    }
    None
}

/// Depth-counted balance check over the whole string.
pub fn validate(text: &str) -> PromptResult<()> {
    let chars: Vec<char> = text.chars().collect();
    let mut open = Vec::new();
    for (idx, c) in chars.iter().enumerate() {
        match c {
            '{' => open.push(idx),
            '}' => {
                if open.pop().is_none() {
                    return Err(PromptError::UnbalancedBracket {
                        bracket: "closing",
                        symbol: '}',
                        context: context_window(&chars, idx),
                    });
                }
            }
            _ => {}
        }
    }
    if let Some(&idx) = open.last() {
        return Err(PromptError::UnbalancedBracket {
            bracket: "opening",
            symbol: '{',
            context: context_window(&chars, idx),
        });
    }
    Ok(())
}

fn context_window(chars: &[char], idx: usize) -> String {
    let start = idx.saturating_sub(CONTEXT_RADIUS);
    let end = (idx + CONTEXT_RADIUS).min(chars.len());
    chars[start..end].iter().collect()
}

/// Splits on `sep` only where no bracket expression is open.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    splitn_top_level(text, sep, usize::MAX)
}

/// Like [`split_top_level`] but yields at most `limit` parts; the last part
/// keeps the remainder verbatim.
pub fn splitn_top_level(text: &str, sep: char, limit: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    if limit == 0 {
        return parts;
    }
    let mut depth = 0usize;
    let mut last = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 && parts.len() + 1 < limit => {
                parts.push(&text[last..idx]);
                last = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[last..]);
    parts
}

/// Splits at the first top-level `sep`.
pub fn split_once_top_level(text: &str, sep: char) -> Option<(&str, &str)> {
    match splitn_top_level(text, sep, 2).as_slice() {
        [head, tail] => Some((head, tail)),
        _ => None,
    }
}

pub fn contains_top_level(text: &str, sep: char) -> bool {
    split_once_top_level(text, sep).is_some()
}
