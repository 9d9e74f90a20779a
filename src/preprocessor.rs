use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::{Captures, NoExpand, Regex, RegexBuilder};

use crate::template::{DataValue, RegexRule, TemplateData};
use crate::{PromptError, PromptResult};

/// Prefix under which regex captures are exposed, after the `meta_` binding.
pub const CAPTURE_PREFIX: &str = "regex_";

// `&` first on the way in, last on the way out.
const ESCAPES: [(&str, &str); 5] = [
    ("&", "&amp;"),
    ("|", "&pipe;"),
    ("{", "&lbrace;"),
    ("}", "&rbrace;"),
    (",", "&comma;"),
];

lazy_static! {
    static ref GROUP_REFERENCE: Regex = Regex::new(r"\{(\d+)\}").unwrap();
}

/// Replaces characters that carry meaning in templates with entities.
pub fn escape(text: &str) -> String {
    ESCAPES
        .iter()
        .fold(text.to_string(), |acc, (raw, entity)| acc.replace(raw, entity))
}

pub fn unescape(text: &str) -> String {
    ESCAPES
        .iter()
        .rev()
        .fold(text.to_string(), |acc, (raw, entity)| acc.replace(entity, raw))
}

/// A compiled, case-insensitive rewrite rule.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    regex: Regex,
    replacement: String,
}

impl CompiledRule {
    pub fn compile(rule: &RegexRule, stage: &'static str) -> PromptResult<Self> {
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| PromptError::Regex {
                pattern: rule.pattern.clone(),
                stage,
                message: e.to_string(),
            })?;
        Ok(Self {
            regex,
            replacement: rule.replacement.clone(),
        })
    }

    /// `{n}` in the replacement expands to group `n`, or nothing when the
    /// group did not take part in the match. Any other replacement is literal.
    pub fn apply(&self, text: &str) -> String {
        if !GROUP_REFERENCE.is_match(&self.replacement) {
            return self
                .regex
                .replace_all(text, NoExpand(&self.replacement))
                .into_owned();
        }
        self.regex
            .replace_all(text, |caps: &Captures| {
                GROUP_REFERENCE
                    .replace_all(&self.replacement, |group: &Captures| {
                        group[1]
                            .parse::<usize>()
                            .ok()
                            .and_then(|n| caps.get(n))
                            .map(|m| m.as_str().to_string())
                            .unwrap_or_default()
                    })
                    .into_owned()
            })
            .into_owned()
    }
}

pub fn compile_rules(rules: &[RegexRule], stage: &'static str) -> PromptResult<Vec<CompiledRule>> {
    rules.iter().map(|r| CompiledRule::compile(r, stage)).collect()
}

pub fn apply_rules(rules: &[CompiledRule], text: &str) -> String {
    rules
        .iter()
        .fold(text.to_string(), |acc, rule| rule.apply(&acc))
}

/// Preprocess stage of a template: rewrites for the `text` argument and
/// the capture table read from it.
#[derive(Debug)]
pub struct Preprocessor {
    rules: Vec<CompiledRule>,
    captures: Vec<(String, Regex)>,
}

impl Preprocessor {
    pub fn new(templates: &TemplateData) -> PromptResult<Self> {
        let rules = compile_rules(&templates.preprocess, "preprocess")?;
        let mut captures = Vec::with_capacity(templates.regex.len());
        for (field, pattern) in &templates.regex {
            let regex = Regex::new(pattern).map_err(|e| PromptError::Regex {
                pattern: pattern.clone(),
                stage: "regex",
                message: e.to_string(),
            })?;
            captures.push((field.clone(), regex));
        }
        Ok(Self { rules, captures })
    }

    pub fn process_text(&self, text: &str) -> String {
        apply_rules(&self.rules, text)
    }

    /// One entry per capture field, keyed `regex_<field>`.
    ///
    /// The pattern must match at the start of `text`. A single group gives a
    /// string, several groups a list. No match, or no text, gives "".
    /// Captured text is escaped like any other argument.
    pub fn captures(&self, text: Option<&str>) -> BTreeMap<String, DataValue> {
        self.captures
            .iter()
            .map(|(field, regex)| {
                let key = format!("{}{}", CAPTURE_PREFIX, field);
                let value = text
                    .and_then(|t| regex.captures(t))
                    .filter(|caps| caps.get(0).map_or(false, |m| m.start() == 0))
                    .map(|caps| {
                        let groups: Vec<String> = caps
                            .iter()
                            .skip(1)
                            .map(|g| g.map(|m| escape(m.as_str())).unwrap_or_default())
                            .collect();
                        match groups.as_slice() {
                            [single] => DataValue::Text(single.clone()),
                            _ => DataValue::List(groups),
                        }
                    })
                    .unwrap_or_else(|| DataValue::Text(String::new()));
                (key, value)
            })
            .collect()
    }
}
