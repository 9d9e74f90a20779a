use lazy_static::lazy_static;
use regex::Regex;

use crate::preprocessor::{apply_rules, compile_rules, unescape, CompiledRule};
use crate::template::RegexRule;
use crate::PromptResult;

lazy_static! {
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref RE_SPACE_BEFORE_PUNCTUATION: Regex = Regex::new(r"\s+([.!?,;:])").unwrap();
    static ref RE_AFTER_COMMA: Regex = Regex::new(r",\s*").unwrap();
}

/// Final cleanup of a resolved pass output.
pub struct Formatter {
    rules: Vec<CompiledRule>,
}

impl Formatter {
    pub fn new(postprocess: &[RegexRule]) -> PromptResult<Self> {
        Ok(Self {
            rules: compile_rules(postprocess, "postprocess")?,
        })
    }

    pub fn format(&self, input: &str) -> String {
        let mut output = self.normalize_spacing(input);

        // template rules
        output = apply_rules(&self.rules, &output);

        unescape(&output)
    }

    fn normalize_spacing(&self, input: &str) -> String {
        let output = RE_WHITESPACE.replace_all(input, " ");
        let output = output.trim().replace(". .", ".").replace(", ,", ",");
        let output = RE_SPACE_BEFORE_PUNCTUATION.replace_all(&output, "$1");
        RE_AFTER_COMMA.replace_all(&output, ", ").into_owned()
    }
}
