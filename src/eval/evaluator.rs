use std::collections::BTreeMap;

use tracing::trace;

use super::context::EvalContext;
use crate::{scanner, PromptResult};

const COMMENT_MARKERS: [&str; 2] = ["comment:", "//:"];

/// Recursive resolver for one generation pass.
pub struct Evaluator<'a> {
    pub(crate) ctx: EvalContext<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: EvalContext<'a>) -> Self {
        Self { ctx }
    }

    /// Resolves every bracket expression in `text`, left to right.
    ///
    /// Each expression's value is trimmed and spliced in place of its span.
    /// The spliced value is scanned again, so an expression produced by a
    /// hook is resolved as well. Text without brackets is returned as is.
    pub fn resolve(&mut self, text: &str) -> PromptResult<String> {
        if !text.contains('{') {
            return Ok(text.to_string());
        }
        self.ctx.enter()?;
        let resolved = self.resolve_spans(text);
        self.ctx.leave();
        resolved
    }

    fn resolve_spans(&mut self, text: &str) -> PromptResult<String> {
        let mut working = text.to_string();
        let mut cursor = 0;
        while let Some(span) = scanner::scan(&working[cursor..]) {
            self.ctx.step()?;
            let start = cursor + span.start;
            let end = cursor + span.end;
            let inner = span.inner(&working[cursor..]).to_string();
            let value = self.resolve_expression(&inner)?;
            trace!("{{{}}} -> {:?}", inner, value);
            working.replace_range(start..end, value.trim());
            cursor = start;
        }
        Ok(working)
    }

    /// Evaluates the content of one bracket expression, braces stripped.
    pub fn resolve_expression(&mut self, content: &str) -> PromptResult<String> {
        if COMMENT_MARKERS.iter().any(|m| content.starts_with(m)) {
            return Ok(String::new());
        }
        self.eval_expression(content)
    }

    pub fn context(&self) -> &EvalContext<'a> {
        &self.ctx
    }

    pub fn into_statics(self) -> BTreeMap<String, String> {
        self.ctx.into_statics()
    }
}
