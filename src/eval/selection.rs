//! Selection strategies over the data map.
//!
//! Every strategy picks a raw value first and resolves it afterwards, so
//! nested expressions inside the chosen value see the registers as they are
//! after the pick was recorded.

use rand::seq::SliceRandom;
use tracing::debug;

use super::evaluator::Evaluator;
use crate::template::DataValue;
use crate::{PromptError, PromptResult};

impl Evaluator<'_> {
    /// Uniform pick. A name containing `{` is resolved as an expression.
    pub fn select_normal(&mut self, name: &str) -> PromptResult<String> {
        if name.contains('{') {
            return self.resolve(name);
        }
        let raw = self.ctx.pick(name)?;
        self.resolve(&raw)
    }

    /// Scoped exclusive pick: never repeats a value for `prefix + name`
    /// within the pass until every option has been used.
    pub fn select_exclusive(&mut self, name: &str, prefix: &str) -> PromptResult<String> {
        let Some(options) = self.exclusive_options(name)? else {
            return self.select_normal(name);
        };
        let slot = format!("{}{}", prefix, name);
        let choice = self
            .ctx
            .usage
            .draw(&slot, &options, &mut self.ctx.rng)
            .ok_or_else(|| PromptError::invalid_data(name, "must be a non-empty list."))?;
        self.resolve(&choice)
    }

    /// Like [`Self::select_exclusive`] but recorded in the shared ledger, so
    /// the exclusion spans generations.
    pub fn select_global(&mut self, name: &str, prefix: &str) -> PromptResult<String> {
        let Some(options) = self.exclusive_options(name)? else {
            return self.select_normal(name);
        };
        let slot = format!("{}{}", prefix, name);
        let choice = self
            .ctx
            .ledger
            .draw(&slot, &options, &mut self.ctx.rng)
            .ok_or_else(|| PromptError::invalid_data(name, "must be a non-empty list."))?;
        debug!("Global draw for '{}': {}", slot, choice);
        self.resolve(&choice)
    }

    // `None` for plain strings and tracked values, which fall back to a
    // normal pick.
    fn exclusive_options(&self, name: &str) -> PromptResult<Option<Vec<String>>> {
        match self.ctx.data.get(name) {
            None if self.ctx.tracked.contains_key(name) => Ok(None),
            None => Err(PromptError::MissingKey(name.to_string())),
            Some(DataValue::Text(_)) => Ok(None),
            Some(DataValue::List(options)) if !options.is_empty() => Ok(Some(options.clone())),
            Some(_) => Err(PromptError::invalid_data(name, "must be a non-empty list.")),
        }
    }

    /// Memoized pick, fixed per `prefix + name` for the rest of the pass.
    pub fn select_static(&mut self, name: &str, prefix: &str) -> PromptResult<String> {
        let slot = format!("{}{}", prefix, name);
        if let Some(value) = self.ctx.statics.get(&slot) {
            return Ok(value.clone());
        }
        let value = self.select_normal(name)?;
        Ok(self.ctx.statics.entry(slot).or_insert(value).clone())
    }

    pub fn select_index(
        &mut self,
        name: &str,
        index: usize,
        default: &str,
    ) -> PromptResult<String> {
        let options = self.ctx.options(name)?;
        match options.get(index) {
            Some(choice) => self.resolve(choice),
            None => self.resolve(default),
        }
    }

    /// Pick from `name` after removing every value named by `exclude`.
    ///
    /// `exclude` is a comma list when it contains `,`, an expression whose
    /// result is read as a comma list when it contains `{`, and otherwise the
    /// name of another data key. Falls back to `default` when nothing is left.
    pub fn select_except(
        &mut self,
        name: &str,
        exclude: &str,
        default: &str,
    ) -> PromptResult<String> {
        let mut options = Vec::new();
        for option in self.ctx.options(name)? {
            options.push(self.resolve(&option)?.trim().to_string());
        }

        let exclusions: Vec<String> = if exclude.contains('{') {
            comma_list(&self.resolve(exclude)?)
        } else if exclude.contains(',') {
            comma_list(exclude)
        } else {
            let mut values = Vec::new();
            for value in self.ctx.options(exclude.trim())? {
                values.push(self.resolve(&value)?.trim().to_string());
            }
            values
        };

        let remaining: Vec<&String> = options
            .iter()
            .filter(|option| !exclusions.iter().any(|e| !e.is_empty() && e == *option))
            .collect();
        match remaining.choose(&mut self.ctx.rng) {
            Some(choice) => Ok(choice.to_string()),
            None => self.resolve(default),
        }
    }

    /// Anonymous or explicit one-of list; options are trimmed before the pick.
    pub fn select_one_of(&mut self, options: &[&str]) -> PromptResult<String> {
        let choice = options
            .choose(&mut self.ctx.rng)
            .map(|option| option.trim().to_string())
            .unwrap_or_default();
        self.resolve(&choice)
    }
}

pub(crate) fn comma_list(text: &str) -> Vec<String> {
    text.split(',').map(|v| v.trim().to_string()).collect()
}
