use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::hooks::{EchoSink, Hooks};
use super::ledger::{GlobalLedger, UsageLedger};
use crate::config::GeneratorConfig;
use crate::template::DataValue;
use crate::{PromptError, PromptResult};

pub const TRACK_PREFIX: &str = "track_";

/// Key prefixes no operator may write.
const RESERVED_STATE_PREFIXES: [&str; 3] = ["meta_", "track_", "regex_"];

/// Mutable state of one generation pass.
///
/// Created fresh for every pass. Only `statics` leaves it, as the snapshot
/// exported with the result record.
pub struct EvalContext<'a> {
    pub(crate) data: BTreeMap<String, DataValue>,
    pub(crate) statics: BTreeMap<String, String>,
    pub(crate) usage: UsageLedger,
    pub(crate) tracked: BTreeMap<String, String>,
    pub(crate) hooks: &'a Hooks,
    pub(crate) ledger: &'a GlobalLedger,
    pub(crate) echo: &'a dyn EchoSink,
    pub(crate) config: &'a GeneratorConfig,
    pub(crate) rng: StdRng,
    depth: usize,
    steps: usize,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        data: BTreeMap<String, DataValue>,
        rng: StdRng,
        hooks: &'a Hooks,
        ledger: &'a GlobalLedger,
        echo: &'a dyn EchoSink,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self {
            data,
            statics: BTreeMap::new(),
            usage: UsageLedger::new(),
            tracked: BTreeMap::new(),
            hooks,
            ledger,
            echo,
            config,
            rng,
            depth: 0,
            steps: 0,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key) || self.tracked.contains_key(key)
    }

    /// Raw value for `key`: the string itself, or one uniform pick from a list.
    /// The result is not resolved.
    pub(crate) fn pick(&mut self, key: &str) -> PromptResult<String> {
        match self.data.get(key) {
            Some(DataValue::Text(text)) => Ok(text.clone()),
            Some(DataValue::List(options)) => options
                .choose(&mut self.rng)
                .cloned()
                .ok_or_else(|| PromptError::invalid_data(key, "must be a non-empty list.")),
            Some(DataValue::Other(_)) => Err(PromptError::invalid_data(
                key,
                "must be a string or a non-empty list.",
            )),
            None => self
                .tracked
                .get(key)
                .cloned()
                .ok_or_else(|| PromptError::MissingKey(key.to_string())),
        }
    }

    /// All raw options for `key`. A string counts as a one-element list.
    pub(crate) fn options(&self, key: &str) -> PromptResult<Vec<String>> {
        match self.data.get(key) {
            Some(DataValue::Text(text)) => Ok(vec![text.clone()]),
            Some(DataValue::List(options)) if !options.is_empty() => Ok(options.clone()),
            Some(_) => Err(PromptError::invalid_data(
                key,
                "must be a string or a non-empty list.",
            )),
            None => self
                .tracked
                .get(key)
                .map(|text| vec![text.clone()])
                .ok_or_else(|| PromptError::MissingKey(key.to_string())),
        }
    }

    pub(crate) fn store_static(&mut self, key: String, value: String) -> PromptResult<()> {
        check_writable(&key)?;
        self.statics.insert(key, value);
        Ok(())
    }

    pub(crate) fn track(&mut self, name: &str, value: String) -> PromptResult<()> {
        check_writable(name)?;
        self.tracked.insert(format!("{}{}", TRACK_PREFIX, name), value);
        Ok(())
    }

    pub(crate) fn enter(&mut self) -> PromptResult<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(PromptError::ResourceExhausted(format!(
                "recursion depth exceeded {} nested resolutions",
                self.config.max_depth
            )));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn step(&mut self) -> PromptResult<()> {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(PromptError::ResourceExhausted(format!(
                "more than {} bracket substitutions in one pass",
                self.config.max_steps
            )));
        }
        Ok(())
    }

    pub fn statics(&self) -> &BTreeMap<String, String> {
        &self.statics
    }

    pub fn into_statics(self) -> BTreeMap<String, String> {
        self.statics
    }
}

fn check_writable(key: &str) -> PromptResult<()> {
    if let Some(prefix) = RESERVED_STATE_PREFIXES.iter().find(|p| key.starts_with(*p)) {
        return Err(PromptError::ReservedKey(format!(
            "Key '{}' cannot start with '{}'. This prefix is reserved.",
            key, prefix
        )));
    }
    Ok(())
}
